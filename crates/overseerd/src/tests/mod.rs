//! Test suites for the supervisor.

mod status;
mod support;
