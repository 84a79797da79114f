//! Rewrites the current invocation so the same binary starts in another role.
//!
//! The parent hands its own argument vector to each child with the role
//! selectors replaced. One-shot flags are stripped so a child never repeats a
//! command that only makes sense once.

use std::ffi::{OsStr, OsString};

const DAEMON_LONG: &str = "--daemon";
const DAEMON_SHORT: &str = "-d";
const WORKER_LONG: &str = "--worker";
const WORKER_SHORT: &str = "-w";

/// Flags dropped on their own.
const ONE_SHOT_FLAGS: [&str; 2] = ["--migrate", "--status"];
/// One-shot flags that carry a value.
const ONE_SHOT_OPTIONS: [&str; 1] = ["--signal"];

#[derive(Clone, Copy, PartialEq, Eq)]
enum Selector {
    Daemon,
    Worker,
}

enum Token {
    Keep,
    Drop { takes_value: bool },
    Selector { selector: Selector, takes_value: bool },
}

/// Builds the argument vector for a child process.
///
/// The first `--daemon` selector (any of `--daemon=x`, `--daemon x`, `-d x`,
/// `-dx`) is replaced in place with `--daemon=<daemon>` and later ones are
/// dropped; `--daemon=<daemon>` is appended when none is present. With
/// `worker` set the `--worker` selector is handled the same way; without it
/// every worker selector is removed. Applying the rewrite twice yields the
/// same vector.
pub fn respawn_arguments<I, S>(args: I, daemon: &str, worker: Option<&str>) -> Vec<OsString>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let mut input = args.into_iter().map(Into::into);
    let mut output: Vec<OsString> = input.next().into_iter().collect();
    let mut daemon_written = false;
    let mut worker_written = false;

    while let Some(arg) = input.next() {
        match classify(&arg) {
            Token::Keep => output.push(arg),
            Token::Drop { takes_value } => {
                if takes_value {
                    input.next();
                }
            }
            Token::Selector {
                selector,
                takes_value,
            } => {
                if takes_value {
                    input.next();
                }
                match selector {
                    Selector::Daemon if !daemon_written => {
                        output.push(selector_arg(DAEMON_LONG, daemon));
                        daemon_written = true;
                    }
                    Selector::Worker => {
                        if let Some(worker) = worker
                            && !worker_written
                        {
                            output.push(selector_arg(WORKER_LONG, worker));
                            worker_written = true;
                        }
                    }
                    Selector::Daemon => {}
                }
            }
        }
    }

    if !daemon_written {
        output.push(selector_arg(DAEMON_LONG, daemon));
    }
    if let Some(worker) = worker
        && !worker_written
    {
        output.push(selector_arg(WORKER_LONG, worker));
    }
    output
}

fn selector_arg(flag: &str, value: &str) -> OsString {
    OsString::from(format!("{flag}={value}"))
}

fn classify(arg: &OsStr) -> Token {
    let Some(arg) = arg.to_str() else {
        return Token::Keep;
    };
    if ONE_SHOT_FLAGS.contains(&arg) {
        return Token::Drop { takes_value: false };
    }
    for option in ONE_SHOT_OPTIONS {
        if arg == option {
            return Token::Drop { takes_value: true };
        }
        if is_long_with_value(arg, option) {
            return Token::Drop { takes_value: false };
        }
    }
    for (selector, long, short) in [
        (Selector::Daemon, DAEMON_LONG, DAEMON_SHORT),
        (Selector::Worker, WORKER_LONG, WORKER_SHORT),
    ] {
        if arg == long || arg == short {
            return Token::Selector {
                selector,
                takes_value: true,
            };
        }
        if is_long_with_value(arg, long) || (arg.starts_with(short) && !arg.starts_with("--")) {
            return Token::Selector {
                selector,
                takes_value: false,
            };
        }
    }
    Token::Keep
}

fn is_long_with_value(arg: &str, flag: &str) -> bool {
    arg.strip_prefix(flag)
        .is_some_and(|rest| rest.starts_with('='))
}
