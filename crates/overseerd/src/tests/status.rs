//! Worker counts reported by the status query.

use nix::unistd::Pid;
use rstest::{fixture, rstest};

use crate::daemon::{Count, DaemonStatus, daemons_status};

use super::support::{Harness, IMPORT_TREE, dead_pid};

#[fixture]
fn harness() -> Harness {
    Harness::new()
}

fn status(current: usize, total: usize) -> DaemonStatus {
    DaemonStatus {
        count: Count { current, total },
    }
}

#[rstest]
fn the_watcher_reports_each_supervised_daemon(harness: Harness) {
    let runtime = harness.import_runtime(None);
    harness.write_pid("import_alpha.pid", Pid::this());
    harness.write_pid("import_beta.pid", dead_pid());

    let report = daemons_status(&runtime, "watcher");

    assert_eq!(report.len(), 1);
    assert_eq!(report["import"], status(1, 2));
}

#[rstest]
fn other_daemons_report_themselves(harness: Harness) {
    let runtime = harness.import_runtime(None);

    let report = daemons_status(&runtime, "import");

    assert_eq!(report.len(), 1);
    assert_eq!(report["import"], status(0, 2));
}

#[rstest]
#[case::unknown("reporting")]
#[case::disabled("archive")]
fn unavailable_daemons_are_left_out(harness: Harness, #[case] name: &str) {
    let yaml = format!("{IMPORT_TREE}  archive:\n    enabled: false\n");
    let runtime = harness.runtime(harness.config(&yaml, name, None));

    assert!(daemons_status(&runtime, name).is_empty());
}

#[rstest]
fn status_serialises_as_nested_counts(harness: Harness) {
    let runtime = harness.import_runtime(None);
    harness.write_pid("import_beta.pid", Pid::this());

    let json = serde_json::to_string(&daemons_status(&runtime, "watcher")).expect("serialise");

    assert_eq!(json, r#"{"import":{"count":{"current":1,"total":2}}}"#);
}
