use refinery_harness::telemetry::collector::{
    latest_baseline, read_run_reports, read_trace_events, CollectorError,
};
use refinery_harness::telemetry::schemas::TraceEvent;

fn run_report_json(run_id: &str, timestamp: &str) -> String {
    serde_json::json!({
        "run_id": run_id,
        "timestamp": timestamp,
        "task_id": "task-1",
        "subtask_id": "sub-1",
        "feature": "login",
        "test_type": "unit",
        "phases": [],
        "fix_routing": {
            "code_review_cycles": 0,
            "arch_review_cycles": 0,
            "escalations": []
        },
        "guard_violations": [],
        "overall_status": "DONE",
        "partial_credit_score": 1.0
    })
    .to_string()
}

#[test]
fn run_reports_are_sorted_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("a.json"),
        run_report_json("old", "2026-08-01T00:00:00Z"),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("b.json"),
        run_report_json("new", "2026-08-02T00:00:00Z"),
    )
    .unwrap();

    let reports = read_run_reports(dir.path()).unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].run_id, "new");
    assert_eq!(reports[1].run_id, "old");
}

#[test]
fn malformed_report_is_a_hard_error_naming_the_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("good.json"),
        run_report_json("ok", "2026-08-01T00:00:00Z"),
    )
    .unwrap();
    std::fs::write(dir.path().join("zz-bad.json"), "{\"run_id\": 42}").unwrap();

    let err = read_run_reports(dir.path()).unwrap_err();
    match err {
        CollectorError::Parse { context, .. } => assert!(context.contains("zz-bad.json")),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn trace_lines_parse_by_shape() {
    let dir = tempfile::tempdir().unwrap();
    let timing = serde_json::json!({
        "timestamp": "2026-08-01T00:00:00Z",
        "agent": "tdd-implementer",
        "phase": "GREEN",
        "started_at": "2026-08-01T00:00:00Z",
        "finished_at": "2026-08-01T00:01:00Z",
        "tool_calls_count": 12.0
    });
    let violation = serde_json::json!({
        "timestamp": "2026-08-01T00:02:00Z",
        "agent": "tdd-implementer",
        "attempted_action": "edit",
        "target_file": "tests/login.rs",
        "blocked": true,
        "reason": "test files are protected during GREEN"
    });
    std::fs::write(
        dir.path().join("trace.jsonl"),
        format!("{timing}\n\n{violation}\n"),
    )
    .unwrap();

    let events = read_trace_events(dir.path()).unwrap();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], TraceEvent::Timing(_)));
    assert!(matches!(events[1], TraceEvent::Violation(_)));
}

#[test]
fn malformed_trace_error_names_file_and_line() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("trace.jsonl"), "{\"ok\": true}\nnot json\n").unwrap();

    let err = read_trace_events(dir.path()).unwrap_err();
    match err {
        CollectorError::Parse { context, .. } => {
            assert!(context.contains("trace.jsonl"));
            assert!(context.ends_with(":1") || context.ends_with(":2"));
        }
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn missing_baseline_directory_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let baseline = latest_baseline(dir.path().join("reports")).unwrap();
    assert!(baseline.is_none());
}

#[test]
fn empty_baseline_directory_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let baseline = latest_baseline(dir.path()).unwrap();
    assert!(baseline.is_none());
}
