//! Round bookkeeping, truncation, and result classification.

use pretty_assertions::assert_eq;

use volley::tools::{
    truncate_result, MarkerClassifier, ResultClassifier, RoundStatus, ToolExecutionCoordinator,
    RESULT_CHAR_CAP, TRUNCATION_MARKER,
};
use volley::types::ToolCall;

fn call(id: &str) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: "create_file".to_string(),
        arguments: serde_json::json!({}),
    }
}

#[test]
fn round_completes_on_the_last_missing_result() {
    let mut coordinator = ToolExecutionCoordinator::new();
    coordinator.begin_round(vec![call("a"), call("b")]);

    assert_eq!(
        coordinator.submit_result("a", "one".to_string()),
        RoundStatus::Pending
    );
    assert!(!coordinator.is_complete());
    assert_eq!(
        coordinator.submit_result("b", "two".to_string()),
        RoundStatus::Complete
    );
    assert!(coordinator.is_complete());
}

#[test]
fn completion_is_independent_of_submission_order() {
    let mut coordinator = ToolExecutionCoordinator::new();
    coordinator.begin_round(vec![call("a"), call("b")]);

    assert_eq!(
        coordinator.submit_result("b", "two".to_string()),
        RoundStatus::Pending
    );
    assert_eq!(
        coordinator.submit_result("a", "one".to_string()),
        RoundStatus::Complete
    );
}

#[test]
fn resubmission_updates_text_without_recompleting() {
    let mut coordinator = ToolExecutionCoordinator::new();
    coordinator.begin_round(vec![call("a")]);

    assert_eq!(
        coordinator.submit_result("a", "first".to_string()),
        RoundStatus::Complete
    );
    // A late duplicate still reports Complete and the text is replaced.
    assert_eq!(
        coordinator.submit_result("a", "second".to_string()),
        RoundStatus::Complete
    );
    assert_eq!(coordinator.result("a").unwrap().text, "second");
}

#[test]
fn begin_round_discards_previous_residue() {
    let mut coordinator = ToolExecutionCoordinator::new();
    coordinator.begin_round(vec![call("a")]);
    coordinator.submit_result("a", "one".to_string());
    assert!(coordinator.is_complete());

    coordinator.begin_round(vec![call("b")]);
    assert!(!coordinator.is_complete());
    assert!(coordinator.result("a").is_none());
    assert_eq!(coordinator.pending().len(), 1);
    assert_eq!(coordinator.pending()[0].id, "b");
}

#[test]
fn stray_result_ids_do_not_complete_the_round() {
    let mut coordinator = ToolExecutionCoordinator::new();
    coordinator.begin_round(vec![call("a")]);

    assert_eq!(
        coordinator.submit_result("unrelated", "noise".to_string()),
        RoundStatus::Pending
    );
    assert!(!coordinator.is_complete());
}

#[test]
fn empty_round_never_reports_complete() {
    let mut coordinator = ToolExecutionCoordinator::new();
    assert_eq!(
        coordinator.submit_result("a", "one".to_string()),
        RoundStatus::Pending
    );
    assert!(!coordinator.is_complete());
}

#[test]
fn results_at_the_cap_pass_through() {
    let exact = "x".repeat(RESULT_CHAR_CAP);
    assert_eq!(truncate_result(&exact), exact);
    assert_eq!(truncate_result("short"), "short");
}

#[test]
fn oversized_results_are_cut_and_marked() {
    let long = "y".repeat(RESULT_CHAR_CAP + 500);
    let truncated = truncate_result(&long);

    assert!(truncated.ends_with(TRUNCATION_MARKER));
    let kept = truncated.trim_end_matches(TRUNCATION_MARKER);
    assert_eq!(kept.chars().count(), RESULT_CHAR_CAP);
}

#[test]
fn truncation_counts_characters_not_bytes() {
    let long = "日".repeat(RESULT_CHAR_CAP + 1);
    let truncated = truncate_result(&long);
    assert!(truncated.ends_with(TRUNCATION_MARKER));
    let kept = truncated.trim_end_matches(TRUNCATION_MARKER);
    assert_eq!(kept.chars().count(), RESULT_CHAR_CAP);
}

#[test]
fn marker_classifier_flags_failure_text() {
    let classifier = MarkerClassifier;
    assert!(classifier.is_success("create_file", "file written to /tmp/a"));
    assert!(!classifier.is_success("create_file", "Error: permission denied"));
    assert!(!classifier.is_success("execute_command", "the command FAILED"));
    // Known limitation of the heuristic: mentions of failure flip the flag
    // even in success messages.
    assert!(!classifier.is_success("execute_command", "recovered from error"));
}
