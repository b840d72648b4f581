use super::*;

#[test]
fn metadata_agent_ids_matches_spawned_set() {
    let agent_ids = vec!["agent-0".to_owned(), "agent-1".to_owned()];
    let metadata = run_metadata(false, &agent_ids);
    assert_eq!(metadata["status"], "completed");
    assert_eq!(metadata["agent_ids"], serde_json::json!(["agent-0", "agent-1"]));
}

#[test]
fn metadata_status_reflects_interruption() {
    let metadata = run_metadata(true, &[]);
    assert_eq!(metadata["status"], "interrupted");
    assert_eq!(metadata["agent_ids"], serde_json::json!([]));
}
