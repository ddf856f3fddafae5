use std::io::Write;

use braid_core::config::WorkflowConfig;
use braid_core::error::BraidError;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[workflow]
name = "article-pipeline"
description = "Research a topic and write it up"

[llm]
endpoint = "http://localhost:11434/api/chat"
model = "llama3.2"
timeout_secs = 60
temperature = 0.3
strip_thinking = true

[call]
max_retries = 2
retry_backoff_secs = 0.25

[[node]]
name = "Research"
prompt = "Collect key facts about {topic}."
system = "You are a meticulous researcher."

[[node]]
name = "Write"
prompt = "Write a short article based on: {findings}"
depends_on = ["Research"]

[node.inputs]
findings = "Research.content"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = WorkflowConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.workflow.name, "article-pipeline");
    assert_eq!(config.llm.model, "llama3.2");
    assert_eq!(config.llm.timeout_secs, 60);
    assert_eq!(config.llm.temperature, Some(0.3));
    assert!(config.llm.strip_thinking);
    assert_eq!(config.call.max_retries, 2);
    assert_eq!(config.call.retry_backoff_secs, 0.25);

    assert_eq!(config.nodes.len(), 2);
    assert_eq!(config.nodes[0].name, "Research");
    assert_eq!(
        config.nodes[0].system.as_deref(),
        Some("You are a meticulous researcher.")
    );
    assert_eq!(config.nodes[1].depends_on, vec!["Research"]);
    assert_eq!(
        config.nodes[1].inputs.get("findings").unwrap(),
        "Research.content"
    );
}

#[test]
fn test_defaults_fill_omitted_sections() {
    let toml_content = r#"
[workflow]
name = "minimal"

[llm]
model = "llama3.2"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = WorkflowConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.llm.endpoint, "http://localhost:11434/api/chat");
    assert_eq!(config.llm.timeout_secs, 120);
    assert_eq!(config.call.max_retries, 1);
    assert!(config.nodes.is_empty());
}

#[test]
fn test_invalid_toml_is_a_config_error() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[workflow\nname = ").expect("write toml");

    let err = WorkflowConfig::load(tmp.path()).unwrap_err();
    assert!(matches!(err, BraidError::Config(_)));
}

#[test]
fn test_missing_file_is_distinguished() {
    let err = WorkflowConfig::load(std::path::Path::new("/no/such/braid.toml")).unwrap_err();
    assert!(matches!(err, BraidError::ConfigNotFound(_)));
}
