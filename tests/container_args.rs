// tests/container_args.rs

mod common;
use crate::common::{AgentConfigBuilder, test_settings};

use std::error::Error;
use std::path::PathBuf;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use agentloop::exec::{ContainerBackend, ExecutionRequest};
use agentloop::types::{ContainerRuntime, RunMode};

type TestResult = Result<(), Box<dyn Error>>;

/// Value following each `flag` occurrence.
fn values_of<'a>(args: &'a [String], flag: &str) -> Vec<&'a str> {
    args.windows(2)
        .filter(|w| w[0] == flag)
        .map(|w| w[1].as_str())
        .collect()
}

#[test]
fn triggered_run_carries_env_mounts_and_init() -> TestResult {
    let state = PathBuf::from("/state");
    let settings = test_settings(&state);
    let agent = AgentConfigBuilder::new("notes", "/work/notes")
        .prompt("check inbox")
        .model("opus")
        .env("NOTES_MODE", "triage")
        .init("git pull --ff-only")
        .init("make deps")
        .script_trigger("true")
        .build();

    let request = ExecutionRequest::for_agent(&agent, &settings, RunMode::Triggered);
    let backend = ContainerBackend::new(ContainerRuntime::Docker, &settings)
        .with_credentials(None)
        .with_debug(Some("1".to_string()));
    let args = backend.build_args(&request, "agentloop-notes-1-1", Some("tok"));

    let env = values_of(&args, "-e");
    assert!(env.contains(&"CLAUDE_PROJECT_NAME=notes"));
    assert!(env.contains(&"CLAUDE_AGENT_MODE=1"));
    assert!(env.contains(&"AGENTLOOP_RUN_MODE=triggered"));
    assert!(env.contains(&"NOTES_MODE=triage"));
    assert!(env.contains(&"CLAUDE_CODE_OAUTH_TOKEN=tok"));
    assert!(env.contains(&"C3PO_DEBUG=1"));

    let handoff_env = env
        .iter()
        .find_map(|e| e.strip_prefix("TRIGGER_HANDOFF_FILE="))
        .ok_or("missing TRIGGER_HANDOFF_FILE")?;

    let mounts = values_of(&args, "-v");
    assert!(mounts.contains(&"/state:/home/node/.claude"));
    assert!(mounts.contains(&"/work/notes:/workspace"));
    assert!(mounts.contains(&"/state/.claude.json:/home/node/.claude.json"));
    assert!(mounts.contains(&"/state/claude-docker.yaml:/home/node/claude-docker.yaml"));
    let handoff_mount = format!("/state/agents/notes-trigger-handoff:{handoff_env}");
    assert!(mounts.contains(&handoff_mount.as_str()), "{mounts:?}");

    let init = env
        .iter()
        .find_map(|e| e.strip_prefix("AGENT_INIT="))
        .ok_or("missing AGENT_INIT")?;
    let decoded: Vec<String> = serde_json::from_slice(&STANDARD.decode(init)?)?;
    assert_eq!(decoded, vec!["git pull --ff-only", "make deps"]);

    assert_eq!(values_of(&args, "-p"), vec!["check inbox"]);
    assert_eq!(values_of(&args, "--model"), vec!["opus"]);
    Ok(())
}

#[test]
fn bootstrap_run_uses_the_bootstrap_prompt() {
    let settings = test_settings(&PathBuf::from("/state"));
    let agent = AgentConfigBuilder::new("notes", "/work/notes")
        .prompt("check inbox")
        .script_trigger("true")
        .build();

    let request = ExecutionRequest::for_agent(&agent, &settings, RunMode::Bootstrap);
    let backend = ContainerBackend::new(ContainerRuntime::Finch, &settings)
        .with_credentials(None)
        .with_debug(None);
    let args = backend.build_args(&request, "n", None);

    assert_eq!(values_of(&args, "-p"), vec!["/c3po auto"]);
    assert!(!args.iter().any(|a| a.starts_with("C3PO_DEBUG=")));
    assert!(values_of(&args, "-e").contains(&"AGENTLOOP_RUN_MODE=bootstrap"));
    assert!(!args.iter().any(|a| a.starts_with("AGENT_INIT=")));
}

#[test]
fn credentials_are_mounted_read_only() {
    let settings = test_settings(&PathBuf::from("/state"));
    let agent = AgentConfigBuilder::new("notes", "/work/notes").build();

    let request = ExecutionRequest::for_agent(&agent, &settings, RunMode::AlwaysOn);
    let backend = ContainerBackend::new(ContainerRuntime::Docker, &settings)
        .with_credentials(Some(PathBuf::from("/home/me/.claude/.credentials.json")));
    let args = backend.build_args(&request, "n", None);

    assert!(values_of(&args, "-v")
        .contains(&"/home/me/.claude/.credentials.json:/home/node/.claude/.credentials.json:ro"));
}
