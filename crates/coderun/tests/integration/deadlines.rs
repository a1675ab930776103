use std::time::{Duration, Instant};

use coderun::Runner;
use coderun::types::ExecutionRequest;

use super::{Scratch, process_exists, read_pid, shell_config};

#[tokio::test]
async fn test_timeout_kills_program() {
    let scratch = Scratch::new();
    let mut config = shell_config(&scratch);
    config.deadline = 1.0;
    let pid_file = scratch.path().join("pid");

    let source = format!("echo $$ > '{}'\nexec sleep 30", pid_file.display());
    let started = Instant::now();
    let response = Runner::new(config)
        .execute(ExecutionRequest::new("sh", source))
        .await;
    let waited = started.elapsed();

    assert_eq!(response.output, "");
    assert_eq!(response.errors.as_deref(), Some("execution timeout"));
    assert!(response.execution_time_seconds >= 0.9);
    assert!(waited < Duration::from_secs(5), "took {waited:?}");

    let pid = read_pid(&pid_file).await;
    assert!(!process_exists(pid), "process {pid} survived the timeout");
}

#[tokio::test]
async fn test_timeout_applies_to_compile_stage() {
    let scratch = Scratch::new();
    let mut config = shell_config(&scratch);
    config.deadline = 0.5;

    let started = Instant::now();
    let response = Runner::new(config)
        .execute(ExecutionRequest::new("slowc", "echo never"))
        .await;

    assert_eq!(response.errors.as_deref(), Some("execution timeout"));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_deadline_covers_all_stages() {
    let scratch = Scratch::new();
    let mut config = shell_config(&scratch);
    config.deadline = 1.0;
    // each stage fits the deadline on its own, together they do not
    config
        .languages
        .get_mut("shc")
        .expect("shc language")
        .compile
        .as_mut()
        .expect("shc compile")
        .command = vec![
        "sh".to_owned(),
        "-c".to_owned(),
        r#"sleep 0.7; cp "$1" "$2""#.to_owned(),
        "shc".to_owned(),
        "{source}".to_owned(),
        "{binary}".to_owned(),
    ];

    let response = Runner::new(config)
        .execute(ExecutionRequest::new("shc", "sleep 0.7\necho late"))
        .await;
    assert_eq!(response.errors.as_deref(), Some("execution timeout"));
}

#[tokio::test]
async fn test_program_within_deadline() {
    let scratch = Scratch::new();
    let mut config = shell_config(&scratch);
    config.deadline = 2.0;

    let response = Runner::new(config)
        .execute(ExecutionRequest::new("sh", "sleep 0.1\necho ok"))
        .await;
    assert_eq!(response.output, "ok\n");
    assert!(response.execution_time_seconds >= 0.1);
    assert!(response.execution_time_seconds < 2.0);
}

#[tokio::test]
async fn test_background_child_does_not_hold_job() {
    let scratch = Scratch::new();
    let mut config = shell_config(&scratch);
    config.kill_grace = 0.3;

    // the background sleep inherits stdout and keeps the pipe open
    let started = Instant::now();
    let response = Runner::new(config)
        .execute(ExecutionRequest::new("sh", "sleep 3 &\necho parent"))
        .await;

    assert_eq!(response.output, "parent\n");
    assert!(started.elapsed() < Duration::from_secs(2));
}
