use std::time::{Duration, Instant};

use coderun::Runner;
use coderun::types::ExecutionRequest;

use super::{Scratch, leftover_entries, process_exists, read_pid, shell_config};

#[tokio::test]
async fn test_abort_running_job() {
    let scratch = Scratch::new();
    let runner = Runner::new(shell_config(&scratch));
    let pid_file = scratch.path().join("pid");

    let source = format!("echo $$ > '{}'\nexec sleep 30", pid_file.display());
    let started = Instant::now();
    let submission = runner.submit(ExecutionRequest::new("sh", source));

    let pid = read_pid(&pid_file).await;
    assert!(runner.abort(submission.handle()));
    let response = submission.response().await;

    assert_eq!(response.output, "");
    assert_eq!(response.errors.as_deref(), Some("execution aborted"));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!process_exists(pid), "process {pid} survived the abort");
    assert!(leftover_entries(&scratch.work_dir()).is_empty());
}

#[tokio::test]
async fn test_abort_before_launch() {
    let scratch = Scratch::new();
    let runner = Runner::new(shell_config(&scratch));

    let submission = runner.submit(ExecutionRequest::new("sh", "exec sleep 30"));
    runner.abort(submission.handle());
    let response = submission.response().await;

    assert_eq!(response.errors.as_deref(), Some("execution aborted"));
    assert!(leftover_entries(&scratch.work_dir()).is_empty());
}

#[tokio::test]
async fn test_abort_after_completion_has_no_effect() {
    let scratch = Scratch::new();
    let runner = Runner::new(shell_config(&scratch));

    let submission = runner.submit(ExecutionRequest::new("sh", "echo done"));
    let handle = submission.handle().clone();
    let response = submission.response().await;

    assert!(runner.abort(&handle));
    assert!(!runner.abort(&handle));
    assert_eq!(response.output, "done\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_abort_only_affects_its_job() {
    let scratch = Scratch::new();
    let runner = Runner::new(shell_config(&scratch));

    let doomed = runner.submit(ExecutionRequest::new("sh", "exec sleep 30"));
    let survivor = runner.submit(ExecutionRequest::new("sh", "sleep 0.3\necho survived"));

    tokio::time::sleep(Duration::from_millis(100)).await;
    runner.abort(doomed.handle());

    assert_eq!(
        doomed.response().await.errors.as_deref(),
        Some("execution aborted")
    );
    assert_eq!(survivor.response().await.output, "survived\n");
}
