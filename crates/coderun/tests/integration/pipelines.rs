use coderun::types::{ExecutionRequest, Feedback, FeedbackAnalyzer};
use coderun::Runner;

use super::{Scratch, shell_config};

fn runner(scratch: &Scratch) -> Runner {
    Runner::new(shell_config(scratch))
}

#[tokio::test]
async fn test_interpreted_literal_output() {
    let scratch = Scratch::new();
    let response = runner(&scratch)
        .execute(ExecutionRequest::new("sh", "echo 5"))
        .await;

    assert_eq!(response.output, "5\n");
    assert!(response.errors.is_none());
    assert!(response.execution_time_seconds >= 0.0);
    assert_eq!(response.memory_megabytes, 0.0);
    assert!(response.feedback.is_none());
}

#[tokio::test]
async fn test_unicode_output() {
    let scratch = Scratch::new();
    let response = runner(&scratch)
        .execute(ExecutionRequest::new("sh", "printf 'héllo wörld ✓\\n'"))
        .await;
    assert_eq!(response.output, "héllo wörld ✓\n");
}

#[tokio::test]
async fn test_stdin_is_delivered() {
    let scratch = Scratch::new();
    let request = ExecutionRequest::new("sh", "read a b\necho $((a + b))").with_stdin("2 3\n");
    let response = runner(&scratch).execute(request).await;
    assert_eq!(response.output, "5\n");
    assert!(response.is_success());
}

#[tokio::test]
async fn test_missing_stdin_reads_eof() {
    let scratch = Scratch::new();
    let response = runner(&scratch)
        .execute(ExecutionRequest::new("sh", "cat\necho done"))
        .await;
    assert_eq!(response.output, "done\n");
}

#[tokio::test]
async fn test_stderr_is_ignored_on_success() {
    let scratch = Scratch::new();
    let response = runner(&scratch)
        .execute(ExecutionRequest::new("sh", "echo out\necho warning >&2"))
        .await;
    assert_eq!(response.output, "out\n");
    assert!(response.errors.is_none());
}

#[tokio::test]
async fn test_runtime_failure_reports_stderr() {
    let scratch = Scratch::new();
    let response = runner(&scratch)
        .execute(ExecutionRequest::new(
            "sh",
            "echo partial\necho 'division by zero' >&2\nexit 3",
        ))
        .await;
    assert_eq!(response.output, "");
    assert_eq!(response.errors.as_deref(), Some("division by zero\n"));
}

#[tokio::test]
async fn test_runtime_failure_without_stderr() {
    let scratch = Scratch::new();
    let response = runner(&scratch)
        .execute(ExecutionRequest::new("sh", "exit 4"))
        .await;
    assert_eq!(response.errors.as_deref(), Some("process exited with code 4"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_killed_by_signal() {
    let scratch = Scratch::new();
    let response = runner(&scratch)
        .execute(ExecutionRequest::new("sh", "kill -9 $$"))
        .await;
    assert_eq!(
        response.errors.as_deref(),
        Some("process terminated by signal 9")
    );
}

#[tokio::test]
async fn test_interleaved_streams_are_reassembled() {
    let scratch = Scratch::new();
    let source = r#"
i=1
while [ $i -le 3000 ]; do
  echo "line $i"
  echo "err $i" >&2
  i=$((i + 1))
done
"#;
    let response = runner(&scratch)
        .execute(ExecutionRequest::new("sh", source))
        .await;

    let expected: String = (1..=3000).map(|i| format!("line {i}\n")).collect();
    assert!(response.is_success(), "{:?}", response.errors);
    assert_eq!(response.output, expected);
}

#[tokio::test]
async fn test_output_is_capped() {
    let scratch = Scratch::new();
    let mut config = shell_config(&scratch);
    config.max_output = 1024;
    let response = Runner::new(config)
        .execute(ExecutionRequest::new(
            "sh",
            "i=0\nwhile [ $i -lt 500 ]; do echo 0123456789; i=$((i + 1)); done",
        ))
        .await;
    assert!(response.is_success());
    assert_eq!(response.output.len(), 1024);
}

#[tokio::test]
async fn test_compiled_pipeline() {
    let scratch = Scratch::new();
    let response = runner(&scratch)
        .execute(ExecutionRequest::new("shc", "echo compiled").with_stdin("unused\n"))
        .await;
    assert_eq!(response.output, "compiled\n");
    assert!(response.errors.is_none());
}

#[tokio::test]
async fn test_compile_failure_reports_diagnostics() {
    let scratch = Scratch::new();
    let response = runner(&scratch)
        .execute(ExecutionRequest::new("shc", "echo never\n# COMPILE_ERROR"))
        .await;
    assert_eq!(response.output, "");
    assert_eq!(
        response.errors.as_deref(),
        Some("main.sh:1: error: COMPILE_ERROR\n")
    );
}

#[tokio::test]
async fn test_compiler_without_output() {
    let scratch = Scratch::new();
    let response = runner(&scratch)
        .execute(ExecutionRequest::new("shnull", "echo never"))
        .await;
    assert_eq!(
        response.errors.as_deref(),
        Some("compiler did not produce 'program'")
    );
}

#[tokio::test]
async fn test_named_class_uses_declared_type() {
    let scratch = Scratch::new();
    let source = "# public class Greeter {\necho \"class $1 from $(basename \"$0\")\"\n";
    let response = runner(&scratch)
        .execute(ExecutionRequest::new("shclass", source))
        .await;
    assert_eq!(response.output, "class Greeter from Greeter.out\n");
}

#[tokio::test]
async fn test_named_class_fallback() {
    let scratch = Scratch::new();
    let response = runner(&scratch)
        .execute(ExecutionRequest::new("shclass", "echo \"class $1\""))
        .await;
    assert_eq!(response.output, "class Main\n");
}

#[tokio::test]
async fn test_performance_markers_are_extracted() {
    let scratch = Scratch::new();
    let response = runner(&scratch)
        .execute(ExecutionRequest::new("shm", "echo hello"))
        .await;
    assert_eq!(response.output, "hello\n");
    assert_eq!(response.execution_time_seconds, 0.042);
    assert_eq!(response.memory_megabytes, 3.5);
}

#[tokio::test]
async fn test_measured_source_is_written_verbatim() {
    let scratch = Scratch::new();
    let source = "#!/bin/sh\ncat \"$0\"";
    let response = runner(&scratch)
        .execute(ExecutionRequest::new("shm", source))
        .await;
    assert_eq!(response.output, source);
    assert_eq!(response.memory_megabytes, 3.5);
}

#[tokio::test]
async fn test_measured_failure_has_no_markers() {
    let scratch = Scratch::new();
    let response = runner(&scratch)
        .execute(ExecutionRequest::new("shm", "echo partial\nexit 4"))
        .await;
    assert_eq!(response.output, "");
    assert_eq!(response.errors.as_deref(), Some("process exited with code 4"));
    assert_eq!(response.memory_megabytes, 0.0);
}

#[tokio::test]
async fn test_marker_lookalike_in_middle_is_kept() {
    let scratch = Scratch::new();
    let source = "printf '%s\\n' '--- Performance Metrics ---' 'Execution time: 9 seconds' 'Memory usage: 9 MB' after";
    let response = runner(&scratch)
        .execute(ExecutionRequest::new("sh", source))
        .await;
    assert!(response.output.ends_with("after\n"));
    assert!(response.output.contains("--- Performance Metrics ---"));
    assert_eq!(response.memory_megabytes, 0.0);
}

#[tokio::test]
async fn test_unsupported_language() {
    let scratch = Scratch::new();
    let response = runner(&scratch)
        .execute(ExecutionRequest::new("ruby", "puts 5"))
        .await;
    assert_eq!(response.output, "");
    assert_eq!(response.errors.as_deref(), Some("unsupported language: ruby"));
    assert!(!scratch.work_dir().exists());
}

#[derive(Debug)]
struct LineCounter;

impl FeedbackAnalyzer for LineCounter {
    fn analyze(&self, source: &str, language: &str) -> Option<Feedback> {
        Some(Feedback {
            complexity: "O(1)".to_owned(),
            notes: vec![format!("{language}: {} lines", source.lines().count())],
        })
    }
}

#[tokio::test]
async fn test_feedback_is_attached() {
    let scratch = Scratch::new();
    let runner = runner(&scratch).with_feedback(LineCounter);

    let response = runner
        .execute(ExecutionRequest::new("sh", "echo a\necho b"))
        .await;
    let feedback = response.feedback.expect("feedback missing");
    assert_eq!(feedback.notes, vec!["sh: 2 lines".to_owned()]);

    // failures carry feedback as well
    let response = runner.execute(ExecutionRequest::new("sh", "exit 1")).await;
    assert!(response.errors.is_some());
    assert!(response.feedback.is_some());
}
