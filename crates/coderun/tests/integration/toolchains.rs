use coderun::config::Config;
use coderun::types::ExecutionRequest;
use coderun::{RunError, Runner};

use super::{Scratch, leftover_entries, shell_config};

#[tokio::test]
async fn test_missing_toolchain() {
    let scratch = Scratch::new();
    let response = Runner::new(shell_config(&scratch))
        .execute(ExecutionRequest::new("ghost", "boo"))
        .await;

    assert_eq!(response.output, "");
    let errors = response.errors.expect("expected an error");
    assert!(
        errors.starts_with("Ghost compiler (ghostc) is not installed or not on PATH"),
        "unexpected error: {errors}"
    );
    assert!(errors.contains("coderun-test-ghostc"));
    assert!(leftover_entries(&scratch.work_dir()).is_empty());
}

#[tokio::test]
async fn test_check_toolchain() {
    let scratch = Scratch::new();
    let runner = Runner::new(shell_config(&scratch));

    assert!(runner.check_toolchain("sh").await.is_ok());
    assert!(matches!(
        runner.check_toolchain("ghost").await,
        Err(RunError::ToolchainUnavailable { .. })
    ));
    assert!(matches!(
        runner.check_toolchain("cobol").await,
        Err(RunError::UnsupportedLanguage(_))
    ));
}

fn flaky_tool_config(scratch: &Scratch, cache_probes: bool) -> Config {
    let marker = scratch.path().join("tool-installed");
    let toml = format!(
        r#"
cache_probes = {cache_probes}

[languages.flaky]
name = "Flaky"
extension = "sh"

[[languages.flaky.toolchain]]
name = "Flaky tool"
probe = ["test", "-f", "{}"]

[languages.flaky.run]
command = ["sh", "{{source}}"]
"#,
        marker.display()
    );
    std::fs::write(&marker, b"").unwrap();
    let mut config = Config::parse_toml(&toml).unwrap();
    config.work_dir = Some(scratch.work_dir());
    config
}

#[tokio::test]
async fn test_successful_probes_are_cached() {
    let scratch = Scratch::new();
    let runner = Runner::new(flaky_tool_config(&scratch, true));

    assert!(runner.check_toolchain("flaky").await.is_ok());
    std::fs::remove_file(scratch.path().join("tool-installed")).unwrap();
    assert!(runner.check_toolchain("flaky").await.is_ok());
}

#[tokio::test]
async fn test_probes_without_cache() {
    let scratch = Scratch::new();
    let runner = Runner::new(flaky_tool_config(&scratch, false));

    assert!(runner.check_toolchain("flaky").await.is_ok());
    std::fs::remove_file(scratch.path().join("tool-installed")).unwrap();

    let response = runner
        .execute(ExecutionRequest::new("flaky", "echo never"))
        .await;
    let errors = response.errors.expect("expected an error");
    assert!(errors.starts_with("Flaky tool is not installed or not on PATH"));
}
