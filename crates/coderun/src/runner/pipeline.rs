//! Stage selection
//!
//! Turns a language configuration into the ordered list of stages a job
//! runs: an optional compile stage followed by the run stage. Selection is
//! pure; nothing is spawned or written here.

use std::path::{Path, PathBuf};

use crate::config::{Config, Language, Placeholders};
use crate::process::StageCommand;
use crate::runner::RunError;
use crate::runner::materialize::MaterializedSource;

/// Kind of pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Compile,
    Run,
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageKind::Compile => write!(f, "compile"),
            StageKind::Run => write!(f, "run"),
        }
    }
}

/// One process launch in a job's pipeline
#[derive(Debug, Clone)]
pub struct Stage {
    pub kind: StageKind,
    pub command: StageCommand,
    /// Exit code that counts as success
    pub expected_exit_code: i32,
    /// A failure of this stage skips the stages after it
    pub aborts_pipeline: bool,
    /// File the stage must produce, registered for cleanup before launch
    pub output: Option<PathBuf>,
}

/// Look up the language for a request's tag
pub fn resolve<'a>(config: &'a Config, tag: &str) -> Result<&'a Language, RunError> {
    config
        .get_language(tag)
        .map_err(|_| RunError::UnsupportedLanguage(tag.to_owned()))
}

/// Build the stages for a materialized source
///
/// Every stage runs in `job_dir`. Compiled languages get a compile stage
/// whose output path is `job_dir/<output_name>`, and the run stage refers
/// to that output through `{binary}`.
pub fn select(
    language: &Language,
    source: &MaterializedSource,
    job_dir: &Path,
) -> Result<Vec<Stage>, RunError> {
    let binary = language.compile.as_ref().map(|compile| {
        job_dir.join(compile.output_name.replace("{class}", &source.type_name))
    });

    let placeholders = Placeholders {
        source: &source.path,
        binary: binary.as_deref(),
        driver: source.driver.as_deref(),
        class: &source.type_name,
        dir: job_dir,
    };

    let mut stages = Vec::with_capacity(2);

    if let Some(compile) = &language.compile {
        let command = build_command(&compile.command, &placeholders, job_dir)?
            .envs(compile.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        stages.push(Stage {
            kind: StageKind::Compile,
            command,
            expected_exit_code: 0,
            aborts_pipeline: true,
            output: binary.clone(),
        });
    }

    let command = build_command(&language.run.command, &placeholders, job_dir)?
        .envs(language.run.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    stages.push(Stage {
        kind: StageKind::Run,
        command,
        expected_exit_code: 0,
        aborts_pipeline: true,
        output: None,
    });

    Ok(stages)
}

fn build_command(
    template: &[String],
    placeholders: &Placeholders<'_>,
    job_dir: &Path,
) -> Result<StageCommand, RunError> {
    let argv = Language::expand_command(template, placeholders);
    StageCommand::from_argv(argv)
        .map(|command| command.working_dir(job_dir))
        .map_err(|e| RunError::Internal(format!("invalid command template: {e}")))
}
