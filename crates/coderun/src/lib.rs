//! A library for running submitted source code.
//!
//! Coderun takes a piece of source code and a language tag, writes the
//! source into a private job directory, runs the language's compile and run
//! stages as local processes under a single deadline, and returns the
//! program's output together with its execution time and memory usage.
//!
//! # Features
//!
//! - **Multi-language** — Interpreted, compiled and named-class (Java style) pipelines.
//! - **TOML configuration** — Per-language commands, toolchain probes and measurement drivers.
//! - **Deadlines** — One wall clock budget per job; processes that overrun are killed.
//! - **Cleanup** — Every file written for a job is removed on every outcome.
//! - **Aborts** — Background jobs can be stopped through their handle.
//!
//! # Example
//!
//! ```no_run
//! use coderun::{ExecutionRequest, Runner};
//!
//! # async fn demo() {
//! let runner = Runner::with_defaults();
//! let response = runner
//!     .execute(ExecutionRequest::new("python", "print(5)"))
//!     .await;
//! assert_eq!(response.output, "5\n");
//! # }
//! ```

pub use config::{Config, ConfigError, EXAMPLE_CONFIG, Language};
pub use process::{ProcessError, StageOutcome};
pub use runner::{JobHandle, JobId, RunError, Runner, Submission};
pub use types::{ExecutionRequest, ExecutionResponse, Feedback, FeedbackAnalyzer, NoFeedback};

pub mod config;
pub mod process;
pub mod runner;
pub mod types;
