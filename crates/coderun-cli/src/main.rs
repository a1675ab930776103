//! Coderun CLI
//!
//! A command-line tool for running source files through coderun pipelines.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coderun::{Config, EXAMPLE_CONFIG, ExecutionRequest, Language, Runner};
use tracing::{Level, debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "coderun")]
#[command(about = "A tool for compiling and running source code under a deadline")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration file
    Init {
        /// Output path (default: coderun.toml)
        #[arg(short, long, default_value = "coderun.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Run a program (compile if needed, then execute)
    Run {
        /// Source file to run
        #[arg(value_name = "FILE")]
        source: PathBuf,

        /// Language ID (e.g., cpp, python)
        #[arg(short, long)]
        language: String,

        /// File whose content is written to the program's stdin
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Deadline in seconds, overriding the configured one
        #[arg(short, long)]
        deadline: Option<f64>,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },

    /// List available languages
    Languages,

    /// Check that language toolchains are installed
    Check {
        /// Language ID (default: every configured language)
        language: Option<String>,
    },

    /// Show effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = if let Some(ref path) = cli.config {
        info!(?path, "loading configuration");
        Config::from_file(path).context("failed to load configuration")?
    } else {
        debug!("using default configuration");
        Config::default()
    };

    match cli.command {
        Commands::Init { output, force } => init_config(&output, force).await,
        Commands::Run {
            source,
            language,
            input,
            deadline,
            json,
        } => run_source(config, &source, &language, input.as_deref(), deadline, json).await,
        Commands::Languages => {
            list_languages(&config);
            Ok(())
        }
        Commands::Check { language } => check_toolchains(config, language.as_deref()).await,
        Commands::ShowConfig => {
            show_config(&config);
            Ok(())
        }
    }
}

async fn run_source(
    mut config: Config,
    source: &Path,
    language_id: &str,
    input: Option<&Path>,
    deadline: Option<f64>,
    json: bool,
) -> Result<()> {
    if let Some(deadline) = deadline {
        config.deadline = deadline;
        config.validate().context("invalid --deadline")?;
    }

    let source_text = tokio::fs::read_to_string(source)
        .await
        .context("failed to read source file")?;

    let mut request = ExecutionRequest::new(language_id, source_text);
    if let Some(input_path) = input {
        let stdin = tokio::fs::read_to_string(input_path)
            .await
            .context("failed to read input file")?;
        request = request.with_stdin(stdin);
    }

    info!(language = language_id, "running program");
    let response = Runner::new(config).execute(request).await;

    if json {
        let rendered =
            serde_json::to_string_pretty(&response).context("failed to serialize response")?;
        println!("{rendered}");
    } else {
        print!("{}", response.output);
        if let Some(errors) = &response.errors {
            eprintln!("{errors}");
        }
    }

    // Log execution info via tracing (stderr), keeping stdout clean for piping
    info!(
        time = format_args!("{:.3}s", response.execution_time_seconds),
        memory = format_args!("{:.2} MB", response.memory_megabytes),
        success = response.is_success(),
        "execution result"
    );

    if response.is_success() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn pipeline_kind(language: &Language) -> &'static str {
    match (language.is_compiled(), language.is_named_class()) {
        (true, true) => "compiled, named class",
        (true, false) => "compiled",
        (false, _) => "interpreted",
    }
}

fn list_languages(config: &Config) {
    println!("Available languages:\n");

    let mut languages: Vec<_> = config.languages.iter().collect();
    languages.sort_by_key(|(id, _)| *id);

    for (id, lang) in languages {
        println!("  {:<15} {} ({})", id, lang.name, pipeline_kind(lang));
    }
}

async fn check_toolchains(config: Config, language: Option<&str>) -> Result<()> {
    let ids: Vec<String> = match language {
        Some(id) => vec![id.to_owned()],
        None => {
            let mut ids: Vec<_> = config.languages.keys().cloned().collect();
            ids.sort();
            ids
        }
    };

    let runner = Runner::new(config);
    let mut missing = 0;
    for id in &ids {
        match runner.check_toolchain(id).await {
            Ok(()) => println!("  {id:<15} ok"),
            Err(e) => {
                missing += 1;
                println!("  {id:<15} {e}");
            }
        }
    }

    if missing > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn show_config(config: &Config) {
    println!("Work directory: {}", config.work_root().display());
    println!("Deadline: {}s", config.deadline);
    println!("Kill grace: {}s", config.kill_grace);
    println!("Probe timeout: {}s", config.probe_timeout);
    println!("Cache probes: {}", config.cache_probes);
    println!("Max output: {} bytes per stream", config.max_output);
    match config.max_concurrent_jobs {
        Some(n) => println!("Max concurrent jobs: {n}"),
        None => println!("Max concurrent jobs: unbounded"),
    }
    println!();
    println!("Languages configured: {}", config.languages.len());
}

async fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
