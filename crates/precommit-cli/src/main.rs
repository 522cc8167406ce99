//! precommit-action - pre-commit as a CI step
//!
//! ## Commands
//!
//! - `run`: install pre-commit, lint with a warm cache, push fixes to the PR
//! - `cache-key`: print the cache key for the current interpreter and config

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};

use precommit_ci::inputs::{DEFAULT_CONFIG, DEFAULT_EXTRA_ARGS};
use precommit_ci::{
    cache_service_from_env, home_cache_dir, init_tracing, workflow, ActionInputs, DisabledCache,
    EventContext, FixOutcome, LintRunner, ProcessRunner, ToolSet,
};

#[derive(Parser)]
#[command(name = "precommit-action")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run pre-commit in CI and push its fixes back to pull requests", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lint the workspace, caching hook environments and pushing fixes
    Run {
        #[command(flatten)]
        inputs: InputArgs,
    },

    /// Print the cache key for the current interpreter and config file
    CacheKey {
        #[command(flatten)]
        inputs: InputArgs,
    },
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Path to the pre-commit config, relative to the workspace
    #[arg(long, env = "INPUT_CONFIG", default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Token allowed to push fixes to the pull request branch
    #[arg(long, env = "INPUT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Extra arguments for `pre-commit run`, shell-quoted
    #[arg(long, env = "INPUT_EXTRA_ARGS", default_value = DEFAULT_EXTRA_ARGS, allow_hyphen_values = true)]
    extra_args: String,

    /// Repository checkout to lint
    #[arg(long, env = "GITHUB_WORKSPACE", default_value = ".")]
    workspace: PathBuf,

    /// JSON payload of the triggering event
    #[arg(long, env = "GITHUB_EVENT_PATH")]
    event_path: Option<PathBuf>,

    /// pre-commit cache directory (default: ~/.cache/pre-commit)
    #[arg(long, env = "PRE_COMMIT_HOME")]
    cache_dir: Option<PathBuf>,

    /// Python interpreter whose identity keys the cache
    #[arg(long, default_value = "python")]
    python: String,
}

impl InputArgs {
    fn to_inputs(&self) -> Result<ActionInputs> {
        let config = if self.config.as_os_str().is_empty() {
            PathBuf::from(DEFAULT_CONFIG)
        } else {
            self.config.clone()
        };
        let cache_dir = match &self.cache_dir {
            Some(dir) if !dir.as_os_str().is_empty() => dir.clone(),
            _ => home_cache_dir().context("Failed to locate the pre-commit cache directory")?,
        };

        Ok(ActionInputs::new(config, cache_dir)
            .with_token(self.token.clone())
            .with_extra_args(&self.extra_args)
            .in_workspace(&self.workspace))
    }

    fn tools(&self) -> ToolSet {
        ToolSet {
            python: self.python.clone(),
            ..ToolSet::default()
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let result = match cli.command {
        Commands::Run { inputs } => cmd_run(&inputs).await,
        Commands::CacheKey { inputs } => cmd_cache_key(&inputs).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            workflow::error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

/// Run the full lint flow
async fn cmd_run(args: &InputArgs) -> Result<()> {
    let inputs = args.to_inputs()?;
    let event = EventContext::load(args.event_path.as_deref())
        .context("Failed to load the triggering event")?;
    let tools = args.tools();

    let process = Arc::new(ProcessRunner);
    let cache = cache_service_from_env(process.clone(), &tools.tar)
        .context("Failed to set up the cache service")?;

    let report = LintRunner::new(process.as_ref(), cache.as_ref())
        .with_tools(tools)
        .run(&inputs, &event)
        .await?;

    match &report.fix {
        FixOutcome::Clean => info!("pre-commit passed"),
        FixOutcome::NoChanges => info!("pre-commit failed without fixable changes to push"),
        FixOutcome::Pushed { branch } => info!("pushed pre-commit fixes to {}", branch),
    }
    info!(
        cache_key = %report.cache_key,
        cache_restored = report.cache_restored,
        cache_saved = report.cache_saved,
        "run complete"
    );
    Ok(())
}

/// Print the cache key
async fn cmd_cache_key(args: &InputArgs) -> Result<()> {
    let inputs = args.to_inputs()?;
    let process = ProcessRunner;
    let key = LintRunner::new(&process, &DisabledCache)
        .with_tools(args.tools())
        .cache_key(&inputs)
        .await?;
    println!("{}", key);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_explicit_inputs() {
        let cli = Cli::try_parse_from([
            "precommit-action",
            "run",
            "--config",
            "ci/pre-commit.yaml",
            "--token",
            "t0k",
            "--extra-args",
            "--hook-stage manual",
            "--workspace",
            "/src/repo",
            "--cache-dir",
            "/tmp/pc-cache",
        ])
        .unwrap();

        let Commands::Run { inputs } = cli.command else {
            panic!("expected run");
        };
        let resolved = inputs.to_inputs().unwrap();
        assert_eq!(resolved.config, PathBuf::from("ci/pre-commit.yaml"));
        assert_eq!(resolved.token.as_deref(), Some("t0k"));
        assert_eq!(resolved.extra_args, "--hook-stage manual");
        assert_eq!(resolved.workspace, PathBuf::from("/src/repo"));
        assert_eq!(resolved.cache_dir, PathBuf::from("/tmp/pc-cache"));
    }

    #[test]
    fn empty_token_means_no_push() {
        let cli = Cli::try_parse_from([
            "precommit-action",
            "run",
            "--token",
            "",
            "--cache-dir",
            "/tmp/pc-cache",
        ])
        .unwrap();
        let Commands::Run { inputs } = cli.command else {
            panic!("expected run");
        };
        assert!(inputs.to_inputs().unwrap().token.is_none());
    }

    #[test]
    fn python_override_reaches_tools() {
        let cli = Cli::try_parse_from([
            "precommit-action",
            "cache-key",
            "--python",
            "python3.12",
        ])
        .unwrap();
        let Commands::CacheKey { inputs } = cli.command else {
            panic!("expected cache-key");
        };
        assert_eq!(inputs.tools().python, "python3.12");
        assert_eq!(inputs.tools().git, "git");
    }
}
