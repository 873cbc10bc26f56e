mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "coderun")]
#[command(about = "Run code snippets with timeouts and captured output")]
#[command(version)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Configuration preset used when no config file is given
    #[arg(long, global = true, value_enum, default_value_t = Preset::Default)]
    pub preset: Preset,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    Default,
    Secure,
    Development,
}

/// Overrides applied on top of the loaded configuration
#[derive(Debug, Clone, Default, clap::Args)]
pub struct RunOverrides {
    /// Timeout in seconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Working directory for staged files
    #[arg(short, long)]
    pub work_dir: Option<PathBuf>,

    /// Keep staged files after execution
    #[arg(long)]
    pub keep_temp_files: bool,

    /// Print the full result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a source file or a code string
    Run {
        /// Source file, or `-` to read code from stdin
        path: Option<PathBuf>,

        /// Code to run instead of a file
        #[arg(short = 'e', long, conflicts_with = "path")]
        code: Option<String>,

        /// Language tag (inferred from the file extension when omitted)
        #[arg(short, long)]
        language: Option<String>,

        #[command(flatten)]
        overrides: RunOverrides,
    },
    /// Run a command line directly
    Exec {
        #[command(flatten)]
        overrides: RunOverrides,

        /// Program and arguments
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },
    /// Extract code blocks from text
    Extract {
        /// Input file, stdin when omitted
        path: Option<PathBuf>,

        /// Fall back to inline `code` spans
        #[arg(long)]
        inline: bool,

        /// Treat the input as JSON message content
        #[arg(long)]
        content_json: bool,

        /// Run each extracted block with a known language
        #[arg(long)]
        run: bool,
    },
    /// Invoke the python_execute tool with raw input
    Tool {
        /// Tool input (JSON parameters or code), stdin when omitted
        input: Option<String>,

        /// Print the tool output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the python_execute tool definition
    Schema,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let success = run(Cli::parse()).await?;
    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Run the parsed command. The log file is flushed before this returns.
async fn run(cli: Cli) -> Result<bool> {
    let _guard = commands::init_logging(cli.verbose, cli.log_file.as_deref())?;
    let config = commands::load_config(cli.config.as_deref(), cli.preset)?;

    let success = match cli.command {
        Commands::Run {
            path,
            code,
            language,
            overrides,
        } => commands::execute_run(config, path, code, language, overrides).await?,
        Commands::Exec { overrides, command } => {
            commands::execute_exec(config, command, overrides).await?
        }
        Commands::Extract {
            path,
            inline,
            content_json,
            run,
        } => commands::execute_extract(config, path, inline, content_json, run).await?,
        Commands::Tool { input, json } => commands::execute_tool(config, input, json).await?,
        Commands::Schema => commands::execute_schema(config)?,
    };
    Ok(success)
}
