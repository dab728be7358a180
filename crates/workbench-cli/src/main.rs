mod backend;
mod config;
mod error;
mod session;
mod terminal;

use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing_subscriber::fmt::time::FormatTime;

use crate::error::CliResult;
use crate::session::Session;

struct Elapsed(Instant);

impl FormatTime for Elapsed {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> fmt::Result {
        let d = self.0.elapsed();
        let total_secs = d.as_secs();
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        let millis = d.subsec_millis();
        write!(w, "[{mins:02}:{secs:02}:{millis:03}]")
    }
}

#[derive(Parser)]
#[command(name = "workbench", version)]
struct Cli {
    /// Path to the workbench YAML config
    #[arg(long, short, env = "WORKBENCH_CONFIG", default_value = "workbench.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one command in the sandbox and exit with its exit code
    Run {
        #[arg(trailing_var_arg = true, required = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_timer(Elapsed(Instant::now()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult<ExitCode> {
    let config = config::load(&cli.config).await?;
    let session = Session::start(&config)?;

    let result = match cli.command {
        None => session.interactive().await.map(|()| ExitCode::SUCCESS),
        Some(Command::Run { command }) => session
            .run_once(&command.join(" "))
            .await
            .map(|out| exit_code(out.map(|o| o.exit_code))),
    };
    session.close().await;
    result
}

/// Unknown outcomes exit with 1; codes outside 0..=255 are clamped to 1.
fn exit_code(code: Option<i32>) -> ExitCode {
    code.and_then(|c| u8::try_from(c).ok())
        .map_or(ExitCode::FAILURE, ExitCode::from)
}
