use clap::{Parser, error::ErrorKind};
use diskfill::{
    FillError,
    config::{Config, parse_size},
    fill::{FillDriver, FillPlan, FillProgress, LocalDisk, Progress, StepReport, SystemClock},
    pool::DataProvider,
    seed::OsSeedSource,
};
use std::{
    io::{self, IsTerminal, Write},
    path::PathBuf,
    process,
    sync::Arc,
};
use tracing::error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "diskfill")]
#[command(about = "fill a file with random data, repeatedly, until a size or the disk is reached")]
struct Cli {
    // number of fill steps, all but the last remove their file
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    count: u32,

    // file to fill, must not exist yet
    file: PathBuf,

    // bytes to write per step, e.g. 1048576 or 10GiB; fills the disk when omitted
    #[arg(value_parser = parse_size_arg)]
    size: Option<u64>,

    // TOML file with pool and fill tuning
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn parse_size_arg(s: &str) -> Result<u64, String> {
    parse_size(s).map_err(|e| e.to_string())
}

/// Redraws a single status line on stdout.
struct TerminalProgress;

impl Progress for TerminalProgress {
    fn update(&mut self, progress: &FillProgress) {
        let mut out = io::stdout().lock();
        let _ = write!(out, "\x1b[2K\r{}", progress);
        let _ = out.flush();
    }

    fn step_done(&mut self, _report: &StepReport) {
        println!();
    }
}

fn init_tracing() -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(writer)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .init();
    guard
}

fn usage_error(err: impl std::fmt::Display) -> ! {
    eprintln!("{}", err);
    process::exit(1);
}

/// Unrecoverable file system state: flush the log and abort.
fn fatal(guard: WorkerGuard, err: FillError) -> ! {
    error!("{}", err);
    drop(guard);
    process::abort();
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let _ = e.print();
            process::exit(1);
        }
    };

    let config = match &cli.config {
        Some(path) => Config::load(path).unwrap_or_else(|e| usage_error(e)),
        None => Config::default(),
    };
    let plan = FillPlan::new(cli.count, cli.file, cli.size).unwrap_or_else(|e| usage_error(e));

    let guard = init_tracing();

    let mut provider = match DataProvider::spawn(&config.pool, Arc::new(OsSeedSource)) {
        Ok(provider) => provider,
        Err(e) => fatal(guard, e),
    };
    let result = FillDriver::new(&mut provider, LocalDisk, SystemClock, config.fill)
        .run(&plan, &mut TerminalProgress);
    if let Err(e) = result {
        fatal(guard, e);
    }
    provider.close();
}
