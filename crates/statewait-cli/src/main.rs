//! statewait: block until a shell-probed resource reaches a target state
//!
//! ```text
//! statewait --pending PENDING --target ENABLED -- \
//!     sh -c 'aws securityhub list-organization-admin-accounts --query "AdminAccounts[0].Status" --output text'
//! ```

use anyhow::Result;
use clap::Parser;
use statewait::{WaiterOutcome, wait_for_state};
use statewait_cli::{CommandProbe, WaitConfig, WaitOverrides, exit};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "statewait")]
#[command(about = "Poll a command until the resource it reports reaches a target state")]
#[command(version)]
struct Args {
    /// JSON config file; flags override its values
    #[arg(short, long, env = "STATEWAIT_CONFIG")]
    config: Option<PathBuf>,

    /// Resource name used in log lines
    #[arg(long)]
    name: Option<String>,

    /// Comma-separated labels meaning "still working"
    #[arg(long, value_delimiter = ',')]
    pending: Option<Vec<String>>,

    /// Comma-separated labels meaning "done"
    #[arg(long, value_delimiter = ',')]
    target: Option<Vec<String>>,

    /// Comma-separated labels to tolerate without failing
    #[arg(long, value_delimiter = ',')]
    ignore: Option<Vec<String>>,

    /// Overall wait budget in seconds (default: 300)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Sleep before the first probe, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    #[arg(long)]
    min_interval_ms: Option<u64>,

    #[arg(long)]
    max_interval_ms: Option<u64>,

    /// Interval multiplier between polls
    #[arg(long)]
    growth_factor: Option<f64>,

    /// Random fraction added to each interval (0.0 - 1.0)
    #[arg(long)]
    jitter: Option<f64>,

    /// Consecutive absent probes tolerated before giving up
    #[arg(long)]
    not_found_checks: Option<u32>,

    /// Consecutive target observations required
    #[arg(long)]
    consecutive: Option<u32>,

    /// Probe exit code meaning the resource does not exist
    #[arg(long)]
    absent_exit_code: Option<i32>,

    /// Label to report when the probe exits with --absent-exit-code
    #[arg(long, requires = "absent_exit_code")]
    absent_state: Option<String>,

    /// Per-probe timeout in seconds (default: 60)
    #[arg(long)]
    command_timeout_secs: Option<u64>,

    /// Print the merged configuration and exit
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Probe command and its arguments
    #[arg(last = true)]
    command: Vec<String>,
}

impl Args {
    fn overrides(&self) -> WaitOverrides {
        WaitOverrides {
            name: self.name.clone(),
            pending: self.pending.clone(),
            target: self.target.clone(),
            ignore: self.ignore.clone(),
            timeout_secs: self.timeout_secs,
            delay_ms: self.delay_ms,
            min_interval_ms: self.min_interval_ms,
            max_interval_ms: self.max_interval_ms,
            growth_factor: self.growth_factor,
            jitter: self.jitter,
            not_found_checks: self.not_found_checks,
            consecutive: self.consecutive,
            absent_exit_code: self.absent_exit_code,
            absent_state: self.absent_state.clone(),
            command: self.command.clone(),
            command_timeout_secs: self.command_timeout_secs,
        }
    }
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            print_error(&e);
            std::process::exit(exit::USAGE);
        }
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr, "\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }
}

async fn run() -> Result<i32> {
    let args = Args::parse();

    // stdout carries only the payload
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => WaitConfig::load(path)?,
        None => WaitConfig::default(),
    };
    config.apply(args.overrides());
    let spec = config.to_spec()?;

    if args.dry_run {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(exit::SUCCESS);
    }

    let probe = CommandProbe::from_config(&config)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling wait");
            on_interrupt.cancel();
        }
    });

    info!(
        resource = %config.name,
        pending = ?config.pending,
        target = ?config.target,
        timeout_secs = config.timeout_secs,
        "Waiting for resource"
    );

    let outcome = wait_for_state(&spec, Some(&cancel), || probe.probe(), &config.name).await;
    Ok(report(outcome))
}

/// Print the payload or the failure and pick the exit code.
fn report(outcome: WaiterOutcome<String, String>) -> i32 {
    let code = exit::for_phase(outcome.phase());
    match outcome.into_result() {
        Ok(payload) => {
            use std::io::Write;
            let mut stdout = std::io::stdout();
            let _ = write!(stdout, "{payload}");
            let _ = stdout.flush();
        }
        Err(e) => print_error(&anyhow::Error::new(e)),
    }
    code
}
