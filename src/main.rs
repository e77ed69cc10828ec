// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tracing::info;

use ticket_verifier::{init_logging, run_check, Config, LogTarget, NullSink, Policy, Session};

#[derive(Parser)]
#[command(name = "ticket-verifier", version, about = "Verify ticket and serial codes")]
struct Cli {
    /// Config file (defaults to ./ticket-verifier.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the validation policy
    #[arg(long, global = true)]
    policy: Option<Policy>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Verify every line of a file and print a CSV report
    Check {
        /// File with one code per line ("-" for stdin)
        file: PathBuf,

        /// Print only the summary
        #[arg(long)]
        summary_only: bool,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(policy) = cli.policy {
        config.policy = policy;
    }

    match cli.command {
        Some(Command::Check {
            file,
            summary_only,
            json,
        }) => {
            init_logging(LogTarget::Stderr, &config.log_level)?;
            config.log_startup();
            run_check_mode(&config, &file, summary_only, json)
        }
        None => {
            init_logging(LogTarget::File(config.log_file.clone()), &config.log_level)?;
            config.log_startup();
            run_ui_mode(&config)
        }
    }
}

fn run_check_mode(config: &Config, file: &Path, summary_only: bool, json: bool) -> Result<()> {
    let mut session = Session::new(config.build_verifier()?, config.history_limit, NullSink);

    let report = if file.as_os_str() == "-" {
        run_check(&mut session, io::stdin().lock())?
    } else {
        let input = File::open(file)
            .with_context(|| format!("Failed to open {}", file.display()))?;
        run_check(&mut session, BufReader::new(input))?
    };

    if !summary_only {
        report.write_csv(io::stdout().lock())?;
    }

    if json {
        println!("{}", report.summary_json()?);
    } else {
        eprintln!("{}", report.summary_line());
    }

    info!(rows = report.rows.len(), "check complete");
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &Config) -> Result<()> {
    use std::time::Duration;
    use ticket_verifier::{ReplayDecoder, Scanner, UnavailableDecoder};

    let verifier = config.build_verifier()?;
    let session = Session::new(verifier, config.history_limit, ui::UiFeed::default());

    let decoder: Box<dyn ticket_verifier::Decoder> = match &config.scanner.replay_file {
        Some(path) => Box::new(ReplayDecoder::new(
            path.clone(),
            Duration::from_millis(config.scanner.interval_ms),
        )),
        None => Box::new(UnavailableDecoder::new(
            "no scanner input configured (set scanner.replay_file)",
        )),
    };

    let mut app = ui::App::new(session, Scanner::new(decoder), config.scanner.close_on_detect);
    ui::run_ui(&mut app)?;

    let snapshot = app.session.snapshot();
    println!(
        "✅ Session closed: {} valid, {} invalid, {} duplicate",
        snapshot.counters.valid, snapshot.counters.invalid, snapshot.counters.duplicate
    );

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &Config) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use batch mode: ticket-verifier check <file>");
    std::process::exit(1);
}
