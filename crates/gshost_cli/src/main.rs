use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use gshost::{Backend as _, ConsoleStdio, DynamicBackend, Engine, Poll};
use tracing_subscriber::{fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter};

/// Drive a Ghostscript engine library from the command line.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the Ghostscript shared library (e.g. /usr/lib/libgs.so).
    #[arg(long, global = true, default_value = "libgs.so")]
    library: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the engine build information.
    Revision,
    /// Interpret one PostScript/PDF file with console stdio.
    Run {
        /// File handed to the engine; content is opaque to this tool.
        file: PathBuf,

        /// Output device selection, passed as -sDEVICE=<name>.
        #[arg(long, default_value = "display")]
        device: String,

        /// Abort the run cooperatively after this many seconds.
        #[arg(long)]
        deadline: Option<u64>,
    },
}

fn main() -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "gshost=info,gshost_cli=info");
    }

    let subscriber = tracing_subscriber::Registry::default()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(EnvFilter::from_default_env());
    subscriber.try_init()?;

    let cli = Cli::parse();
    let backend = DynamicBackend::load(&cli.library)
        .with_context(|| format!("failed to load engine library {}", cli.library.display()))?;

    match cli.command {
        Command::Revision => {
            let revision = backend.revision()?;
            println!("product      : {}", revision.product);
            println!("copyright    : {}", revision.copyright);
            println!("revision     : {}", revision.revision);
            println!("revision date: {}", revision.revision_date);
            Ok(())
        }
        Command::Run {
            file,
            device,
            deadline,
        } => run_file(backend, &file, &device, deadline),
    }
}

fn run_file(
    backend: DynamicBackend,
    file: &PathBuf,
    device: &str,
    deadline: Option<u64>,
) -> Result<()> {
    let mut engine = Engine::try_acquire(backend)?;
    engine.set_stdio(ConsoleStdio)?;

    if let Some(secs) = deadline {
        // There is no hard timeout primitive; a deadline is expressed by
        // answering the engine's poll with a cancel once it passes.
        let expires = Instant::now() + Duration::from_secs(secs);
        engine.set_poll(move || {
            if Instant::now() >= expires {
                Poll::Cancel
            } else {
                Poll::Continue
            }
        })?;
    }

    let init = engine.init_with_args([
        format!("-sDEVICE={device}"),
        "-dNOPAUSE".to_owned(),
        "-dBATCH".to_owned(),
    ])?;
    tracing::info!("init_with_args: {init}");

    if init.is_success() {
        let (outcome, exit_code) = engine.run_file(file, 0)?;
        tracing::info!("run_file: {outcome} (exit code {exit_code})");
    }

    engine.exit()?;
    engine.finish()?;
    Ok(())
}
