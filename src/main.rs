//! pcapreplay CLI entry point.

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pcapreplay::cli::{Args, PacketPrinter};
use pcapreplay::replay::{CaptureReplay, Driver, DriverExit, Mode};

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Set up logging
    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    let config = args.to_config()?;
    let mode = if args.pull { Mode::Pull } else { Mode::Push };
    let mut replay = CaptureReplay::open(config, mode)
        .with_context(|| format!("Failed to open capture: {}", args.file.display()))?;

    let stdout = io::stdout();
    let mut printer = PacketPrinter::new(args.format, stdout.lock(), args.quiet);

    match mode {
        Mode::Push => {
            let exit = Driver::new().run(&mut replay, &mut printer);
            tracing::info!(?exit, "push loop finished");
            if exit == DriverExit::Stopped {
                tracing::info!("stop requested");
            }
        }
        Mode::Pull => run_pull(&mut replay, &mut printer),
    }

    let main_count = printer.main_count();
    let side_count = printer.side_count();
    let main_bytes = printer.main_bytes();
    printer.finish().context("Failed to write packets")?;

    let mut stderr = io::stderr();
    writeln!(
        stderr,
        "{}: {} packets ({} bytes), {} on side output",
        replay.name(),
        main_count,
        main_bytes,
        side_count
    )?;

    if args.status {
        for (key, value) in replay.control_readings() {
            writeln!(stderr, "{}: {}", key, value)?;
        }
    }

    replay.close();
    Ok(())
}

/// Pull packets until the capture is used up, the session goes inactive,
/// or a stop is requested.
fn run_pull<W: Write>(replay: &mut CaptureReplay, printer: &mut PacketPrinter<W>) {
    use pcapreplay::replay::{PacketSink, MAIN_PORT};

    loop {
        if replay.stop_requested() {
            break;
        }
        match replay.pull_into(printer) {
            Some(packet) => printer.push(MAIN_PORT, packet),
            None => {
                if let Some(wait) = replay.time_until_due() {
                    std::thread::sleep(wait);
                } else if replay.is_finished() || !replay.is_active() {
                    break;
                }
            }
        }
    }
}
