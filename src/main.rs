use anyhow::Result;
use beamline_common::{run_simulation, script_lines, Session, SessionConfig};
use clap::Parser;
use log::{debug, error, info, warn};
use std::fs;
use std::path::PathBuf;

mod backend;
mod report;

use backend::DryRunBackend;
use report::SessionReport;

/// Command-line arguments for the beamline engine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Session description (.toml)
    #[arg(short, long, default_value = "session.toml")]
    session: PathBuf,

    /// Previously exported listing to import instead of the session file
    #[arg(short, long)]
    import: Option<PathBuf>,

    /// Write a validity and record report to this path
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Report format: "json" or "csv"
    #[arg(short, long, default_value = "json")]
    format: String,

    /// Write the session as an importable listing to this path
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Hand the session to the simulation backend if it is valid
    #[arg(long, default_value_t = false)]
    run: bool,
}

fn load_session(args: &Args) -> Result<Session> {
    if let Some(path) = &args.import {
        let text = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read listing '{}': {}", path.display(), e))?;
        let mut session = Session::new();
        session.import_script(&text);
        if let Some(message) = &session.import_error {
            anyhow::bail!("{}: {}", message, path.display());
        }
        info!("Imported listing from {}", path.display());
        return Ok(session);
    }

    let config = SessionConfig::load(&args.session)?;
    info!("Loaded session from {}", args.session.display());
    config.into_session()
}

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();
    let args = Args::parse();

    info!("Starting Beamline Engine...");
    let session = load_session(&args)?;
    debug!(
        "Session: {} lattice elements, distribution {}, space charge {}, CSR {}",
        session.lattice.len(),
        session.distribution.selected,
        session.space_charge.enabled,
        session.csr
    );

    // --- Validity Digest ---
    let validity = session.validity();
    if validity.can_run {
        println!("Simulation inputs are valid.");
    } else {
        println!("Simulation inputs are not valid:");
        for message in &validity.errors {
            println!("  {}", message);
        }
    }

    // --- Save Report ---
    if let Some(path) = &args.report {
        let report = SessionReport::collect(&session);
        report::write_report(&report, path, &args.format)?;
    }

    // --- Export Listing ---
    if let Some(path) = &args.export {
        let mut listing = script_lines(&session).join("\n");
        listing.push('\n');
        fs::write(path, listing)
            .map_err(|e| anyhow::anyhow!("Error writing listing '{}': {}", path.display(), e))?;
        info!("Session listing saved to {}", path.display());
    }

    // --- Run ---
    if args.run {
        if !validity.can_run {
            warn!("Refusing to run: {} validation errors.", validity.errors.len());
            anyhow::bail!("Simulation inputs are not valid.");
        }
        let mut backend = DryRunBackend::default();
        match run_simulation(&session, &mut backend) {
            Ok(output) => {
                for line in &output.lines {
                    println!("{}", line);
                }
            }
            Err(e) => {
                error!("Simulation failed: {}", e);
                return Err(e);
            }
        }
    }

    info!("Beamline Engine Complete.");
    Ok(())
}
