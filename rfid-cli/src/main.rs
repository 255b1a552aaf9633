//! rfidctl - UHF RFID reader control
//!
//! Finds readers on serial ports and drives a single reader: identification,
//! single-tag reads and the LED tag animation.

mod commands;
mod settings;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rfid_protocol::ReaderFamily;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::ReadMode;
use settings::Settings;

const DEFAULT_PORT: &str = "/dev/ttyUSB0";

#[derive(Debug, Parser)]
#[command(name = "rfidctl", version, about = "Detect and drive UHF RFID reader modules")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Probe serial ports for readers
    Scan {
        /// Print results as JSON
        #[arg(long)]
        json: bool,
        /// Ports to probe; defaults to every plausible port
        ports: Vec<String>,
    },
    /// Connect to one reader
    Read {
        /// Serial port the reader is attached to
        #[arg(long)]
        port: Option<String>,
        /// Reader family: r200-aadd, r200-bb7e, cf600 or hyb506
        #[arg(long)]
        family: Option<ReaderFamily>,
        /// Perform a single read and exit
        #[arg(long, conflicts_with = "animate")]
        single: bool,
        /// Run the LED tag animation until interrupted
        #[arg(long)]
        animate: bool,
        /// Remember port and family as defaults
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "rfidctl=info,rfid_protocol=info,rfid_session=info,rfid_detect=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::load();

    match cli.command {
        Command::Scan { json, ports } => commands::scan(&settings, ports, json).await,
        Command::Read {
            port,
            family,
            single,
            animate,
            save,
        } => {
            let port = port
                .or_else(|| settings.port.clone())
                .unwrap_or_else(|| DEFAULT_PORT.to_string());
            let family = family
                .or(settings.family)
                .unwrap_or(ReaderFamily::R200Bb7e);
            let mode = match (single, animate) {
                (true, _) => ReadMode::Single,
                (_, true) => ReadMode::Animate,
                _ => ReadMode::Identify,
            };

            if save {
                settings.port = Some(port.clone());
                settings.family = Some(family);
                if let Err(e) = settings.save() {
                    warn!("Could not save settings: {:#}", e);
                }
            }

            commands::read(&settings, &port, family, mode)
                .await
                .with_context(|| format!("{} on {}", family, port))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_single_and_animate_conflict() {
        let result = Cli::try_parse_from(["rfidctl", "read", "--single", "--animate"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_read_flags() {
        let cli = Cli::try_parse_from([
            "rfidctl", "read", "--port", "COM4", "--family", "hyb506", "--single",
        ])
        .unwrap();
        match cli.command {
            Command::Read {
                port,
                family,
                single,
                animate,
                ..
            } => {
                assert_eq!(port.as_deref(), Some("COM4"));
                assert_eq!(family, Some(ReaderFamily::Hyb506));
                assert!(single);
                assert!(!animate);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_scan_ports() {
        let cli = Cli::try_parse_from(["rfidctl", "scan", "--json", "/dev/ttyUSB0", "COM3"]).unwrap();
        match cli.command {
            Command::Scan { json, ports } => {
                assert!(json);
                assert_eq!(ports, vec!["/dev/ttyUSB0", "COM3"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
