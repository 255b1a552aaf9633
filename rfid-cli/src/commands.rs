//! Subcommand implementations

use std::time::Duration;

use anyhow::Context;
use rfid_detect::{DetectionOrchestrator, DetectorRegistry, PortScanner};
use rfid_protocol::{cf600, hyb506, r200, MemBank, ReaderCommand, ReaderFamily, SelectParams};
use rfid_session::{ReaderSession, SessionError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::settings::Settings;

/// TID prefixes of the LED tags lit in turn by `--animate`
pub const LED_TAG_MASKS: &[&str] = &[
    "7882f903", "7882f904", "7882f905", "7882f906", "7882f907", "7882f908", "7882f909", "7882f90a",
];

/// Bit address of the TID serial, where the LED masks are compared
const TID_SERIAL_POINTER: u32 = 0x40;

/// Deadline for each animation command; unanswered writes are normal
const ANIMATE_TIMEOUT: Duration = Duration::from_millis(200);

const ANIMATE_STEP: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid hex string '{0}'")]
    InvalidHex(String),

    #[error("{operation} is only supported on R200 readers, not {family}")]
    R200Only {
        operation: &'static str,
        family: ReaderFamily,
    },
}

/// Decode a hex string, ignoring whitespace
pub fn parse_hex(text: &str) -> Result<Vec<u8>, CliError> {
    let digits: Vec<u8> = text.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::InvalidHex(text.to_string()));
    }
    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| CliError::InvalidHex(text.to_string()))
        })
        .collect()
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sweep `ports` (or every plausible port) and print what answered
pub async fn scan(settings: &Settings, ports: Vec<String>, json: bool) -> anyhow::Result<()> {
    let ports = if ports.is_empty() {
        PortScanner::new()
            .plausible_ports()
            .context("failed to list serial ports")?
    } else {
        ports
    };

    let orchestrator = DetectionOrchestrator::with_config(
        std::sync::Arc::new(rfid_session::SerialConnector),
        DetectorRegistry::with_defaults(),
        settings.probe_config(),
    );
    let readers = orchestrator.scan(ports).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&readers)?);
    } else if readers.is_empty() {
        println!("No readers found");
    } else {
        for reader in &readers {
            println!("{}", reader);
        }
    }
    Ok(())
}

/// What `read` does once connected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Print reader identification only
    Identify,
    /// One inventory round
    Single,
    /// Cycle the LED tags until interrupted
    Animate,
}

pub async fn read(
    settings: &Settings,
    port: &str,
    family: ReaderFamily,
    mode: ReadMode,
) -> anyhow::Result<()> {
    if mode == ReadMode::Animate && family.r200_flavor().is_none() {
        return Err(CliError::R200Only {
            operation: "LED animation",
            family,
        }
        .into());
    }

    let mut session = ReaderSession::open_serial(port, family, settings.session_config())
        .await
        .with_context(|| format!("failed to open {} on {}", family, port))?;

    let result = run_read(&mut session, mode).await;
    session.close().await;
    result
}

async fn run_read(session: &mut ReaderSession, mode: ReadMode) -> anyhow::Result<()> {
    let family = session.family();
    identify(session).await?;

    if family.r200_flavor().is_some() {
        session
            .execute(&r200::dense_reader_mode())
            .await
            .context("failed to enable dense reader mode")?;
    }

    match mode {
        ReadMode::Identify => {
            println!("{} ready. Use --single for a single read or --animate for LED animation.", family);
            Ok(())
        }
        ReadMode::Single => single(session).await,
        ReadMode::Animate => animate(session).await,
    }
}

async fn identify(session: &mut ReaderSession) -> anyhow::Result<()> {
    let family = session.family();
    let info = match family {
        ReaderFamily::R200Aadd | ReaderFamily::R200Bb7e => {
            let payload = session.execute(&r200::module_info()).await?;
            r200::module_info_text(&payload).unwrap_or_else(|| hex(&payload))
        }
        ReaderFamily::Cf600 => {
            let payload = session.execute(&cf600::device_info()).await?;
            String::from_utf8_lossy(payload.get(1..).unwrap_or_default()).into_owned()
        }
        ReaderFamily::Hyb506 => {
            let payload = session.execute(&hyb506::reader_info()).await?;
            let info = hyb506::ReaderInfo::parse(&payload)?;
            format!(
                "firmware {}, {} dBm",
                info.firmware_version(),
                info.power_dbm
            )
        }
    };
    info!("Connected to {} on {}: {}", family, session.endpoint(), info);
    println!("{}: {}", family, info);
    Ok(())
}

async fn single(session: &mut ReaderSession) -> anyhow::Result<()> {
    let family = session.family();
    if family.r200_flavor().is_some() {
        match session.read_single().await? {
            Some(tag) => println!("EPC {} (RSSI {} dBm, PC {:04X})", tag.epc_hex(), tag.rssi, tag.pc),
            None => println!("No tag in range"),
        }
        return Ok(());
    }

    let command = match family {
        ReaderFamily::Cf600 => cf600::inventory(1),
        _ => hyb506::inventory(),
    };
    let payload = session.execute(&command).await?;
    println!("Inventory response: {}", hex(&payload));
    Ok(())
}

/// Build the select command targeting one LED tag
fn led_select(mask: &str) -> anyhow::Result<ReaderCommand> {
    let params = SelectParams::new(parse_hex(mask)?)?
        .bank(MemBank::Tid)
        .pointer(TID_SERIAL_POINTER);
    Ok(r200::set_select(&params))
}

/// Light the LED tags in turn until Ctrl-C
///
/// Writing the reserved bank powers the selected tag's LED; the write
/// itself is expected to fail.
async fn animate(session: &mut ReaderSession) -> anyhow::Result<()> {
    let selects = LED_TAG_MASKS
        .iter()
        .map(|mask| led_select(mask))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let flash = r200::write(MemBank::Reserved, 4, &[0x00; 4], [0x00; 4])?;

    println!("Animating {} LED tags, press Ctrl-C to stop", selects.len());
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut cycles: u64 = 0;
    loop {
        for select in &selects {
            for command in [select, &flash] {
                tokio::select! {
                    result = &mut ctrl_c => {
                        if let Err(e) = result {
                            warn!("Failed to wait for Ctrl-C: {}", e);
                        }
                        info!("Animation stopped after {} cycles", cycles);
                        return Ok(());
                    }
                    result = session.send_and_await(command.code, &command.payload, ANIMATE_TIMEOUT) => {
                        match result {
                            Ok(_) | Err(SessionError::Timeout(_)) => {}
                            Err(e) => return Err(e.into()),
                        }
                    }
                }
            }
            tokio::time::sleep(ANIMATE_STEP).await;
        }
        cycles += 1;
        debug!("Animation cycle {} done", cycles);
    }
}
