//! RFID Reader Detection Library
//!
//! This crate finds UHF RFID reader modules on serial ports and identifies
//! which protocol each one speaks.
//!
//! - [`PortScanner`] enumerates ports and orders the plausible ones
//! - [`Detector`]s hold the probe command, reply validator and info
//!   extractor for one family, collected in a [`DetectorRegistry`]
//! - [`Prober`] runs one probe with a settle window and a hard deadline
//! - [`DetectionOrchestrator`] sweeps many ports concurrently
//!
//! # Example
//!
//! ```rust,no_run
//! use rfid_detect::{DetectionOrchestrator, PortScanner};
//!
//! # async fn example() -> Result<(), rfid_detect::DetectError> {
//! let orchestrator = DetectionOrchestrator::serial();
//! let readers = orchestrator.scan_available(&PortScanner::new()).await?;
//!
//! for reader in readers {
//!     println!("{}", reader);
//! }
//! # Ok(())
//! # }
//! ```

pub mod detector;
pub mod error;
pub mod orchestrator;
pub mod probe;
pub mod scanner;
pub mod usb_ids;

pub use detector::{Cf600Detector, Detector, DetectorRegistry, Hyb506Detector, R200Detector};
pub use error::DetectError;
pub use orchestrator::{DetectedReader, DetectionOrchestrator};
pub use probe::{ProbeConfig, ProbeOutcome, Prober};
pub use scanner::{PortScanner, ScannerConfig, SerialPortInfo};
