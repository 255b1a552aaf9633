//! Detection sweep across many ports
//!
//! Every distinct port gets its own task. Within a port the registered
//! detectors run one after another, each with its own open/probe/close cycle,
//! so two probes never contend for the same device. Ports are swept in
//! parallel and a failing port never affects the others.

use std::fmt;
use std::sync::Arc;

use rfid_protocol::ReaderFamily;
use rfid_session::{Connector, SerialConnector};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::detector::DetectorRegistry;
use crate::error::DetectError;
use crate::probe::{ProbeConfig, ProbeOutcome, Prober};
use crate::scanner::PortScanner;

/// A reader found by a detection sweep
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DetectedReader {
    /// Port the reader answered on
    pub port: String,
    /// Protocol it answered in
    pub family: ReaderFamily,
    /// Identification text reported by the reader
    pub info: String,
}

impl fmt::Display for DetectedReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} - {}", self.port, self.family, self.info)
    }
}

/// Probes ports with every registered detector
#[derive(Clone)]
pub struct DetectionOrchestrator {
    prober: Prober,
    registry: DetectorRegistry,
}

impl DetectionOrchestrator {
    /// Orchestrator with the built-in detectors and default timing
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self::with_config(
            connector,
            DetectorRegistry::with_defaults(),
            ProbeConfig::default(),
        )
    }

    /// Orchestrator over physical serial ports
    pub fn serial() -> Self {
        Self::new(Arc::new(SerialConnector))
    }

    pub fn with_config(
        connector: Arc<dyn Connector>,
        registry: DetectorRegistry,
        config: ProbeConfig,
    ) -> Self {
        Self {
            prober: Prober::with_config(connector, config),
            registry,
        }
    }

    pub fn registry(&self) -> &DetectorRegistry {
        &self.registry
    }

    /// Sweep `ports` and return every reader found, sorted by port
    ///
    /// Duplicate port names are probed once. Resolves once every port has
    /// either identified a reader or exhausted its detectors.
    pub async fn scan<I, S>(&self, ports: I) -> Vec<DetectedReader>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for port in ports {
            let port = port.into();
            if !unique.contains(&port) {
                unique.push(port);
            }
        }

        info!(
            "Scanning {} port(s) with {} detector(s)",
            unique.len(),
            self.registry.len()
        );

        let mut tasks = JoinSet::new();
        for port in unique {
            let prober = self.prober.clone();
            let registry = self.registry.clone();
            tasks.spawn(async move { sweep_port(prober, registry, port).await });
        }

        let mut found = Vec::new();
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(Some(reader)) => found.push(reader),
                Ok(None) => {}
                Err(e) => warn!("Port sweep task failed: {}", e),
            }
        }

        found.sort();
        found.dedup();
        info!("Scan complete: {} reader(s) found", found.len());
        found
    }

    /// Sweep every plausible port reported by `scanner`
    pub async fn scan_available(
        &self,
        scanner: &PortScanner,
    ) -> Result<Vec<DetectedReader>, DetectError> {
        let ports = scanner.plausible_ports()?;
        Ok(self.scan(ports).await)
    }
}

/// Try each detector on one port until one recognises the reply
async fn sweep_port(
    prober: Prober,
    registry: DetectorRegistry,
    port: String,
) -> Option<DetectedReader> {
    for (i, detector) in registry.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(prober.config().inter_probe_delay).await;
        }

        match prober.probe(&port, detector.as_ref()).await {
            ProbeOutcome::Detected(reader) => return Some(reader),
            ProbeOutcome::Rejected(response) => {
                debug!(
                    "{} did not recognise reply on {}: {:02X?}",
                    detector.name(),
                    port,
                    response
                );
            }
            ProbeOutcome::Silent => debug!("No reply to {} probe on {}", detector.name(), port),
            ProbeOutcome::Failed(e @ DetectError::OpenFailed { .. }) => {
                // The remaining detectors would fail the same way
                warn!("Giving up on {}: {}", port, e);
                return None;
            }
            ProbeOutcome::Failed(e) => warn!("{} probe on {} failed: {}", detector.name(), port, e),
        }
    }

    debug!("No reader detected on {}", port);
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detected_reader_display() {
        let reader = DetectedReader {
            port: "/dev/ttyUSB0".to_string(),
            family: ReaderFamily::R200Aadd,
            info: "M100 26dBm V1.0".to_string(),
        };
        assert_eq!(reader.to_string(), "/dev/ttyUSB0: R200 (AADD) - M100 26dBm V1.0");
    }

    #[test]
    fn test_detected_reader_json() {
        let reader = DetectedReader {
            port: "COM3".to_string(),
            family: ReaderFamily::Hyb506,
            info: "HYB506 Reader".to_string(),
        };
        let json = serde_json::to_string(&reader).unwrap();
        assert_eq!(
            json,
            r#"{"port":"COM3","family":"hyb506","info":"HYB506 Reader"}"#
        );
    }
}
