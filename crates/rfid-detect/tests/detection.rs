//! Detection sweeps against simulated ports
//!
//! These tests run the orchestrator over a [`SimConnector`] and check:
//! - Every reader family is identified on its own port
//! - Silent, noisy and unopenable ports yield nothing and do not disturb
//!   other ports
//! - Replies split across chunks are reassembled by the settle window
//! - Every opened port is closed once the sweep returns

use std::sync::Arc;
use std::time::Duration;

use rfid_detect::{Cf600Detector, DetectedReader, DetectionOrchestrator, DetectorRegistry, ProbeConfig};
use rfid_protocol::ReaderFamily;
use rfid_sim::{PortBehaviour, SimConnector};
use tokio::time::Instant;

mod helpers {
    use super::*;

    /// One port per family plus one of each misbehaving kind
    pub fn mixed_bench() -> SimConnector {
        SimConnector::new()
            .with_port("/dev/ttyUSB0", PortBehaviour::reader(ReaderFamily::R200Aadd))
            .with_port("/dev/ttyUSB1", PortBehaviour::reader(ReaderFamily::R200Bb7e))
            .with_port("/dev/ttyUSB2", PortBehaviour::reader(ReaderFamily::Cf600))
            .with_port("/dev/ttyUSB3", PortBehaviour::reader(ReaderFamily::Hyb506))
            .with_port("/dev/ttyS0", PortBehaviour::Silent)
            .with_port("/dev/ttyS1", PortBehaviour::Noisy)
            .with_port("/dev/ttyACM0", PortBehaviour::Unopenable)
    }

    pub fn orchestrator(sim: &SimConnector) -> DetectionOrchestrator {
        DetectionOrchestrator::new(Arc::new(sim.clone()))
    }

    pub fn families(found: &[DetectedReader]) -> Vec<(&str, ReaderFamily)> {
        found.iter().map(|r| (r.port.as_str(), r.family)).collect()
    }
}

use helpers::*;

#[tokio::test(start_paused = true)]
async fn test_sweep_identifies_every_family() {
    let sim = mixed_bench();
    let orchestrator = orchestrator(&sim);
    let ports = sim.port_names();

    let found = orchestrator.scan(ports.clone()).await;

    assert_eq!(
        families(&found),
        vec![
            ("/dev/ttyUSB0", ReaderFamily::R200Aadd),
            ("/dev/ttyUSB1", ReaderFamily::R200Bb7e),
            ("/dev/ttyUSB2", ReaderFamily::Cf600),
            ("/dev/ttyUSB3", ReaderFamily::Hyb506),
        ]
    );
    assert_eq!(found[0].info, "M100 26dBm V1.0");
    assert_eq!(found[1].info, "M100 26dBm V1.0");
    assert!(found[2].info.starts_with("CF600 Reader (Response: CF"));
    assert!(found[3].info.starts_with("HYB506 Reader (Firmware:"));

    assert!(sim.opens() <= ports.len() * orchestrator.registry().len());
    assert!(sim.wait_closed(Duration::from_secs(1)).await);
}

#[tokio::test(start_paused = true)]
async fn test_ports_are_swept_concurrently() {
    let sim = mixed_bench();
    let started = Instant::now();

    orchestrator(&sim).scan(sim.port_names()).await;

    // A silent port costs four full deadlines; sweeping ports one at a time
    // would take several times that
    let per_silent_port = Duration::from_millis(4 * 2050 + 3 * 100);
    let elapsed = started.elapsed();
    assert!(elapsed >= per_silent_port);
    assert!(elapsed < per_silent_port * 2);
}

#[tokio::test(start_paused = true)]
async fn test_misbehaving_ports_yield_nothing() {
    let sim = SimConnector::new()
        .with_port("quiet", PortBehaviour::Silent)
        .with_port("noisy", PortBehaviour::Noisy)
        .with_port("busy", PortBehaviour::Unopenable);

    let found = orchestrator(&sim)
        .scan(["quiet", "noisy", "busy", "missing"])
        .await;

    assert!(found.is_empty());
    // Unopenable and unknown ports are given up after the first failure
    assert_eq!(sim.opens(), 8);
    assert!(sim.wait_closed(Duration::from_secs(1)).await);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_ports_probed_once() {
    let sim = SimConnector::new().with_port("sim0", PortBehaviour::reader(ReaderFamily::R200Aadd));

    let found = orchestrator(&sim).scan(["sim0", "sim0", "sim0"]).await;

    assert_eq!(found.len(), 1);
    assert_eq!(sim.opens(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_chunked_reply_within_settle_window() {
    let sim = SimConnector::new().with_port(
        "slow",
        PortBehaviour::chunked(ReaderFamily::Hyb506, 2, Duration::from_millis(150)),
    );

    let found = orchestrator(&sim).scan(["slow"]).await;

    assert_eq!(families(&found), vec![("slow", ReaderFamily::Hyb506)]);
    assert!(sim.wait_closed(Duration::from_secs(1)).await);
}

#[tokio::test(start_paused = true)]
async fn test_gap_longer_than_settle_splits_reply() {
    let sim = SimConnector::new().with_port(
        "stalling",
        PortBehaviour::chunked(ReaderFamily::R200Aadd, 8, Duration::from_millis(500)),
    );

    let found = orchestrator(&sim).scan(["stalling"]).await;

    assert!(found.is_empty());
    assert!(sim.wait_closed(Duration::from_secs(5)).await);
}

#[tokio::test(start_paused = true)]
async fn test_custom_registry_and_timing() {
    let sim = SimConnector::new()
        .with_port("a", PortBehaviour::reader(ReaderFamily::Cf600))
        .with_port("b", PortBehaviour::reader(ReaderFamily::R200Aadd));
    let mut registry = DetectorRegistry::new();
    registry.register(Cf600Detector::new());
    let config = ProbeConfig {
        deadline: Duration::from_millis(500),
        ..Default::default()
    };
    let orchestrator = DetectionOrchestrator::with_config(Arc::new(sim.clone()), registry, config);
    let started = Instant::now();

    let found = orchestrator.scan(sim.port_names()).await;

    assert_eq!(families(&found), vec![("a", ReaderFamily::Cf600)]);
    assert_eq!(sim.opens(), 2);
    assert!(started.elapsed() < Duration::from_secs(1));
}
