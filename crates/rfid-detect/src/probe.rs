//! Probing a single port for a single reader family
//!
//! A probe opens a fresh transport on the port, writes the detector's probe
//! command and collects whatever comes back. Replies often arrive split over
//! several serial reads, so the reply is only considered complete once no new
//! bytes have arrived for a settle window. A hard deadline bounds the whole
//! wait. The transport is closed before the probe returns, whatever the
//! outcome.

use std::sync::Arc;
use std::time::Duration;

use rfid_session::{Connector, SerialConnector, Transport, TransportConfig, TransportEvent};
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, trace};

use crate::detector::Detector;
use crate::error::DetectError;
use crate::orchestrator::DetectedReader;

/// Configuration for probing
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Quiet time after the last inbound chunk before the reply is final
    pub settle: Duration,
    /// Upper bound on waiting for a reply
    pub deadline: Duration,
    /// Pause between opening the port and writing the probe
    pub post_open_delay: Duration,
    /// Delay between detectors tried on the same port
    pub inter_probe_delay: Duration,
    /// Transport settings used for every probe
    pub transport: TransportConfig,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(200),
            deadline: Duration::from_secs(2),
            post_open_delay: Duration::from_millis(50),
            inter_probe_delay: Duration::from_millis(100),
            transport: TransportConfig::default(),
        }
    }
}

/// Result of one probe
#[derive(Debug)]
pub enum ProbeOutcome {
    /// The detector recognised the reply
    Detected(DetectedReader),
    /// Bytes arrived but the detector did not recognise them
    Rejected(Vec<u8>),
    /// Nothing arrived before the deadline
    Silent,
    /// The probe could not be carried out
    Failed(DetectError),
}

impl ProbeOutcome {
    pub fn is_detected(&self) -> bool {
        matches!(self, ProbeOutcome::Detected(_))
    }
}

/// Why reply collection stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    Settled,
    Deadline,
    ConnectionLost,
}

/// Runs probes against ports opened through a [`Connector`]
#[derive(Clone)]
pub struct Prober {
    connector: Arc<dyn Connector>,
    config: ProbeConfig,
}

impl Prober {
    /// Create a prober with default configuration
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self::with_config(connector, ProbeConfig::default())
    }

    /// Create a prober with custom configuration
    pub fn with_config(connector: Arc<dyn Connector>, config: ProbeConfig) -> Self {
        Self { connector, config }
    }

    /// Prober for physical serial ports
    pub fn serial(config: ProbeConfig) -> Self {
        Self::with_config(Arc::new(SerialConnector), config)
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Probe `port` with one detector
    pub async fn probe(&self, port: &str, detector: &dyn Detector) -> ProbeOutcome {
        debug!("Probing {} for {}", port, detector.name());

        let mut transport =
            Transport::new(port, self.connector.clone(), self.config.transport.clone());
        let mut events = match transport.connect().await {
            Ok(events) => events,
            Err(e) => {
                return ProbeOutcome::Failed(DetectError::OpenFailed {
                    port: port.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        let outcome = self.exchange(port, &mut transport, &mut events, detector).await;
        events.close();
        transport.disconnect().await;
        outcome
    }

    async fn exchange(
        &self,
        port: &str,
        transport: &mut Transport,
        events: &mut mpsc::Receiver<TransportEvent>,
        detector: &dyn Detector,
    ) -> ProbeOutcome {
        sleep(self.config.post_open_delay).await;

        // Boot banners and leftovers from an earlier probe
        while let Ok(event) = events.try_recv() {
            match event {
                TransportEvent::Data(stale) => trace!("Discarding stale bytes: {:02X?}", stale),
                TransportEvent::ConnectionLost(_) => return ProbeOutcome::Silent,
            }
        }

        let probe = detector.probe_command();
        trace!("Sending {} probe: {:02X?}", detector.name(), probe);
        if let Err(e) = transport.write(&probe).await {
            return ProbeOutcome::Failed(e.into());
        }

        let (response, completion) = self.collect_response(events).await;
        trace!(
            "{} probe on {} finished ({:?}): {:02X?}",
            detector.name(),
            port,
            completion,
            response
        );

        if response.is_empty() {
            return ProbeOutcome::Silent;
        }
        if !detector.validate(&response) {
            return ProbeOutcome::Rejected(response);
        }

        let reader = DetectedReader {
            port: port.to_string(),
            family: detector.family(),
            info: detector.extract_info(&response),
        };
        info!("Identified {} on {}: {}", reader.family, reader.port, reader.info);
        ProbeOutcome::Detected(reader)
    }

    /// Accumulate inbound bytes until the reply settles or the deadline hits
    ///
    /// The settle timer is only armed once the first byte has arrived and is
    /// rearmed on every chunk. Both timers live in one `select!`, so exactly
    /// one of them ends the wait.
    async fn collect_response(
        &self,
        events: &mut mpsc::Receiver<TransportEvent>,
    ) -> (Vec<u8>, Completion) {
        let mut response = Vec::new();
        let deadline = sleep(self.config.deadline);
        let settle = sleep(self.config.settle);
        tokio::pin!(deadline);
        tokio::pin!(settle);

        let completion = loop {
            tokio::select! {
                biased;
                event = events.recv() => match event {
                    Some(TransportEvent::Data(chunk)) => {
                        response.extend_from_slice(&chunk);
                        settle.as_mut().reset(Instant::now() + self.config.settle);
                    }
                    Some(TransportEvent::ConnectionLost(_)) | None => {
                        break Completion::ConnectionLost;
                    }
                },
                _ = &mut settle, if !response.is_empty() => break Completion::Settled,
                _ = &mut deadline => break Completion::Deadline,
            }
        };

        (response, completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{Cf600Detector, Hyb506Detector, R200Detector};
    use rfid_protocol::{r200, ReaderFamily};
    use rfid_sim::{PortBehaviour, SimConnector};

    fn prober(sim: &SimConnector) -> Prober {
        Prober::new(Arc::new(sim.clone()))
    }

    #[test]
    fn test_probe_config_default() {
        let config = ProbeConfig::default();
        assert_eq!(config.settle, Duration::from_millis(200));
        assert_eq!(config.deadline, Duration::from_secs(2));
        assert_eq!(config.transport.baud_rate, 115_200);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_detects_reader() {
        let sim = SimConnector::new().with_port("sim0", PortBehaviour::reader(ReaderFamily::Cf600));

        let outcome = prober(&sim).probe("sim0", &Cf600Detector::new()).await;

        match outcome {
            ProbeOutcome::Detected(reader) => {
                assert_eq!(reader.port, "sim0");
                assert_eq!(reader.family, ReaderFamily::Cf600);
                assert!(reader.info.starts_with("CF600 Reader (Response: CF 01 00 50"));
            }
            other => panic!("expected detection, got {:?}", other),
        }
        assert!(sim.wait_closed(Duration::from_secs(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_wrong_family_is_not_detected() {
        let sim = SimConnector::new().with_port("sim0", PortBehaviour::reader(ReaderFamily::Hyb506));

        let outcome = prober(&sim)
            .probe("sim0", &R200Detector::new(r200::Flavor::Aadd))
            .await;

        assert!(!outcome.is_detected());
        assert!(sim.wait_closed(Duration::from_secs(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_port_hits_deadline() {
        let sim = SimConnector::new().with_port("quiet", PortBehaviour::Silent);
        let started = Instant::now();

        let outcome = prober(&sim).probe("quiet", &Hyb506Detector::new()).await;

        assert!(matches!(outcome, ProbeOutcome::Silent));
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(sim.wait_closed(Duration::from_secs(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_noise_is_rejected() {
        let sim = SimConnector::new().with_port("noisy", PortBehaviour::Noisy);

        let outcome = prober(&sim).probe("noisy", &Hyb506Detector::new()).await;

        assert!(matches!(outcome, ProbeOutcome::Rejected(ref bytes) if !bytes.is_empty()));
        assert!(sim.wait_closed(Duration::from_secs(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunked_reply_settles() {
        let sim = SimConnector::new().with_port(
            "slow",
            PortBehaviour::chunked(ReaderFamily::R200Aadd, 3, Duration::from_millis(80)),
        );

        let outcome = prober(&sim)
            .probe("slow", &R200Detector::new(r200::Flavor::Aadd))
            .await;

        match outcome {
            ProbeOutcome::Detected(reader) => assert_eq!(reader.info, "M100 26dBm V1.0"),
            other => panic!("expected detection, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unopenable_port_fails() {
        let sim = SimConnector::new().with_port("busy", PortBehaviour::Unopenable);

        let outcome = prober(&sim).probe("busy", &Cf600Detector::new()).await;

        assert!(matches!(
            outcome,
            ProbeOutcome::Failed(DetectError::OpenFailed { ref port, .. }) if port == "busy"
        ));
        assert_eq!(sim.opens(), 0);
    }
}
