//! In-memory serial endpoints
//!
//! [`SimConnector`] implements [`Connector`] by mapping endpoint names to
//! simulated behaviours. Every successful open spawns a task serving one end
//! of a duplex pair; the other end is handed to the transport. The connector
//! counts opens and live streams so tests can check that every session was
//! closed.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use rfid_protocol::ReaderFamily;
use rfid_session::{BoxedIo, ConnectFuture, Connector, TransportConfig};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::reader::{VirtualReader, VirtualReaderConfig};
use crate::task::{run_noise_task, run_reader_task, run_silent_task, Delivery};

/// Bytes sent by noisy ports; they frame as nothing in any family
pub const NOISE: &[u8] = &[0x00, 0x13, 0x37, 0x02, 0x01, 0x00];

const DUPLEX_CAPACITY: usize = 4096;

/// What sits behind a simulated endpoint
#[derive(Debug, Clone)]
pub enum PortBehaviour {
    /// A reader answering in its own protocol
    Reader {
        config: VirtualReaderConfig,
        delivery: Delivery,
    },
    /// Opens fine, never answers
    Silent,
    /// Refuses to open
    Unopenable,
    /// Answers every write with [`NOISE`]
    Noisy,
}

impl PortBehaviour {
    /// Reader of `family` with default settings
    pub fn reader(family: ReaderFamily) -> Self {
        PortBehaviour::Reader {
            config: VirtualReaderConfig::new(family),
            delivery: Delivery::Whole,
        }
    }

    /// Reader of `family` whose replies trickle in
    pub fn chunked(family: ReaderFamily, size: usize, gap: Duration) -> Self {
        PortBehaviour::Reader {
            config: VirtualReaderConfig::new(family),
            delivery: Delivery::Chunked { size, gap },
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    opens: AtomicUsize,
    live: AtomicUsize,
}

/// Decrements the live stream count when the serving task ends
struct LiveStream(Arc<Counters>);

impl Drop for LiveStream {
    fn drop(&mut self) {
        self.0.live.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Connector serving simulated endpoints
#[derive(Debug, Clone, Default)]
pub struct SimConnector {
    ports: Arc<RwLock<HashMap<String, PortBehaviour>>>,
    counters: Arc<Counters>,
}

impl SimConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an endpoint
    pub fn add_port(&self, name: impl Into<String>, behaviour: PortBehaviour) -> &Self {
        if let Ok(mut ports) = self.ports.write() {
            ports.insert(name.into(), behaviour);
        }
        self
    }

    /// Builder form of [`add_port`](Self::add_port)
    pub fn with_port(self, name: impl Into<String>, behaviour: PortBehaviour) -> Self {
        self.add_port(name, behaviour);
        self
    }

    /// Names of all configured endpoints, sorted
    pub fn port_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .ports
            .read()
            .map(|ports| ports.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Successful opens so far
    pub fn opens(&self) -> usize {
        self.counters.opens.load(Ordering::Acquire)
    }

    /// Streams whose host end is still open
    pub fn live_streams(&self) -> usize {
        self.counters.live.load(Ordering::Acquire)
    }

    /// Wait until every stream has been closed by its host
    ///
    /// Returns `false` if streams are still open after `within`.
    pub async fn wait_closed(&self, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        while self.live_streams() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        true
    }

    fn open_port(&self, endpoint: &str) -> io::Result<BoxedIo> {
        let behaviour = self
            .ports
            .read()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "port table poisoned"))?
            .get(endpoint)
            .cloned()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no such port: {}", endpoint))
            })?;

        if matches!(behaviour, PortBehaviour::Unopenable) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is busy", endpoint),
            ));
        }

        let (host, device) = tokio::io::duplex(DUPLEX_CAPACITY);
        self.counters.opens.fetch_add(1, Ordering::AcqRel);
        self.counters.live.fetch_add(1, Ordering::AcqRel);
        let live = LiveStream(self.counters.clone());
        let name = endpoint.to_string();
        debug!("Opened simulated port {}", name);

        tokio::spawn(async move {
            let _live = live;
            let result = match behaviour {
                PortBehaviour::Reader { config, delivery } => {
                    run_reader_task(device, VirtualReader::from_config(config), delivery).await
                }
                PortBehaviour::Silent => run_silent_task(device).await,
                PortBehaviour::Noisy => run_noise_task(device, NOISE.to_vec()).await,
                PortBehaviour::Unopenable => Ok(()),
            };
            match result {
                Ok(()) => debug!("Simulated port {} closed", name),
                // Host dropped its end mid-write
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    debug!("Simulated port {} closed while writing", name)
                }
                Err(e) => warn!("Simulated port {} failed: {}", name, e),
            }
        });

        Ok(Box::new(host))
    }
}

impl Connector for SimConnector {
    fn open<'a>(&'a self, endpoint: &'a str, _config: &'a TransportConfig) -> ConnectFuture<'a> {
        Box::pin(async move { self.open_port(endpoint) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfid_protocol::cf600;
    use rfid_session::{ReaderSession, SessionConfig, SessionError, TransportError};

    #[tokio::test]
    async fn test_session_against_simulated_reader() {
        let sim = SimConnector::new().with_port("sim0", PortBehaviour::reader(ReaderFamily::Cf600));

        let mut session = ReaderSession::open(
            Arc::new(sim.clone()),
            "sim0",
            ReaderFamily::Cf600,
            SessionConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(sim.live_streams(), 1);

        let payload = session.execute(&cf600::device_info()).await.unwrap();
        assert_eq!(&payload[1..], b"CF600 V2.3");

        session.close().await;
        assert!(sim.wait_closed(Duration::from_secs(1)).await);
        assert_eq!(sim.opens(), 1);
    }

    #[tokio::test]
    async fn test_unopenable_and_unknown_ports() {
        let sim = SimConnector::new().with_port("busy", PortBehaviour::Unopenable);
        let connector: Arc<dyn Connector> = Arc::new(sim.clone());

        for port in ["busy", "missing"] {
            let result = ReaderSession::open(
                connector.clone(),
                port,
                ReaderFamily::Hyb506,
                SessionConfig::default(),
            )
            .await;
            assert!(matches!(
                result,
                Err(SessionError::Transport(TransportError::ConnectFailed { .. }))
            ));
        }
        assert_eq!(sim.opens(), 0);
    }
}
