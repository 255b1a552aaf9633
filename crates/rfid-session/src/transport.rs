//! Async byte transport over a serial endpoint
//!
//! A [`Transport`] owns one open endpoint. Inbound bytes are pushed by a
//! spawned reader task into an mpsc channel as [`TransportEvent::Data`]
//! chunks, exactly as they arrive: chunks are not aligned to protocol frames.
//! If the endpoint drops underneath us the task emits a single
//! [`TransportEvent::ConnectionLost`] and exits.
//!
//! Endpoints are opened through a [`Connector`], so tests and the simulator
//! can hand out `tokio::io::duplex` streams in place of serial ports.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, WriteHalf};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_serial::{SerialPort, SerialPortBuilderExt};
use tracing::{debug, info, trace, warn};

use crate::error::TransportError;

/// Byte stream usable as a transport endpoint
pub trait SerialIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> SerialIo for T {}

/// Type-erased endpoint stream
pub type BoxedIo = Box<dyn SerialIo>;

/// Future returned by [`Connector::open`]
pub type ConnectFuture<'a> = Pin<Box<dyn Future<Output = io::Result<BoxedIo>> + Send + 'a>>;

/// Opens endpoints by name
pub trait Connector: Send + Sync {
    fn open<'a>(&'a self, endpoint: &'a str, config: &'a TransportConfig) -> ConnectFuture<'a>;
}

/// Opens physical serial ports with tokio-serial
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialConnector;

impl Connector for SerialConnector {
    fn open<'a>(&'a self, endpoint: &'a str, config: &'a TransportConfig) -> ConnectFuture<'a> {
        Box::pin(async move {
            let mut stream = tokio_serial::new(endpoint, config.baud_rate)
                .timeout(Duration::from_millis(100))
                .open_native_async()?;

            // These modules reset while RTS is asserted
            stream.write_request_to_send(false)?;

            Ok(Box::new(stream) as BoxedIo)
        })
    }
}

/// Transport configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Serial baud rate
    pub baud_rate: u32,
    /// Upper bound on opening the endpoint
    pub connect_timeout: Duration,
    /// Size of a single read from the endpoint
    pub read_buffer_size: usize,
    /// Inbound events buffered before the reader task waits
    pub event_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            connect_timeout: Duration::from_secs(1),
            read_buffer_size: 1024,
            event_capacity: 64,
        }
    }
}

/// Notification from the reader task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Bytes received, in arrival order
    Data(Vec<u8>),
    /// The endpoint closed or failed; sent at most once per connection
    ConnectionLost(Option<String>),
}

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

struct ReaderTask {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// One connection to one endpoint
pub struct Transport {
    endpoint: String,
    config: TransportConfig,
    connector: Arc<dyn Connector>,
    state: ConnectionState,
    writer: Option<WriteHalf<BoxedIo>>,
    reader: Option<ReaderTask>,
}

impl Transport {
    /// Create a disconnected transport for `endpoint`
    pub fn new(
        endpoint: impl Into<String>,
        connector: Arc<dyn Connector>,
        config: TransportConfig,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            config,
            connector,
            state: ConnectionState::Disconnected,
            writer: None,
            reader: None,
        }
    }

    /// Transport for a physical serial port
    pub fn serial(endpoint: impl Into<String>, config: TransportConfig) -> Self {
        Self::new(endpoint, Arc::new(SerialConnector), config)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Current state; a connection whose reader task has ended counts as
    /// disconnected
    pub fn state(&self) -> ConnectionState {
        match (&self.state, &self.reader) {
            (ConnectionState::Connected, Some(task)) if task.handle.is_finished() => {
                ConnectionState::Disconnected
            }
            (state, _) => *state,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Open the endpoint and start receiving
    ///
    /// Any previous connection is closed first. The returned receiver yields
    /// every inbound chunk until the connection ends.
    pub async fn connect(&mut self) -> Result<mpsc::Receiver<TransportEvent>, TransportError> {
        self.disconnect().await;
        self.state = ConnectionState::Connecting;
        debug!("Opening {}", self.endpoint);

        let opened = tokio::time::timeout(
            self.config.connect_timeout,
            self.connector.open(&self.endpoint, &self.config),
        )
        .await;

        let io = match opened {
            Ok(Ok(io)) => io,
            Ok(Err(source)) => {
                self.state = ConnectionState::Disconnected;
                return Err(TransportError::ConnectFailed {
                    endpoint: self.endpoint.clone(),
                    source,
                });
            }
            Err(_) => {
                self.state = ConnectionState::Disconnected;
                return Err(TransportError::ConnectTimeout {
                    endpoint: self.endpoint.clone(),
                    timeout: self.config.connect_timeout,
                });
            }
        };

        let (read_half, write_half) = tokio::io::split(io);
        let (event_tx, event_rx) = mpsc::channel(self.config.event_capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(run_read_loop(
            self.endpoint.clone(),
            read_half,
            self.config.read_buffer_size,
            event_tx,
            shutdown_rx,
        ));

        self.writer = Some(write_half);
        self.reader = Some(ReaderTask {
            shutdown: shutdown_tx,
            handle,
        });
        self.state = ConnectionState::Connected;
        info!("Connected to {}", self.endpoint);

        Ok(event_rx)
    }

    /// Send bytes to the endpoint
    pub async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let writer = self.writer.as_mut().ok_or(TransportError::NotConnected)?;
        trace!("Write {} bytes to {}: {:02X?}", data.len(), self.endpoint, data);
        writer.write_all(data).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Close the endpoint
    ///
    /// Safe to call at any time and any number of times. When this returns
    /// the endpoint handle has been released.
    pub async fn disconnect(&mut self) {
        if let Some(task) = self.reader.take() {
            let _ = task.shutdown.send(());
            if let Err(e) = task.handle.await {
                warn!("Reader task for {} ended abnormally: {}", self.endpoint, e);
            }
        }
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
            debug!("Closed {}", self.endpoint);
        }
        self.state = ConnectionState::Disconnected;
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Some(task) = self.reader.take() {
            task.handle.abort();
        }
    }
}

async fn run_read_loop<R>(
    endpoint: String,
    mut reader: R,
    buffer_size: usize,
    events: mpsc::Sender<TransportEvent>,
    mut shutdown: oneshot::Receiver<()>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; buffer_size.max(1)];

    let lost = loop {
        let result = tokio::select! {
            _ = &mut shutdown => return,
            result = reader.read(&mut buf) => result,
        };

        match result {
            Ok(0) => break None,
            Ok(n) => {
                trace!("Read {} bytes from {}: {:02X?}", n, endpoint, &buf[..n]);
                let event = TransportEvent::Data(buf[..n].to_vec());
                // A full channel must not keep disconnect() waiting
                tokio::select! {
                    _ = &mut shutdown => return,
                    sent = events.send(event) => {
                        if sent.is_err() {
                            debug!("Event receiver for {} dropped", endpoint);
                            return;
                        }
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock
                || e.kind() == io::ErrorKind::TimedOut => continue,
            Err(e) => break Some(e.to_string()),
        }
    };

    warn!(
        "Connection to {} lost{}",
        endpoint,
        lost.as_ref().map(|r| format!(": {}", r)).unwrap_or_default()
    );
    tokio::select! {
        _ = &mut shutdown => {}
        _ = events.send(TransportEvent::ConnectionLost(lost)) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::io::DuplexStream;

    /// Hands out one pre-made duplex end, then refuses
    struct OneShotConnector(Mutex<Option<DuplexStream>>);

    impl Connector for OneShotConnector {
        fn open<'a>(&'a self, _: &'a str, _: &'a TransportConfig) -> ConnectFuture<'a> {
            let io = self.0.lock().unwrap().take();
            Box::pin(async move {
                io.map(|io| Box::new(io) as BoxedIo)
                    .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such port"))
            })
        }
    }

    struct PendingConnector;

    impl Connector for PendingConnector {
        fn open<'a>(&'a self, _: &'a str, _: &'a TransportConfig) -> ConnectFuture<'a> {
            Box::pin(std::future::pending())
        }
    }

    fn transport_pair() -> (Transport, DuplexStream) {
        let (client, device) = tokio::io::duplex(256);
        let connector = OneShotConnector(Mutex::new(Some(client)));
        let transport = Transport::new("sim0", Arc::new(connector), TransportConfig::default());
        (transport, device)
    }

    #[tokio::test]
    async fn test_round_trip_bytes() {
        let (mut transport, mut device) = transport_pair();
        let mut events = transport.connect().await.unwrap();
        assert!(transport.is_connected());

        transport.write(&[0xAA, 0x00]).await.unwrap();
        let mut buf = [0u8; 2];
        device.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0xAA, 0x00]);

        device.write_all(&[0x01, 0x02, 0x03]).await.unwrap();
        assert_eq!(
            events.recv().await,
            Some(TransportEvent::Data(vec![0x01, 0x02, 0x03]))
        );

        transport.disconnect().await;
    }

    #[tokio::test]
    async fn test_write_requires_connection() {
        let (mut transport, _device) = transport_pair();
        assert!(matches!(
            transport.write(&[0x00]).await,
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_connection_lost_reported_once() {
        let (mut transport, device) = transport_pair();
        let mut events = transport.connect().await.unwrap();

        drop(device);
        assert_eq!(events.recv().await, Some(TransportEvent::ConnectionLost(None)));
        assert_eq!(events.recv().await, None);
        assert_eq!(transport.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent_and_releases_endpoint() {
        let (mut transport, mut device) = transport_pair();
        let _events = transport.connect().await.unwrap();

        transport.disconnect().await;
        transport.disconnect().await;
        assert_eq!(transport.state(), ConnectionState::Disconnected);

        // Both halves dropped: the device side sees end of stream
        let mut buf = [0u8; 1];
        assert_eq!(device.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_with_full_event_channel() {
        let (client, mut device) = tokio::io::duplex(256);
        let connector = OneShotConnector(Mutex::new(Some(client)));
        let config = TransportConfig {
            event_capacity: 2,
            ..Default::default()
        };
        let mut transport = Transport::new("sim0", Arc::new(connector), config);
        let _events = transport.connect().await.unwrap();

        for _ in 0..8 {
            device.write_all(&[0xAA, 0x02, 0x00]).await.unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        tokio::time::timeout(Duration::from_secs(1), transport.disconnect())
            .await
            .expect("disconnect did not complete");
        assert_eq!(transport.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_open_failure() {
        let connector = OneShotConnector(Mutex::new(None));
        let mut transport = Transport::new("ghost", Arc::new(connector), TransportConfig::default());
        assert!(matches!(
            transport.connect().await,
            Err(TransportError::ConnectFailed { .. })
        ));
        assert_eq!(transport.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_timeout() {
        let mut transport =
            Transport::new("stuck", Arc::new(PendingConnector), TransportConfig::default());
        assert!(matches!(
            transport.connect().await,
            Err(TransportError::ConnectTimeout { .. })
        ));
    }
}
