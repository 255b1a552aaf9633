//! Request/response sessions with a single reader
//!
//! A [`ReaderSession`] pairs a [`Transport`] with the codec of one reader
//! family. Requests are strictly one at a time: a command is written, inbound
//! chunks are fed through the decoder, heartbeats are skipped and the first
//! other frame completes the request. A request that sees no such frame
//! before its deadline times out and leaves the session usable.
//!
//! [`SessionHandle`] runs a session as a task so that several parts of a
//! program can share it; overlapping requests are rejected rather than
//! queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rfid_protocol::{
    create_codec, r200, Frame, ProtocolError, ReaderCodec, ReaderCommand, ReaderFamily, TagRead,
};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::error::SessionError;
use crate::transport::{Connector, SerialConnector, Transport, TransportConfig, TransportEvent};

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Transport settings for the underlying endpoint
    pub transport: TransportConfig,
    /// Deadline applied by [`ReaderSession::execute`]
    pub request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            request_timeout: Duration::from_secs(2),
        }
    }
}

/// The request currently awaiting a response
#[derive(Debug, Clone, Copy)]
pub struct PendingRequest {
    pub command: u16,
    pub issued_at: Instant,
    pub deadline: Instant,
}

impl PendingRequest {
    fn new(command: u16, timeout: Duration) -> Self {
        let issued_at = Instant::now();
        Self {
            command,
            issued_at,
            deadline: issued_at + timeout,
        }
    }

    fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// Open connection to one reader
pub struct ReaderSession {
    family: ReaderFamily,
    transport: Transport,
    events: mpsc::Receiver<TransportEvent>,
    codec: Box<dyn ReaderCodec>,
    config: SessionConfig,
    pending: Option<PendingRequest>,
    lost: bool,
    closed: bool,
}

impl ReaderSession {
    /// Connect to `endpoint` through `connector` and speak `family`
    pub async fn open(
        connector: Arc<dyn Connector>,
        endpoint: &str,
        family: ReaderFamily,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let mut transport = Transport::new(endpoint, connector, config.transport.clone());
        let events = transport.connect().await?;
        info!("Opened {} session on {}", family.name(), endpoint);

        Ok(Self {
            family,
            transport,
            events,
            codec: create_codec(family),
            config,
            pending: None,
            lost: false,
            closed: false,
        })
    }

    /// Open a physical serial port
    pub async fn open_serial(
        port: &str,
        family: ReaderFamily,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        Self::open(Arc::new(SerialConnector), port, family, config).await
    }

    pub fn family(&self) -> ReaderFamily {
        self.family
    }

    pub fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Request currently awaiting its response, if any
    pub fn pending(&self) -> Option<&PendingRequest> {
        self.pending.as_ref()
    }

    /// Send a command and wait for the first non-heartbeat frame
    ///
    /// Frames failing their integrity check are dropped and the request keeps
    /// waiting until `timeout`.
    pub async fn send_and_await(
        &mut self,
        command: u16,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Frame, SessionError> {
        self.ensure_usable()?;
        if let Some(pending) = &self.pending {
            if !pending.expired() {
                // An abandoned request may still be answered
                return Err(SessionError::RequestPending);
            }
            debug!("Dropping expired request 0x{:02X}", pending.command);
        }

        let bytes = self
            .codec
            .encode(&ReaderCommand::new(command, payload.to_vec()))?;
        self.discard_stale();
        let pending = PendingRequest::new(command, timeout);
        self.pending = Some(pending);

        debug!(
            "Sending command 0x{:02X} to {} ({} bytes)",
            command,
            self.endpoint(),
            bytes.len()
        );
        if let Err(e) = self.transport.write(&bytes).await {
            self.pending = None;
            return Err(e.into());
        }

        let mut heartbeats = 0;
        let result = self.await_frame(pending.deadline, &mut heartbeats).await;
        self.pending = None;

        match &result {
            Ok(frame) => trace!(
                "Command 0x{:02X} answered by 0x{:02X} after {:?}",
                command,
                frame.command,
                pending.issued_at.elapsed()
            ),
            Err(SessionError::Timeout(_)) => {
                debug!("Command 0x{:02X} timed out after {:?}", command, timeout)
            }
            Err(_) => {}
        }
        result.map_err(|e| match e {
            SessionError::Timeout(_) => SessionError::Timeout(timeout),
            other => other,
        })
    }

    /// Send a command with the configured timeout and return the response payload
    pub async fn execute(&mut self, command: &ReaderCommand) -> Result<Vec<u8>, SessionError> {
        self.send_and_await(command.code, &command.payload, self.config.request_timeout)
            .await
            .map(|frame| frame.payload)
    }

    /// Wait for the next non-heartbeat frame without sending anything
    ///
    /// Used while the reader streams results, e.g. during multi inventory.
    pub async fn next_frame(&mut self, timeout: Duration) -> Result<Frame, SessionError> {
        self.ensure_usable()?;
        let mut heartbeats = 0;
        self.await_frame(Instant::now() + timeout, &mut heartbeats)
            .await
            .map_err(|e| match e {
                SessionError::Timeout(_) => SessionError::Timeout(timeout),
                other => other,
            })
    }

    /// Run one inventory round and return the tag seen, if any
    ///
    /// R200 readers answer an empty field with the keep-alive status frame;
    /// seeing only those before the deadline means no tag, not a timeout.
    pub async fn read_single(&mut self) -> Result<Option<TagRead>, SessionError> {
        if self.family.r200_flavor().is_none() {
            return Err(ProtocolError::Unsupported {
                family: self.family.name().to_string(),
                command: "single inventory".to_string(),
            }
            .into());
        }
        self.ensure_usable()?;

        let cmd = r200::single_inventory();
        let bytes = self.codec.encode(&cmd)?;
        self.discard_stale();
        let pending = PendingRequest::new(cmd.code, self.config.request_timeout);
        self.pending = Some(pending);
        if let Err(e) = self.transport.write(&bytes).await {
            self.pending = None;
            return Err(e.into());
        }

        let mut heartbeats = 0;
        let result = self.await_frame(pending.deadline, &mut heartbeats).await;
        self.pending = None;

        match result {
            Ok(frame)
                if frame.header == r200::TYPE_NOTIFICATION
                    && frame.command == u16::from(r200::CMD_SINGLE_INVENTORY) =>
            {
                let tag = TagRead::parse(&frame.payload).map_err(ProtocolError::from)?;
                info!("Tag {} (RSSI {} dBm)", tag.epc_hex(), tag.rssi);
                Ok(Some(tag))
            }
            Ok(frame) => {
                debug!("Inventory answered with command 0x{:02X}", frame.command);
                Ok(None)
            }
            Err(SessionError::Timeout(_)) if heartbeats > 0 => Ok(None),
            Err(SessionError::Timeout(_)) => {
                Err(SessionError::Timeout(self.config.request_timeout))
            }
            Err(e) => Err(e),
        }
    }

    /// Close the session and release the endpoint
    pub async fn close(mut self) {
        self.shutdown().await;
    }

    async fn shutdown(&mut self) {
        if !self.closed {
            self.closed = true;
            // The reader task may be parked on a full channel
            self.events.close();
            self.transport.disconnect().await;
            debug!("Closed {} session on {}", self.family.name(), self.endpoint());
        }
    }

    fn ensure_usable(&self) -> Result<(), SessionError> {
        if self.closed {
            Err(SessionError::Closed)
        } else if self.lost {
            Err(SessionError::ConnectionLost(None))
        } else {
            Ok(())
        }
    }

    /// Drop bytes that arrived while nothing was pending
    fn discard_stale(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                TransportEvent::Data(data) => {
                    trace!("Discarding {} stale bytes: {:02X?}", data.len(), data)
                }
                TransportEvent::ConnectionLost(_) => self.lost = true,
            }
        }
        self.codec.clear();
    }

    async fn await_frame(
        &mut self,
        deadline: Instant,
        heartbeats: &mut usize,
    ) -> Result<Frame, SessionError> {
        loop {
            while let Some(frame) = self.codec.next_frame() {
                if frame.is_heartbeat() {
                    trace!("Skipping heartbeat from {}", self.endpoint());
                    *heartbeats += 1;
                    continue;
                }
                return Ok(frame);
            }

            if self.lost {
                return Err(SessionError::ConnectionLost(None));
            }

            tokio::select! {
                event = self.events.recv() => match event {
                    Some(TransportEvent::Data(data)) => self.codec.push_bytes(&data),
                    Some(TransportEvent::ConnectionLost(reason)) => {
                        warn!("{} session on {} lost its connection", self.family.name(), self.endpoint());
                        self.lost = true;
                        return Err(SessionError::ConnectionLost(reason));
                    }
                    None => {
                        self.lost = true;
                        return Err(SessionError::ConnectionLost(None));
                    }
                },
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(SessionError::Timeout(deadline.saturating_duration_since(Instant::now())));
                }
            }
        }
    }
}

enum SessionRequest {
    Send {
        command: ReaderCommand,
        timeout: Duration,
        reply: oneshot::Sender<Result<Frame, SessionError>>,
    },
    ReadSingle {
        reply: oneshot::Sender<Result<Option<TagRead>, SessionError>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Shareable handle to a session running in its own task
#[derive(Clone)]
pub struct SessionHandle {
    family: ReaderFamily,
    request_timeout: Duration,
    tx: mpsc::Sender<SessionRequest>,
    busy: Arc<AtomicBool>,
}

/// Clears the busy flag when a request finishes or its caller gives up
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SessionHandle {
    /// Move `session` into a task and return a handle to it
    pub fn spawn(session: ReaderSession) -> Self {
        let family = session.family();
        let request_timeout = session.config().request_timeout;
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(run_session_task(session, rx));

        Self {
            family,
            request_timeout,
            tx,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn family(&self) -> ReaderFamily {
        self.family
    }

    /// Send a command and wait for the response frame
    ///
    /// Fails with [`SessionError::RequestPending`] if another clone of this
    /// handle has a request in flight.
    pub async fn send_and_await(
        &self,
        command: ReaderCommand,
        timeout: Duration,
    ) -> Result<Frame, SessionError> {
        let _guard = self.acquire()?;
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionRequest::Send {
                command,
                timeout,
                reply,
            })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Send a command with the session's timeout and return the response payload
    pub async fn execute(&self, command: ReaderCommand) -> Result<Vec<u8>, SessionError> {
        self.send_and_await(command, self.request_timeout)
            .await
            .map(|frame| frame.payload)
    }

    /// See [`ReaderSession::read_single`]
    pub async fn read_single(&self) -> Result<Option<TagRead>, SessionError> {
        let _guard = self.acquire()?;
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionRequest::ReadSingle { reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Close the session; other clones see [`SessionError::Closed`] afterwards
    pub async fn close(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(SessionRequest::Close { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }

    fn acquire(&self) -> Result<BusyGuard<'_>, SessionError> {
        if self.busy.swap(true, Ordering::AcqRel) {
            return Err(SessionError::RequestPending);
        }
        Ok(BusyGuard(&self.busy))
    }
}

async fn run_session_task(mut session: ReaderSession, mut rx: mpsc::Receiver<SessionRequest>) {
    while let Some(request) = rx.recv().await {
        match request {
            SessionRequest::Send {
                command,
                timeout,
                reply,
            } => {
                let result = session
                    .send_and_await(command.code, &command.payload, timeout)
                    .await;
                let _ = reply.send(result);
            }
            SessionRequest::ReadSingle { reply } => {
                let _ = reply.send(session.read_single().await);
            }
            SessionRequest::Close { reply } => {
                session.shutdown().await;
                let _ = reply.send(());
                return;
            }
        }
    }
    session.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{BoxedIo, ConnectFuture};
    use rfid_protocol::r200::{Flavor, R200Layout};
    use rfid_protocol::FrameLayout;
    use std::io;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

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

    const AADD: R200Layout = R200Layout::new(Flavor::Aadd);

    async fn open_r200() -> (ReaderSession, DuplexStream) {
        let (client, device) = tokio::io::duplex(1024);
        let connector = Arc::new(OneShotConnector(Mutex::new(Some(client))));
        let session = ReaderSession::open(
            connector,
            "sim0",
            ReaderFamily::R200Aadd,
            SessionConfig::default(),
        )
        .await
        .unwrap();
        (session, device)
    }

    /// Read one command frame written by the session
    async fn read_command(device: &mut DuplexStream) -> Vec<u8> {
        let mut header = [0u8; 5];
        device.read_exact(&mut header).await.unwrap();
        let len = usize::from(u16::from_be_bytes([header[3], header[4]]));
        let mut rest = vec![0u8; len + 2];
        device.read_exact(&mut rest).await.unwrap();
        [header.to_vec(), rest].concat()
    }

    fn response(command: u8, payload: &[u8]) -> Vec<u8> {
        AADD.encode_frame(r200::TYPE_RESPONSE, u16::from(command), payload)
    }

    fn heartbeat() -> Vec<u8> {
        response(r200::CMD_HEARTBEAT, &[0x15])
    }

    #[tokio::test]
    async fn test_execute_returns_payload() {
        let (mut session, mut device) = open_r200().await;

        let device_task = tokio::spawn(async move {
            let cmd = read_command(&mut device).await;
            assert_eq!(cmd, r200::module_info().encode(&AADD));
            let reply = response(r200::CMD_MODULE_INFO, b"\x00M100 26dBm V1.0");
            // Split the reply across writes
            device.write_all(&reply[..4]).await.unwrap();
            tokio::task::yield_now().await;
            device.write_all(&reply[4..]).await.unwrap();
            device
        });

        let payload = session.execute(&r200::module_info()).await.unwrap();
        assert_eq!(
            r200::module_info_text(&payload).as_deref(),
            Some("M100 26dBm V1.0")
        );
        assert!(session.pending().is_none());

        let _device = device_task.await.unwrap();
        session.close().await;
    }

    #[tokio::test]
    async fn test_heartbeats_and_corrupt_frames_are_skipped() {
        let (mut session, mut device) = open_r200().await;

        let device_task = tokio::spawn(async move {
            read_command(&mut device).await;
            let mut corrupt = response(r200::CMD_FIRMWARE, &[0x01, 0x02]);
            let chk = corrupt.len() - 2;
            corrupt[chk] ^= 0xFF;

            device.write_all(&heartbeat()).await.unwrap();
            device.write_all(&corrupt).await.unwrap();
            device.write_all(&[0x00, 0x13]).await.unwrap();
            device
                .write_all(&response(r200::CMD_FIRMWARE, &[0x01, 0x56]))
                .await
                .unwrap();
            device
        });

        let frame = session
            .send_and_await(u16::from(r200::CMD_FIRMWARE), &[0x01], Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(frame.command, u16::from(r200::CMD_FIRMWARE));
        assert_eq!(frame.payload, vec![0x01, 0x56]);

        let _device = device_task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_leaves_session_usable() {
        let (mut session, mut device) = open_r200().await;

        let err = session
            .send_and_await(0x22, &[], Duration::from_millis(300))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Timeout(t) if t == Duration::from_millis(300)));
        assert!(session.pending().is_none());

        read_command(&mut device).await;
        let device_task = tokio::spawn(async move {
            read_command(&mut device).await;
            device
                .write_all(&response(r200::CMD_MODULE_INFO, &[0x00, b'X']))
                .await
                .unwrap();
            device
        });

        let payload = session.execute(&r200::module_info()).await.unwrap();
        assert_eq!(payload, vec![0x00, b'X']);
        let _device = device_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_lost_while_waiting() {
        let (mut session, mut device) = open_r200().await;

        let device_task = tokio::spawn(async move {
            read_command(&mut device).await;
            drop(device);
        });

        let err = session.execute(&r200::module_info()).await.unwrap_err();
        assert!(matches!(err, SessionError::ConnectionLost(_)));
        device_task.await.unwrap();

        assert!(matches!(
            session.execute(&r200::module_info()).await,
            Err(SessionError::ConnectionLost(_))
        ));
    }

    #[tokio::test]
    async fn test_read_single_tag() {
        let (mut session, mut device) = open_r200().await;

        let device_task = tokio::spawn(async move {
            read_command(&mut device).await;
            let notification = AADD.encode_frame(
                r200::TYPE_NOTIFICATION,
                u16::from(r200::CMD_SINGLE_INVENTORY),
                &[0xC9, 0x34, 0x00, 0xE2, 0x00, 0x11, 0x22, 0x3A, 0x76],
            );
            device.write_all(&notification).await.unwrap();
            device
        });

        let tag = session.read_single().await.unwrap().unwrap();
        assert_eq!(tag.epc_hex(), "e2001122");
        assert_eq!(tag.rssi, -55);
        let _device = device_task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_single_empty_field() {
        let (mut session, mut device) = open_r200().await;

        let device_task = tokio::spawn(async move {
            read_command(&mut device).await;
            device.write_all(&heartbeat()).await.unwrap();
            device
        });

        assert_eq!(session.read_single().await.unwrap(), None);
        let _device = device_task.await.unwrap();
    }

    fn notification(epc_tail: u8) -> Vec<u8> {
        AADD.encode_frame(
            r200::TYPE_NOTIFICATION,
            u16::from(r200::CMD_SINGLE_INVENTORY),
            &[0xC9, 0x34, 0x00, 0xE2, 0x00, 0x11, epc_tail, 0x3A, 0x76],
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_frame_follows_multi_inventory() {
        let (mut session, mut device) = open_r200().await;

        let device_task = tokio::spawn(async move {
            let cmd = read_command(&mut device).await;
            assert_eq!(cmd, r200::multi_inventory(3).encode(&AADD));
            for tail in [0x01, 0x02, 0x03] {
                device.write_all(&heartbeat()).await.unwrap();
                tokio::time::sleep(Duration::from_millis(10)).await;
                device.write_all(&notification(tail)).await.unwrap();
                device.write_all(&heartbeat()).await.unwrap();
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            device
        });

        let inventory = r200::multi_inventory(3);
        let first = session
            .send_and_await(inventory.code, &inventory.payload, Duration::from_secs(1))
            .await
            .unwrap();
        let mut epcs = vec![TagRead::parse(&first.payload).unwrap().epc_hex()];
        for _ in 0..2 {
            let frame = session.next_frame(Duration::from_millis(100)).await.unwrap();
            assert_eq!(frame.header, r200::TYPE_NOTIFICATION);
            epcs.push(TagRead::parse(&frame.payload).unwrap().epc_hex());
        }
        assert_eq!(epcs, vec!["e2001101", "e2001102", "e2001103"]);

        let _device = device_task.await.unwrap();
        assert!(matches!(
            session.next_frame(Duration::from_millis(100)).await,
            Err(SessionError::Timeout(t)) if t == Duration::from_millis(100)
        ));
        session.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_while_reader_streams() {
        let (session, mut device) = open_r200().await;

        // Nobody drains the session, so the event channel fills up
        let streamer = tokio::spawn(async move {
            for _ in 0..100 {
                if device.write_all(&heartbeat()).await.is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        });
        tokio::time::sleep(Duration::from_millis(250)).await;

        tokio::time::timeout(Duration::from_secs(3), session.close())
            .await
            .expect("close did not complete");
        streamer.await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_payload_is_not_sent() {
        let (mut session, _device) = open_r200().await;
        let err = session
            .send_and_await(
                u16::from(r200::CMD_WRITE),
                &[0u8; r200::MAX_PAYLOAD + 1],
                Duration::from_millis(100),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Protocol(ProtocolError::InvalidParameter(_))
        ));
        assert!(session.pending().is_none());
    }

    #[tokio::test]
    async fn test_read_single_requires_r200() {
        let (client, _device) = tokio::io::duplex(64);
        let connector = Arc::new(OneShotConnector(Mutex::new(Some(client))));
        let mut session =
            ReaderSession::open(connector, "sim0", ReaderFamily::Cf600, SessionConfig::default())
                .await
                .unwrap();
        assert!(matches!(
            session.read_single().await,
            Err(SessionError::Protocol(ProtocolError::Unsupported { .. }))
        ));
    }

    #[tokio::test]
    async fn test_open_failure_is_transport_error() {
        let connector = Arc::new(OneShotConnector(Mutex::new(None)));
        let result =
            ReaderSession::open(connector, "ghost", ReaderFamily::Hyb506, SessionConfig::default())
                .await;
        assert!(matches!(result, Err(SessionError::Transport(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_rejects_overlapping_requests() {
        let (session, mut device) = open_r200().await;
        let handle = SessionHandle::spawn(session);
        let other = handle.clone();

        let first = tokio::spawn({
            let handle = handle.clone();
            async move { handle.execute(r200::module_info()).await }
        });
        // Let the first request reach the reader
        read_command(&mut device).await;

        assert!(matches!(
            other.execute(r200::firmware()).await,
            Err(SessionError::RequestPending)
        ));

        device
            .write_all(&response(r200::CMD_MODULE_INFO, &[0x00, b'A']))
            .await
            .unwrap();
        assert_eq!(first.await.unwrap().unwrap(), vec![0x00, b'A']);

        // Free again once the first request resolved
        let second = tokio::spawn(async move { other.execute(r200::firmware()).await });
        read_command(&mut device).await;
        device
            .write_all(&response(r200::CMD_FIRMWARE, &[0x01, b'B']))
            .await
            .unwrap();
        assert_eq!(second.await.unwrap().unwrap(), vec![0x01, b'B']);

        handle.close().await;
        assert!(matches!(
            handle.execute(r200::firmware()).await,
            Err(SessionError::Closed)
        ));
    }
}
