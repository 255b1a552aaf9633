//! RFID Reader Sessions
//!
//! This crate moves bytes between the host and a reader and turns them into
//! request/response exchanges:
//!
//! - [`Transport`]: one async connection to an endpoint, pushing inbound
//!   chunks through a channel and reporting connection loss once
//! - [`ReaderSession`]: one outstanding command at a time over a transport,
//!   with deadlines, heartbeat filtering and frame reassembly
//! - [`SessionHandle`]: a session running in its own task, shareable across
//!   callers
//!
//! # Example
//!
//! ```rust,no_run
//! use rfid_protocol::{r200, ReaderFamily};
//! use rfid_session::{ReaderSession, SessionConfig};
//!
//! # async fn example() -> Result<(), rfid_session::SessionError> {
//! let mut session =
//!     ReaderSession::open_serial("/dev/ttyUSB0", ReaderFamily::R200Aadd, SessionConfig::default())
//!         .await?;
//!
//! let info = session.execute(&r200::module_info()).await?;
//! println!("{:?}", r200::module_info_text(&info));
//!
//! session.close().await;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod session;
pub mod transport;

pub use error::{SessionError, TransportError};
pub use session::{PendingRequest, ReaderSession, SessionConfig, SessionHandle};
pub use transport::{
    BoxedIo, ConnectFuture, ConnectionState, Connector, SerialConnector, SerialIo, Transport,
    TransportConfig, TransportEvent,
};
