//! RFID Reader Simulation Library
//!
//! This crate provides simulated reader modules for exercising sessions and
//! detection without hardware. It includes:
//!
//! - **VirtualReader**: answers commands with protocol-accurate frames for
//!   every supported family
//! - **SimConnector**: a [`Connector`](rfid_session::Connector) mapping port
//!   names to readers, silent or noisy devices and ports that refuse to open
//!
//! # Example
//!
//! ```rust
//! use rfid_protocol::{r200, ReaderFamily};
//! use rfid_sim::VirtualReader;
//!
//! let mut reader = VirtualReader::new(ReaderFamily::R200Aadd);
//! let replies = reader.process(&r200::probe_command(r200::Flavor::Aadd));
//!
//! for bytes in replies {
//!     println!("Reader output: {:02X?}", bytes);
//! }
//! ```

pub mod connector;
pub mod reader;
pub mod task;

pub use connector::{PortBehaviour, SimConnector, NOISE};
pub use reader::{VirtualReader, VirtualReaderConfig};
pub use task::{run_reader_task, Delivery};
