//! Virtual reader simulation
//!
//! Provides a simulated reader module that decodes host commands with the
//! family's own codec and answers them with protocol-accurate frames.

use rfid_protocol::cf600::{self, Cf600Layout};
use rfid_protocol::hyb506::{self, Hyb506Layout};
use rfid_protocol::r200::{self, Flavor, R200Layout};
use rfid_protocol::{create_codec, Frame, FrameLayout, ReaderCodec, ReaderFamily, TagRead};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for creating a virtual reader
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualReaderConfig {
    /// Protocol spoken by the reader
    pub family: ReaderFamily,
    /// Text returned by module/device info queries
    pub info_text: String,
    /// Tag answering inventory rounds, if any
    pub tag: Option<TagRead>,
    /// Emit a keep-alive frame before each R200 inventory answer
    pub heartbeat_before_reply: bool,
}

impl VirtualReaderConfig {
    /// Defaults for a reader of `family`
    pub fn new(family: ReaderFamily) -> Self {
        Self {
            family,
            info_text: match family {
                ReaderFamily::R200Aadd | ReaderFamily::R200Bb7e => "M100 26dBm V1.0".to_string(),
                ReaderFamily::Cf600 => "CF600 V2.3".to_string(),
                ReaderFamily::Hyb506 => "UHFReader06".to_string(),
            },
            tag: None,
            heartbeat_before_reply: false,
        }
    }

    pub fn with_info(mut self, text: impl Into<String>) -> Self {
        self.info_text = text.into();
        self
    }

    pub fn with_tag(mut self, tag: TagRead) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn with_heartbeat(mut self, enabled: bool) -> Self {
        self.heartbeat_before_reply = enabled;
        self
    }
}

/// A simulated reader module
pub struct VirtualReader {
    config: VirtualReaderConfig,
    codec: Box<dyn ReaderCodec>,
    commands_seen: usize,
}

impl VirtualReader {
    pub fn new(family: ReaderFamily) -> Self {
        Self::from_config(VirtualReaderConfig::new(family))
    }

    pub fn from_config(config: VirtualReaderConfig) -> Self {
        Self {
            codec: create_codec(config.family),
            config,
            commands_seen: 0,
        }
    }

    pub fn family(&self) -> ReaderFamily {
        self.config.family
    }

    pub fn config(&self) -> &VirtualReaderConfig {
        &self.config
    }

    /// Number of well-formed commands received so far
    pub fn commands_seen(&self) -> usize {
        self.commands_seen
    }

    /// Feed bytes from the host and collect the frames to send back
    ///
    /// Bytes that are not valid commands for this family are ignored, as a
    /// real module would.
    pub fn process(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        self.codec.push_bytes(data);

        let mut replies = Vec::new();
        while let Some(frame) = self.codec.next_frame() {
            self.commands_seen += 1;
            debug!(
                "Virtual {} received command 0x{:02X}",
                self.config.family.name(),
                frame.command
            );
            replies.extend(self.respond(&frame));
        }
        replies
    }

    fn respond(&self, frame: &Frame) -> Vec<Vec<u8>> {
        match self.config.family.r200_flavor() {
            Some(flavor) => self.respond_r200(flavor, frame),
            None if self.config.family == ReaderFamily::Cf600 => self.respond_cf600(frame),
            None => self.respond_hyb506(frame),
        }
    }

    fn respond_r200(&self, flavor: Flavor, frame: &Frame) -> Vec<Vec<u8>> {
        // Responses never trigger responses
        if frame.header != r200::TYPE_COMMAND {
            return Vec::new();
        }
        let layout = R200Layout::new(flavor);
        let reply = |command: u8, payload: &[u8]| {
            layout.encode_frame(r200::TYPE_RESPONSE, u16::from(command), payload)
        };

        let Ok(command) = u8::try_from(frame.command) else {
            return Vec::new();
        };
        match command {
            r200::CMD_MODULE_INFO => {
                let mut payload = vec![0x00];
                payload.extend_from_slice(self.config.info_text.as_bytes());
                vec![reply(command, &payload)]
            }
            r200::CMD_SINGLE_INVENTORY => {
                let mut out = Vec::new();
                if self.config.heartbeat_before_reply {
                    out.push(reply(r200::CMD_HEARTBEAT, &[0x15]));
                }
                match &self.config.tag {
                    Some(tag) => out.push(layout.encode_frame(
                        r200::TYPE_NOTIFICATION,
                        u16::from(command),
                        &tag_payload(tag),
                    )),
                    // Empty field is reported with the error status frame
                    None if !self.config.heartbeat_before_reply => {
                        out.push(reply(r200::CMD_HEARTBEAT, &[0x15]))
                    }
                    None => {}
                }
                out
            }
            _ => vec![reply(command, &[0x00])],
        }
    }

    fn respond_cf600(&self, frame: &Frame) -> Vec<Vec<u8>> {
        let layout = Cf600Layout::new();
        let payload = match frame.command {
            cf600::CMD_DEVICE_INFO => {
                let mut payload = vec![cf600::STATUS_OK];
                payload.extend_from_slice(self.config.info_text.as_bytes());
                payload
            }
            _ => vec![cf600::STATUS_OK],
        };
        vec![layout.encode_frame(0x01, frame.command, &payload)]
    }

    fn respond_hyb506(&self, frame: &Frame) -> Vec<Vec<u8>> {
        let layout = Hyb506Layout::with_address(frame.header);
        let payload = match u8::try_from(frame.command) {
            Ok(hyb506::CMD_READER_INFO) => {
                vec![hyb506::STATUS_OK, 0x03, 0x01, 0x0F, 0x02, 0x3E, 0x00, 0x1E, 0x0A]
            }
            _ => vec![hyb506::STATUS_OK],
        };
        vec![layout.encode(frame.command, &payload)]
    }
}

fn tag_payload(tag: &TagRead) -> Vec<u8> {
    let mut payload = Vec::with_capacity(5 + tag.epc.len());
    payload.push(tag.rssi as u8);
    payload.extend_from_slice(&tag.pc.to_be_bytes());
    payload.extend_from_slice(&tag.epc);
    payload.extend_from_slice(&tag.epc_crc.to_be_bytes());
    payload
}
