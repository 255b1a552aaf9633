//! Per-family detectors
//!
//! A [`Detector`] knows the probe bytes for one reader family, how to
//! recognise the settled reply, and how to summarise the reader it found.
//! Detectors are collected in a [`DetectorRegistry`]; new families register
//! their own detector without touching existing ones.

use std::sync::Arc;

use rfid_protocol::frame::{DecodeStep, FrameDecoder, FrameLayout};
use rfid_protocol::{cf600, hyb506, r200, Frame, ReaderFamily};
use tracing::trace;

/// Probe, validation and identification for one reader family
pub trait Detector: Send + Sync {
    /// Family this detector identifies
    fn family(&self) -> ReaderFamily;

    /// Short name used in logs
    fn name(&self) -> &'static str {
        self.family().name()
    }

    /// Bytes written to the port to provoke an answer
    fn probe_command(&self) -> Vec<u8>;

    /// Whether the settled reply identifies this family
    fn validate(&self, response: &[u8]) -> bool;

    /// Human-readable description of the reader behind `response`
    ///
    /// Only called after [`validate`](Self::validate) accepted the reply.
    fn extract_info(&self, response: &[u8]) -> String;
}

/// First integrity-checked frame in `response` accepted by `matches`
///
/// Leading garbage and corrupt frames are skipped the same way a session
/// would skip them.
fn find_frame<L, F>(layout: L, response: &[u8], matches: F) -> Option<Frame>
where
    L: FrameLayout,
    F: Fn(&Frame) -> bool,
{
    let mut decoder = FrameDecoder::new(layout);
    decoder.push_bytes(response);
    loop {
        match decoder.step() {
            DecodeStep::Frame { frame, .. } if matches(&frame) => return Some(frame),
            DecodeStep::Frame { frame, .. } => {
                trace!("Ignoring unrelated frame 0x{:04X}", frame.command);
            }
            DecodeStep::Resync { error, .. } => trace!("Resync while validating: {}", error),
            DecodeStep::Incomplete => return None,
        }
    }
}

/// R200 module, either marker flavor
#[derive(Debug, Clone, Copy)]
pub struct R200Detector {
    flavor: r200::Flavor,
}

impl R200Detector {
    pub fn new(flavor: r200::Flavor) -> Self {
        Self { flavor }
    }

    fn module_info(&self, response: &[u8]) -> Option<Frame> {
        find_frame(
            r200::R200Layout::new(self.flavor),
            response,
            r200::is_module_info_response,
        )
    }
}

impl Detector for R200Detector {
    fn family(&self) -> ReaderFamily {
        self.flavor.family()
    }

    fn probe_command(&self) -> Vec<u8> {
        r200::probe_command(self.flavor)
    }

    fn validate(&self, response: &[u8]) -> bool {
        self.module_info(response).is_some()
    }

    fn extract_info(&self, response: &[u8]) -> String {
        self.module_info(response)
            .and_then(|frame| r200::module_info_text(&frame.payload))
            .unwrap_or_else(|| "R200 Reader".to_string())
    }
}

/// CF600 module
#[derive(Debug, Clone, Copy, Default)]
pub struct Cf600Detector;

impl Cf600Detector {
    pub fn new() -> Self {
        Self
    }
}

impl Detector for Cf600Detector {
    fn family(&self) -> ReaderFamily {
        ReaderFamily::Cf600
    }

    fn probe_command(&self) -> Vec<u8> {
        cf600::probe_command()
    }

    fn validate(&self, response: &[u8]) -> bool {
        find_frame(cf600::Cf600Layout::new(), response, |frame| {
            frame.command == cf600::CMD_MODULE_INIT
        })
        .is_some()
    }

    fn extract_info(&self, response: &[u8]) -> String {
        let start = response
            .iter()
            .position(|&b| b == cf600::HEAD)
            .unwrap_or(0);
        let head: Vec<String> = response[start..]
            .iter()
            .take(8)
            .map(|b| format!("{:02X}", b))
            .collect();
        format!("CF600 Reader (Response: {})", head.join(" "))
    }
}

/// HYB506 reader at the default address
#[derive(Debug, Clone, Copy, Default)]
pub struct Hyb506Detector;

impl Hyb506Detector {
    pub fn new() -> Self {
        Self
    }

    fn reader_info(&self, response: &[u8]) -> Option<Frame> {
        find_frame(hyb506::Hyb506Layout::new(), response, |frame| {
            frame.command == u16::from(hyb506::CMD_READER_INFO)
        })
    }
}

impl Detector for Hyb506Detector {
    fn family(&self) -> ReaderFamily {
        ReaderFamily::Hyb506
    }

    fn probe_command(&self) -> Vec<u8> {
        hyb506::probe_command()
    }

    fn validate(&self, response: &[u8]) -> bool {
        self.reader_info(response).is_some()
    }

    fn extract_info(&self, response: &[u8]) -> String {
        match self
            .reader_info(response)
            .and_then(|frame| hyb506::ReaderInfo::parse(&frame.payload).ok())
        {
            Some(info) => format!(
                "HYB506 Reader (Firmware: {}, Power: {} dBm)",
                info.firmware_version(),
                info.power_dbm
            ),
            None => format!("HYB506 Reader (Length: {})", response.len()),
        }
    }
}

/// Ordered catalog of detectors tried on every port
#[derive(Clone, Default)]
pub struct DetectorRegistry {
    detectors: Vec<Arc<dyn Detector>>,
}

impl DetectorRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a detector for every built-in family
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(R200Detector::new(r200::Flavor::Aadd));
        registry.register(R200Detector::new(r200::Flavor::Bb7e));
        registry.register(Cf600Detector::new());
        registry.register(Hyb506Detector::new());
        registry
    }

    /// Add a detector; it is tried after the ones already registered
    pub fn register<D: Detector + 'static>(&mut self, detector: D) -> &mut Self {
        self.detectors.push(Arc::new(detector));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Detector>> {
        self.detectors.iter()
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Detector for `family`, if registered
    pub fn get(&self, family: ReaderFamily) -> Option<&Arc<dyn Detector>> {
        self.detectors.iter().find(|d| d.family() == family)
    }
}

impl std::fmt::Debug for DetectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.detectors.iter().map(|d| d.name()))
            .finish()
    }
}
