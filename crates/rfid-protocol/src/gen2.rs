//! EPC Gen2 air-interface parameters shared by reader command sets

use crate::error::ProtocolError;

/// Tag memory bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum MemBank {
    /// Kill and access passwords
    Reserved = 0b00,
    /// EPC/UII bank
    EpcUii = 0b01,
    /// Tag identifier bank
    Tid = 0b10,
    /// User memory
    User = 0b11,
}

/// Memory area addressed by a lock operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LockBank {
    KillPassword = 0,
    AccessPassword = 1,
    Epc = 2,
    Tid = 3,
    User = 4,
}

/// Lock action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LockMode {
    Unlocked = 0b00,
    PermaUnlocked = 0b01,
    Locked = 0b10,
    PermaLocked = 0b11,
}

impl LockMode {
    /// Whether the action can never be undone
    pub fn is_permanent(&self) -> bool {
        matches!(self, LockMode::PermaUnlocked | LockMode::PermaLocked)
    }
}

/// 20-bit lock payload: ten mask bits followed by ten action bits
///
/// Each bank owns two bits in both halves, kill password first. Only the
/// write-lock bit is masked for reversible modes; permanent modes also mask
/// the perma-lock bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LockPayload {
    word: u32,
}

impl LockPayload {
    /// Payload locking a single bank
    pub fn new(bank: LockBank, mode: LockMode) -> Self {
        Self::default().with(bank, mode)
    }

    /// Add the lock state of another bank
    pub fn with(mut self, bank: LockBank, mode: LockMode) -> Self {
        let action_mask: u32 = if mode.is_permanent() { 0b11 } else { 0b10 };
        let slot = 2 * (4 - u32::from(bank as u8));

        // Clear anything previously set for this bank
        self.word &= !((0b11 << (10 + slot)) | (0b11 << slot));
        self.word |= action_mask << (10 + slot);
        self.word |= (u32::from(mode as u8) & action_mask) << slot;
        self
    }

    /// Raw 20-bit value
    pub fn value(&self) -> u32 {
        self.word
    }

    /// Big-endian wire encoding
    pub fn to_bytes(&self) -> [u8; 3] {
        let [_, a, b, c] = self.word.to_be_bytes();
        [a, b, c]
    }
}

/// Parameters of a Gen2 Select command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectParams {
    mask: Vec<u8>,
    mask_len_bits: u8,
    pointer_bits: u32,
    bank: MemBank,
    target: u8,
    action: u8,
    truncate: bool,
}

impl SelectParams {
    /// Select tags whose EPC starts with `mask`
    ///
    /// The mask length defaults to every bit of `mask` and the pointer to
    /// 0x20, the first EPC bit after CRC and PC.
    pub fn new(mask: impl Into<Vec<u8>>) -> Result<Self, ProtocolError> {
        let mask = mask.into();
        if mask.is_empty() {
            return Err(ProtocolError::InvalidParameter("no select mask given".into()));
        }
        let mask_len_bits = u8::try_from(mask.len() * 8).map_err(|_| {
            ProtocolError::InvalidParameter(format!("select mask too long: {} bytes", mask.len()))
        })?;

        Ok(Self {
            mask,
            mask_len_bits,
            pointer_bits: 0x20,
            bank: MemBank::EpcUii,
            target: 0b000,
            action: 0b000,
            truncate: false,
        })
    }

    /// Compare against a different memory bank
    pub fn bank(mut self, bank: MemBank) -> Self {
        self.bank = bank;
        self
    }

    /// Bit address where the comparison starts
    pub fn pointer(mut self, bits: u32) -> Self {
        self.pointer_bits = bits;
        self
    }

    /// Compare only the first `bits` bits of the mask
    pub fn mask_len(mut self, bits: u8) -> Result<Self, ProtocolError> {
        if usize::from(bits) > self.mask.len() * 8 {
            return Err(ProtocolError::InvalidParameter(format!(
                "mask length {} bits exceeds {} mask bytes",
                bits,
                self.mask.len()
            )));
        }
        self.mask_len_bits = bits;
        Ok(self)
    }

    /// Gen2 target and action fields
    pub fn target_action(mut self, target: u8, action: u8) -> Self {
        self.target = target & 0b111;
        self.action = action & 0b111;
        self
    }

    /// Enable truncated replies
    pub fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    /// Encode as the select command payload
    pub fn to_payload(&self) -> Vec<u8> {
        let mask_bytes = usize::from(self.mask_len_bits).div_ceil(8);
        let mut payload = Vec::with_capacity(7 + mask_bytes);
        payload.push((self.target << 5) | (self.action << 3) | (self.bank as u8 & 0b11));
        payload.extend_from_slice(&self.pointer_bits.to_be_bytes());
        payload.push(self.mask_len_bits);
        payload.push(u8::from(self.truncate));
        payload.extend_from_slice(&self.mask[..mask_bytes]);
        payload
    }
}
