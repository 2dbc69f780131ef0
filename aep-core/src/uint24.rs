//! 24-bit big-endian unsigned integer.
//!
//! Composition timing fields (playhead, in/out points, duration) are stored
//! as three bytes inside wider 8-byte windows of the `cdta` record.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AepError, AepResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct U24([u8; 3]);

impl U24 {
    pub const MAX: u32 = (1 << 24) - 1;

    pub fn new(value: u32) -> AepResult<Self> {
        let mut v = U24::default();
        v.set(value)?;
        Ok(v)
    }

    pub const fn from_be_bytes(bytes: [u8; 3]) -> Self {
        U24(bytes)
    }

    /// Stores `value`, rejecting anything above [`U24::MAX`] instead of truncating.
    pub fn set(&mut self, value: u32) -> AepResult<()> {
        if value > Self::MAX {
            return Err(AepError::Uint24Overflow(value));
        }
        self.0 = [
            ((value >> 16) & 0xFF) as u8,
            ((value >> 8) & 0xFF) as u8,
            (value & 0xFF) as u8,
        ];
        Ok(())
    }

    pub fn to_u32(self) -> u32 {
        u32::from(self.0[0]) << 16 | u32::from(self.0[1]) << 8 | u32::from(self.0[2])
    }

    pub fn as_bytes(&self) -> &[u8; 3] {
        &self.0
    }
}

impl fmt::Display for U24 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_u32())
    }
}

impl TryFrom<u32> for U24 {
    type Error = AepError;

    fn try_from(value: u32) -> AepResult<Self> {
        U24::new(value)
    }
}

impl From<U24> for u32 {
    fn from(value: U24) -> u32 {
        value.to_u32()
    }
}
