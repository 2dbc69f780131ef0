//! Fixed-offset record layouts read from item chunks.
//!
//! All values are big-endian and packed without padding. Regions marked
//! reserved have no known meaning and are skipped.

use bytes::Buf;
use serde::{Deserialize, Serialize};

use crate::error::{AepError, AepResult};
use crate::rifx::{Block, Record, Tag};
use crate::uint24::U24;

pub const IDTA: Tag = Tag::new(b"idta");
pub const SSPC: Tag = Tag::new(b"sspc");
pub const OPTI: Tag = Tag::new(b"opti");
pub const CDTA: Tag = Tag::new(b"cdta");

fn get_u24<B: Buf>(buf: &mut B) -> U24 {
    let mut raw = [0u8; 3];
    buf.copy_to_slice(&mut raw);
    U24::from_be_bytes(raw)
}

fn get_array3<B: Buf>(buf: &mut B) -> [u8; 3] {
    let mut raw = [0u8; 3];
    buf.copy_to_slice(&mut raw);
    raw
}

// ============================================================================
// Item descriptor (idta)
// ============================================================================

/// Item type code and id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemDescriptor {
    pub type_code: u16,
    pub id: u32,
}

impl ItemDescriptor {
    pub const FOLDER: u16 = 0x01;
    pub const COMPOSITION: u16 = 0x04;
    pub const FOOTAGE: u16 = 0x07;
}

impl Record for ItemDescriptor {
    const TAG: Tag = IDTA;
    const SIZE: usize = 20;

    fn decode<B: Buf>(buf: &mut B) -> Self {
        let type_code = buf.get_u16();
        buf.advance(14);
        let id = buf.get_u32();
        Self { type_code, id }
    }
}

// ============================================================================
// Footage geometry/timing (sspc)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FootageSpec {
    pub width: u32,             // @30
    pub height: u32,            // @34
    pub duration_num: u32,      // @38
    pub duration_den: u32,      // @42
    pub framerate_int: u32,     // @56
    pub framerate_frac: u16,    // @60, 1/65536 units
}

impl FootageSpec {
    pub fn framerate(&self) -> f64 {
        self.framerate_int as f64 + self.framerate_frac as f64 / 65536.0
    }

    /// `None` when the denominator is zero.
    pub fn duration_seconds(&self) -> Option<f64> {
        if self.duration_den == 0 {
            return None;
        }
        Some(self.duration_num as f64 / self.duration_den as f64)
    }
}

impl Record for FootageSpec {
    const TAG: Tag = SSPC;
    const SIZE: usize = 62;

    fn decode<B: Buf>(buf: &mut B) -> Self {
        buf.advance(30);
        let width = buf.get_u32();
        let height = buf.get_u32();
        let duration_num = buf.get_u32();
        let duration_den = buf.get_u32();
        buf.advance(10);
        let framerate_int = buf.get_u32();
        let framerate_frac = buf.get_u16();
        Self {
            width,
            height,
            duration_num,
            duration_den,
            framerate_int,
            framerate_frac,
        }
    }
}

// ============================================================================
// Footage sub-type (opti)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FootageType {
    Solid,
    Placeholder,
    Other(u16),
}

impl FootageType {
    pub fn from_code(code: u16) -> Self {
        match code {
            0x09 => FootageType::Solid,
            0x02 => FootageType::Placeholder,
            other => FootageType::Other(other),
        }
    }
}

/// `opti` is read as raw bytes; only the sub-type code and the name window are understood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FootageOptions {
    pub footage_type: FootageType,
    data: bytes::Bytes,
}

impl FootageOptions {
    const SOLID_NAME: (usize, usize) = (26, 255);
    const PLACEHOLDER_NAME_START: usize = 10;

    pub fn from_block(block: &Block) -> AepResult<Self> {
        let data = block.data.clone();
        if data.len() < 6 {
            return Err(AepError::malformed(
                OPTI,
                format!("expected at least 6 bytes, got {}", data.len()),
            ));
        }
        let code = u16::from_be_bytes([data[4], data[5]]);
        Ok(Self {
            footage_type: FootageType::from_code(code),
            data,
        })
    }

    /// Name stored in the sub-type's window, or `None` for unrecognised sub-types.
    pub fn display_name(&self) -> AepResult<Option<String>> {
        let window = match self.footage_type {
            FootageType::Solid => {
                let (start, end) = Self::SOLID_NAME;
                self.window(start, end.min(self.data.len()))?
            }
            FootageType::Placeholder => {
                self.window(Self::PLACEHOLDER_NAME_START, self.data.len())?
            }
            FootageType::Other(_) => return Ok(None),
        };
        Ok(Some(clean_name(window)))
    }

    fn window(&self, start: usize, end: usize) -> AepResult<&[u8]> {
        self.data.get(start..end).ok_or_else(|| {
            AepError::malformed(
                OPTI,
                format!(
                    "{:?} name starts at byte {} but block has {} bytes",
                    self.footage_type,
                    start,
                    self.data.len()
                ),
            )
        })
    }
}

/// Strips NUL padding from both ends and turns embedded NULs into spaces.
fn clean_name(raw: &[u8]) -> String {
    let start = raw.iter().position(|&b| b != 0).unwrap_or(raw.len());
    let end = raw.iter().rposition(|&b| b != 0).map_or(start, |pos| pos + 1);
    let bytes: Vec<u8> = raw[start..end]
        .iter()
        .map(|&b| if b == 0 { b' ' } else { b })
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

// ============================================================================
// Composition descriptor (cdta)
// ============================================================================

/// Composition settings.
///
/// Timing values sit in 8-byte windows shaped `[u16 prefix][u24 value][3 spare]`.
/// The layout below is the packed on-disk order:
///
/// ```text
///   0  reserved[10]
///  10  window: unknown
///  18  window: playhead
///  26  window: start frame
///  34  window: end frame        (spare bytes @39)
///  42  window: comp duration
///  50  u16 reserved, bg color[3] @52
///  55  reserved[85]
/// 140  width u16, height u16
/// 144  reserved[12]
/// 156  framerate u16
/// 158  reserved[7]
/// 165  start offset u24, reserved u16
/// 170  comparison framerate u16
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositionDescriptor {
    pub playhead: U24,
    pub start_frame: U24,
    pub end_frame: U24,
    pub end_frame_spare: [u8; 3],
    pub comp_duration: U24,
    pub background_color: [u8; 3],
    pub width: u16,
    pub height: u16,
    pub framerate: u16,
    pub start_offset: U24,
    pub comparison_framerate: u16,
}

impl Record for CompositionDescriptor {
    const TAG: Tag = CDTA;
    const SIZE: usize = 172;

    fn decode<B: Buf>(buf: &mut B) -> Self {
        buf.advance(10);
        buf.advance(8);

        buf.advance(2);
        let playhead = get_u24(buf);
        buf.advance(3);

        buf.advance(2);
        let start_frame = get_u24(buf);
        buf.advance(3);

        buf.advance(2);
        let end_frame = get_u24(buf);
        let end_frame_spare = get_array3(buf);

        buf.advance(2);
        let comp_duration = get_u24(buf);
        buf.advance(3);

        buf.advance(2);
        let background_color = get_array3(buf);
        buf.advance(85);

        let width = buf.get_u16();
        let height = buf.get_u16();
        buf.advance(12);

        let framerate = buf.get_u16();
        buf.advance(7);

        let start_offset = get_u24(buf);
        buf.advance(2);
        let comparison_framerate = buf.get_u16();

        Self {
            playhead,
            start_frame,
            end_frame,
            end_frame_spare,
            comp_duration,
            background_color,
            width,
            height,
            framerate,
            start_offset,
            comparison_framerate,
        }
    }
}
