//! Error types shared by every stage of the item-tree decode.

use thiserror::Error;

use crate::rifx::Tag;

#[derive(Debug, Error)]
pub enum AepError {
    #[error("Missing '{tag}' chunk under {context}")]
    MissingChunk { tag: Tag, context: String },

    #[error("Malformed '{tag}' record: {reason}")]
    MalformedRecord { tag: Tag, reason: String },

    #[error("Value {0} does not fit in 24 bits (max 16777215)")]
    Uint24Overflow(u32),

    #[error("Division by zero while decoding {context}")]
    DivisionByZero { context: String },

    #[error("Unknown item type code {code:#06x} for item {id} ('{name}')")]
    UnknownTypeCode { code: u16, id: u32, name: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AepError {
    pub(crate) fn missing(tag: Tag, context: impl Into<String>) -> Self {
        AepError::MissingChunk {
            tag,
            context: context.into(),
        }
    }

    pub(crate) fn malformed(tag: Tag, reason: impl Into<String>) -> Self {
        AepError::MalformedRecord {
            tag,
            reason: reason.into(),
        }
    }

    /// True for every error caused by bytes that don't match the expected layout,
    /// including 24-bit overflow.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            AepError::MalformedRecord { .. } | AepError::Uint24Overflow(_)
        )
    }
}

pub type AepResult<T> = Result<T, AepError>;
