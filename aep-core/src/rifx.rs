//! In-memory RIFX chunk tree.
//!
//! The container reader hands the decoder a tree of tagged lists and data
//! blocks. This module models that tree and the navigation primitives the
//! item decoder relies on.
//!
//! ```text
//! RIFX 'Egg!'
//! └── LIST 'Fold'            project root
//!     ├── LIST 'Item'
//!     │   ├── Utf8           display name
//!     │   ├── idta           type code + id
//!     │   ├── cdta           (compositions)
//!     │   └── LIST 'Pin '    (footage) sspc, opti
//!     └── LIST 'Sfdr'        wrapped folder children
//!         └── LIST 'Item'
//! ```

use std::fmt;

use bytes::Bytes;

use crate::error::{AepError, AepResult};

// ============================================================================
// Tags
// ============================================================================

/// Four-character chunk identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag([u8; 4]);

impl Tag {
    pub const fn new(bytes: &[u8; 4]) -> Self {
        Tag(*bytes)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self)
    }
}

// ============================================================================
// Fixed-layout records
// ============================================================================

/// A fixed-offset, big-endian binary layout stored in a single block.
pub trait Record: Sized {
    const TAG: Tag;
    /// Minimum number of bytes the layout occupies.
    const SIZE: usize;

    /// Decodes from a buffer holding at least `SIZE` bytes.
    fn decode<B: bytes::Buf>(buf: &mut B) -> Self;
}

// ============================================================================
// Tree nodes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub tag: Tag,
    pub data: Bytes,
}

impl Block {
    pub fn new(tag: Tag, data: impl Into<Bytes>) -> Self {
        Self {
            tag,
            data: data.into(),
        }
    }

    /// Text payload with NUL padding removed. Invalid UTF-8 is replaced, not rejected.
    pub fn text(&self) -> String {
        let end = self
            .data
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |pos| pos + 1);
        String::from_utf8_lossy(&self.data[..end]).into_owned()
    }

    pub fn to_record<R: Record>(&self) -> AepResult<R> {
        if self.tag != R::TAG {
            return Err(AepError::malformed(
                R::TAG,
                format!("block is tagged '{}'", self.tag),
            ));
        }
        if self.data.len() < R::SIZE {
            return Err(AepError::malformed(
                R::TAG,
                format!("expected at least {} bytes, got {}", R::SIZE, self.data.len()),
            ));
        }
        let mut buf = &self.data[..R::SIZE];
        Ok(R::decode(&mut buf))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Block(Block),
    List(List),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct List {
    pub identifier: Tag,
    pub children: Vec<Node>,
}

impl List {
    pub fn new(identifier: Tag) -> Self {
        Self {
            identifier,
            children: Vec::new(),
        }
    }

    pub fn with_block(mut self, tag: Tag, data: impl Into<Bytes>) -> Self {
        self.children.push(Node::Block(Block::new(tag, data)));
        self
    }

    pub fn with_list(mut self, list: List) -> Self {
        self.children.push(Node::List(list));
        self
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.children.iter().filter_map(|node| match node {
            Node::Block(block) => Some(block),
            Node::List(_) => None,
        })
    }

    pub fn lists(&self) -> impl Iterator<Item = &List> {
        self.children.iter().filter_map(|node| match node {
            Node::List(list) => Some(list),
            Node::Block(_) => None,
        })
    }

    /// First direct child block tagged `tag`.
    pub fn find_by_type(&self, tag: Tag) -> Option<&Block> {
        self.blocks().find(|block| block.tag == tag)
    }

    /// First direct child list with the given identifier.
    pub fn sublist_find(&self, identifier: Tag) -> Option<&List> {
        self.lists().find(|list| list.identifier == identifier)
    }

    /// All direct child lists with the given identifier, in on-disk order.
    pub fn sublist_filter(&self, identifier: Tag) -> Vec<&List> {
        self.lists()
            .filter(|list| list.identifier == identifier)
            .collect()
    }

    /// Concatenates the children of every direct child list tagged
    /// `identifier` into a single list, preserving order.
    pub fn sublist_merge(&self, identifier: Tag) -> List {
        let mut merged = List::new(identifier);
        for list in self.lists().filter(|list| list.identifier == identifier) {
            merged.children.extend(list.children.iter().cloned());
        }
        merged
    }

    pub fn require_block(&self, tag: Tag, context: &str) -> AepResult<&Block> {
        self.find_by_type(tag)
            .ok_or_else(|| AepError::missing(tag, context))
    }

    pub fn require_list(&self, identifier: Tag, context: &str) -> AepResult<&List> {
        self.sublist_find(identifier)
            .ok_or_else(|| AepError::missing(identifier, context))
    }
}
