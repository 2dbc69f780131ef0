//! Project item model: folders, compositions and footage.

use serde::{Deserialize, Serialize};

pub use crate::records::FootageType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub id: u32,
    pub kind: ItemKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ItemKind {
    Folder(Folder),
    Composition(Composition),
    Footage(Footage),
    /// Item whose `idta` type code isn't one of the known kinds.
    Unknown { type_code: u16 },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    /// Children in on-disk order.
    pub contents: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footage {
    pub width: u32,
    pub height: u32,
    pub framerate: f64,
    pub duration_seconds: f64,
    pub footage_type: FootageType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    pub width: u16,
    pub height: u16,
    pub framerate: f64,
    pub start_frame: f64,
    pub end_frame: f64,
    pub duration_seconds: f64,
    pub background_color: [u8; 3],
    /// Always empty: layer records are not decoded.
    pub layers: Vec<Layer>,
}

/// Composition layer. Reserved; the decoder never produces layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    /// 1-based position in the composition's layer stack.
    pub index: u32,
    pub name: String,
}

impl Item {
    pub fn root() -> Self {
        Item {
            name: "root".to_string(),
            id: 0,
            kind: ItemKind::Folder(Folder::default()),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            ItemKind::Folder(_) => "Folder",
            ItemKind::Composition(_) => "Composition",
            ItemKind::Footage(_) => "Footage",
            ItemKind::Unknown { .. } => "Unknown",
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self.kind, ItemKind::Folder(_))
    }

    pub fn as_folder(&self) -> Option<&Folder> {
        match &self.kind {
            ItemKind::Folder(folder) => Some(folder),
            _ => None,
        }
    }

    pub fn as_composition(&self) -> Option<&Composition> {
        match &self.kind {
            ItemKind::Composition(comp) => Some(comp),
            _ => None,
        }
    }

    pub fn as_footage(&self) -> Option<&Footage> {
        match &self.kind {
            ItemKind::Footage(footage) => Some(footage),
            _ => None,
        }
    }

    /// Folder contents; empty for every other kind.
    pub fn children(&self) -> &[Item] {
        self.as_folder()
            .map(|folder| folder.contents.as_slice())
            .unwrap_or(&[])
    }
}
