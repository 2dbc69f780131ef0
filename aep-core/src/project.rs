//! Decoded project: the owned item tree plus an id index into it.

use std::collections::HashMap;

use crate::decode::{DecodeConfig, ItemDecoder};
use crate::error::AepResult;
use crate::item::{Composition, Footage, Item};
use crate::rifx::List;

/// Child indices leading from the root to an item. The root's path is empty.
pub type ItemPath = Vec<usize>;

// ============================================================================
// Registry
// ============================================================================

/// Flat id -> tree position index filled in while decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    entries: HashMap<u32, ItemPath>,
}

impl Registry {
    /// Registers `id`; a colliding id replaces the earlier entry.
    pub fn insert(&mut self, id: u32, path: ItemPath) -> Option<ItemPath> {
        let previous = self.entries.insert(id, path);
        if let Some(old) = &previous {
            tracing::warn!("Item id {} registered twice, replacing entry at {:?}", id, old);
        }
        previous
    }

    /// Moves every entry of `other` into `self`, with the same collision rule as `insert`.
    pub fn merge(&mut self, other: Registry) {
        for (id, path) in other.entries {
            self.insert(id, path);
        }
    }

    pub fn get(&self, id: u32) -> Option<&ItemPath> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.keys().copied()
    }
}

// ============================================================================
// Project
// ============================================================================

#[derive(Debug, Clone)]
pub struct Project {
    root: Item,
    registry: Registry,
}

impl Project {
    pub fn from_root(root: &List) -> AepResult<Self> {
        Self::from_root_with(root, DecodeConfig::default())
    }

    pub fn from_root_with(root: &List, config: DecodeConfig) -> AepResult<Self> {
        let mut registry = Registry::default();
        let root = ItemDecoder::new(config).decode_root(root, &mut registry)?;
        tracing::debug!("Decoded project with {} items", registry.len());
        Ok(Self { root, registry })
    }

    pub fn root(&self) -> &Item {
        &self.root
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn item(&self, id: u32) -> Option<&Item> {
        self.registry.get(id).and_then(|path| self.resolve(path))
    }

    pub fn contains(&self, id: u32) -> bool {
        self.registry.contains(id)
    }

    /// Number of distinct registered ids.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Registered ids in ascending order.
    pub fn ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.registry.ids().collect();
        ids.sort_unstable();
        ids
    }

    /// Depth-first, pre-order walk starting at the root.
    pub fn iter(&self) -> Items<'_> {
        Items {
            stack: vec![&self.root],
        }
    }

    pub fn compositions(&self) -> impl Iterator<Item = (&Item, &Composition)> {
        self.iter()
            .filter_map(|item| item.as_composition().map(|comp| (item, comp)))
    }

    pub fn footage(&self) -> impl Iterator<Item = (&Item, &Footage)> {
        self.iter()
            .filter_map(|item| item.as_footage().map(|footage| (item, footage)))
    }

    pub fn folders(&self) -> impl Iterator<Item = &Item> {
        self.iter().filter(|item| item.is_folder())
    }

    /// First item named `name` in pre-order.
    pub fn find_by_name(&self, name: &str) -> Option<&Item> {
        self.iter().find(|item| item.name == name)
    }

    /// Names from the root's first-level child down to the item itself.
    pub fn path_of(&self, id: u32) -> Option<Vec<&str>> {
        let path = self.registry.get(id)?;
        let mut names = Vec::with_capacity(path.len());
        let mut current = &self.root;
        for &index in path {
            current = current.children().get(index)?;
            names.push(current.name.as_str());
        }
        Some(names)
    }

    fn resolve(&self, path: &[usize]) -> Option<&Item> {
        path.iter()
            .try_fold(&self.root, |item, &index| item.children().get(index))
    }
}

impl<'a> IntoIterator for &'a Project {
    type Item = &'a Item;
    type IntoIter = Items<'a>;

    fn into_iter(self) -> Items<'a> {
        self.iter()
    }
}

pub struct Items<'a> {
    stack: Vec<&'a Item>,
}

impl<'a> Iterator for Items<'a> {
    type Item = &'a Item;

    fn next(&mut self) -> Option<&'a Item> {
        let item = self.stack.pop()?;
        self.stack.extend(item.children().iter().rev());
        Some(item)
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Decodes `root` and dumps the item tree as JSON.
pub fn project_probe(root: &List) -> AepResult<serde_json::Value> {
    let project = Project::from_root(root)?;
    Ok(serde_json::json!({
        "items": project.len(),
        "compositions": project.compositions().count(),
        "root": serde_json::to_value(project.root())?,
    }))
}
