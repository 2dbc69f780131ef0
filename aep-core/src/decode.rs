//! Recursive item-tree decoder.
//!
//! Walks a `Fold` root list, classifies every `Item` list by its `idta`
//! type code and decodes the kind-specific records. Folder children come
//! either directly under the folder or wrapped in `Sfdr` groups; direct
//! children are decoded first, then wrapped ones, each in on-disk order.
//!
//! Decoding is all-or-nothing: the first error aborts the whole descent.

use serde::{Deserialize, Serialize};

use crate::error::{AepError, AepResult};
use crate::item::{Composition, Folder, Footage, Item, ItemKind};
use crate::project::{ItemPath, Registry};
use crate::records::{
    CompositionDescriptor, FootageOptions, FootageSpec, ItemDescriptor, CDTA, IDTA, OPTI, SSPC,
};
use crate::rifx::{List, Tag};

// ============================================================================
// Tags
// ============================================================================

pub const FOLD: Tag = Tag::new(b"Fold");
pub const ITEM: Tag = Tag::new(b"Item");
pub const SFDR: Tag = Tag::new(b"Sfdr");
pub const UTF8: Tag = Tag::new(b"Utf8");
pub const PIN: Tag = Tag::new(b"Pin ");
pub const LAYR: Tag = Tag::new(b"Layr");

/// Composition layers (`Layr` lists) are not decoded; `Composition::layers` stays empty.
pub const LAYER_DECODING_SUPPORTED: bool = false;

/// Raw end-frame values at or above this use the composition duration as the out point.
pub const DEFAULT_END_FRAME_THRESHOLD: u32 = 0x0013_C680;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnknownItemPolicy {
    /// Keep the item as `ItemKind::Unknown` with its raw type code.
    Preserve,
    /// Abort the decode with `AepError::UnknownTypeCode`.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeConfig {
    pub unknown_items: UnknownItemPolicy,
    pub end_frame_threshold: u32,
    /// Integer-divide composition frame values before converting to float,
    /// dropping half frames the way the authoring tool reports them.
    pub truncate_timing: bool,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            unknown_items: UnknownItemPolicy::Preserve,
            end_frame_threshold: DEFAULT_END_FRAME_THRESHOLD,
            truncate_timing: true,
        }
    }
}

// ============================================================================
// Composition timing
// ============================================================================

/// Frame range and duration resolved from a `cdta` record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositionTiming {
    /// Start offset after the framerate-mismatch halving.
    pub start_offset: u32,
    /// True when the end frame overflowed and the comp duration bounds the range.
    pub duration_bound: bool,
    pub start_frame: f64,
    pub end_frame: f64,
    pub duration_seconds: f64,
}

impl CompositionTiming {
    pub fn resolve(cdta: &CompositionDescriptor, config: &DecodeConfig) -> AepResult<Self> {
        let start_offset = effective_start_offset(cdta)?;
        let duration_bound = end_frame_overflows(cdta, config.end_frame_threshold);

        let start = start_offset + cdta.start_frame.to_u32();
        let end = start_offset
            + if duration_bound {
                cdta.comp_duration.to_u32()
            } else {
                cdta.end_frame.to_u32()
            };
        let duration = cdta.comp_duration.to_u32();

        let half = |v: u32| {
            if config.truncate_timing {
                (v / 2) as f64
            } else {
                v as f64 / 2.0
            }
        };

        Ok(Self {
            start_offset,
            duration_bound,
            start_frame: half(start),
            end_frame: half(end),
            duration_seconds: half(duration),
        })
    }
}

/// Start offset is stored doubled when the trailing comparison framerate
/// differs from the composition framerate.
pub fn effective_start_offset(cdta: &CompositionDescriptor) -> AepResult<u32> {
    let mut offset = cdta.start_offset;
    if cdta.comparison_framerate != cdta.framerate {
        offset.set(offset.to_u32() / 2)?;
    }
    Ok(offset.to_u32())
}

/// Detects end frames that spill past the maximum comp length.
pub fn end_frame_overflows(cdta: &CompositionDescriptor, threshold: u32) -> bool {
    let raw = cdta.end_frame.to_u32();
    let [_, t0, t1, t2] = threshold.to_be_bytes();
    let [b0, b1, b2] = *cdta.end_frame.as_bytes();

    raw >= threshold || (b0 > t0 && b1 > t1 && b2 > t2) || cdta.end_frame_spare[0] != 0
}

// ============================================================================
// Decoder
// ============================================================================

enum Class {
    Folder,
    Composition,
    Footage,
    Unknown(u16),
}

struct Header {
    name: String,
    id: u32,
    class: Class,
}

#[derive(Debug, Clone, Default)]
pub struct ItemDecoder {
    config: DecodeConfig,
}

impl ItemDecoder {
    pub fn new(config: DecodeConfig) -> Self {
        Self { config }
    }

    /// Decodes the project root and everything below it.
    ///
    /// `registry` is only touched when the whole tree decodes.
    pub fn decode_root(&self, root: &List, registry: &mut Registry) -> AepResult<Item> {
        if root.identifier != FOLD {
            return Err(AepError::malformed(
                FOLD,
                format!("project root is a '{}' list", root.identifier),
            ));
        }
        let mut path = ItemPath::new();
        let mut decoded = Registry::default();
        let item = self.decode_item(root, &mut path, &mut decoded)?;
        registry.merge(decoded);
        Ok(item)
    }

    /// Decodes one `Fold` or `Item` list located at `path` below the root.
    ///
    /// The item is registered only after its whole subtree decoded.
    fn decode_item(
        &self,
        node: &List,
        path: &mut ItemPath,
        registry: &mut Registry,
    ) -> AepResult<Item> {
        let header = self.classify(node)?;
        let context = format!("item {} ('{}')", header.id, header.name);

        let mut name = header.name;
        let kind = match header.class {
            Class::Folder => ItemKind::Folder(self.decode_folder(node, path, registry)?),
            Class::Footage => {
                let (footage, display_name) = self.decode_footage(node, &context)?;
                if let Some(display_name) = display_name {
                    name = display_name;
                }
                ItemKind::Footage(footage)
            }
            Class::Composition => ItemKind::Composition(self.decode_composition(node, &context)?),
            Class::Unknown(type_code) => ItemKind::Unknown { type_code },
        };

        let item = Item {
            name,
            id: header.id,
            kind,
        };
        tracing::debug!(
            "Decoded {} {} '{}' at {:?}",
            item.type_name(),
            item.id,
            item.name,
            path
        );
        registry.insert(item.id, path.clone());
        Ok(item)
    }

    fn classify(&self, node: &List) -> AepResult<Header> {
        if node.identifier == FOLD {
            return Ok(Header {
                name: "root".to_string(),
                id: 0,
                class: Class::Folder,
            });
        }

        let name = node.require_block(UTF8, "item node")?.text();
        let context = format!("item '{}'", name);
        let desc: ItemDescriptor = node.require_block(IDTA, &context)?.to_record()?;

        let class = match desc.type_code {
            ItemDescriptor::FOLDER => Class::Folder,
            ItemDescriptor::COMPOSITION => Class::Composition,
            ItemDescriptor::FOOTAGE => Class::Footage,
            code => match self.config.unknown_items {
                UnknownItemPolicy::Preserve => {
                    tracing::warn!(
                        "Item {} ('{}') has unknown type code {:#06x}",
                        desc.id,
                        name,
                        code
                    );
                    Class::Unknown(code)
                }
                UnknownItemPolicy::Reject => {
                    return Err(AepError::UnknownTypeCode {
                        code,
                        id: desc.id,
                        name,
                    });
                }
            },
        };

        Ok(Header {
            name,
            id: desc.id,
            class,
        })
    }

    fn decode_folder(
        &self,
        node: &List,
        path: &mut ItemPath,
        registry: &mut Registry,
    ) -> AepResult<Folder> {
        let wrapped = node.sublist_merge(SFDR);
        let children = node
            .sublist_filter(ITEM)
            .into_iter()
            .chain(wrapped.sublist_filter(ITEM));

        let mut contents = Vec::new();
        for (index, child) in children.enumerate() {
            path.push(index);
            let item = self.decode_item(child, path, registry)?;
            path.pop();
            contents.push(item);
        }
        Ok(Folder { contents })
    }

    /// Returns the footage and, for solids and placeholders, its display name.
    fn decode_footage(&self, node: &List, context: &str) -> AepResult<(Footage, Option<String>)> {
        let pin = node.require_list(PIN, context)?;
        let spec: FootageSpec = pin.require_block(SSPC, context)?.to_record()?;
        let duration_seconds = spec.duration_seconds().ok_or_else(|| AepError::DivisionByZero {
            context: format!(
                "'{}' duration of {} ({}/0)",
                SSPC, context, spec.duration_num
            ),
        })?;

        let options = FootageOptions::from_block(pin.require_block(OPTI, context)?)?;
        let display_name = options.display_name()?;

        let footage = Footage {
            width: spec.width,
            height: spec.height,
            framerate: spec.framerate(),
            duration_seconds,
            footage_type: options.footage_type,
        };
        Ok((footage, display_name))
    }

    fn decode_composition(&self, node: &List, context: &str) -> AepResult<Composition> {
        let cdta: CompositionDescriptor = node.require_block(CDTA, context)?.to_record()?;
        let timing = CompositionTiming::resolve(&cdta, &self.config)?;

        if !LAYER_DECODING_SUPPORTED && node.sublist_find(LAYR).is_some() {
            tracing::debug!("Skipping layers of {}", context);
        }

        Ok(Composition {
            width: cdta.width,
            height: cdta.height,
            framerate: cdta.framerate as f64,
            start_frame: timing.start_frame,
            end_frame: timing.end_frame,
            duration_seconds: timing.duration_seconds,
            background_color: cdta.background_color,
            layers: Vec::new(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::records::tests::{idta, opti, sspc, CdtaBuilder};
    use crate::records::FootageType;
    use crate::rifx::Record;
    use crate::uint24::U24;

    pub(crate) fn init_logging() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("aep_core=debug")
            .with_test_writer()
            .try_init();
    }

    pub(crate) fn item_node(name: &str, type_code: u16, id: u32) -> List {
        List::new(ITEM)
            .with_block(UTF8, name.as_bytes().to_vec())
            .with_block(IDTA, idta(type_code, id))
    }

    pub(crate) fn folder(name: &str, id: u32) -> List {
        item_node(name, ItemDescriptor::FOLDER, id)
    }

    pub(crate) fn comp(name: &str, id: u32, cdta: CdtaBuilder) -> List {
        item_node(name, ItemDescriptor::COMPOSITION, id).with_block(CDTA, cdta.build())
    }

    pub(crate) fn solid(name: &str, id: u32, solid_name: &str) -> List {
        let pin = List::new(PIN)
            .with_block(SSPC, sspc(1920, 1080, 1000, 500, 24, 32768))
            .with_block(OPTI, opti(0x09, 26, solid_name.as_bytes(), 300));
        item_node(name, ItemDescriptor::FOOTAGE, id).with_list(pin)
    }

    fn cdta_30fps() -> CdtaBuilder {
        CdtaBuilder {
            start_frame: 0,
            end_frame: 600,
            comp_duration: 600,
            width: 1920,
            height: 1080,
            framerate: 30,
            comparison_framerate: 30,
            background_color: [0x10, 0x20, 0x30],
            ..Default::default()
        }
    }

    fn descriptor(builder: CdtaBuilder) -> CompositionDescriptor {
        let buf = builder.build();
        CompositionDescriptor::decode(&mut &buf[..])
    }

    fn decode(root: &List) -> AepResult<(Item, Registry)> {
        init_logging();
        let mut registry = Registry::default();
        let item = ItemDecoder::default().decode_root(root, &mut registry)?;
        Ok((item, registry))
    }

    #[test]
    fn root_is_synthesized_without_descriptor() {
        let (root, registry) = decode(&List::new(FOLD)).expect("decode");
        assert_eq!(root, Item::root());
        assert_eq!(registry.get(0), Some(&ItemPath::new()));
    }

    #[test]
    fn rejects_non_fold_root() {
        let err = decode(&folder("x", 1)).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn folder_keeps_direct_children_in_order() {
        let root = List::new(FOLD)
            .with_list(folder("A", 1))
            .with_list(folder("B", 2))
            .with_list(folder("C", 3));
        let (root, _) = decode(&root).expect("decode");
        let names: Vec<&str> = root.children().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["A", "B", "C"]);
    }

    #[test]
    fn wrapped_children_follow_direct_children() {
        let root = List::new(FOLD)
            .with_list(List::new(SFDR).with_list(folder("W1", 10)))
            .with_list(folder("D1", 1))
            .with_list(List::new(SFDR).with_list(folder("W2", 11)))
            .with_list(folder("D2", 2));
        let (root, registry) = decode(&root).expect("decode");
        let names: Vec<&str> = root.children().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["D1", "D2", "W1", "W2"]);
        assert_eq!(registry.get(11), Some(&vec![3]));
    }

    #[test]
    fn nested_folders_register_paths() {
        let inner = folder("Inner", 5).with_list(comp("Main", 6, cdta_30fps()));
        let root = List::new(FOLD).with_list(folder("Outer", 4).with_list(inner));
        let (root, registry) = decode(&root).expect("decode");

        assert_eq!(registry.get(6), Some(&vec![0, 0, 0]));
        assert_eq!(registry.get(5), Some(&vec![0, 0]));
        assert_eq!(registry.len(), 4);
        assert_eq!(root.children()[0].children()[0].children()[0].name, "Main");
    }

    #[test]
    fn decodes_solid_footage() {
        let root = List::new(FOLD).with_list(solid("item name", 7, "Dark Gray Solid 1"));
        let (root, _) = decode(&root).expect("decode");
        let item = &root.children()[0];
        assert_eq!(item.name, "Dark Gray Solid 1");
        let footage = item.as_footage().expect("footage");
        assert_eq!((footage.width, footage.height), (1920, 1080));
        assert_eq!(footage.framerate, 24.5);
        assert_eq!(footage.duration_seconds, 2.0);
        assert_eq!(footage.footage_type, FootageType::Solid);
    }

    #[test]
    fn unknown_footage_subtype_keeps_item_name() {
        let pin = List::new(PIN)
            .with_block(SSPC, sspc(10, 10, 1, 1, 30, 0))
            .with_block(OPTI, opti(0x05, 10, b"not a name", 64));
        let node = item_node("clip.mov", ItemDescriptor::FOOTAGE, 8).with_list(pin);
        let (root, _) = decode(&List::new(FOLD).with_list(node)).expect("decode");
        let item = &root.children()[0];
        assert_eq!(item.name, "clip.mov");
        assert_eq!(
            item.as_footage().map(|f| f.footage_type),
            Some(FootageType::Other(0x05))
        );
    }

    #[test]
    fn zero_duration_denominator_fails() {
        let pin = List::new(PIN)
            .with_block(SSPC, sspc(10, 10, 1000, 0, 30, 0))
            .with_block(OPTI, opti(0x02, 10, b"ph", 32));
        let node = item_node("bad", ItemDescriptor::FOOTAGE, 9).with_list(pin);
        let err = decode(&List::new(FOLD).with_list(node)).unwrap_err();
        match err {
            AepError::DivisionByZero { context } => assert!(context.contains("item 9")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn footage_without_pin_is_missing_chunk() {
        let node = item_node("no pin", ItemDescriptor::FOOTAGE, 12);
        let err = decode(&List::new(FOLD).with_list(node)).unwrap_err();
        assert!(matches!(err, AepError::MissingChunk { tag, .. } if tag == PIN));
    }

    #[test]
    fn decodes_composition() {
        let cdta = CdtaBuilder {
            start_frame: 0,
            end_frame: 0x12C0,
            comp_duration: 0x1C20,
            start_offset: 0,
            ..cdta_30fps()
        };
        let root = List::new(FOLD).with_list(comp("Comp 1", 2, cdta));
        let (root, _) = decode(&root).expect("decode");
        let item = &root.children()[0];
        assert_eq!(item.name, "Comp 1");
        let comp = item.as_composition().expect("composition");
        assert_eq!((comp.width, comp.height), (1920, 1080));
        assert_eq!(comp.framerate, 30.0);
        assert_eq!(comp.start_frame, 0.0);
        assert_eq!(comp.end_frame, 2400.0);
        assert_eq!(comp.duration_seconds, 3600.0);
        assert_eq!(comp.background_color, [0x10, 0x20, 0x30]);
        assert!(comp.layers.is_empty());
    }

    #[test]
    fn layer_lists_are_ignored() {
        let node = comp("Layered", 3, cdta_30fps()).with_list(List::new(LAYR));
        let (root, _) = decode(&List::new(FOLD).with_list(node)).expect("decode");
        let comp = root.children()[0].as_composition().expect("composition");
        assert!(comp.layers.is_empty());
    }

    #[test]
    fn mismatched_comparison_framerate_halves_start_offset() {
        let desc = descriptor(CdtaBuilder {
            framerate: 30,
            comparison_framerate: 15,
            start_offset: 200,
            ..cdta_30fps()
        });
        assert_eq!(effective_start_offset(&desc).expect("offset"), 100);

        let timing = CompositionTiming::resolve(&desc, &DecodeConfig::default()).expect("timing");
        assert_eq!(timing.start_offset, 100);
        assert_eq!(timing.start_frame, 50.0);
        assert_eq!(timing.end_frame, 350.0);
    }

    #[test]
    fn matching_comparison_framerate_keeps_start_offset() {
        let desc = descriptor(CdtaBuilder {
            start_offset: 200,
            ..cdta_30fps()
        });
        assert_eq!(effective_start_offset(&desc).expect("offset"), 200);
    }

    #[test]
    fn end_frame_at_threshold_uses_duration() {
        let at = descriptor(CdtaBuilder {
            end_frame: DEFAULT_END_FRAME_THRESHOLD,
            comp_duration: 900,
            ..cdta_30fps()
        });
        let timing = CompositionTiming::resolve(&at, &DecodeConfig::default()).expect("timing");
        assert!(timing.duration_bound);
        assert_eq!(timing.end_frame, 450.0);

        let below = descriptor(CdtaBuilder {
            end_frame: DEFAULT_END_FRAME_THRESHOLD - 1,
            comp_duration: 900,
            ..cdta_30fps()
        });
        let timing = CompositionTiming::resolve(&below, &DecodeConfig::default()).expect("timing");
        assert!(!timing.duration_bound);
        assert_eq!(timing.end_frame, ((DEFAULT_END_FRAME_THRESHOLD - 1) / 2) as f64);
    }

    #[test]
    fn spare_end_frame_byte_uses_duration() {
        let desc = descriptor(CdtaBuilder {
            end_frame: 10,
            end_frame_spare: 0x01,
            comp_duration: 900,
            ..cdta_30fps()
        });
        assert!(end_frame_overflows(&desc, DEFAULT_END_FRAME_THRESHOLD));
    }

    #[test]
    fn custom_threshold_is_honoured() {
        let desc = descriptor(CdtaBuilder {
            end_frame: 1000,
            comp_duration: 600,
            ..cdta_30fps()
        });
        assert!(!end_frame_overflows(&desc, DEFAULT_END_FRAME_THRESHOLD));
        assert!(end_frame_overflows(&desc, 1000));
    }

    #[test]
    fn truncation_can_be_disabled() {
        let desc = descriptor(CdtaBuilder {
            start_frame: 1,
            end_frame: 601,
            comp_duration: 61,
            ..cdta_30fps()
        });
        let truncated = CompositionTiming::resolve(&desc, &DecodeConfig::default()).expect("timing");
        assert_eq!(truncated.start_frame, 0.0);
        assert_eq!(truncated.end_frame, 300.0);
        assert_eq!(truncated.duration_seconds, 30.0);

        let config = DecodeConfig {
            truncate_timing: false,
            ..Default::default()
        };
        let exact = CompositionTiming::resolve(&desc, &config).expect("timing");
        assert_eq!(exact.start_frame, 0.5);
        assert_eq!(exact.end_frame, 300.5);
        assert_eq!(exact.duration_seconds, 30.5);
    }

    #[test]
    fn start_offset_at_u24_max_stays_in_range() {
        let desc = descriptor(CdtaBuilder {
            comparison_framerate: 24,
            start_offset: U24::MAX,
            ..cdta_30fps()
        });
        assert_eq!(effective_start_offset(&desc).expect("offset"), U24::MAX / 2);
    }

    #[test]
    fn unknown_type_code_is_preserved_by_default() {
        let root = List::new(FOLD).with_list(item_node("odd", 0x0B, 21));
        let (root, registry) = decode(&root).expect("decode");
        assert_eq!(root.children()[0].kind, ItemKind::Unknown { type_code: 0x0B });
        assert!(registry.contains(21));
    }

    #[test]
    fn unknown_type_code_can_be_rejected() {
        let decoder = ItemDecoder::new(DecodeConfig {
            unknown_items: UnknownItemPolicy::Reject,
            ..Default::default()
        });
        let root = List::new(FOLD).with_list(item_node("odd", 0x0B, 21));
        let mut registry = Registry::default();
        let err = decoder.decode_root(&root, &mut registry).unwrap_err();
        assert!(matches!(err, AepError::UnknownTypeCode { code: 0x0B, id: 21, .. }));
    }

    #[test]
    fn missing_idta_registers_nothing_for_subtree() {
        let broken = List::new(ITEM)
            .with_block(UTF8, b"Broken".to_vec())
            .with_list(folder("Child", 31));
        let mut registry = Registry::default();
        let mut path = vec![0];
        let err = ItemDecoder::default()
            .decode_item(&broken, &mut path, &mut registry)
            .unwrap_err();
        match err {
            AepError::MissingChunk { tag, context } => {
                assert_eq!(tag, IDTA);
                assert!(context.contains("Broken"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn missing_name_is_missing_chunk() {
        let node = List::new(ITEM).with_block(IDTA, idta(1, 3));
        let err = decode(&List::new(FOLD).with_list(node)).unwrap_err();
        assert!(matches!(err, AepError::MissingChunk { tag, .. } if tag == UTF8));
    }

    #[test]
    fn error_deep_in_tree_aborts_whole_decode() {
        let bad_comp = item_node("No cdta", ItemDescriptor::COMPOSITION, 44);
        let root = List::new(FOLD)
            .with_list(folder("ok", 40))
            .with_list(folder("deep", 41).with_list(bad_comp));
        let mut registry = Registry::default();
        let err = ItemDecoder::default()
            .decode_root(&root, &mut registry)
            .unwrap_err();
        assert!(matches!(err, AepError::MissingChunk { tag, .. } if tag == CDTA));
        assert!(!registry.contains(41));
        assert!(!registry.contains(44));
        assert!(!registry.contains(0));
        assert!(registry.is_empty());
    }

    #[test]
    fn failed_decode_leaves_caller_registry_untouched() {
        let root = List::new(FOLD)
            .with_list(folder("outer", 40).with_list(folder("inner", 50)))
            .with_list(item_node("No cdta", ItemDescriptor::COMPOSITION, 44));
        let mut registry = Registry::default();
        registry.insert(7, vec![3]);
        let err = ItemDecoder::default()
            .decode_root(&root, &mut registry)
            .unwrap_err();
        assert!(matches!(err, AepError::MissingChunk { tag, .. } if tag == CDTA));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(7), Some(&vec![3]));
        assert!(!registry.contains(40));
        assert!(!registry.contains(50));
    }

    #[test]
    fn successful_decode_merges_into_caller_registry() {
        let root = List::new(FOLD).with_list(folder("outer", 40).with_list(folder("inner", 50)));
        let mut registry = Registry::default();
        registry.insert(7, vec![3]);
        ItemDecoder::default()
            .decode_root(&root, &mut registry)
            .expect("decode");
        assert_eq!(registry.get(7), Some(&vec![3]));
        assert_eq!(registry.get(50), Some(&vec![0, 0]));
        assert_eq!(registry.len(), 4);
    }
}
