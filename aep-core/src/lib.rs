//! # AEP Core
//!
//! Decodes the item tree (folders, compositions, footage) of a RIFX
//! compositing project so render tooling can inspect a project without
//! opening the authoring application.
//!
//! ```no_run
//! # fn chunk_tree() -> aep_core::rifx::List { unimplemented!() }
//! use aep_core::Project;
//!
//! let project = Project::from_root(&chunk_tree())?;
//! for (item, comp) in project.compositions() {
//!     println!("{}: {}..{} @ {} fps", item.name, comp.start_frame, comp.end_frame, comp.framerate);
//! }
//! # Ok::<(), aep_core::AepError>(())
//! ```

// ============================================================================
// Container primitives
// ============================================================================
pub mod rifx;
pub mod uint24;
pub mod records;

// ============================================================================
// Item tree
// ============================================================================
pub mod item;
pub mod decode;
pub mod project;

// ============================================================================
// Errors
// ============================================================================
pub mod error;

pub use decode::{DecodeConfig, ItemDecoder, UnknownItemPolicy};
pub use error::{AepError, AepResult};
pub use item::{Composition, Folder, Footage, FootageType, Item, ItemKind, Layer};
pub use project::{project_probe, ItemPath, Project, Registry};
pub use uint24::U24;

// ============================================================================
// Version
// ============================================================================
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
