//! Data models for resource merging.
//!
//! - [`ResourceItem`]: a logical resource handed to the writer by the merge driver
//! - [`ResourceFile`]: the source file an item came from, with its [`FileKind`] and qualifiers
//! - [`ValueNode`]: the document fragment carried by aggregated (`Multi`) items
//! - [`MergeSettings`]: pass configuration loaded from `resmerge.yaml`

pub mod config;
pub mod resource;
pub mod value;

pub use config::{MergeSettings, SettingsOverrides};
pub use resource::{
    FileKind, QUALIFIER_SEPARATOR, ResourceFile, ResourceItem, ResourceType, VALUES_FOLDER,
    qualified_folder_name,
};
pub use value::{Element, ValueNode};
