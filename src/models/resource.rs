use crate::models::ValueNode;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Separator between a folder type and its qualifiers (`values-fr`, `drawable-hdpi`).
pub const QUALIFIER_SEPARATOR: char = '-';

/// Folder holding aggregated value files.
pub const VALUES_FOLDER: &str = "values";

/// Resource types, in their canonical ordering.
///
/// The declaration order is significant: aggregate files sort their items by
/// type first, so reordering variants changes the generated output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceType {
    Anim,
    Animator,
    Array,
    Attr,
    Bool,
    Color,
    DeclareStyleable,
    Dimen,
    Drawable,
    Fraction,
    Id,
    Integer,
    Interpolator,
    Layout,
    Menu,
    Mipmap,
    Plurals,
    Raw,
    String,
    Style,
    Styleable,
    Xml,
    Public,
}

impl ResourceType {
    pub const ALL: [ResourceType; 23] = [
        ResourceType::Anim,
        ResourceType::Animator,
        ResourceType::Array,
        ResourceType::Attr,
        ResourceType::Bool,
        ResourceType::Color,
        ResourceType::DeclareStyleable,
        ResourceType::Dimen,
        ResourceType::Drawable,
        ResourceType::Fraction,
        ResourceType::Id,
        ResourceType::Integer,
        ResourceType::Interpolator,
        ResourceType::Layout,
        ResourceType::Menu,
        ResourceType::Mipmap,
        ResourceType::Plurals,
        ResourceType::Raw,
        ResourceType::String,
        ResourceType::Style,
        ResourceType::Styleable,
        ResourceType::Xml,
        ResourceType::Public,
    ];

    /// The name used both in value files and as the output folder of single-file resources.
    pub fn name(self) -> &'static str {
        match self {
            ResourceType::Anim => "anim",
            ResourceType::Animator => "animator",
            ResourceType::Array => "array",
            ResourceType::Attr => "attr",
            ResourceType::Bool => "bool",
            ResourceType::Color => "color",
            ResourceType::DeclareStyleable => "declare-styleable",
            ResourceType::Dimen => "dimen",
            ResourceType::Drawable => "drawable",
            ResourceType::Fraction => "fraction",
            ResourceType::Id => "id",
            ResourceType::Integer => "integer",
            ResourceType::Interpolator => "interpolator",
            ResourceType::Layout => "layout",
            ResourceType::Menu => "menu",
            ResourceType::Mipmap => "mipmap",
            ResourceType::Plurals => "plurals",
            ResourceType::Raw => "raw",
            ResourceType::String => "string",
            ResourceType::Style => "style",
            ResourceType::Styleable => "styleable",
            ResourceType::Xml => "xml",
            ResourceType::Public => "public",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unknown resource type: {0}")]
pub struct UnknownResourceType(pub String);

impl FromStr for ResourceType {
    type Err = UnknownResourceType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceType::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| UnknownResourceType(s.to_string()))
    }
}

/// How items of a source file map onto output files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// One item, one output file.
    Single,
    /// Many items aggregated into one values file per qualifier.
    Multi,
}

/// The source file one or more items came from.
///
/// Items share their source through an `Arc`; aggregation treats two items as
/// coming from the same file only when they point at the same allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceFile {
    path: Utf8PathBuf,
    kind: FileKind,
    qualifiers: String,
}

impl ResourceFile {
    pub fn new(path: impl Into<Utf8PathBuf>, kind: FileKind, qualifiers: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            qualifiers: qualifiers.into(),
        }
    }

    pub fn single(path: impl Into<Utf8PathBuf>, qualifiers: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(path, FileKind::Single, qualifiers))
    }

    pub fn multi(path: impl Into<Utf8PathBuf>, qualifiers: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(path, FileKind::Multi, qualifiers))
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn qualifiers(&self) -> &str {
        &self.qualifiers
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name()
    }
}

/// Appends `-<qualifiers>` to a folder name when qualifiers are present.
pub fn qualified_folder_name(base: &str, qualifiers: &str) -> String {
    if qualifiers.is_empty() {
        base.to_string()
    } else {
        format!("{}{}{}", base, QUALIFIER_SEPARATOR, qualifiers)
    }
}

/// A logical resource handed to the writer by the merge driver.
#[derive(Debug, Clone)]
pub struct ResourceItem {
    name: String,
    resource_type: ResourceType,
    source: Arc<ResourceFile>,
    value: Option<ValueNode>,
    touched: bool,
    ignored_from_disk_merge: bool,
}

impl ResourceItem {
    pub fn new(name: impl Into<String>, resource_type: ResourceType, source: Arc<ResourceFile>) -> Self {
        Self {
            name: name.into(),
            resource_type,
            source,
            value: None,
            touched: false,
            ignored_from_disk_merge: false,
        }
    }

    pub fn with_value(mut self, value: ValueNode) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_touched(mut self, touched: bool) -> Self {
        self.touched = touched;
        self
    }

    pub fn with_ignored_from_disk_merge(mut self, ignored: bool) -> Self {
        self.ignored_from_disk_merge = ignored;
        self
    }

    pub fn set_touched(&mut self, touched: bool) {
        self.touched = touched;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn source(&self) -> &Arc<ResourceFile> {
        &self.source
    }

    pub fn kind(&self) -> FileKind {
        self.source.kind()
    }

    pub fn qualifiers(&self) -> &str {
        self.source.qualifiers()
    }

    pub fn value(&self) -> Option<&ValueNode> {
        self.value.as_ref()
    }

    pub fn is_touched(&self) -> bool {
        self.touched
    }

    pub fn is_ignored_from_disk_merge(&self) -> bool {
        self.ignored_from_disk_merge
    }

    /// Output folder for this item: `<type>[-<qualifiers>]` or `values[-<qualifiers>]`.
    pub fn folder_name(&self) -> String {
        match self.kind() {
            FileKind::Single => qualified_folder_name(self.resource_type.name(), self.qualifiers()),
            FileKind::Multi => qualified_folder_name(VALUES_FOLDER, self.qualifiers()),
        }
    }

    /// Ordering used when aggregating items into a values file.
    pub fn merge_order(&self, other: &Self) -> Ordering {
        self.resource_type
            .cmp(&other.resource_type)
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.source.path().cmp(other.source.path()))
    }
}
