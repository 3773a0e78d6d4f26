//! Scripted merge passes.
//!
//! A [`MergePlan`] lists source files, the items currently present and the
//! items that went away, in YAML. Replaying it against a [`MergeConsumer`] runs
//! one pass the way a merge driver would, which makes the writer usable from
//! the command line and from tests.
//!
//! ```yaml
//! files:
//!   - id: strings
//!     path: res/values/strings.xml
//!     kind: multi
//!   - id: icon
//!     path: res/drawable-hdpi/icon.png
//!     kind: single
//!     qualifiers: hdpi
//! items:
//!   - name: app_name
//!     type: string
//!     file: strings
//!     touched: true
//!     value:
//!       element: { name: string, attributes: { name: app_name }, children: [ { text: Demo } ] }
//!   - name: icon
//!     type: drawable
//!     file: icon
//!     touched: true
//! removals:
//!   - item: { name: old_title, type: string, file: strings }
//! ```

use crate::merge::MergeConsumer;
use crate::models::{FileKind, ResourceFile, ResourceItem, ResourceType, ValueNode};
use anyhow::{Context, Result, anyhow, bail};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergePlan {
    #[serde(default)]
    pub files: Vec<PlanFile>,
    #[serde(default)]
    pub items: Vec<PlanItem>,
    #[serde(default)]
    pub removals: Vec<PlanRemoval>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanFile {
    pub id: String,
    /// Relative paths are resolved against the plan's base directory.
    pub path: String,
    pub kind: FileKind,
    #[serde(default)]
    pub qualifiers: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanItem {
    /// Key for `replaced_by`; defaults to the item name.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub file: String,
    #[serde(default)]
    pub touched: bool,
    #[serde(default)]
    pub ignored: bool,
    /// Written as single-key maps (`{ element: {...} }`, `{ text: ... }`) at every level.
    #[serde(default, with = "serde_yaml_ng::with::singleton_map_recursive")]
    pub value: Option<ValueNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRemoval {
    pub item: PlanItem,
    /// Id of the entry in `items` that replaces the removed item.
    #[serde(default)]
    pub replaced_by: Option<String>,
}

impl PlanItem {
    fn key(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }
}

/// Counts of what a replay submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub added: usize,
    pub removed: usize,
    pub ignored: usize,
}

/// A plan with its files resolved to shared [`ResourceFile`]s.
#[derive(Debug, Clone)]
pub struct ResolvedPlan {
    pub items: Vec<ResourceItem>,
    pub removals: Vec<(ResourceItem, Option<usize>)>,
}

impl MergePlan {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml_ng::from_str(yaml).context("Failed to parse merge plan")
    }

    /// Loads a plan file. Its relative paths are relative to the file's directory.
    pub fn load(path: &Utf8Path) -> Result<(Self, Utf8PathBuf)> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read merge plan: {}", path))?;
        let plan = Self::from_yaml(&contents)
            .with_context(|| format!("Invalid merge plan: {}", path))?;
        let base = path
            .parent()
            .map(Utf8Path::to_path_buf)
            .unwrap_or_else(|| Utf8PathBuf::from("."));
        Ok((plan, base))
    }

    /// Builds the items of this plan. Items naming the same file id share one
    /// `ResourceFile`.
    pub fn resolve(&self, base_dir: &Utf8Path) -> Result<ResolvedPlan> {
        let mut files: HashMap<&str, Arc<ResourceFile>> = HashMap::new();
        for file in &self.files {
            let path = absolutize(base_dir, Utf8Path::new(&file.path))?;
            let resource_file = Arc::new(ResourceFile::new(path, file.kind, file.qualifiers.clone()));
            if files.insert(file.id.as_str(), resource_file).is_some() {
                bail!("Duplicate file id in merge plan: {}", file.id);
            }
        }

        let build = |item: &PlanItem| -> Result<ResourceItem> {
            let source = files
                .get(item.file.as_str())
                .ok_or_else(|| anyhow!("Item {} refers to unknown file {}", item.name, item.file))?;
            let mut built = ResourceItem::new(&item.name, item.resource_type, Arc::clone(source))
                .with_touched(item.touched)
                .with_ignored_from_disk_merge(item.ignored);
            if let Some(value) = &item.value {
                built = built.with_value(value.clone());
            }
            Ok(built)
        };

        let items = self.items.iter().map(&build).collect::<Result<Vec<_>>>()?;

        let mut removals = Vec::with_capacity(self.removals.len());
        for removal in &self.removals {
            let replaced_by = match &removal.replaced_by {
                Some(id) => Some(
                    self.items
                        .iter()
                        .position(|i| i.key() == id)
                        .ok_or_else(|| anyhow!("Unknown replacement item: {}", id))?,
                ),
                None => None,
            };
            removals.push((build(&removal.item)?, replaced_by));
        }

        Ok(ResolvedPlan { items, removals })
    }
}

impl ResolvedPlan {
    /// Runs one full pass against `consumer`: removals first, then additions.
    ///
    /// Anything the consumer wants ignored is skipped, including a removal whose
    /// replacement is ignored.
    pub async fn replay<C>(&self, consumer: &mut C) -> Result<ReplaySummary>
    where
        C: MergeConsumer<ResourceItem>,
    {
        let mut summary = ReplaySummary::default();
        consumer.start().context("Failed to start merge pass")?;

        for (removed, replaced_by) in &self.removals {
            let replacement = replaced_by.map(|index| &self.items[index]);
            if consumer.ignore_item_in_merge(removed)
                || replacement.is_some_and(|r| consumer.ignore_item_in_merge(r))
            {
                summary.ignored += 1;
                continue;
            }
            consumer
                .remove_item(removed, replacement)
                .with_context(|| format!("Failed to remove {}", removed.name()))?;
            summary.removed += 1;
        }

        for item in &self.items {
            if consumer.ignore_item_in_merge(item) {
                tracing::debug!("Ignoring {} in merge", item.name());
                summary.ignored += 1;
                continue;
            }
            consumer
                .add_item(item)
                .with_context(|| format!("Failed to add {}", item.name()))?;
            summary.added += 1;
        }

        consumer.end().await.context("Merge pass failed")?;
        tracing::info!(
            "Replayed plan: {} added, {} removed, {} ignored",
            summary.added,
            summary.removed,
            summary.ignored
        );
        Ok(summary)
    }
}

fn absolutize(base_dir: &Utf8Path, path: &Utf8Path) -> Result<Utf8PathBuf> {
    let joined = base_dir.join(path);
    let absolute = std::path::absolute(joined.as_std_path())
        .with_context(|| format!("Cannot make {} absolute", joined))?;
    Utf8PathBuf::try_from(absolute).context("Non UTF-8 path in merge plan")
}
