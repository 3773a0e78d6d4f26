use crate::merge::aggregate::{build_values_document, values_file_path};
use crate::merge::consumer::{ConsumerError, MergeConsumer, WriteError};
use crate::merge::tasks::{DirCreator, TaskCoordinator};
use crate::metrics::WriteMetrics;
use crate::models::config::default_max_concurrent_writes;
use crate::models::{FileKind, MergeSettings, ResourceItem};
use crate::services::provenance::xml_comment;
use crate::services::{CrunchTool, PrettyPrinter, XmlPrinter, create_path_comment, print_with_fallback};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;

/// State that lives for exactly one `start`..`end` pass.
#[derive(Debug, Default)]
struct PassState {
    /// `Multi` items by qualifier, in first-seen qualifier order.
    values: IndexMap<String, Vec<ResourceItem>>,

    /// Qualifiers whose values file lost at least one item this pass.
    deleted_qualifiers: BTreeSet<String>,

    tasks: TaskCoordinator,
}

/// What a per-item task needs, shared by all of them.
#[derive(Debug)]
struct OutputContext {
    root: Utf8PathBuf,
    crunch: Option<CrunchTool>,
    dirs: DirCreator,
    metrics: Arc<WriteMetrics>,
}

/// Writes merged resources into an output folder.
///
/// `Single` items are written by concurrent tasks as they are added.
/// `Multi` items are collected per qualifier and written into
/// `values[-<qualifiers>]/values.xml` when the pass ends, once every task has
/// finished. Only touched items cause writes, so re-running an unchanged
/// merge leaves the output as it was.
pub struct MergedResourceWriter {
    ctx: Arc<OutputContext>,
    printer: Box<dyn XmlPrinter>,
    runtime: Handle,
    max_concurrent_writes: usize,
    interrupt: Arc<watch::Sender<bool>>,
    pass: PassState,
}

/// Interrupts the crunch invocations of a writer's current pass from another task.
#[derive(Debug, Clone)]
pub struct InterruptHandle(Arc<watch::Sender<bool>>);

impl InterruptHandle {
    pub fn interrupt(&self) {
        tracing::warn!("Interrupt requested for running merge pass");
        self.0.send_replace(true);
    }
}

impl MergedResourceWriter {
    /// Creates a writer for `root` that spawns its tasks on `runtime`.
    ///
    /// Without a crunch tool every image is copied as is.
    pub fn new(root: impl Into<Utf8PathBuf>, crunch: Option<CrunchTool>, runtime: Handle) -> Self {
        let (interrupt, _) = watch::channel(false);
        Self {
            ctx: Arc::new(OutputContext {
                root: root.into(),
                crunch,
                dirs: DirCreator::new(),
                metrics: Arc::new(WriteMetrics::new()),
            }),
            printer: Box::new(PrettyPrinter::default()),
            runtime,
            max_concurrent_writes: default_max_concurrent_writes(),
            interrupt: Arc::new(interrupt),
            pass: PassState::default(),
        }
    }

    /// Creates a writer configured from `settings`.
    pub fn from_settings(root: impl Into<Utf8PathBuf>, settings: &MergeSettings, runtime: Handle) -> Self {
        let crunch = settings.has_crunch_tool().then(|| {
            let mut tool =
                CrunchTool::new(settings.crunch_tool.trim()).with_no_crunch(settings.no_crunch);
            if !settings.crunch_env.is_empty() {
                tool = tool.with_env(settings.crunch_env.clone());
            }
            if settings.crunch_timeout > 0 {
                tool = tool.with_timeout(Duration::from_secs(settings.crunch_timeout.into()));
            }
            tool
        });
        if crunch.is_none() {
            tracing::info!("No crunch tool configured, images will be copied");
        }
        Self::new(root, crunch, runtime).with_max_concurrent_writes(settings.max_concurrent_writes)
    }

    pub fn crunch_tool(&self) -> Option<&CrunchTool> {
        self.ctx.crunch.as_ref()
    }

    pub fn with_printer(mut self, printer: Box<dyn XmlPrinter>) -> Self {
        self.printer = printer;
        self
    }

    pub fn with_max_concurrent_writes(mut self, max: usize) -> Self {
        self.max_concurrent_writes = max.max(1);
        self
    }

    pub fn root_folder(&self) -> &Utf8Path {
        &self.ctx.root
    }

    pub fn metrics(&self) -> Arc<WriteMetrics> {
        Arc::clone(&self.ctx.metrics)
    }

    /// Interrupts running and queued crunch invocations of the current pass.
    ///
    /// They fail with [`CrunchError::Interrupted`](crate::services::CrunchError::Interrupted),
    /// which fails the pass. The flag is cleared by the next `start`.
    pub fn interrupt(&self) {
        self.interrupt_handle().interrupt();
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle(Arc::clone(&self.interrupt))
    }

    async fn finish_pass(&mut self) -> Result<(), ConsumerError> {
        let mut pass = std::mem::take(&mut self.pass);

        let scheduled = pass.tasks.pending();
        match pass.tasks.join_all().await {
            Ok(completed) => {
                tracing::debug!("All {} output tasks completed", completed);
            }
            Err(mut failures) => {
                for _ in &failures {
                    self.ctx.metrics.record_task_failed();
                }
                tracing::error!("{} of {} output tasks failed", failures.len(), scheduled);
                return Err(failures.swap_remove(0).into());
            }
        }

        let ctx = Arc::clone(&self.ctx);
        post_write_action(&ctx, self.printer.as_ref(), &mut pass).await?;

        self.ctx.metrics.record_pass();
        self.ctx.metrics.log_summary();
        tracing::info!("Merge pass finished for {}", self.ctx.root);
        Ok(())
    }
}

impl MergeConsumer<ResourceItem> for MergedResourceWriter {
    fn start(&mut self) -> Result<(), ConsumerError> {
        tracing::info!("Merge pass started for {}", self.ctx.root);
        self.interrupt.send_replace(false);
        self.pass = PassState {
            tasks: TaskCoordinator::new(self.max_concurrent_writes),
            ..PassState::default()
        };
        Ok(())
    }

    fn end(&mut self) -> impl Future<Output = Result<(), ConsumerError>> + Send {
        self.finish_pass()
    }

    fn add_item(&mut self, item: &ResourceItem) -> Result<(), ConsumerError> {
        match item.kind() {
            FileKind::Multi => {
                // Written at the end of the pass, once membership is known.
                self.pass
                    .values
                    .entry(item.qualifiers().to_string())
                    .or_default()
                    .push(item.clone());
            }
            FileKind::Single if !item.is_touched() => {}
            FileKind::Single => {
                let ctx = Arc::clone(&self.ctx);
                let item = item.clone();
                let interrupt = self.interrupt.subscribe();
                self.pass
                    .tasks
                    .spawn(&self.runtime, write_single_item(ctx, item, interrupt));
            }
        }
        Ok(())
    }

    fn remove_item(
        &mut self,
        removed: &ResourceItem,
        replaced_by: Option<&ResourceItem>,
    ) -> Result<(), ConsumerError> {
        match (removed.kind(), replaced_by.map(ResourceItem::kind)) {
            (FileKind::Multi, _) => {
                self.pass
                    .deleted_qualifiers
                    .insert(removed.qualifiers().to_string());
            }
            // The replacement is written to the same path by its own add_item.
            (FileKind::Single, Some(FileKind::Single)) => {}
            (FileKind::Single, Some(FileKind::Multi) | None) => {
                let out_file = single_output_path(&self.ctx.root, removed)?;
                let ctx = Arc::clone(&self.ctx);
                self.pass.tasks.spawn(&self.runtime, async move {
                    if remove_out_file(&out_file).await? {
                        ctx.metrics.record_output_removed();
                        tracing::debug!("Removed {}", out_file);
                    }
                    Ok(())
                });
            }
        }
        Ok(())
    }

    fn ignore_item_in_merge(&self, item: &ResourceItem) -> bool {
        item.is_ignored_from_disk_merge()
    }
}

/// Regenerates values files whose group changed and deletes those whose group is now empty.
async fn post_write_action(
    ctx: &OutputContext,
    printer: &dyn XmlPrinter,
    pass: &mut PassState,
) -> Result<(), WriteError> {
    for (qualifiers, items) in pass.values.iter_mut() {
        // Remove it either way: whatever is left afterwards has no items at all.
        let mut must_write = pass.deleted_qualifiers.remove(qualifiers);
        if !must_write {
            must_write = items.iter().any(ResourceItem::is_touched);
        }
        if !must_write {
            tracing::debug!("Values for '{}' unchanged, skipping", qualifiers);
            continue;
        }

        let out_file = values_file_path(&ctx.root, qualifiers);
        let document = build_values_document(items)?;
        let (content, fell_back) = print_with_fallback(printer, &document)
            .map_err(|source| WriteError::Serialize {
                path: out_file.clone(),
                source,
            })?;
        if fell_back {
            ctx.metrics.record_printer_fallback();
        }

        if let Some(folder) = out_file.parent() {
            ctx.dirs.ensure(folder).await?;
        }
        tokio::fs::write(&out_file, content)
            .await
            .map_err(|source| WriteError::Write {
                path: out_file.clone(),
                source,
            })?;
        ctx.metrics.record_aggregate_written();
        tracing::debug!("Wrote {} values into {}", items.len(), out_file);
    }

    for qualifiers in std::mem::take(&mut pass.deleted_qualifiers) {
        let out_file = values_file_path(&ctx.root, &qualifiers);
        if remove_out_file(&out_file).await? {
            ctx.metrics.record_aggregate_removed();
            tracing::debug!("Removed empty values file {}", out_file);
        }
    }

    Ok(())
}

fn single_output_path(root: &Utf8Path, item: &ResourceItem) -> Result<Utf8PathBuf, WriteError> {
    let source = item.source().path();
    let filename = source
        .file_name()
        .ok_or_else(|| WriteError::InvalidSource(source.to_path_buf()))?;
    Ok(root.join(item.folder_name()).join(filename))
}

/// Deletes an output file. Returns whether there was one to delete.
async fn remove_out_file(path: &Utf8Path) -> Result<bool, WriteError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(WriteError::Remove {
            path: path.to_path_buf(),
            source,
        }),
    }
}

async fn write_single_item(
    ctx: Arc<OutputContext>,
    item: ResourceItem,
    interrupt: watch::Receiver<bool>,
) -> Result<(), WriteError> {
    let from = item.source().path();
    let out_file = single_output_path(&ctx.root, &item)?;
    let filename = out_file.file_name().unwrap_or_default();

    if let Some(folder) = out_file.parent() {
        ctx.dirs.ensure(folder).await?;
    }

    match &ctx.crunch {
        Some(crunch) if crunch.should_crunch_file(filename) => {
            crunch.crunch(from, &out_file, Some(interrupt)).await?;
            ctx.metrics.record_crunch();
        }
        _ if filename.ends_with(".xml") => {
            copy_xml_with_comment(from, &out_file, &create_path_comment(from)?).await?;
            ctx.metrics.record_xml_copy();
        }
        _ => {
            tokio::fs::copy(from, &out_file)
                .await
                .map_err(|source| WriteError::Copy {
                    from: from.to_path_buf(),
                    to: out_file.clone(),
                    source,
                })?;
            ctx.metrics.record_copy();
        }
    }

    tracing::debug!("Wrote {}", out_file);
    Ok(())
}

/// Copies an XML file and appends `comment` to the end as an XML comment.
async fn copy_xml_with_comment(from: &Utf8Path, to: &Utf8Path, comment: &str) -> Result<(), WriteError> {
    let mut content = tokio::fs::read(from).await.map_err(|source| WriteError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })?;
    content.extend_from_slice(xml_comment(comment).as_bytes());
    tokio::fs::write(to, content)
        .await
        .map_err(|source| WriteError::Write {
            path: to.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResourceFile, ResourceType, ValueNode};
    use crate::services::PrintError;
    use crate::services::xml::MockXmlPrinter;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    fn temp_dir() -> (TempDir, Utf8PathBuf) {
        let temp = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
        (temp, path)
    }

    #[test]
    fn test_single_output_path() {
        let file = ResourceFile::single("/res/drawable-hdpi/icon.png", "hdpi");
        let item = ResourceItem::new("icon", ResourceType::Drawable, file);
        assert_eq!(
            single_output_path(Utf8Path::new("/out"), &item).unwrap(),
            Utf8PathBuf::from("/out/drawable-hdpi/icon.png")
        );
    }

    #[test]
    fn test_single_output_path_requires_file_name() {
        let file = ResourceFile::single("/", "");
        let item = ResourceItem::new("root", ResourceType::Raw, file);
        assert!(matches!(
            single_output_path(Utf8Path::new("/out"), &item),
            Err(WriteError::InvalidSource(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_out_file() {
        let (_temp, dir) = temp_dir();
        let out_file = dir.join("icon.png");
        std::fs::write(&out_file, "PNG").unwrap();

        assert!(remove_out_file(&out_file).await.unwrap());
        assert!(!out_file.exists());
        assert!(!remove_out_file(&out_file).await.unwrap());
    }

    #[tokio::test]
    async fn test_single_removal_runs_as_pass_task() {
        let (_temp, out) = temp_dir();
        let out_file = out.join("drawable/icon.png");
        std::fs::create_dir_all(out_file.parent().unwrap()).unwrap();
        std::fs::write(&out_file, "PNG").unwrap();

        let mut writer = MergedResourceWriter::new(&out, None, Handle::current());
        let item = ResourceItem::new("icon", ResourceType::Drawable, ResourceFile::single("/res/drawable/icon.png", ""));

        writer.start().unwrap();
        writer.remove_item(&item, None).unwrap();
        assert_eq!(writer.pass.tasks.pending(), 1);
        writer.end().await.unwrap();

        assert!(!out_file.exists());
        assert_eq!(writer.metrics().outputs_removed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_copy_xml_with_comment_appends_marker() {
        let (_temp, dir) = temp_dir();
        let from = dir.join("main.xml");
        let to = dir.join("copy.xml");
        std::fs::write(&from, "<LinearLayout/>\n").unwrap();

        copy_xml_with_comment(&from, &to, "From: file:///a&b.xml").await.unwrap();

        let copied = std::fs::read_to_string(&to).unwrap();
        assert_eq!(copied, "<LinearLayout/>\n<!-- From: file:///a&amp;b.xml -->");
    }

    #[tokio::test]
    async fn test_printer_failure_falls_back_to_plain_output() {
        let (_temp, src) = temp_dir();
        let (_out_temp, out) = temp_dir();
        let values = src.join("values.xml");

        let mut printer = MockXmlPrinter::new();
        printer
            .expect_print()
            .times(1)
            .returning(|_| Err(PrintError::NotAnElement));

        let mut writer = MergedResourceWriter::new(&out, None, Handle::current())
            .with_printer(Box::new(printer));
        let file = ResourceFile::multi(values.clone(), "");
        let item = ResourceItem::new("app_name", ResourceType::String, file)
            .with_value(ValueNode::named("string", "app_name", "Demo"))
            .with_touched(true);

        writer.start().unwrap();
        writer.add_item(&item).unwrap();
        writer.end().await.unwrap();

        let content = std::fs::read_to_string(out.join("values/values.xml")).unwrap();
        assert!(content.contains("<string name=\"app_name\">Demo</string>"));
        assert!(!content.contains("\n    <string"));
        assert_eq!(writer.metrics().printer_fallbacks.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_from_settings_configures_crunch_tool() {
        let settings = MergeSettings {
            crunch_tool: "/opt/aapt".to_string(),
            no_crunch: true,
            max_concurrent_writes: 3,
            ..MergeSettings::default()
        };
        let writer = MergedResourceWriter::from_settings("/out", &settings, Handle::current());
        let tool = writer.crunch_tool().unwrap();
        assert_eq!(tool.tool_path(), Utf8Path::new("/opt/aapt"));
        assert!(!tool.should_crunch_file("icon.png"));
        assert!(tool.should_crunch_file("icon.9.png"));
        assert_eq!(writer.max_concurrent_writes, 3);

        let plain = MergedResourceWriter::from_settings("/out", &MergeSettings::default(), Handle::current());
        assert!(plain.crunch_tool().is_none());
    }

    #[tokio::test]
    async fn test_state_is_reset_between_passes() {
        let (_temp, out) = temp_dir();
        let mut writer = MergedResourceWriter::new(&out, None, Handle::current());
        let file = ResourceFile::multi("/res/values/values.xml", "");
        let item = ResourceItem::new("x", ResourceType::String, file)
            .with_value(ValueNode::named("string", "x", "X"));

        writer.start().unwrap();
        writer.add_item(&item).unwrap();
        writer.remove_item(&item, None).unwrap();
        assert_eq!(writer.pass.values.len(), 1);
        assert_eq!(writer.pass.deleted_qualifiers.len(), 1);

        writer.start().unwrap();
        assert!(writer.pass.values.is_empty());
        assert!(writer.pass.deleted_qualifiers.is_empty());
    }
}
