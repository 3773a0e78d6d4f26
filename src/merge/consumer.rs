use crate::services::{CrunchError, PrintError, ProvenanceError};
use camino::Utf8PathBuf;
use std::future::Future;
use thiserror::Error;

/// Errors raised while writing merge output.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Failed to create directory: {path}")]
    CreateDir {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy {from} to {to}")]
    Copy {
        from: Utf8PathBuf,
        to: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove {path}")]
    Remove {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Resource file has no file name: {0}")]
    InvalidSource(Utf8PathBuf),

    #[error("Value resource {0} has no value to write")]
    MissingValue(String),

    #[error(transparent)]
    Provenance(#[from] ProvenanceError),

    #[error(transparent)]
    Crunch(#[from] CrunchError),

    #[error("Failed to serialize {path}")]
    Serialize {
        path: Utf8PathBuf,
        #[source]
        source: PrintError,
    },

    #[error("Output task did not complete: {0}")]
    Task(String),
}

/// The error every consumer call fails with. Always carries the original cause.
#[derive(Error, Debug)]
#[error("Merge consumer failed")]
pub struct ConsumerError {
    #[from]
    cause: WriteError,
}

impl ConsumerError {
    pub fn cause(&self) -> &WriteError {
        &self.cause
    }

    pub fn into_cause(self) -> WriteError {
        self.cause
    }
}

/// A sink for the results of a merge.
///
/// The driver calls [`start`](Self::start), then any number of
/// [`add_item`](Self::add_item) / [`remove_item`](Self::remove_item), then awaits
/// [`end`](Self::end). Calls are made from one task at a time; any error means
/// the pass failed and the driver should stop.
pub trait MergeConsumer<I> {
    /// Called before the merge starts.
    fn start(&mut self) -> Result<(), ConsumerError>;

    /// Called after the last item. Resolves once every output of the pass is written.
    fn end(&mut self) -> impl Future<Output = Result<(), ConsumerError>> + Send;

    /// Adds an item. The item may already exist; its touched flag tells whether it changed.
    fn add_item(&mut self, item: &I) -> Result<(), ConsumerError>;

    /// Removes an item, optionally naming the item that replaces it.
    ///
    /// This does not perform the replacement: `replaced_by` is also passed to
    /// `add_item`. It is only there so a removal can be skipped when the
    /// replacement will overwrite the same output.
    fn remove_item(&mut self, removed: &I, replaced_by: Option<&I>) -> Result<(), ConsumerError>;

    /// Whether the driver must leave this item out of the merge entirely.
    fn ignore_item_in_merge(&self, item: &I) -> bool;
}
