//! Write-back of merge results.
//!
//! A merge driver decides which resource items exist and reports changes to a
//! [`MergeConsumer`]. [`MergedResourceWriter`] is the consumer that keeps an
//! output resource folder in sync with those changes:
//!
//! - touched `Single` items are copied, crunched or commented into
//!   `<type>[-<qualifiers>]/<file>` by concurrent tasks ([`tasks`])
//! - `Multi` items are gathered per qualifier and rewritten into
//!   `values[-<qualifiers>]/values.xml` at the end of the pass ([`aggregate`])
//! - removals delete single outputs right away, and mark values files for
//!   regeneration (or deletion, when nothing is left in them)

pub mod aggregate;
pub mod consumer;
pub mod tasks;
pub mod writer;

pub use aggregate::{FN_VALUES_XML, build_values_document, values_file_path};
pub use consumer::{ConsumerError, MergeConsumer, WriteError};
pub use tasks::{DirCreator, TaskCoordinator};
pub use writer::{InterruptHandle, MergedResourceWriter};
