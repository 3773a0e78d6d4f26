//! Services used by the writer to produce output files.
//!
//! # Components
//!
//! - [`CrunchTool`]: decides which images need lossless recompression and runs the
//!   external crunch tool on them (`<tool> s -i <in> -o <out>`), with interruption
//!   and timeout support.
//! - [`provenance`]: builds the `From: file:///...` markers recorded next to merged
//!   content, safe to embed in XML comments.
//! - [`xml`]: prints value documents, with a plain fallback serializer for when the
//!   pretty printer fails.
//!
//! Nothing here keeps state between calls; the writer owns all pass state.

pub mod crunch;
pub mod provenance;
pub mod xml;

pub use crunch::{CrunchError, CrunchTool};
pub use provenance::{ProvenanceError, create_path_comment};
pub use xml::{PrettyPrinter, PrintError, XmlPrinter, print_with_fallback, to_plain_xml};
