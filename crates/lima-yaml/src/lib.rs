//! # lima-yaml
//!
//! Comment-preserving YAML documents for Lima instance templates.
//!
//! This crate provides [`Document`], a plain tree of [`Node`]s in which every
//! mapping entry and sequence item owns its own head comment (the block of
//! `#` lines directly above it) and line comment (the trailing `# ...` on its
//! line). Templates are merged and rewritten as trees, then emitted back as
//! YAML that still reads like the hand-written input.
//!
//! ## Design
//!
//! Parsing is driven by the marked event stream of `yaml-rust2`. The events
//! give structure and positions; comments, which the event stream drops, are
//! recovered from the source text and attached to the node they annotate.
//! Nothing in this crate knows about Lima fields: merge policies live in
//! `lima-template`, typed decoding in `lima-config`.
//!
//! ## Example
//!
//! ```rust
//! use lima_yaml::Document;
//!
//! let doc = Document::parse("# Backend\nvmType: vz # fast\n").unwrap();
//! let vm_type = doc.root.as_mapping().unwrap().get("vmType").unwrap();
//! assert_eq!(vm_type.as_str(), Some("vz"));
//! assert_eq!(vm_type.comments.line.as_deref(), Some("# fast"));
//! assert_eq!(doc.to_yaml_string(), "# Backend\nvmType: vz  # fast\n");
//! ```

mod comments;
mod emitter;
mod error;
mod node;
mod parser;
mod scalar;

pub use error::{Error, Result};
pub use node::{
    CollectionStyle, Comments, Document, Mapping, MappingEntry, Node, NodeKind, Scalar,
    ScalarStyle, Sequence,
};
pub use scalar::{ResolvedScalar, needs_quotes, resolve_plain};
