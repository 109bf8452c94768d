/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Resolve, merge and embed Lima instance templates.
 */

//! Lima instance templates.
//!
//! A template may be based on other templates through `basedOn`. This crate
//! reads the whole graph, merges it into one comment-preserving document,
//! inlines referenced script files, and hands the result to `lima-config` for
//! decoding and validation.
//!
//! ```rust,no_run
//! use lima_template::{Cancellation, Locator, NativeRuntime, ResolveOptions, Template};
//!
//! # fn main() -> lima_template::Result<()> {
//! let locator = Locator::parse("docker.yaml", None)?;
//! let mut tmpl = Template::read(locator, &NativeRuntime, &Cancellation::new())?;
//! tmpl.embed(&ResolveOptions::default(), &NativeRuntime, &Cancellation::new())?;
//! tmpl.validate(&lima_config::Validator::new(), true)?;
//! # Ok(())
//! # }
//! ```
//!
//! Rules that depend on the host are only checked when validating for the
//! current host. A template that passes portable validation can still be
//! rejected on a machine that cannot run it.

mod absolute;
pub mod cancellation;
mod embed;
pub mod error;
pub mod locator;
pub mod merge;
mod resolve;
pub mod runtime;
mod template;

pub use cancellation::Cancellation;
pub use error::{Error, LocatorError, Result};
pub use locator::Locator;
pub use merge::{WILDCARD, merge, merge_documents};
pub use resolve::BASED_ON;
pub use runtime::{NativeRuntime, Runtime, RuntimeError, RuntimeResult};
pub use template::{ResolveOptions, Template};
