/*
 * template.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * A template moving through resolve, decode and validate.
 */

use std::path::PathBuf;

use lima_config::{DecodeError, LimaYaml, Validator, decode_document};
use lima_yaml::Document;
use tracing::info;

use crate::absolute::rewrite_relative_locators;
use crate::cancellation::Cancellation;
use crate::error::{Error, LocatorError, Result};
use crate::locator::Locator;
use crate::resolve::Resolver;
use crate::runtime::{Runtime, RuntimeError};

/// Options for resolving a template.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Inline `provision` and `probes` script files after merging bases.
    pub embed_scripts: bool,
    /// Directory that `template://NAME` locators point into.
    pub template_dir: Option<PathBuf>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        ResolveOptions {
            embed_scripts: true,
            template_dir: None,
        }
    }
}

/// A template: its source bytes and where they came from.
///
/// Resolution rewrites `bytes` in place. Decoding stores the typed
/// configuration alongside.
#[derive(Debug, Clone)]
pub struct Template {
    pub locator: Locator,
    pub bytes: Vec<u8>,
    config: Option<LimaYaml>,
    warning: Option<DecodeError>,
}

impl Template {
    pub fn new(bytes: impl Into<Vec<u8>>, locator: Locator) -> Self {
        Template {
            locator,
            bytes: bytes.into(),
            config: None,
            warning: None,
        }
    }

    /// Read a template through `runtime`.
    pub fn read(locator: Locator, runtime: &dyn Runtime, cancel: &Cancellation) -> Result<Self> {
        let bytes = read_bytes(runtime, &locator, cancel)?;
        info!(locator = %locator, size = bytes.len(), "Loaded template");
        Ok(Template::new(bytes, locator))
    }

    /// Parse the current bytes.
    pub fn document(&self) -> Result<Document> {
        let text = std::str::from_utf8(&self.bytes).map_err(|err| {
            DecodeError::new(format!("{}: template is not UTF-8: {err}", self.locator))
        })?;
        Ok(Document::parse_mapping(text)?)
    }

    /// Replace the bytes with `doc`, forgetting any decoded configuration.
    pub fn set_document(&mut self, doc: &Document) {
        self.bytes = doc.to_yaml_string().into_bytes();
        self.config = None;
        self.warning = None;
    }

    /// Merge every base into this template and, if enabled, inline its
    /// script files.
    ///
    /// The result no longer has a `basedOn` field and does not depend on any
    /// other template.
    pub fn embed(
        &mut self,
        options: &ResolveOptions,
        runtime: &dyn Runtime,
        cancel: &Cancellation,
    ) -> Result<()> {
        let resolver = Resolver {
            options,
            runtime,
            cancel,
        };
        let mut doc = resolver.resolve(self.document()?, &self.locator)?;
        if options.embed_scripts {
            resolver.embed_scripts(&mut doc, &self.locator)?;
        }
        self.set_document(&doc);
        Ok(())
    }

    /// Rewrite relative `basedOn` entries and script files as absolute
    /// locators, so the template keeps working from another directory.
    pub fn use_abs_locators(&mut self, options: &ResolveOptions) -> Result<()> {
        let mut doc = self.document()?;
        rewrite_relative_locators(&mut doc, &self.locator, options)?;
        self.set_document(&doc);
        Ok(())
    }

    /// Decode the bytes into the typed configuration.
    ///
    /// Unknown keys only produce a [`Template::warning`].
    pub fn decode(&mut self) -> Result<&LimaYaml> {
        let doc = self.document()?;
        let decoded = decode_document(&doc, &self.locator.to_string())?;
        self.warning = decoded.warning;
        Ok(self.config.insert(decoded.config))
    }

    /// The configuration from the last [`Template::decode`].
    pub fn config(&self) -> Option<&LimaYaml> {
        self.config.as_ref()
    }

    /// Why the last decode was only lenient, if it was.
    pub fn warning(&self) -> Option<&DecodeError> {
        self.warning.as_ref()
    }

    /// Check the configuration, decoding first if needed.
    pub fn validate(&mut self, validator: &Validator, for_current_host: bool) -> Result<()> {
        let config = match self.config.take() {
            Some(config) => config,
            None => self.decode()?.clone(),
        };
        let result = validator.validate(&config, for_current_host);
        self.config = Some(config);
        result.map_err(Error::from)
    }
}

/// Read through `runtime`, mapping failures onto resolution errors.
pub(crate) fn read_bytes(
    runtime: &dyn Runtime,
    locator: &Locator,
    cancel: &Cancellation,
) -> Result<Vec<u8>> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    runtime.read(locator, cancel).map_err(|source| match source {
        RuntimeError::Cancelled => Error::Cancelled,
        source => LocatorError::Read {
            locator: locator.to_string(),
            source,
        }
        .into(),
    })
}
