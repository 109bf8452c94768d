/*
 * embed.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Inline external script files into provision and probe entries.
 */

use lima_config::{DecodeError, ScriptFile, decode_value};
use lima_yaml::{Document, Mapping, MappingEntry, Node};
use tracing::debug;

use crate::absolute::SCRIPT_LISTS;
use crate::error::{Error, Result};
use crate::locator::Locator;
use crate::resolve::Resolver;
use crate::template::read_bytes;

impl Resolver<'_> {
    /// Replace every `file` reference under `provision` and `probes` with the
    /// file's content.
    ///
    /// The content goes into `script` (or `content` for `data` provisioning)
    /// at the position `file` had, and takes over its comments. Entries that
    /// are already inline are left untouched.
    pub fn embed_scripts(&self, doc: &mut Document, locator: &Locator) -> Result<()> {
        let Some(root) = doc.root_mapping_mut() else {
            return Ok(());
        };
        for field in SCRIPT_LISTS {
            let Some(items) = root.get_mut(field).and_then(Node::as_sequence_mut) else {
                continue;
            };
            for (index, item) in items.items.iter_mut().enumerate() {
                let Some(entry) = item.as_mapping_mut() else {
                    continue;
                };
                self.embed_entry(entry, locator)
                    .map_err(|err| within(err, field, index))?;
            }
        }
        Ok(())
    }

    fn embed_entry(&self, entry: &mut Mapping, locator: &Locator) -> Result<()> {
        let Some(position) = entry.position("file") else {
            return Ok(());
        };
        let target = match entry.get("mode").and_then(Node::as_str) {
            Some("data") => "content",
            _ => "script",
        };
        match entry.get(target).map(Node::is_null) {
            Some(true) => {
                entry.remove(target);
            }
            Some(false) => {
                return Err(DecodeError::new(format!(
                    "`{target}` and `file` cannot both be set"
                ))
                .into());
            }
            None => {}
        }
        // `remove` may have shifted the entry.
        let position = entry.position("file").unwrap_or(position);

        let reference: ScriptFile = decode_value(&entry.entries[position].value)
            .map_err(|err: DecodeError| err.within_key("file"))?;
        let script_locator =
            locator.resolve(&reference.url, self.options.template_dir.as_deref())?;
        let bytes = read_bytes(self.runtime, &script_locator, self.cancel)?;
        let script = String::from_utf8(bytes).map_err(|err| {
            DecodeError::new(format!("script {script_locator} is not UTF-8: {err}"))
                .within_key("file")
        })?;
        debug!(script = %script_locator, "Embedding script file");

        let comments = std::mem::take(&mut entry.entries[position].value.comments);
        entry.entries[position] = MappingEntry {
            key: target.to_string(),
            value: Node::string(script).with_comments(comments),
        };
        Ok(())
    }
}

/// Prefix decode errors with the list entry they came from.
fn within(err: Error, field: &str, index: usize) -> Error {
    match err {
        Error::Decode(err) => Error::Decode(err.within_index(index).within_key(field)),
        other => other,
    }
}
