//! Decode document trees into [`LimaYaml`].

use crate::de::NodeDeserializer;
use crate::error::DecodeError;
use crate::types::LimaYaml;
use lima_yaml::{Document, Node};
use serde::Deserialize;

/// A decoded configuration and the strict-mode complaint, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub config: LimaYaml,
    /// Set when the document only decodes leniently, e.g. because it carries
    /// keys this model does not know.
    pub warning: Option<DecodeError>,
}

/// Decode `node`, tolerating unknown keys.
pub fn decode(node: &Node) -> Result<LimaYaml, DecodeError> {
    LimaYaml::deserialize(NodeDeserializer::new(node, false))
}

/// Decode `node`, rejecting unknown keys.
pub fn decode_strict(node: &Node) -> Result<LimaYaml, DecodeError> {
    LimaYaml::deserialize(NodeDeserializer::new(node, true))
}

/// Leniently decode a single field value, such as one `basedOn` entry list.
pub fn decode_value<'de, T: Deserialize<'de>>(node: &'de Node) -> Result<T, DecodeError> {
    T::deserialize(NodeDeserializer::new(node, false))
}

/// Decode a parsed template.
///
/// The lenient result is always returned when it succeeds. A strict-mode
/// failure is logged and reported through [`Decoded::warning`].
pub fn decode_document(doc: &Document, locator: &str) -> Result<Decoded, DecodeError> {
    let config = decode(&doc.root)?;
    let warning = match decode_strict(&doc.root) {
        Ok(_) => None,
        Err(err) => {
            tracing::warn!(
                locator,
                error = %err,
                "Non-strict YAML is deprecated and will be unsupported in a future version"
            );
            Some(err)
        }
    };
    Ok(Decoded { config, warning })
}

/// Parse and decode template bytes.
pub fn load(bytes: &[u8], locator: &str) -> Result<Decoded, DecodeError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|err| DecodeError::new(format!("{locator}: template is not UTF-8: {err}")))?;
    let doc = Document::parse_mapping(text)?;
    decode_document(&doc, locator)
}
