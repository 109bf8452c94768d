//! Serialize a configuration back to YAML.

use crate::error::MarshalError;
use crate::types::LimaYaml;

const DOCUMENT_START: &str = "---\n";
const DOCUMENT_END: &str = "...\n";

/// Marshal `config` as a YAML document, optionally framed as a stream
/// document with start and end markers.
pub fn marshal(config: &LimaYaml, stream: bool) -> Result<String, MarshalError> {
    let body = serde_yaml::to_string(config)?;
    if stream {
        Ok(format!("{DOCUMENT_START}{body}{DOCUMENT_END}"))
    } else {
        Ok(body)
    }
}
