//! Schema description store.
//!
//! Descriptions live in a directory of JSON files, one per docType. Each file
//! maps field paths to field-type tags; nested objects describe nested
//! documents. The loader flattens paths with `.` separators and reports a
//! content-hash version so stored shards can be told apart from stale ones
//! after a migration.

use crate::error::{Result, SkilletError};
use crate::types::CONTENT_DOC_TYPE;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Built-in description of the derived content docType. It is not an entry
/// of the description store; its lifecycle belongs to the files docType.
const CONTENT_DESCRIPTION: &str = r#"{"content": "textField"}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Keyword,
    Number,
    Date,
    Store,
    Timestamp,
}

impl FieldKind {
    fn parse(tag: &str) -> Result<Self> {
        match tag {
            "textField" => Ok(FieldKind::Text),
            "keywordField" => Ok(FieldKind::Keyword),
            "numberField" => Ok(FieldKind::Number),
            "dateField" => Ok(FieldKind::Date),
            "storeField" => Ok(FieldKind::Store),
            "timestampField" => Ok(FieldKind::Timestamp),
            other => Err(SkilletError::Schema(format!(
                "unknown field mapping tag '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MappedField {
    /// Flattened field path, nested levels joined with `.`.
    pub path: String,
    pub kind: FieldKind,
}

#[derive(Debug, Clone)]
pub struct MappingDescription {
    pub fields: Vec<MappedField>,
}

impl MappingDescription {
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            SkilletError::Schema("description file must be a JSON object".to_string())
        })?;

        let mut fields = Vec::new();
        collect_fields(object, "", &mut fields)?;
        Ok(MappingDescription { fields })
    }
}

fn collect_fields(
    object: &serde_json::Map<String, serde_json::Value>,
    prefix: &str,
    out: &mut Vec<MappedField>,
) -> Result<()> {
    for (name, value) in object {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };
        match value {
            serde_json::Value::String(tag) => {
                out.push(MappedField {
                    path,
                    kind: FieldKind::parse(tag)?,
                });
            }
            serde_json::Value::Object(nested) => {
                collect_fields(nested, &path, out)?;
            }
            _ => {
                return Err(SkilletError::Schema(format!(
                    "field '{}' must be a tag string or a nested object",
                    path
                )));
            }
        }
    }
    Ok(())
}

/// On-disk description store: `<dir>/<docType>.json` per docType.
#[derive(Debug, Clone)]
pub struct MappingStore {
    dir: PathBuf,
}

impl MappingStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        MappingStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Registered docTypes, the derived content docType excluded.
    pub fn doc_types(&self) -> Result<Vec<String>> {
        let mut doc_types = Vec::new();
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            SkilletError::Schema(format!(
                "cannot read description store {}: {}",
                self.dir.display(),
                e
            ))
        })?;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(doc_type) = name.strip_suffix(".json") {
                if doc_type != CONTENT_DOC_TYPE {
                    doc_types.push(doc_type.to_string());
                }
            }
        }
        doc_types.sort();
        Ok(doc_types)
    }

    pub fn load(&self, doc_type: &str) -> Result<MappingDescription> {
        let value: serde_json::Value = serde_json::from_slice(&self.raw(doc_type)?)?;
        MappingDescription::from_json(&value)
    }

    /// Schema version of a docType: hex digest of the description content.
    pub fn version(&self, doc_type: &str) -> Result<String> {
        let digest = Sha256::digest(&self.raw(doc_type)?);
        let mut version = String::with_capacity(16);
        for byte in digest.iter().take(8) {
            version.push_str(&format!("{:02x}", byte));
        }
        Ok(version)
    }

    /// Replace a docType's description file. The new content is validated
    /// first and lands via temp file + rename.
    pub fn install(&self, doc_type: &str, content: &[u8]) -> Result<()> {
        if doc_type == CONTENT_DOC_TYPE {
            return Err(SkilletError::Schema(
                "the content docType is derived and cannot be described directly".to_string(),
            ));
        }
        let value: serde_json::Value = serde_json::from_slice(content)?;
        MappingDescription::from_json(&value)?;

        std::fs::create_dir_all(&self.dir)?;
        let tmp = self.dir.join(format!(".{}.json.tmp", doc_type));
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, self.description_path(doc_type))?;
        Ok(())
    }

    fn description_path(&self, doc_type: &str) -> PathBuf {
        self.dir.join(format!("{}.json", doc_type))
    }

    fn raw(&self, doc_type: &str) -> Result<Vec<u8>> {
        if doc_type == CONTENT_DOC_TYPE {
            return Ok(CONTENT_DESCRIPTION.as_bytes().to_vec());
        }
        std::fs::read(self.description_path(doc_type)).map_err(|e| {
            SkilletError::Schema(format!("no description for docType '{}': {}", doc_type, e))
        })
    }
}
