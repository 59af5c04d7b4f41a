//! Mapping-driven schema construction and document conversion.
//!
//! The change feed delivers arbitrary JSON per docType; field selection is
//! driven entirely by the docType's mapping description. Unmapped fields are
//! ignored, mapped fields with an unconvertible value are skipped silently.

use crate::error::{Result, SkilletError};
use crate::mapping::{FieldKind, MappedField, MappingDescription};
use tantivy::schema::{
    DateOptions, Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING,
};
use tantivy::TantivyDocument;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub const ID_FIELD: &str = "_id";
pub const DOC_TYPE_FIELD: &str = "docType";

/// Resolved tantivy handles for a shard's mapped fields.
pub struct ShardFields {
    pub id: Field,
    pub doc_type: Field,
    pub mapped: Vec<(MappedField, Field)>,
}

pub fn analyzer_name(lang: &str) -> String {
    format!("stem_{}", lang)
}

/// Build the tantivy schema for one (docType, language) shard.
///
/// Text fields use the language's stemming analyzer; `highlight` stores
/// textual fields so matched fragments can be returned at query time.
pub fn build_schema(description: &MappingDescription, lang: &str, highlight: bool) -> Schema {
    let mut builder = Schema::builder();

    builder.add_text_field(ID_FIELD, STRING | STORED);
    // Common to all docTypes, used by the read side to tell shards apart.
    builder.add_text_field(DOC_TYPE_FIELD, STRING | STORED);

    for field in &description.fields {
        match field.kind {
            FieldKind::Text => {
                let indexing = TextFieldIndexing::default()
                    .set_tokenizer(&analyzer_name(lang))
                    .set_index_option(IndexRecordOption::WithFreqsAndPositions);
                let mut options = TextOptions::default().set_indexing_options(indexing);
                if highlight {
                    options = options.set_stored();
                }
                builder.add_text_field(&field.path, options);
            }
            FieldKind::Keyword => {
                let options = if highlight { STRING | STORED } else { STRING };
                builder.add_text_field(&field.path, options);
            }
            FieldKind::Number => {
                let options = tantivy::schema::NumericOptions::default()
                    .set_indexed()
                    .set_stored();
                builder.add_f64_field(&field.path, options);
            }
            FieldKind::Date | FieldKind::Timestamp => {
                let options = DateOptions::default().set_indexed().set_stored();
                builder.add_date_field(&field.path, options);
            }
            FieldKind::Store => {
                builder.add_text_field(&field.path, TextOptions::default().set_stored());
            }
        }
    }

    builder.build()
}

/// Resolve field handles against an existing schema.
///
/// Mapped paths absent from the stored schema are dropped: a drifted shard
/// keeps indexing the fields it was created with until it is re-indexed.
pub fn resolve_fields(schema: &Schema, description: &MappingDescription) -> Result<ShardFields> {
    let id = schema
        .get_field(ID_FIELD)
        .map_err(|_| SkilletError::Index(format!("shard schema lacks {}", ID_FIELD)))?;
    let doc_type = schema
        .get_field(DOC_TYPE_FIELD)
        .map_err(|_| SkilletError::Index(format!("shard schema lacks {}", DOC_TYPE_FIELD)))?;

    let mut mapped = Vec::with_capacity(description.fields.len());
    for field in &description.fields {
        if let Ok(handle) = schema.get_field(&field.path) {
            mapped.push((field.clone(), handle));
        }
    }

    Ok(ShardFields {
        id,
        doc_type,
        mapped,
    })
}

/// Convert one feed document into a tantivy document.
pub fn to_tantivy(
    fields: &ShardFields,
    doc_id: &str,
    doc: &serde_json::Map<String, serde_json::Value>,
) -> TantivyDocument {
    let mut out = TantivyDocument::default();
    out.add_text(fields.id, doc_id);

    if let Some(doc_type) = doc.get(DOC_TYPE_FIELD).and_then(|v| v.as_str()) {
        out.add_text(fields.doc_type, doc_type);
    }

    for (mapped, handle) in &fields.mapped {
        let Some(value) = lookup_path(doc, &mapped.path) else {
            continue;
        };
        match value {
            serde_json::Value::Array(items) => {
                for item in items {
                    add_scalar(&mut out, *handle, mapped.kind, item);
                }
            }
            scalar => add_scalar(&mut out, *handle, mapped.kind, scalar),
        }
    }

    out
}

fn add_scalar(
    doc: &mut TantivyDocument,
    field: Field,
    kind: FieldKind,
    value: &serde_json::Value,
) {
    match kind {
        FieldKind::Text | FieldKind::Keyword | FieldKind::Store => {
            if let Some(text) = value.as_str() {
                doc.add_text(field, text);
            }
        }
        FieldKind::Number => {
            if let Some(number) = value.as_f64() {
                doc.add_f64(field, number);
            }
        }
        FieldKind::Date => {
            if let Some(parsed) = value
                .as_str()
                .and_then(|s| OffsetDateTime::parse(s, &Rfc3339).ok())
            {
                doc.add_date(
                    field,
                    tantivy::DateTime::from_timestamp_secs(parsed.unix_timestamp()),
                );
            }
        }
        FieldKind::Timestamp => {
            if let Some(secs) = value.as_i64() {
                doc.add_date(field, tantivy::DateTime::from_timestamp_secs(secs));
            } else if let Some(parsed) = value
                .as_str()
                .and_then(|s| OffsetDateTime::parse(s, &Rfc3339).ok())
            {
                doc.add_date(
                    field,
                    tantivy::DateTime::from_timestamp_secs(parsed.unix_timestamp()),
                );
            }
        }
    }
}

fn lookup_path<'a>(
    doc: &'a serde_json::Map<String, serde_json::Value>,
    path: &str,
) -> Option<&'a serde_json::Value> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}
