//! Mapping bulk uploads onto [`NewDocument`] records.
//!
//! Decoding files is the caller's business; these helpers only shape
//! already-decoded text, CSV rows and JSON into documents.

use serde_json::{Map, Value, json};

use crate::models::{Metadata, NewDocument};

/// One document from a plain-text upload.
///
/// `source` falls back to `filename` when absent.
pub fn record_from_text(
    title: &str,
    text: &str,
    source: Option<&str>,
    filename: Option<&str>,
) -> NewDocument {
    let mut metadata = Metadata::new();
    metadata.insert("file_type".to_string(), json!("txt"));
    metadata.insert("filename".to_string(), json!(filename));

    NewDocument {
        title: title.to_string(),
        content: text.to_string(),
        source: source.or(filename).map(str::to_string),
        metadata,
    }
}

/// One document per JSON object that has string `title_field` and
/// `content_field` values. Other items, and non-array payloads, yield nothing.
pub fn records_from_json(
    items: &Value,
    title_field: &str,
    content_field: &str,
    filename: Option<&str>,
) -> Vec<NewDocument> {
    let Some(items) = items.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let title = item.get(title_field)?.as_str()?;
            let content = item.get(content_field)?.as_str()?;

            let mut metadata = Metadata::new();
            metadata.insert("file_type".to_string(), json!("json"));
            metadata.insert("filename".to_string(), json!(filename));
            metadata.insert("item_data".to_string(), item.clone());

            Some(NewDocument {
                title: title.to_string(),
                content: content.to_string(),
                source: filename.map(str::to_string),
                metadata,
            })
        })
        .collect()
}

/// One document per CSV row that has string values in both columns.
///
/// Rows arrive already parsed into header-keyed maps. The whole row is kept
/// under `row_data`.
pub fn records_from_rows(
    rows: &[Map<String, Value>],
    title_column: &str,
    content_column: &str,
    filename: Option<&str>,
) -> Vec<NewDocument> {
    rows.iter()
        .filter_map(|row| {
            let title = row.get(title_column)?.as_str()?;
            let content = row.get(content_column)?.as_str()?;

            let mut metadata = Metadata::new();
            metadata.insert("file_type".to_string(), json!("csv"));
            metadata.insert("filename".to_string(), json!(filename));
            metadata.insert("row_data".to_string(), Value::Object(row.clone()));

            Some(NewDocument {
                title: title.to_string(),
                content: content.to_string(),
                source: filename.map(str::to_string),
                metadata,
            })
        })
        .collect()
}
