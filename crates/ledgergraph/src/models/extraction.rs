//! Typed form of the remote extraction output.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An entity as the extraction service reported it, before normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEntity {
    #[serde(default, rename = "type")]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub properties: serde_json::Map<String, Value>,
    #[serde(default)]
    pub citations: Vec<super::Citation>,
}

/// A table as the extraction service reported it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTable {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Value>,
    #[serde(default)]
    pub caption: Option<String>,
}

/// One extracted key/value pair. Values may be nested structures from a
/// schema extraction; the normalizer flattens them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub extraction_id: Option<String>,
}

/// The normalized output of a Parse + Extract round trip.
///
/// A parse-only fallback has empty `entities`/`tables`/`key_values` and no
/// `structured_extraction`, but keeps the markdown.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionRecord {
    #[serde(default)]
    pub markdown: String,
    /// The raw `extraction` object an adaptive or default schema produced.
    #[serde(default)]
    pub structured_extraction: Option<Value>,
    #[serde(default)]
    pub entities: Vec<RawEntity>,
    #[serde(default)]
    pub tables: Vec<RawTable>,
    #[serde(default)]
    pub key_values: Vec<KeyValue>,
    #[serde(default)]
    pub metadata: ExtractionMetadata,
}

impl ExtractionRecord {
    /// Parse-only record: markdown preserved, no structured extraction.
    #[must_use]
    pub fn parse_only(markdown: String, total_pages: u32) -> Self {
        Self {
            markdown,
            metadata: ExtractionMetadata {
                total_pages,
                confidence: None,
                extraction_id: None,
            },
            ..Self::default()
        }
    }

    /// The `summary` string, when the record carries only the default
    /// `{summary}` schema output.
    #[must_use]
    pub fn summary_text(&self) -> Option<&str> {
        self.key_values
            .iter()
            .find(|kv| kv.key == "summary")
            .and_then(|kv| kv.value.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Aggregate several member records (ZIP fan-out) into one: concatenate
/// entities, tables and key/values; sum page counts; average the
/// confidences that were reported.
#[must_use]
pub fn aggregate_records(results: Vec<ExtractionRecord>) -> ExtractionRecord {
    let mut combined = ExtractionRecord::default();
    let mut confidences = Vec::new();
    let mut markdown_parts = Vec::new();

    for record in results {
        combined.entities.extend(record.entities);
        combined.tables.extend(record.tables);
        combined.key_values.extend(record.key_values);
        combined.metadata.total_pages += record.metadata.total_pages;
        if let Some(c) = record.metadata.confidence {
            confidences.push(c);
        }
        if !record.markdown.is_empty() {
            markdown_parts.push(record.markdown);
        }
    }

    combined.markdown = markdown_parts.join("\n\n");
    combined.metadata.confidence = if confidences.is_empty() {
        None
    } else {
        Some(confidences.iter().sum::<f64>() / confidences.len() as f64)
    };
    combined
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pages: u32, confidence: Option<f64>) -> ExtractionRecord {
        ExtractionRecord {
            metadata: ExtractionMetadata {
                total_pages: pages,
                confidence,
                extraction_id: None,
            },
            ..ExtractionRecord::default()
        }
    }

    #[test]
    fn aggregation_sums_pages_and_averages_confidence() {
        let combined = aggregate_records(vec![
            record(3, Some(0.9)),
            record(2, None),
            record(5, Some(0.7)),
        ]);
        assert_eq!(combined.metadata.total_pages, 10);
        let conf = combined.metadata.confidence.unwrap();
        assert!((conf - 0.8).abs() < 1e-9);
    }

    #[test]
    fn aggregating_nothing_yields_empty_completed_record() {
        let combined = aggregate_records(vec![]);
        assert!(combined.entities.is_empty());
        assert!(combined.tables.is_empty());
        assert_eq!(combined.metadata.total_pages, 0);
        assert_eq!(combined.metadata.confidence, None);
    }

    #[test]
    fn summary_text_reads_default_schema_output() {
        let mut r = ExtractionRecord::default();
        r.key_values.push(KeyValue {
            key: "summary".into(),
            value: serde_json::json!("  Revenue grew 8% to $50M.  "),
        });
        assert_eq!(r.summary_text(), Some("Revenue grew 8% to $50M."));
    }
}
