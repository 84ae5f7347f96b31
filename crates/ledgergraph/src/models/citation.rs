//! Citation records linking extracted facts back to source documents.

use serde::{Deserialize, Serialize};

/// A pointer into the source document: page, and optionally the section,
/// table, cell or clause the fact was read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// 1-indexed page number.
    pub page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,
    /// Cell coordinate, e.g. "B5".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clause: Option<String>,
    /// Extraction confidence in [0, 1].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Citation {
    #[must_use]
    pub fn page(page: u32) -> Self {
        Self {
            page,
            section: None,
            table_id: None,
            cell: None,
            clause: None,
            confidence: None,
        }
    }

    #[must_use]
    pub fn section(page: u32, section: impl Into<String>) -> Self {
        Self {
            section: Some(section.into()),
            ..Self::page(page)
        }
    }

    #[must_use]
    pub fn table(page: u32, table_id: impl Into<String>) -> Self {
        Self {
            table_id: Some(table_id.into()),
            ..Self::page(page)
        }
    }
}
