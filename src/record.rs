//! Output record type.

use serde::{Deserialize, Serialize};

/// One publication as written to the output JSON.
///
/// Only `title` and `link` are always present; everything else is omitted
/// from the output when the detail page does not carry it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublicationRecord {
    pub title: String,
    pub link: String,
    /// Authors in the order the source lists them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    /// `[year]`, `[year, month]` or `[year, month, day]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<Vec<i32>>,
    /// Journal or conference name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    /// Abstract with markup removed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<u64>,
}

impl PublicationRecord {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            ..Default::default()
        }
    }
}
