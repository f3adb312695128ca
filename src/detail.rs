//! Record extractor.
//!
//! Turns one listing row into a [`PublicationRecord`] by fetching the
//! publication's detail page. A row that cannot be turned into a record is
//! reported as [`Extraction::Skipped`] and never fails the run.

use crate::client::ScholarClient;
use crate::error::{Result, ScholarError};
use crate::fields::{self, cell_text};
use crate::page::RowHandle;
use crate::record::PublicationRecord;
use scraper::{ElementRef, Html, Selector};
use std::fmt;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Per-publication identifier, the part after `:` in `citation_for_view`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailId(String);

impl DetailId {
    /// Resolve the identifier from a row link such as
    /// `/citations?view_op=view_citation&user=X&citation_for_view=X:u5HHmVD_uO8C`.
    pub fn from_href(href: &str) -> Option<Self> {
        let (_, tail) = href.rsplit_once(':')?;
        let id = tail.split(['&', '#']).next().unwrap_or_default().trim();
        (!id.is_empty()).then(|| DetailId(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DetailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a row produced no record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("row has no publication link")]
    MissingDetailId,

    #[error("failed to fetch detailed record {detail_id}: {error}")]
    DetailUnavailable { detail_id: DetailId, error: String },

    #[error("unable to parse publication title of {detail_id}")]
    MissingTitle { detail_id: DetailId },
}

/// Outcome of extracting one row.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Record(PublicationRecord),
    Skipped(SkipReason),
}

/// Fetch and parse the detail page behind `row`.
pub async fn extract_record(client: &ScholarClient, subject_id: &str, row: &RowHandle) -> Extraction {
    let Some(detail_id) = row.href.as_deref().and_then(DetailId::from_href) else {
        return Extraction::Skipped(SkipReason::MissingDetailId);
    };

    let url = match build_detail_url(client, subject_id, &detail_id) {
        Ok(url) => url,
        Err(e) => return unavailable(detail_id, e),
    };
    let html = match client.get_text(&url).await {
        Ok(html) => html,
        Err(e) => return unavailable(detail_id, e),
    };

    match parse_detail(&html, url.as_str()) {
        Some(record) => {
            debug!(detail_id = %detail_id, title = %record.title, "Extracted publication");
            Extraction::Record(record)
        }
        None => Extraction::Skipped(SkipReason::MissingTitle { detail_id }),
    }
}

fn unavailable(detail_id: DetailId, error: ScholarError) -> Extraction {
    Extraction::Skipped(SkipReason::DetailUnavailable {
        detail_id,
        error: error.to_string(),
    })
}

/// Build the detail page URL for one publication
pub fn build_detail_url(client: &ScholarClient, subject_id: &str, detail_id: &DetailId) -> Result<Url> {
    let mut url = client.endpoint("/citations")?;
    url.query_pairs_mut()
        .append_pair("view_op", "view_citation")
        .append_pair("hl", "en")
        .append_pair("user", subject_id)
        .append_pair("citation_for_view", &format!("{}:{}", subject_id, detail_id));
    Ok(url)
}

/// Parse a detail page into a record.
///
/// Returns `None` when the page has no title element. A title without a
/// link falls back to `page_url` as the record link.
pub fn parse_detail(html: &str, page_url: &str) -> Option<PublicationRecord> {
    let document = Html::parse_document(html);

    let title_selector = selector("#gsc_oci_title")?;
    let title_link_selector = selector("#gsc_oci_title a")?;
    let table_selector = selector("#gsc_oci_table")?;

    let title_elem = document.select(&title_selector).next()?;
    let mut record = match document.select(&title_link_selector).next() {
        Some(link) => PublicationRecord::new(
            cell_text(link),
            link.value().attr("href").unwrap_or(page_url),
        ),
        None => PublicationRecord::new(cell_text(title_elem), page_url),
    };

    let Some(table) = document.select(&table_selector).next() else {
        debug!(title = %record.title, "Detail page has no field table");
        return Some(record);
    };

    for row in table.children().filter_map(ElementRef::wrap) {
        let mut cells = row.children().filter_map(ElementRef::wrap);
        let (Some(label), Some(value)) = (cells.next(), cells.next()) else {
            continue;
        };

        let label = cell_text(label);
        if let Some(rule) = fields::rule_for(&label) {
            if !(rule.apply)(&mut record, value) {
                debug!(label = %label, field = rule.field, "Could not read field value");
            }
        }
    }

    Some(record)
}

fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(e) => {
            debug!(css = css, error = %e, "Invalid selector");
            None
        }
    }
}
