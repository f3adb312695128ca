//! Listing page fetcher.
//!
//! The profile listing is paged through a POST to `/citations` with `json=1`.
//! The response is a JSON envelope whose `B` field holds the HTML rows of the
//! publication table for the requested window.

use crate::client::ScholarClient;
use crate::error::{OptionExt, Result, ScholarError};
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tracing::debug;
use url::Url;

/// One window of the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Offset of the first row
    pub start: usize,
    /// Number of rows requested
    pub size: usize,
}

impl PageRequest {
    pub fn first(size: usize) -> Self {
        Self { start: 0, size }
    }

    /// Exclusive end of the window; Scholar expects it as `pagesize`.
    pub fn end(&self) -> usize {
        self.start + self.size
    }

    /// The window directly after this one.
    pub fn next(&self) -> Self {
        Self {
            start: self.start + self.size,
            size: self.size,
        }
    }
}

/// One entry of a fetched listing page.
///
/// Holds the row's link so the detail identifier can be resolved after the
/// parsed page itself is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowHandle {
    /// Position of the row within its page
    pub index: usize,
    /// `href` of the row's first link, if any
    pub href: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PagePayload {
    #[serde(rename = "B")]
    rows_html: String,
}

/// Fetch one listing page and return its rows in source order.
///
/// Any failure here is fatal to the run.
pub async fn fetch_page(
    client: &ScholarClient,
    subject_id: &str,
    request: &PageRequest,
) -> Result<Vec<RowHandle>> {
    let url = build_page_url(client, subject_id, request)?;
    debug!(start = request.start, end = request.end(), url = %url, "Fetching listing page");

    let body = client.post_form(&url, "json=1").await?;
    let fragment = unwrap_payload(&body)?;
    parse_rows(&fragment)
}

/// Build the listing URL for a window
fn build_page_url(client: &ScholarClient, subject_id: &str, request: &PageRequest) -> Result<Url> {
    let mut url = client.endpoint("/citations")?;
    url.query_pairs_mut()
        .append_pair("user", subject_id)
        .append_pair("cstart", &request.start.to_string())
        .append_pair("pagesize", &request.end().to_string());
    Ok(url)
}

/// Pull the HTML fragment out of the JSON envelope.
pub fn unwrap_payload(body: &str) -> Result<String> {
    let payload: PagePayload = serde_json::from_str(body)?;
    Ok(payload.rows_html)
}

/// Split a listing fragment into row handles.
///
/// The rows are bare `<tr>` elements, which an HTML parser drops outside a
/// table, so the fragment is parsed inside a table body.
pub fn parse_rows(fragment: &str) -> Result<Vec<RowHandle>> {
    let document = Html::parse_document(&format!("<table><tbody>{}</tbody></table>", fragment));

    let body_selector = Selector::parse("tbody").map_err(|e| ScholarError::Parse(e.to_string()))?;
    let link_selector = Selector::parse("a[href]").map_err(|e| ScholarError::Parse(e.to_string()))?;

    let tbody = document
        .select(&body_selector)
        .next()
        .ok_or_parse("listing fragment has no row container")?;

    let rows = tbody
        .children()
        .filter_map(ElementRef::wrap)
        .enumerate()
        .map(|(index, row)| RowHandle {
            index,
            href: row
                .select(&link_selector)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(str::to_string),
        })
        .collect();

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    const ROWS: &str = r##"<tr class="gsc_a_tr"><td class="gsc_a_t"><a href="/citations?view_op=view_citation&amp;hl=en&amp;user=abc&amp;citation_for_view=abc:u5HHmVD_uO8C" class="gsc_a_at">First</a><div class="gs_gray">A Author</div></td><td class="gsc_a_c"><a href="#" class="gsc_a_ac gs_ibl">12</a></td></tr><tr class="gsc_a_tr"><td class="gsc_a_t"><a href="/citations?view_op=view_citation&amp;hl=en&amp;user=abc&amp;citation_for_view=abc:d1gkVwhDpl0C" class="gsc_a_at">Second</a></td></tr><tr class="gsc_a_tr"><td class="gsc_a_t">No link</td></tr>"##;

    #[test]
    fn test_page_request_windows() {
        let first = PageRequest::first(100);
        assert_eq!((first.start, first.end()), (0, 100));
        let second = first.next();
        assert_eq!((second.start, second.end()), (100, 200));
    }

    #[test]
    fn test_unwrap_payload() {
        let body = serde_json::json!({ "B": ROWS, "N": 3 }).to_string();
        assert_eq!(unwrap_payload(&body).expect("payload"), ROWS);
    }

    #[test]
    fn test_unwrap_payload_rejects_bad_envelope() {
        assert!(matches!(unwrap_payload("<html></html>"), Err(ScholarError::Json(_))));
        assert!(matches!(unwrap_payload(r#"{"A": 1}"#), Err(ScholarError::Json(_))));
    }

    #[test]
    fn test_parse_rows_keeps_order_and_links() {
        let rows = parse_rows(ROWS).expect("rows");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].index, 0);
        assert_eq!(
            rows[0].href.as_deref(),
            Some("/citations?view_op=view_citation&hl=en&user=abc&citation_for_view=abc:u5HHmVD_uO8C")
        );
        assert!(rows[1].href.as_deref().unwrap_or("").ends_with(":d1gkVwhDpl0C"));
        assert_eq!(rows[2].href, None);
    }

    #[test]
    fn test_parse_empty_fragment() {
        assert!(parse_rows("").expect("rows").is_empty());
    }

    #[test]
    fn test_build_page_url() {
        let mut config = Config::new("abc");
        config.cookie_file = Some("/nonexistent/cookies.json".into());
        let client = ScholarClient::new(&config).expect("client");
        let url = build_page_url(&client, "abc", &PageRequest { start: 100, size: 100 }).expect("url");
        assert_eq!(
            url.as_str(),
            "https://scholar.google.com/citations?user=abc&cstart=100&pagesize=200"
        );
    }
}
