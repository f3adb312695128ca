//! SerpApi listing source.
//!
//! Reads the profile listing through SerpApi's `google_scholar_author`
//! engine instead of scraping Scholar. No detail pages are fetched; each
//! listing entry maps directly onto a [`PublicationRecord`], so only the
//! fields the listing carries are filled in.
//!
//! API Details:
//! - Endpoint: GET /search.json?engine=google_scholar_author
//! - At most 100 articles per request (`num`), paged with `start`

use crate::config::{Config, MAX_PAGE_SIZE};
use crate::error::{Result, ScholarError};
use crate::fields::split_authors;
use crate::harvest::{pause, HarvestReport};
use crate::record::PublicationRecord;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Deserialize)]
struct AuthorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    authors: Option<String>,
    #[serde(default)]
    publication: Option<String>,
    #[serde(default)]
    year: Option<String>,
    #[serde(default)]
    cited_by: Option<CitedBy>,
    #[serde(default)]
    volume: Option<String>,
    #[serde(default)]
    pages: Option<String>,
    #[serde(default)]
    publisher: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CitedBy {
    #[serde(default)]
    value: Option<u64>,
}

/// Page through the author's articles until a short page.
pub async fn harvest(config: &Config) -> Result<HarvestReport> {
    config.validate()?;
    let api_key = config
        .serpapi_key
        .as_deref()
        .ok_or_else(|| ScholarError::Config("SerpApi source requires an API key".to_string()))?;

    let client = reqwest::Client::builder()
        .user_agent(concat!("scholar-record/", env!("CARGO_PKG_VERSION")))
        .timeout(config.request_timeout)
        .build()
        .map_err(|e| ScholarError::Config(format!("Failed to build HTTP client: {}", e)))?;

    let num = config.page_size.min(MAX_PAGE_SIZE);
    let mut report = HarvestReport::default();
    let mut start = 0;

    loop {
        pause(config.pacing.page_delay, config.pacing.jitter).await;

        let url = build_search_url(&config.serpapi_url, &config.subject_id, api_key, start, num)?;
        debug!(start = start, num = num, "Fetching SerpApi page");

        let response = client.get(url).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(status_error(status, &text));
        }

        let body: AuthorResponse = serde_json::from_str(&text)?;
        if let Some(error) = body.error {
            return Err(ScholarError::Api(error));
        }

        let count = body.articles.len();
        report.pages += 1;
        report.rows += count;
        info!(start = start, rows = count, "Fetched SerpApi page");

        for article in body.articles {
            match to_record(article) {
                Some(record) => report.records.push(record),
                None => report.skipped += 1,
            }
        }

        if count < num {
            break;
        }
        start += num;
    }

    Ok(report)
}

/// SerpApi explains 4xx responses in an `error` field; keep that message
/// when the body carries one.
fn status_error(status: reqwest::StatusCode, body: &str) -> ScholarError {
    match serde_json::from_str::<AuthorResponse>(body).ok().and_then(|b| b.error) {
        Some(message) => ScholarError::Api(message),
        None => ScholarError::from_status(status),
    }
}

/// Build SerpApi search URL
fn build_search_url(base_url: &str, author_id: &str, api_key: &str, start: usize, num: usize) -> Result<Url> {
    let mut url = Url::parse(&format!("{}/search.json", base_url.trim_end_matches('/')))
        .map_err(|e| ScholarError::Config(format!("Invalid SerpApi URL: {}", e)))?;

    url.query_pairs_mut()
        .append_pair("engine", "google_scholar_author")
        .append_pair("author_id", author_id)
        .append_pair("api_key", api_key)
        .append_pair("sort", "pubdate")
        .append_pair("start", &start.to_string())
        .append_pair("num", &num.to_string());

    Ok(url)
}

/// Map a listing article; untitled entries are dropped.
fn to_record(article: Article) -> Option<PublicationRecord> {
    let title = article.title.trim();
    if title.is_empty() {
        return None;
    }

    let non_empty = |s: Option<String>| s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    Some(PublicationRecord {
        title: title.to_string(),
        link: article.link,
        authors: non_empty(article.authors).map(|a| split_authors(&a)),
        date: non_empty(article.year)
            .and_then(|y| y.parse().ok())
            .map(|year| vec![year]),
        journal: non_empty(article.publication),
        volume: non_empty(article.volume),
        pages: non_empty(article.pages),
        publisher: non_empty(article.publisher),
        description: non_empty(article.snippet),
        citations: article.cited_by.and_then(|c| c.value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_keeps_api_message() {
        let err = status_error(
            reqwest::StatusCode::UNAUTHORIZED,
            r#"{"error":"Invalid API key. Your API key should be here: https://serpapi.com/manage-api-key"}"#,
        );
        assert!(matches!(err, ScholarError::Api(ref m) if m.starts_with("Invalid API key")));

        let err = status_error(reqwest::StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert!(matches!(err, ScholarError::Fetch { status: 502, .. }));
    }

    #[test]
    fn test_build_search_url() {
        let url = build_search_url("https://serpapi.com/", "61Ou1P8AAAAJ", "secret", 100, 100)
            .expect("Failed to build URL");
        assert_eq!(
            url.as_str(),
            "https://serpapi.com/search.json?engine=google_scholar_author&author_id=61Ou1P8AAAAJ&api_key=secret&sort=pubdate&start=100&num=100"
        );
    }

    #[test]
    fn test_to_record_maps_listing_fields() {
        let article: Article = serde_json::from_value(serde_json::json!({
            "title": "Deep learning",
            "link": "https://scholar.google.com/citations?view_op=view_citation&citation_for_view=x:y",
            "citation_id": "x:y",
            "authors": "Y LeCun, Y Bengio, G Hinton",
            "publication": "Nature 521 (7553), 436-444, 2015",
            "cited_by": { "value": 75000, "link": "https://scholar.google.com/scholar?cites=1" },
            "year": "2015"
        }))
        .expect("article");

        let record = to_record(article).expect("record");
        assert_eq!(record.title, "Deep learning");
        assert_eq!(
            record.authors,
            Some(vec!["Y LeCun".to_string(), "Y Bengio".to_string(), "G Hinton".to_string()])
        );
        assert_eq!(record.date, Some(vec![2015]));
        assert_eq!(record.journal.as_deref(), Some("Nature 521 (7553), 436-444, 2015"));
        assert_eq!(record.citations, Some(75000));
        assert_eq!(record.description, None);
    }

    #[test]
    fn test_to_record_handles_sparse_article() {
        let article: Article = serde_json::from_value(serde_json::json!({
            "title": "Preprint",
            "link": "https://example.org",
            "authors": "",
            "year": "",
            "cited_by": { "value": null }
        }))
        .expect("article");

        assert_eq!(to_record(article), Some(PublicationRecord::new("Preprint", "https://example.org")));
    }

    #[test]
    fn test_untitled_article_dropped() {
        let article: Article = serde_json::from_value(serde_json::json!({ "link": "x" })).expect("article");
        assert!(to_record(article).is_none());
    }
}
