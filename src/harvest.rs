//! Pagination loop.
//!
//! Pages through the listing one window at a time, extracts every row in
//! order, and stops after the first page that returns fewer rows than were
//! requested. Requests are strictly sequential.

use crate::client::ScholarClient;
use crate::config::{Config, SourceKind};
use crate::detail::{extract_record, Extraction};
use crate::error::Result;
use crate::page::{fetch_page, PageRequest};
use crate::record::PublicationRecord;
use crate::serpapi;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of a complete run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HarvestReport {
    /// Records in listing order
    pub records: Vec<PublicationRecord>,
    /// Listing pages fetched
    pub pages: usize,
    /// Rows seen across all pages
    pub rows: usize,
    /// Rows that produced no record
    pub skipped: usize,
}

/// Harvest the configured subject from the configured source.
pub async fn harvest(config: &Config) -> Result<HarvestReport> {
    info!(
        user = %config.subject_id,
        source = ?config.source,
        page_size = config.page_size,
        "Starting harvest"
    );

    let report = match config.source {
        SourceKind::Scholar => Harvester::new(config)?.run().await?,
        SourceKind::SerpApi => serpapi::harvest(config).await?,
    };

    info!(
        records = report.records.len(),
        pages = report.pages,
        skipped = report.skipped,
        "Harvest complete"
    );
    Ok(report)
}

/// Scholar listing harvester
pub struct Harvester<'a> {
    config: &'a Config,
    client: ScholarClient,
}

impl<'a> Harvester<'a> {
    pub fn new(config: &'a Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            client: ScholarClient::new(config)?,
        })
    }

    /// Run the loop to completion. A failed page fetch aborts the run; a
    /// failed row is logged and skipped.
    pub async fn run(&self) -> Result<HarvestReport> {
        let pacing = self.config.pacing;
        let mut report = HarvestReport::default();
        let mut request = PageRequest::first(self.config.page_size);

        loop {
            pause(pacing.page_delay, pacing.jitter).await;
            let rows = fetch_page(&self.client, &self.config.subject_id, &request).await?;
            report.pages += 1;
            report.rows += rows.len();
            info!(start = request.start, rows = rows.len(), "Fetched listing page");

            for row in &rows {
                pause(pacing.detail_delay, pacing.jitter).await;
                match extract_record(&self.client, &self.config.subject_id, row).await {
                    Extraction::Record(record) => report.records.push(record),
                    Extraction::Skipped(reason) => {
                        warn!(start = request.start, row = row.index, reason = %reason, "Skipping publication");
                        report.skipped += 1;
                    }
                }
            }

            if rows.len() < request.size {
                debug!(start = request.start, "Short page, listing exhausted");
                break;
            }
            request = request.next();
        }

        Ok(report)
    }
}

/// Sleep for `delay` plus up to `jitter` extra.
pub async fn pause(delay: Duration, jitter: Duration) {
    let total = delay.saturating_add(jitter_extra(jitter));
    if !total.is_zero() {
        tokio::time::sleep(total).await;
    }
}

/// Uniform random extra delay in `0..=jitter`, at millisecond granularity.
fn jitter_extra(jitter: Duration) -> Duration {
    let max = u64::try_from(jitter.as_millis()).unwrap_or(u64::MAX);
    if max == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max))
}
