//! Polymarket data API client for listing a wallet's positions.
//!
//! Read-only. The settler only needs the condition ids (and slugs, for
//! filtering by market); balances are always re-read on-chain before acting.

use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum PositionsError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("data API error {status}: {body}")]
    Api { status: u16, body: String },
}

/// One position row from `/positions`. Only the fields the settler reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRecord {
    #[serde(default)]
    pub condition_id: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
}

/// Where the settler learns which conditions a wallet holds.
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Every position row, or only the balanced (mergeable) ones.
    async fn fetch(&self, mergeable_only: bool) -> Result<Vec<PositionRecord>, PositionsError>;

    /// `fetch`, with failures logged and reported as no positions.
    async fn fetch_or_empty(&self, mergeable_only: bool) -> Vec<PositionRecord> {
        match self.fetch(mergeable_only).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, mergeable_only, "failed to fetch positions");
                Vec::new()
            }
        }
    }

    /// Balanced YES/NO positions only.
    async fn mergeable_positions(&self) -> Vec<PositionRecord> {
        let rows = self.fetch_or_empty(true).await;
        info!(positions = rows.len(), "mergeable positions");
        rows
    }

    /// Mergeable positions plus every other held position, one row per
    /// condition, optionally narrowed to a market slug.
    async fn redeemable_positions(&self, market_slug: Option<&str>) -> Vec<PositionRecord> {
        let mergeable = self.mergeable_positions().await;
        let all = self.fetch_or_empty(false).await;
        let rows = union_by_condition(mergeable, all);

        match market_slug {
            Some(slug) => filter_by_slug(rows, slug),
            None => rows,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PositionsClient {
    http: Client,
    base_url: String,
    user: Address,
    size_threshold: f64,
    page_limit: u32,
    max_pages: u32,
}

impl PositionsClient {
    pub fn new(
        base_url: String,
        user: Address,
        size_threshold: f64,
        page_limit: u32,
        max_pages: u32,
    ) -> Result<Self, PositionsError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            user,
            size_threshold,
            page_limit: page_limit.max(1),
            max_pages: max_pages.max(1),
        })
    }

    async fn fetch_page(
        &self,
        mergeable_only: bool,
        offset: u64,
    ) -> Result<Vec<PositionRecord>, PositionsError> {
        let url = format!("{}/positions", self.base_url);
        let mut query: Vec<(&str, String)> = vec![
            ("user", format!("{:#x}", self.user)),
            ("sizeThreshold", self.size_threshold.to_string()),
            ("limit", self.page_limit.to_string()),
            ("offset", offset.to_string()),
            ("sortBy", "TOKENS".to_string()),
            ("sortDirection", "DESC".to_string()),
        ];
        if mergeable_only {
            query.push(("mergeable", "true".to_string()));
        }

        let resp = self.http.get(&url).query(&query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PositionsError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let rows: Option<Vec<PositionRecord>> = resp.json().await?;
        Ok(rows.unwrap_or_default())
    }
}

#[async_trait]
impl PositionSource for PositionsClient {
    /// All pages of the wallet's positions, largest first.
    async fn fetch(&self, mergeable_only: bool) -> Result<Vec<PositionRecord>, PositionsError> {
        collect_pages(self.page_limit, self.max_pages, |offset| {
            self.fetch_page(mergeable_only, offset)
        })
        .await
    }
}

/// Page through `fetch_page(offset)` until a short page or `max_pages`.
pub async fn collect_pages<F, Fut>(
    page_limit: u32,
    max_pages: u32,
    mut fetch_page: F,
) -> Result<Vec<PositionRecord>, PositionsError>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<Vec<PositionRecord>, PositionsError>>,
{
    let limit = page_limit.max(1);
    let mut all = Vec::new();

    for page in 0..max_pages {
        let offset = page_offset(page, limit);
        let rows = fetch_page(offset).await?;
        let n = rows.len();
        debug!(page, offset, rows = n, "positions page");
        all.extend(rows);

        if n < limit as usize {
            return Ok(all);
        }
    }

    warn!(
        max_pages,
        page_limit = limit,
        rows = all.len(),
        "position listing hit max_pages, later pages not fetched"
    );
    Ok(all)
}

/// Row offset of `page`. Computed in u64 so large limits cannot wrap.
pub fn page_offset(page: u32, page_limit: u32) -> u64 {
    u64::from(page) * u64::from(page_limit)
}

/// `first` followed by rows of `rest` whose condition id is not already present.
pub fn union_by_condition(first: Vec<PositionRecord>, rest: Vec<PositionRecord>) -> Vec<PositionRecord> {
    let mut seen: HashSet<Option<String>> = first.iter().map(|p| p.condition_id.clone()).collect();
    let mut rows = first;
    for row in rest {
        if seen.insert(row.condition_id.clone()) {
            rows.push(row);
        }
    }
    rows
}

/// A market slug without its trailing `-segment`, so recurring markets
/// (`btc-updown-15m-1700000000`) match across instances.
pub fn slug_base_pattern(slug: &str) -> &str {
    slug.rsplit_once('-').map(|(base, _)| base).unwrap_or(slug)
}

/// Rows whose slug contains the base pattern; failing that, exact slug matches.
pub fn filter_by_slug(rows: Vec<PositionRecord>, market_slug: &str) -> Vec<PositionRecord> {
    let base = slug_base_pattern(market_slug);
    let partial: Vec<PositionRecord> = rows
        .iter()
        .filter(|p| p.slug.as_deref().is_some_and(|s| s.contains(base)))
        .cloned()
        .collect();
    if !partial.is_empty() {
        return partial;
    }
    rows.into_iter()
        .filter(|p| p.slug.as_deref() == Some(market_slug))
        .collect()
}

/// Unique, parsed condition ids in first-seen order. Unparseable ids are skipped.
pub fn condition_ids(rows: &[PositionRecord]) -> Vec<B256> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for raw in rows.iter().filter_map(|p| p.condition_id.as_deref()) {
        match raw.parse::<B256>() {
            Ok(id) => {
                if seen.insert(id) {
                    ids.push(id);
                }
            }
            Err(e) => warn!(condition_id = raw, error = %e, "skipping malformed condition id"),
        }
    }
    ids
}
