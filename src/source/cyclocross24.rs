/// cyclocross24.com results scraper
use super::{RaceSource, RawRace};
use crate::config::FetchConfig;
use crate::ratings::{RaceMetadata, RawGap};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Delay unit between retries; attempt `n` waits `n` units
const RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// Header words that identify the gap column of a results table, preferred first.
/// `time` is last since it usually labels absolute finish times.
const GAP_HEADERS: &[&str] = &["gap", "diff", "behind", "time"];

fn race_link_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"/race/(\d+)/").expect("race link pattern"))
}

fn date_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(\d{1,2})\s+(January|February|March|April|May|June|July|August|September|October|November|December)\s+(\d{4})\b")
            .expect("date pattern")
    })
}

fn gap_cell_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^\+?\s*(\d{1,2}:\d{2}(:\d{2})?|s\.t\.?)$").expect("gap cell pattern"))
}

fn year_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b\d{4}\b").expect("year pattern"))
}

/// Scrapes race pages linked from the cyclocross24 homepage
#[derive(Clone)]
pub struct Cyclocross24Source {
    client: Client,
    config: FetchConfig,
    base_url: Url,
}

impl Cyclocross24Source {
    /// Create a new scraper instance
    pub fn new(config: FetchConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).with_context(|| format!("invalid base url {}", config.base_url))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    /// Race ids linked from the homepage, in page order
    pub async fn discover_race_ids(&self) -> Result<Vec<String>> {
        info!("🔍 Discovering races from {}", self.base_url);

        let html = self.fetch_html(&self.base_url).await?;
        let ids = extract_race_ids(&html, self.config.max_races);

        info!("📋 Found {} race IDs", ids.len());
        Ok(ids)
    }

    /// Fetch and parse one race page. `Ok(None)` means the page had no usable results.
    pub async fn fetch_race(&self, race_id: &str) -> Result<Option<RawRace>> {
        let url = self.race_url(race_id)?;
        let html = self.fetch_html(&url).await?;
        let today = chrono::Local::now().date_naive();
        Ok(parse_race_page(race_id, &html, today, self.config.max_result_rows))
    }

    fn race_url(&self, race_id: &str) -> Result<Url> {
        Ok(self.base_url.join(&format!("race/{}/", race_id))?)
    }

    /// GET a page, retrying failed attempts with a growing pause
    async fn fetch_html(&self, url: &Url) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) if attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!("Fetch of {} failed ({}), retry {}/{}", url, e, attempt, self.config.max_retries);
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &Url) -> Result<String> {
        let request = match &self.config.scraper_api_key {
            Some(api_key) => {
                let proxied = Url::parse_with_params(
                    &self.config.scraper_api_url,
                    &[("api_key", api_key.as_str()), ("url", url.as_str())],
                )?;
                debug!("Fetching {} through scraping proxy", url);
                self.client
                    .get(proxied)
                    .timeout(Duration::from_secs(self.config.scraper_api_timeout_seconds))
            }
            None => {
                debug!("Fetching {}", url);
                self.client
                    .get(url.clone())
                    .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8")
                    .header(ACCEPT_LANGUAGE, "en-US,en;q=0.5")
            }
        };

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("HTTP error {}: {}", response.status(), url));
        }

        let body = response.text().await?;
        debug!("📄 Downloaded {} characters from {}", body.len(), url);
        Ok(body)
    }
}

#[async_trait]
impl RaceSource for Cyclocross24Source {
    fn name(&self) -> &str {
        "cyclocross24"
    }

    async fn fetch_races(&self) -> Result<Vec<RawRace>> {
        let ids = self.discover_race_ids().await?;
        let mut races = Vec::new();

        for race_id in &ids {
            info!("Checking race {}...", race_id);
            tokio::time::sleep(Duration::from_millis(self.config.request_delay_ms)).await;

            match self.fetch_race(race_id).await {
                Ok(Some(race)) => races.push(race),
                Ok(None) => debug!("No results table for race {}", race_id),
                Err(e) => warn!("❌ Failed to fetch race {}: {:#}", race_id, e),
            }
        }

        info!("📥 Fetched {} of {} races", races.len(), ids.len());
        Ok(races)
    }
}

/// Collect race ids from `/race/<id>/` links, first occurrence order, at most `limit`
pub fn extract_race_ids(html: &str, limit: usize) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    document
        .select(&selector)
        .filter_map(|link| link.value().attr("href"))
        .filter_map(|href| race_link_regex().captures(href))
        .filter_map(|captures| captures.get(1).map(|m| m.as_str().to_string()))
        .filter(|id| seen.insert(id.clone()))
        .take(limit)
        .collect()
}

/// Turn a race page into a raw race.
///
/// Returns `None` when the page has no results table with gap data.
pub fn parse_race_page(race_id: &str, html: &str, today: NaiveDate, max_rows: usize) -> Option<RawRace> {
    let document = Html::parse_document(html);

    let title_text = first_text(&document, "title").unwrap_or_default();
    let header_text = first_text(&document, "h1, h2").unwrap_or_default();
    let label = format!("{} {}", title_text, header_text).trim().to_string();

    let raw_gaps = extract_raw_gaps(&document, max_rows);
    if raw_gaps.is_empty() {
        return None;
    }

    let venue = match extract_venue(&header_text) {
        venue if venue.is_empty() => format!("Race {}", race_id),
        venue => venue,
    };

    let date = extract_date(html).unwrap_or_else(|| {
        warn!("⚠️ No date found for race {}, filing it under {}", race_id, today);
        today
    });

    Some(RawRace {
        id: race_id.to_string(),
        metadata: RaceMetadata {
            date,
            venue,
            country: String::new(),
            series: label.clone(),
            category: label,
        },
        raw_gaps,
    })
}

fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next().map(|e| element_text(&e))
}

/// Venue from a page header like "Tábor 2025 - Results Men Elite"
pub fn extract_venue(header: &str) -> String {
    let venue = header.split('-').next().unwrap_or_default();
    let venue = year_regex().replace_all(venue, "");
    let venue = venue.replace("Results", "").replace("Cyclocross", "");
    venue.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First "23 November 2025" style date in the page
pub fn extract_date(html: &str) -> Option<NaiveDate> {
    let captures = date_regex().captures(html)?;
    let text = format!("{} {} {}", &captures[1], &captures[2], &captures[3]);
    NaiveDate::parse_from_str(&text, "%d %B %Y").ok()
}

/// Raw gaps from the first results table that has any, leader excluded
fn extract_raw_gaps(document: &Html, max_rows: usize) -> Vec<RawGap> {
    let (Ok(table_selector), Ok(row_selector), Ok(cell_selector), Ok(header_selector)) = (
        Selector::parse("table"),
        Selector::parse("tr"),
        Selector::parse("td"),
        Selector::parse("th"),
    ) else {
        return Vec::new();
    };

    for table in document.select(&table_selector) {
        let headers: Vec<String> = table
            .select(&header_selector)
            .map(|th| element_text(&th).to_lowercase())
            .collect();
        let gap_column = gap_column(&headers);

        let gaps: Vec<RawGap> = table
            .select(&row_selector)
            .map(|row| row.select(&cell_selector).map(|td| element_text(&td)).collect::<Vec<_>>())
            .filter(|cells| cells.len() >= 3)
            .take(max_rows)
            .skip(1)
            .filter_map(|cells| match gap_column {
                Some(column) => cells.get(column).cloned(),
                None => cells.iter().rev().find(|c| gap_cell_regex().is_match(c)).cloned(),
            })
            .map(RawGap::Text)
            .collect();

        if !gaps.is_empty() {
            debug!("Extracted {} raw gaps (gap column: {:?})", gaps.len(), gap_column);
            return gaps;
        }
    }

    Vec::new()
}

/// Index of the best gap header, by [`GAP_HEADERS`] preference
fn gap_column(headers: &[String]) -> Option<usize> {
    GAP_HEADERS
        .iter()
        .find_map(|wanted| headers.iter().position(|header| header.contains(wanted)))
}
