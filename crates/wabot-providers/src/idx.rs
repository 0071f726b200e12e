//! IDX daily bulletin scraper.
//!
//! Four public pages are fetched with a browser User-Agent and their HTML
//! tables read row by row. Only entries dated today survive (dividends:
//! today or the coming month). A source that fails leaves its section empty.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Local, NaiveDate};
use regex::Regex;
use std::time::Duration;
use tracing::{debug, info, warn};
use wabot_core::{
    config::MarketConfig,
    error::WabotError,
    market::{Dividend, MarketSnapshot},
    traits::MarketData,
};

const UMA_URL: &str = "https://www.idx.co.id/en/news/unusual-market-activity-uma";
const SUSPENSION_URL: &str = "https://www.idx.co.id/id/berita/suspensi";
const RUPS_URL: &str = "https://www.new.sahamidx.com/?/rups";
/// Mirrors of the dividend table, tried in order until one has rows.
const DIVIDEND_URLS: &[&str] = &[
    "https://www.new.sahamidx.com/?/deviden",
    "https://www.new.sahamidx.com/deviden",
    "https://new.sahamidx.com/?/deviden",
    "https://new.sahamidx.com/deviden",
];

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9,id;q=0.8";

/// Dividends whose cum/ex date falls within this many days are listed.
const DIVIDEND_WINDOW_DAYS: i64 = 30;

/// Date layouts seen on the source pages, after month names are anglicized.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%d-%b-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %b, %Y",
];

/// Indonesian (and abbreviated) month names mapped to English.
fn english_month(word: &str) -> Option<&'static str> {
    Some(match word {
        "januari" => "january",
        "februari" | "pebruari" => "february",
        "maret" => "march",
        "mei" => "may",
        "juni" => "june",
        "juli" => "july",
        "agustus" => "august",
        "agu" | "agt" | "ags" => "aug",
        "oktober" => "october",
        "okt" => "oct",
        "nopember" => "november",
        "nop" => "nov",
        "desember" => "december",
        "des" => "dec",
        _ => return None,
    })
}

/// Compiled patterns for reading HTML tables and loose dates.
#[derive(Debug, Clone)]
struct Patterns {
    row: Regex,
    cell: Regex,
    tag: Regex,
    space: Regex,
    word: Regex,
    code: Regex,
    amount: Regex,
    dmy: Regex,
    ymd: Regex,
    day_month_year: Regex,
}

impl Patterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            row: Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>")?,
            cell: Regex::new(r"(?is)<td[^>]*>(.*?)</td>")?,
            tag: Regex::new(r"(?s)<[^>]*>")?,
            space: Regex::new(r"\s+")?,
            word: Regex::new(r"[a-z]+")?,
            code: Regex::new(r"^[A-Z]{2,6}$")?,
            amount: Regex::new(r"\d")?,
            dmy: Regex::new(r"(\d{1,2})[/-](\d{1,2})[/-](\d{4})")?,
            ymd: Regex::new(r"(\d{4})[/-](\d{1,2})[/-](\d{1,2})")?,
            day_month_year: Regex::new(r"(\d{1,2})\s+([a-z]+)\.?\s+(\d{4})")?,
        })
    }

    /// Text of every `<td>` of every `<tr>`, tags stripped and whitespace
    /// collapsed. Rows without data cells (header rows) are skipped.
    fn table_rows(&self, html: &str) -> Vec<Vec<String>> {
        self.row
            .captures_iter(html)
            .filter_map(|row| {
                let cells: Vec<String> = self
                    .cell
                    .captures_iter(&row[1])
                    .map(|cell| self.cell_text(&cell[1]))
                    .collect();
                (!cells.is_empty()).then_some(cells)
            })
            .collect()
    }

    fn cell_text(&self, raw: &str) -> String {
        let stripped = self.tag.replace_all(raw, " ");
        let decoded = stripped
            .replace("&nbsp;", " ")
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'");
        self.space.replace_all(&decoded, " ").trim().to_string()
    }

    /// Upper-cased ticker, if the cell holds one.
    fn ticker(&self, cell: &str) -> Option<String> {
        let code = cell.trim().to_uppercase();
        self.code.is_match(&code).then_some(code)
    }

    /// Parse a date cell in any of the layouts the sources use.
    fn parse_date(&self, raw: &str) -> Option<NaiveDate> {
        let lower = raw.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }
        let normalized = self
            .word
            .replace_all(&lower, |caps: &regex::Captures| {
                english_month(&caps[0])
                    .map(str::to_string)
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned();

        if let Some(date) = DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(&normalized, fmt).ok())
        {
            return Some(date);
        }

        // Dates embedded in longer text, e.g. "11 Sep 2025 16:00 WIB".
        if let Some(c) = self.dmy.captures(&normalized) {
            return ymd(&c[3], &c[2], &c[1]);
        }
        if let Some(c) = self.ymd.captures(&normalized) {
            return ymd(&c[1], &c[2], &c[3]);
        }
        if let Some(c) = self.day_month_year.captures(&normalized) {
            let text = format!("{} {} {}", &c[1], &c[2], &c[3]);
            return NaiveDate::parse_from_str(&text, "%d %B %Y")
                .or_else(|_| NaiveDate::parse_from_str(&text, "%d %b %Y"))
                .ok();
        }
        None
    }

    fn is_today(&self, raw: &str, today: NaiveDate) -> bool {
        self.parse_date(raw) == Some(today)
    }

    fn is_upcoming(&self, raw: &str, today: NaiveDate) -> bool {
        self.parse_date(raw).is_some_and(|date| {
            date >= today && date <= today + ChronoDuration::days(DIVIDEND_WINDOW_DAYS)
        })
    }

    /// UMA table: `[date, code, ...]`.
    fn uma(&self, html: &str, today: NaiveDate) -> Vec<String> {
        let codes = self
            .table_rows(html)
            .into_iter()
            .filter(|cells| cells.len() >= 2 && self.is_today(&cells[0], today))
            .filter_map(|cells| self.ticker(&cells[1]));
        dedup(codes)
    }

    /// Suspension table: `[date, code, status, ...]`. Split into new
    /// suspensions and lifted ones; cancelled notices are dropped.
    fn suspensions(&self, html: &str, today: NaiveDate) -> (Vec<String>, Vec<String>) {
        let mut suspended = Vec::new();
        let mut lifted = Vec::new();

        for cells in self.table_rows(html) {
            if cells.len() < 3 || !self.is_today(&cells[0], today) {
                continue;
            }
            let Some(code) = self.ticker(&cells[1]) else {
                continue;
            };
            let status = cells[2].to_lowercase();
            if status.contains("batal") {
                continue;
            }
            if status.contains("unsuspen") || status.contains("pencabutan") {
                lifted.push(code);
            } else if status.contains("suspensi") || status.contains("suspend") {
                suspended.push(code);
            }
        }

        (dedup(suspended), dedup(lifted))
    }

    /// Shareholder meeting table: `[company, code, date, time, place, recording date]`.
    fn rups(&self, html: &str, today: NaiveDate) -> Vec<String> {
        let codes = self
            .table_rows(html)
            .into_iter()
            .filter(|cells| cells.len() >= 6 && self.is_today(&cells[2], today))
            .filter_map(|cells| self.ticker(&cells[1]));
        dedup(codes)
    }

    /// Dividend table: `[code, amount, cum date, ex date, recording, payment]`.
    fn dividends(&self, html: &str, today: NaiveDate) -> Vec<Dividend> {
        let mut out: Vec<Dividend> = Vec::new();
        for cells in self.table_rows(html) {
            if cells.len() < 6 || !self.amount.is_match(&cells[1]) {
                continue;
            }
            let Some(code) = self.ticker(&cells[0]) else {
                continue;
            };
            if !self.is_upcoming(&cells[2], today) && !self.is_upcoming(&cells[3], today) {
                continue;
            }
            if out.iter().any(|d| d.code == code) {
                continue;
            }
            out.push(Dividend {
                code,
                amount: cells[1].clone(),
                cum_date: known(&cells[2]),
                ex_date: known(&cells[3]),
            });
        }
        out
    }
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

fn known(cell: &str) -> Option<String> {
    let cell = cell.trim();
    (!cell.is_empty() && !cell.eq_ignore_ascii_case("n/a")).then(|| cell.to_string())
}

/// Drop repeats, keeping first-seen order.
fn dedup(codes: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for code in codes {
        if !out.contains(&code) {
            out.push(code);
        }
    }
    out
}

/// Scrapes the IDX bulletin sources.
pub struct IdxScraper {
    client: reqwest::Client,
    timeout: Duration,
    patterns: Patterns,
}

impl IdxScraper {
    /// Create from config values.
    pub fn from_config(config: &MarketConfig) -> Result<Self, WabotError> {
        let patterns = Patterns::new()
            .map_err(|e| WabotError::MarketData(format!("invalid pattern: {e}")))?;
        Ok(Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            patterns,
        })
    }

    async fn fetch(&self, url: &str) -> Result<String, WabotError> {
        debug!("idx: GET {url}");
        let resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .header(reqwest::header::ACCEPT_LANGUAGE, ACCEPT_LANGUAGE)
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| WabotError::MarketData(format!("{url}: request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(WabotError::MarketData(format!("{url}: returned {status}")));
        }
        resp.text()
            .await
            .map_err(|e| WabotError::MarketData(format!("{url}: failed to read body: {e}")))
    }

    /// First mirror with matching rows wins. Fails only when every mirror fails.
    async fn fetch_dividends(&self, today: NaiveDate) -> Result<Vec<Dividend>, WabotError> {
        let mut last_error = None;
        let mut answered = false;
        for url in DIVIDEND_URLS {
            match self.fetch(url).await {
                Ok(html) => {
                    answered = true;
                    let found = self.patterns.dividends(&html, today);
                    if !found.is_empty() {
                        return Ok(found);
                    }
                    debug!("idx: no dividend rows at {url}");
                }
                Err(e) => {
                    debug!("idx: {e}");
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) if !answered => Err(e),
            _ => Ok(Vec::new()),
        }
    }

    /// Build a snapshot for `today`.
    pub async fn snapshot_for(&self, today: NaiveDate) -> MarketSnapshot {
        let (uma, suspension, rups, dividends) = tokio::join!(
            self.fetch(UMA_URL),
            self.fetch(SUSPENSION_URL),
            self.fetch(RUPS_URL),
            self.fetch_dividends(today),
        );

        let mut snapshot = MarketSnapshot::empty(today);
        snapshot.uma = or_empty("UMA", uma.map(|html| self.patterns.uma(&html, today)));
        let (suspended, lifted) = or_empty(
            "suspension",
            suspension.map(|html| self.patterns.suspensions(&html, today)),
        );
        snapshot.suspensions = suspended;
        snapshot.unsuspensions = lifted;
        snapshot.rups = or_empty("RUPS", rups.map(|html| self.patterns.rups(&html, today)));
        snapshot.dividends = or_empty("dividend", dividends);

        info!(
            "idx: {} RUPS, {} UMA, {} suspended, {} lifted, {} dividends",
            snapshot.rups.len(),
            snapshot.uma.len(),
            snapshot.suspensions.len(),
            snapshot.unsuspensions.len(),
            snapshot.dividends.len()
        );
        snapshot
    }
}

fn or_empty<T: Default>(source: &str, result: Result<T, WabotError>) -> T {
    result.unwrap_or_else(|e| {
        warn!("idx: {source} source failed: {e}");
        T::default()
    })
}

#[async_trait]
impl MarketData for IdxScraper {
    async fn snapshot(&self) -> Result<MarketSnapshot, WabotError> {
        Ok(self.snapshot_for(Local::now().date_naive()).await)
    }
}
