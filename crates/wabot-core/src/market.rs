//! Daily stock-exchange bulletin: shareholder meetings, unusual market
//! activity, suspensions and dividends.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// One dividend announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dividend {
    pub code: String,
    pub amount: String,
    pub cum_date: Option<String>,
    pub ex_date: Option<String>,
}

/// Everything scheduled for one trading day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub date: NaiveDate,
    /// Shareholder meetings (RUPS).
    pub rups: Vec<String>,
    /// Unusual market activity announcements.
    pub uma: Vec<String>,
    pub unsuspensions: Vec<String>,
    pub suspensions: Vec<String>,
    pub dividends: Vec<Dividend>,
}

impl MarketSnapshot {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            rups: Vec::new(),
            uma: Vec::new(),
            unsuspensions: Vec::new(),
            suspensions: Vec::new(),
            dividends: Vec::new(),
        }
    }

    /// Chat-formatted bulletin. Empty sections show `-`.
    pub fn render(&self) -> String {
        let mut out = format!(
            "📊 *IDX Market Data for {}*\n\n",
            self.date.format("%d-%b-%Y")
        );

        push_codes(&mut out, "🏛️ *RUPS*", &self.rups);
        push_codes(&mut out, "🔥 *UMA*", &self.uma);
        push_codes(&mut out, "✅ *Unsuspensi*", &self.unsuspensions);
        push_codes(&mut out, "⏸️ *Suspensi*", &self.suspensions);

        out.push_str("💰 *DIVIDEND*\n");
        if self.dividends.is_empty() {
            out.push_str("-\n");
        }
        for div in &self.dividends {
            let _ = writeln!(out, "{} (Div. Rp {})", div.code, div.amount);
            if let Some(cum) = &div.cum_date {
                let _ = writeln!(out, "Cum Date: {cum}");
            }
            if let Some(ex) = &div.ex_date {
                let _ = writeln!(out, "Ex Date: {ex}");
            }
        }

        out.trim_end().to_string()
    }
}

fn push_codes(out: &mut String, title: &str, codes: &[String]) {
    out.push_str(title);
    out.push('\n');
    if codes.is_empty() {
        out.push_str("-\n");
    } else {
        for code in codes {
            out.push_str(code);
            out.push('\n');
        }
    }
    out.push('\n');
}
