//! Display formatting helpers
//!
//! Converts dates, counts, account ids and transaction ids into the
//! strings the API and CLI show to people.

use chrono::{DateTime, NaiveDate, Utc};

use crate::ledger::is_local_transaction_id;

/// `Oct 16, 2026`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

/// `Oct 16, 2026 14:05 UTC`
pub fn format_datetime(ts: DateTime<Utc>) -> String {
    ts.format("%b %-d, %Y %H:%M UTC").to_string()
}

/// Human relative time such as `3 days ago`
pub fn format_relative(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - ts).num_seconds();
    if secs < 0 {
        return "in the future".to_string();
    }

    let (value, unit) = match secs {
        0..=59 => return "just now".to_string(),
        60..=3599 => (secs / 60, "minute"),
        3600..=86_399 => (secs / 3600, "hour"),
        86_400..=2_591_999 => (secs / 86_400, "day"),
        2_592_000..=31_535_999 => (secs / 2_592_000, "month"),
        _ => (secs / 31_536_000, "year"),
    };

    format!("{} {}{} ago", value, unit, if value == 1 { "" } else { "s" })
}

/// Thousands separators: `1234567` → `1,234,567`
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Compact counts: `950`, `1.2K`, `3.4M`
pub fn format_compact(n: u64) -> String {
    match n {
        0..=999 => n.to_string(),
        1_000..=999_999 => trim_decimal(n as f64 / 1_000.0, "K"),
        _ => trim_decimal(n as f64 / 1_000_000.0, "M"),
    }
}

fn trim_decimal(value: f64, suffix: &str) -> String {
    let s = format!("{:.1}", value);
    let s = s.strip_suffix(".0").unwrap_or(&s);
    format!("{}{}", s, suffix)
}

/// Normalized account id, or `None` when it is not `shard.realm.num`
pub fn format_account_id(account_id: &str) -> Option<String> {
    let trimmed = account_id.trim();
    let parts: Vec<&str> = trimmed.split('.').collect();
    if parts.len() != 3 {
        return None;
    }

    let nums: Option<Vec<u64>> = parts.iter().map(|p| p.parse::<u64>().ok()).collect();
    nums.map(|n| format!("{}.{}.{}", n[0], n[1], n[2]))
}

/// Shorten a transaction id for display, keeping both ends
pub fn format_transaction_id(tx_id: &str) -> String {
    if is_local_transaction_id(tx_id) {
        return "Local only".to_string();
    }

    let chars: Vec<char> = tx_id.chars().collect();
    if chars.len() <= 20 {
        return tx_id.to_string();
    }

    let head: String = chars[..10].iter().collect();
    let tail: String = chars[chars.len() - 8..].iter().collect();
    format!("{}...{}", head, tail)
}

/// HashScan explorer link for a confirmed transaction
pub fn explorer_url(network: &str, tx_id: &str) -> Option<String> {
    if is_local_transaction_id(tx_id) {
        return None;
    }
    Some(format!(
        "https://hashscan.io/{}/transaction/{}",
        network, tx_id
    ))
}

/// `1 day`, `12 days`
pub fn format_streak(days: u32) -> String {
    if days == 1 {
        "1 day".to_string()
    } else {
        format!("{} days", days)
    }
}

/// Tinybars to a human HBAR amount (`150000000` → `1.5 ℏ`)
pub fn format_hbar(tinybars: i64) -> String {
    let hbar = tinybars as f64 / 100_000_000.0;
    let s = format!("{:.8}", hbar);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    format!("{} ℏ", s)
}
