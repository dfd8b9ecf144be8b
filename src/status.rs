//! Status placeholders and the text they show.
//!
//! The provider behind [`crate::platform::StatusProvider`] returns raw values;
//! everything here is pure so the refresh path can be tested without a Mac.

use std::fmt::Write as _;

use chrono::{DateTime, Local};

const PREVIEW_MAX_CHARS: usize = 32;
const UNKNOWN: &str = "--";

/// Identity of a status placeholder in the render model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatusSlot {
    Time,
    Battery,
    Wifi,
    Clipboard,
}

impl StatusSlot {
    /// Fixed display order.
    pub const ALL: [StatusSlot; 4] = [
        StatusSlot::Time,
        StatusSlot::Battery,
        StatusSlot::Wifi,
        StatusSlot::Clipboard,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StatusSlot::Time => "Time",
            StatusSlot::Battery => "Battery",
            StatusSlot::Wifi => "Wi-Fi",
            StatusSlot::Clipboard => "Clipboard",
        }
    }

    pub fn placeholder(self) -> String {
        format!("{}: {UNKNOWN}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub time: DateTime<Local>,
    pub battery: Option<String>,
    pub wifi: Option<String>,
    /// Short single-line preview; `None` when the clipboard holds no text.
    pub clipboard: Option<String>,
}

/// Text for one placeholder, given a fresh snapshot.
pub fn status_text(slot: StatusSlot, snapshot: &StatusSnapshot, time_format: &str) -> String {
    let value = match slot {
        StatusSlot::Time => format_time(&snapshot.time, time_format),
        StatusSlot::Battery => snapshot.battery.clone().unwrap_or_else(|| UNKNOWN.to_string()),
        StatusSlot::Wifi => snapshot.wifi.clone().unwrap_or_else(|| UNKNOWN.to_string()),
        StatusSlot::Clipboard => snapshot
            .clipboard
            .clone()
            .unwrap_or_else(|| "Empty".to_string()),
    };
    format!("{}: {value}", slot.label())
}

pub fn format_time(time: &DateTime<Local>, pattern: &str) -> String {
    let strftime = to_strftime(pattern);
    let mut out = String::new();
    match write!(out, "{}", time.format(&strftime)) {
        Ok(()) => out,
        Err(_) => UNKNOWN.to_string(),
    }
}

/// Translates a date-format pattern (`EEE, MMM d h:mm a`) into a strftime
/// string. Quoted text is literal; unsupported letters pass through as-is.
pub fn to_strftime(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\'' {
            if chars.peek() == Some(&'\'') {
                chars.next();
                out.push('\'');
                continue;
            }
            while let Some(q) = chars.next() {
                if q == '\'' {
                    if chars.peek() == Some(&'\'') {
                        chars.next();
                        out.push('\'');
                        continue;
                    }
                    break;
                }
                push_literal(&mut out, q);
            }
            continue;
        }

        if !c.is_ascii_alphabetic() {
            push_literal(&mut out, c);
            continue;
        }

        let mut run = 1;
        while chars.peek() == Some(&c) {
            chars.next();
            run += 1;
        }

        let spec = match (c, run) {
            ('E', 1..=3) => "%a",
            ('E', _) => "%A",
            ('M' | 'L', 1) => "%-m",
            ('M' | 'L', 2) => "%m",
            ('M' | 'L', 3) => "%b",
            ('M' | 'L', _) => "%B",
            ('d', 1) => "%-d",
            ('d', _) => "%d",
            ('y', 2) => "%y",
            ('y', _) => "%Y",
            ('H', 1) => "%-H",
            ('H', _) => "%H",
            ('h', 1) => "%-I",
            ('h', _) => "%I",
            ('m', 1) => "%-M",
            ('m', _) => "%M",
            ('s', 1) => "%-S",
            ('s', _) => "%S",
            ('a', _) => "%p",
            ('z', _) => "%Z",
            ('Z', _) => "%z",
            _ => {
                for _ in 0..run {
                    push_literal(&mut out, c);
                }
                continue;
            }
        };
        out.push_str(spec);
    }

    out
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

/// Battery summary from `pmset -g batt`.
pub fn parse_pmset_battery(raw: &str) -> Option<String> {
    // Example:
    // Now drawing from 'Battery Power'
    //  -InternalBattery-0 (id=4653155)	85%; discharging; 4:12 remaining present: true
    for line in raw.lines() {
        let Some(pct_end) = line.find('%') else {
            continue;
        };
        let head = &line[..pct_end];
        // Only ASCII digits are trimmed, so the split stays on a char boundary.
        let digits_start = head.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        let percent = &head[digits_start..];
        if percent.is_empty() {
            continue;
        }

        let state = line[pct_end + 1..]
            .split(';')
            .map(str::trim)
            .find(|s| !s.is_empty());
        return Some(match state {
            Some(state) => format!("{percent}% ({state})"),
            None => format!("{percent}%"),
        });
    }
    None
}

/// Network name from `networksetup -getairportnetwork <iface>`.
pub fn parse_airport_network(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    if let Some((_, name)) = line.split_once("Network:") {
        let name = name.trim();
        if !name.is_empty() {
            return Some(name.to_string());
        }
    }
    if line.contains("not associated") {
        return Some("Not connected".to_string());
    }
    None
}

/// Collapses whitespace and truncates clipboard text for the menu.
pub fn clipboard_preview(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    if collapsed.chars().count() <= PREVIEW_MAX_CHARS {
        return Some(collapsed);
    }
    let mut short: String = collapsed.chars().take(PREVIEW_MAX_CHARS).collect();
    short.push('…');
    Some(short)
}
