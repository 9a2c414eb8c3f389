//! Domain model types.

use serde::{Deserialize, Serialize};

/// Width store numbers are zero-padded to for display and lookup.
pub const STORE_NUMBER_WIDTH: usize = 4;

const TICKET_PREFIX: &str = "HD-";

/// A monitored store entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    /// Store number, zero-padded to four digits.
    pub number: String,
    /// Explicit WAN address to probe. Empty means "use the IP list fallback".
    #[serde(default)]
    pub ip: String,
    /// ISP label, informational only.
    #[serde(default)]
    pub isp: String,
    /// Helpdesk ticket reference, stored raw.
    #[serde(default)]
    pub helpdesk_ticket: String,
}

impl Store {
    pub fn new(number: &str, ip: &str) -> Self {
        Self {
            number: normalize_number(number),
            ip: ip.trim().to_string(),
            isp: String::new(),
            helpdesk_ticket: String::new(),
        }
    }

    pub fn with_details(mut self, isp: &str, helpdesk_ticket: &str) -> Self {
        self.isp = isp.trim().to_string();
        self.helpdesk_ticket = helpdesk_ticket.trim().to_string();
        self
    }
}

/// Canonical form of a store number: trimmed and zero-padded to four digits.
/// Empty input stays empty so callers can reject it.
pub fn normalize_number(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    format!("{:0>1$}", trimmed, STORE_NUMBER_WIDTH)
}

/// Normalize a helpdesk ticket to always carry the `HD-` prefix.
pub fn format_ticket(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.starts_with(TICKET_PREFIX) {
        trimmed.to_string()
    } else {
        format!("{TICKET_PREFIX}{trimmed}")
    }
}

/// Browsable helpdesk URL for an already-normalized ticket.
pub fn helpdesk_url(ticket: &str, prefix: &str) -> Option<String> {
    if ticket.is_empty() {
        None
    } else {
        Some(format!("{prefix}{ticket}"))
    }
}
