//! Read-only store-number → IP fallback table, loaded once at startup.

use std::collections::HashMap;
use std::path::Path;

use crate::repo::normalize_number;

const ID_HEADER: &str = "Store ID";
const IP_HEADER: &str = "IP Address";

/// The `Store ID,IP Address` table. Immutable after load; share by `Arc`.
pub struct StoreIpList {
    map: HashMap<String, String>,
}

impl StoreIpList {
    pub fn empty() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Load the CSV, tolerating a missing file (empty table, logged).
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let list = Self::parse(&text);
                tracing::info!(
                    "loaded {} IP list entries from {}",
                    list.len(),
                    path.display()
                );
                list
            }
            Err(err) => {
                tracing::warn!(
                    "IP list {} not readable ({}), continuing without fallback addresses",
                    path.display(),
                    err
                );
                Self::empty()
            }
        }
    }

    /// Parse CSV text with `Store ID` and `IP Address` header columns.
    /// Rows with an empty id or address are skipped; without the expected
    /// headers the table is empty.
    pub fn parse(text: &str) -> Self {
        let mut lines = text.lines();
        let Some(header) = lines.next() else {
            return Self::empty();
        };
        let columns: Vec<&str> = header.split(',').map(str::trim).collect();
        let Some(id_col) = columns.iter().position(|c| *c == ID_HEADER) else {
            return Self::empty();
        };
        let Some(ip_col) = columns.iter().position(|c| *c == IP_HEADER) else {
            return Self::empty();
        };

        let mut map = HashMap::new();
        for line in lines {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let id = fields.get(id_col).copied().unwrap_or("");
            let ip = fields.get(ip_col).copied().unwrap_or("");
            if id.is_empty() || ip.is_empty() {
                continue;
            }
            map.insert(normalize_number(id), ip.to_string());
        }
        Self { map }
    }

    /// Fallback address for a store number, normalized before lookup.
    pub fn resolve(&self, number: &str) -> Option<&str> {
        let key = normalize_number(number);
        if key.is_empty() {
            return None;
        }
        self.map.get(&key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
