// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Postal address splitting and joining.
//!
//! Boards keep addresses in a single free-text column while the local store
//! has separate street, city, state and ZIP columns.

use std::sync::LazyLock;

use regex::Regex;

static LINE_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\n,]+").expect("valid line split pattern"));

static CITY_STATE_ZIP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z]+)[,\s]+([A-Za-z]{2})[,\s]+(\d{5}(?:-\d{4})?)")
        .expect("valid city/state/zip pattern")
});

static STATE_ZIP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z]{2})[,\s]+(\d{5}(?:-\d{4})?)").expect("valid state/zip pattern")
});

/// Address split into its components. Unknown parts stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
}

impl Address {
    /// True when no component was recognized.
    pub fn is_empty(&self) -> bool {
        self.street.is_none() && self.city.is_none() && self.state.is_none() && self.zip.is_none()
    }
}

/// Split a free-text address.
///
/// The first comma- or newline-separated segment is the street. The
/// remaining segments are scanned for `City ST 12345` and then for
/// `ST 12345`; in the latter case the second segment is taken as the city
/// when at least three segments exist.
pub fn parse_address(raw: &str) -> Address {
    let lines: Vec<&str> = LINE_SPLIT
        .split(raw)
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let Some(first) = lines.first() else {
        return Address::default();
    };

    let mut address = Address {
        street: Some(first.to_string()),
        ..Address::default()
    };

    for line in &lines[1..] {
        if let Some(caps) = CITY_STATE_ZIP.captures(line) {
            address.city = Some(caps[1].to_string());
            address.state = Some(caps[2].to_string());
            address.zip = Some(caps[3].to_string());
            break;
        }
        if let Some(caps) = STATE_ZIP.captures(line) {
            address.state = Some(caps[1].to_string());
            address.zip = Some(caps[2].to_string());
            if lines.len() > 2 {
                address.city = Some(lines[1].to_string());
            }
            break;
        }
    }

    address
}

/// Join address components as `street, city, state, zip`, skipping blanks.
pub fn format_address(
    street: Option<&str>,
    city: Option<&str>,
    state: Option<&str>,
    zip: Option<&str>,
) -> String {
    [street, city, state, zip]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_street_city_state_zip() {
        // Commas split segments, so city/state/zip land on separate lines
        let address = parse_address("12 Main St, Springfield, IL 62701");
        assert_eq!(address.street.as_deref(), Some("12 Main St"));
        assert_eq!(address.city.as_deref(), Some("Springfield"));
        assert_eq!(address.state.as_deref(), Some("IL"));
        assert_eq!(address.zip.as_deref(), Some("62701"));
    }

    #[test]
    fn test_parse_single_line_location() {
        let address = parse_address("12 Main St\nDallas TX 75201-1234");
        assert_eq!(address.street.as_deref(), Some("12 Main St"));
        assert_eq!(address.city.as_deref(), Some("Dallas"));
        assert_eq!(address.state.as_deref(), Some("TX"));
        assert_eq!(address.zip.as_deref(), Some("75201-1234"));
    }

    #[test]
    fn test_parse_street_only() {
        let address = parse_address("  42 Elm Road  ");
        assert_eq!(address.street.as_deref(), Some("42 Elm Road"));
        assert!(address.city.is_none());
        assert!(address.zip.is_none());
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_address("").is_empty());
        assert!(parse_address(" ,\n ").is_empty());
    }

    #[test]
    fn test_format_skips_blanks() {
        assert_eq!(
            format_address(Some("12 Main St"), Some("Springfield"), Some("IL"), Some("62701")),
            "12 Main St, Springfield, IL, 62701"
        );
        assert_eq!(format_address(None, Some(""), Some("TX"), None), "TX");
        assert_eq!(format_address(None, None, None, None), "");
    }
}
