//! Listing domain model and field normalizers for the plot back office.

use std::fmt;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "plotdesk-core";

static RE_SECTOR_I14_I15: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"i\s*[-/]?\s*(14|15)").unwrap());
static RE_SUBSECTOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b([1-4])\b").unwrap());
static RE_SIZE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\s*[*+xX/]\s*)+").unwrap());
static RE_DECIMAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());

/// Timestamp formats the sheet has been observed to write, tried in order.
const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// One property offering as read from the sheet, raw cells plus derived columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Listing {
    /// Opaque handle back to the persistence row; never issued by this core.
    pub row_id: String,
    pub sector: String,
    pub subsector: String,
    pub plot_no: String,
    pub street_no: String,
    pub plot_size: String,
    pub demand: String,
    pub features: String,
    pub property_type: String,
    pub extracted_name: String,
    pub extracted_contact: String,
    pub timestamp: String,
    pub normalized: Normalized,
}

/// Derived comparison columns, computed once at the ingest boundary and
/// never written back to the sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Normalized {
    pub sector: String,
    pub subsector: String,
    pub size: String,
    pub price: Option<f64>,
    pub contacts: Vec<String>,
    pub timestamp: Option<NaiveDateTime>,
}

impl Listing {
    /// Recomputes the derived columns from the raw cells. Filtering, dedup
    /// and batching all read `normalized`, so callers constructing listings
    /// by hand must go through this.
    pub fn derive(mut self) -> Self {
        let subsector = match normalize_subsector(&self.subsector) {
            s if s.is_empty() => normalize_subsector(&self.sector),
            s => s,
        };
        self.normalized = Normalized {
            sector: normalize_sector(&self.sector),
            subsector,
            size: normalize_size(&self.plot_size),
            price: parse_price(&self.demand),
            contacts: normalize_contacts(&self.extracted_contact),
            timestamp: parse_timestamp(&self.timestamp),
        };
        self
    }

    /// Sectors whose canonical form is I-15 ("i15", "I-15/2", ...) carry
    /// street-level addressing and get the stricter completeness rules.
    pub fn in_i15_family(&self) -> bool {
        self.normalized.sector == "I-15"
    }

    pub fn is_complete(&self) -> bool {
        self.completeness_issues().is_empty()
    }

    pub fn completeness_issues(&self) -> Vec<CompletenessIssue> {
        let mut issues = Vec::new();
        if self.sector.trim().is_empty() {
            issues.push(CompletenessIssue::MissingSector);
        }
        if self.plot_no.trim().is_empty() {
            issues.push(CompletenessIssue::MissingPlotNo);
        } else if contains_ignore_case(&self.plot_no, "series") {
            issues.push(CompletenessIssue::SeriesPlotNo);
        }
        if self.in_i15_family() && self.street_no.trim().is_empty() {
            issues.push(CompletenessIssue::MissingStreetNo);
        }
        if self.plot_size.trim().is_empty() {
            issues.push(CompletenessIssue::MissingPlotSize);
        }
        if self.demand.trim().is_empty() {
            issues.push(CompletenessIssue::MissingDemand);
        } else if contains_ignore_case(&self.demand, "offer required") {
            issues.push(CompletenessIssue::OfferRequiredDemand);
        }
        if self.extracted_name.trim().is_empty() && self.extracted_contact.trim().is_empty() {
            issues.push(CompletenessIssue::MissingNameAndContact);
        }
        issues
    }
}

/// Why a listing fails the completeness contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletenessIssue {
    MissingSector,
    MissingPlotNo,
    SeriesPlotNo,
    MissingStreetNo,
    MissingPlotSize,
    MissingDemand,
    OfferRequiredDemand,
    MissingNameAndContact,
}

impl CompletenessIssue {
    pub fn label(&self) -> &'static str {
        match self {
            Self::MissingSector => "Sector",
            Self::MissingPlotNo => "Plot No",
            Self::SeriesPlotNo => "Plot No (series)",
            Self::MissingStreetNo => "Street No",
            Self::MissingPlotSize => "Plot Size",
            Self::MissingDemand => "Demand",
            Self::OfferRequiredDemand => "Demand (offer required)",
            Self::MissingNameAndContact => "Name/Contact",
        }
    }
}

impl fmt::Display for CompletenessIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An incomplete listing together with the conditions it failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncompleteListing {
    pub listing: Listing,
    pub issues: Vec<CompletenessIssue>,
}

impl IncompleteListing {
    pub fn labels(&self) -> Vec<&'static str> {
        self.issues.iter().map(CompletenessIssue::label).collect()
    }
}

/// Reports every listing with at least one completeness issue. Runs over the
/// full collection, not a filtered view: incomplete rows are surfaced, never
/// silently dropped.
pub fn incomplete_report(listings: &[Listing]) -> Vec<IncompleteListing> {
    listings
        .iter()
        .filter_map(|listing| {
            let issues = listing.completeness_issues();
            if issues.is_empty() {
                None
            } else {
                Some(IncompleteListing {
                    listing: listing.clone(),
                    issues,
                })
            }
        })
        .collect()
}

/// Canonicalizes I-14/I-15 spelling variants ("i 14", "I/15", "i-15/2");
/// anything else comes back trimmed and upper-cased.
pub fn normalize_sector(s: &str) -> String {
    let lower = s.to_lowercase();
    match RE_SECTOR_I14_I15.captures(&lower) {
        Some(caps) => format!("I-{}", &caps[1]),
        None => s.trim().to_uppercase(),
    }
}

/// First word-bounded digit 1-4, so "i 15/2" yields "2" but the "1" in "15"
/// does not count. Empty string when absent.
pub fn normalize_subsector(s: &str) -> String {
    RE_SUBSECTOR
        .captures(s)
        .map(|caps| caps[1].to_string())
        .unwrap_or_default()
}

/// Collapses every run of `* + x X /` separators (whitespace included) into
/// a single lower-case `x`, so "5*10", "5 X 10" and "5x10" all compare equal.
pub fn normalize_size(s: &str) -> String {
    RE_SIZE_SEPARATOR
        .replace_all(s, "x")
        .to_lowercase()
        .trim()
        .to_string()
}

/// Canonical domestic phone form: exactly 10 digits with country code and
/// leading zero stripped. Fewer than 10 digits in the input yields whatever
/// digits remain, which callers must treat as non-matchable.
pub fn normalize_phone(s: &str) -> String {
    let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 12 && digits.starts_with("92") {
        digits[2..].to_string()
    } else if digits.len() == 11 && digits.starts_with("03") {
        digits[1..].to_string()
    } else if digits.len() >= 10 {
        digits[digits.len() - 10..].to_string()
    } else {
        digits
    }
}

/// A canonical contact is matchable only in its full 10-digit form.
pub fn is_canonical_contact(s: &str) -> bool {
    s.len() == 10 && s.chars().all(|c| c.is_ascii_digit())
}

/// Splits a comma-separated contact cell into canonical phone numbers,
/// dropping empties and duplicates while preserving first-seen order.
pub fn normalize_contacts(s: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for part in s.split(',') {
        let phone = normalize_phone(part);
        if !phone.is_empty() && !out.contains(&phone) {
            out.push(phone);
        }
    }
    out
}

/// Parses a demand cell into a number. Prices are quoted in Lacs; "cr" and
/// "crore" suffixes are substituted literally with "00" rather than
/// multiplied out, and saved price filters depend on the parsed values
/// staying that way. `None` means "exclude from numeric price filtering
/// only", never "drop the listing".
pub fn parse_price(s: &str) -> Option<f64> {
    let cleaned = s
        .to_lowercase()
        .replace(',', "")
        .replace("crore", "00")
        .replace("cr", "00");
    let found = RE_DECIMAL.find(&cleaned)?;
    found.as_str().parse().ok()
}

/// Lenient parse of the sheet's creation-time cell. Naive local time; the
/// caller supplies `now` wherever a window is computed.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// First run of ASCII digits in a field ("St 12-B" -> 12). Used as the sort
/// key for message ordering; fields without digits sort last.
pub fn first_number(s: &str) -> Option<u64> {
    let mut digits = String::new();
    for ch in s.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
        } else if !digits.is_empty() {
            break;
        }
    }
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
