//! Ingest boundary: header-keyed sheet rows into typed listings.

use std::collections::BTreeMap;

use plotdesk_core::Listing;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, warn};

pub const CRATE_NAME: &str = "plotdesk-ingest";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("expected a JSON array of row objects")]
    NotAnArray,
    #[error("row {index} is not a JSON object")]
    RowNotAnObject { index: usize },
    #[error("row {index} has no usable row id")]
    MissingRowId { index: usize },
}

/// One spreadsheet row as handed over by the persistence collaborator: the
/// opaque row id plus header-keyed cell text. Content defects never fail a
/// row; every cell degrades to the empty string and the structural contract
/// is only the row id itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SheetRow {
    pub row_id: String,
    pub cells: BTreeMap<String, String>,
}

impl SheetRow {
    pub fn to_listing(&self) -> Listing {
        Listing {
            row_id: self.row_id.clone(),
            sector: self.cell(&["sector"]),
            subsector: self.cell(&["subsector", "sub sector"]),
            plot_no: self.cell(&["plot no", "plot#", "plot no.", "plot number"]),
            street_no: self.cell(&["street no", "street#", "st no", "street no."]),
            plot_size: self.cell(&["plot size", "size"]),
            demand: self.cell(&["demand", "demand (lacs)", "price"]),
            features: self.cell(&["features", "extracted features"]),
            property_type: self.cell(&["property type", "type"]),
            extracted_name: self.cell(&["extracted name", "name", "dealer name"]),
            extracted_contact: self.cell(&["extracted contact", "contact", "contact no", "phone"]),
            timestamp: self.cell(&["timestamp", "date", "created at"]),
            ..Listing::default()
        }
        .derive()
    }

    /// First alias with a cell wins. Headers compare case-insensitively with
    /// inner whitespace collapsed, so "Plot  No" and "plot no" are the same
    /// column.
    fn cell(&self, aliases: &[&str]) -> String {
        for alias in aliases {
            for (header, value) in &self.cells {
                if canonical_header(header) == *alias {
                    return value.clone();
                }
            }
        }
        String::new()
    }
}

/// Maps rows to listings, preserving sheet order.
pub fn listings_from_rows(rows: &[SheetRow]) -> Vec<Listing> {
    rows.iter().map(SheetRow::to_listing).collect()
}

/// Accepts the JSON shape the spreadsheet collaborator hands over: an array
/// of objects, one per row. Non-string scalars are coerced to their display
/// text, null and missing cells become empty strings, and the only
/// structural error is a missing row id.
pub fn listings_from_json(value: &JsonValue) -> Result<Vec<Listing>, IngestError> {
    let rows = value.as_array().ok_or(IngestError::NotAnArray)?;
    let mut listings = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let object = row.as_object().ok_or(IngestError::RowNotAnObject { index })?;
        let mut sheet_row = SheetRow::default();
        for (header, cell) in object {
            let canonical = canonical_header(header);
            let text = cell_text(&canonical, cell);
            if matches!(canonical.as_str(), "row id" | "row_id" | "_row_id" | "id") {
                sheet_row.row_id = text;
            } else {
                sheet_row.cells.insert(canonical, text);
            }
        }
        if sheet_row.row_id.trim().is_empty() {
            return Err(IngestError::MissingRowId { index });
        }
        listings.push(sheet_row.to_listing());
    }
    debug!(rows = listings.len(), "ingested listing rows");
    Ok(listings)
}

/// Deduplicated raw sector values, case-insensitively ordered with the first
/// casing kept. These are the values the dashboard offers as filter choices,
/// which is why the sector filter matches raw cell text exactly.
pub fn distinct_sectors(listings: &[Listing]) -> Vec<String> {
    distinct_values(listings, |l| &l.sector)
}

/// Raw plot-size filter choices, same rules as [`distinct_sectors`].
pub fn distinct_sizes(listings: &[Listing]) -> Vec<String> {
    distinct_values(listings, |l| &l.plot_size)
}

fn distinct_values<F>(listings: &[Listing], field: F) -> Vec<String>
where
    F: Fn(&Listing) -> &String,
{
    let mut out: Vec<String> = Vec::new();
    for listing in listings {
        let value = field(listing).trim();
        if value.is_empty() {
            continue;
        }
        if !out.iter().any(|seen| seen.eq_ignore_ascii_case(value)) {
            out.push(value.to_string());
        }
    }
    out.sort_by_key(|v| v.to_lowercase());
    out
}

fn canonical_header(header: &str) -> String {
    header
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn cell_text(header: &str, value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Null => String::new(),
        _ => {
            warn!(header, "ignoring non-scalar cell");
            String::new()
        }
    }
}
