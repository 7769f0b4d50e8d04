//! Outbound message batching: filtered listings into broadcast-ready text.

use std::collections::BTreeMap;

use plotdesk_core::{first_number, CompletenessIssue, Listing};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const CRATE_NAME: &str = "plotdesk-outbound";

/// Practical per-message limit of the transport.
pub const MESSAGE_CHAR_BUDGET: usize = 4000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOptions {
    /// Append the raw feature text to each line when present.
    pub include_features: bool,
    pub char_budget: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            include_features: false,
            char_budget: MESSAGE_CHAR_BUDGET,
        }
    }
}

/// One `*sector (size)*` header plus its formatted listing lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageBlock {
    pub sector: String,
    pub size: String,
    pub lines: Vec<String>,
}

impl MessageBlock {
    pub fn render(&self) -> String {
        format!("*{} ({})*\n{}", self.sector, self.size, self.lines.join("\n"))
    }
}

pub struct MessageBatcher {
    options: BatchOptions,
}

impl MessageBatcher {
    pub fn new(options: BatchOptions) -> Self {
        Self { options }
    }

    /// A listing may be advertised when every offer field is usable; a
    /// missing name/contact hides nothing here.
    pub fn is_eligible(listing: &Listing) -> bool {
        listing
            .completeness_issues()
            .iter()
            .all(|issue| *issue == CompletenessIssue::MissingNameAndContact)
    }

    /// Eligible listings deduplicated per offer, grouped into one block per
    /// (sector, size) and sorted for display.
    pub fn build_blocks(&self, listings: &[Listing]) -> Vec<MessageBlock> {
        // Identical offers collapse to the cheapest parsed copy; the first
        // encountered wins ties, deterministically.
        let mut deduped: BTreeMap<String, &Listing> = BTreeMap::new();
        for listing in listings.iter().filter(|l| Self::is_eligible(l)) {
            let key = offer_key(listing);
            match deduped.get(&key) {
                Some(existing) if effective_price(listing) >= effective_price(existing) => {}
                _ => {
                    deduped.insert(key, listing);
                }
            }
        }

        let mut by_group: BTreeMap<(String, String), Vec<&Listing>> = BTreeMap::new();
        for listing in deduped.into_values() {
            let group = (upper_trim(&listing.sector), listing.normalized.size.clone());
            by_group.entry(group).or_default().push(listing);
        }

        let mut blocks = Vec::with_capacity(by_group.len());
        for ((sector, size), mut members) in by_group {
            sort_for_display(&mut members);
            let lines = members.iter().map(|l| self.line_for(l)).collect();
            blocks.push(MessageBlock { sector, size, lines });
        }
        blocks
    }

    /// Packs rendered blocks into messages under the character budget,
    /// splitting only at block boundaries and never inside a block. A single
    /// block over the budget goes out alone.
    pub fn pack(&self, blocks: &[MessageBlock]) -> Vec<String> {
        let mut messages = Vec::new();
        let mut current = String::new();
        for block in blocks {
            let rendered = block.render();
            if current.is_empty() {
                current = rendered;
                continue;
            }
            let joined_len = char_len(&current) + 2 + char_len(&rendered);
            if joined_len > self.options.char_budget {
                messages.push(std::mem::take(&mut current));
                current = rendered;
            } else {
                current.push_str("\n\n");
                current.push_str(&rendered);
            }
        }
        if !current.is_empty() {
            messages.push(current);
        }
        messages
    }

    pub fn build_messages(&self, listings: &[Listing]) -> Vec<String> {
        let blocks = self.build_blocks(listings);
        let messages = self.pack(&blocks);
        debug!(
            input = listings.len(),
            blocks = blocks.len(),
            messages = messages.len(),
            "built outbound messages"
        );
        messages
    }

    fn line_for(&self, listing: &Listing) -> String {
        let mut line = if listing.in_i15_family() {
            format!(
                "St# {} | Plot# {} | Size {} | Demand {}",
                listing.street_no.trim(),
                listing.plot_no.trim(),
                listing.normalized.size,
                listing.demand.trim(),
            )
        } else {
            format!(
                "Plot# {} | Size {} | Demand {}",
                listing.plot_no.trim(),
                listing.normalized.size,
                listing.demand.trim(),
            )
        };
        if self.options.include_features {
            let features = listing.features.trim();
            if !features.is_empty() {
                line.push_str(" | ");
                line.push_str(features);
            }
        }
        line
    }
}

/// The same plot advertised at the same demand is one offer regardless of
/// who reported it.
fn offer_key(listing: &Listing) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        upper_trim(&listing.sector),
        upper_trim(&listing.plot_no),
        upper_trim(&listing.street_no),
        upper_trim(&listing.plot_size),
        upper_trim(&listing.demand),
    )
}

fn effective_price(listing: &Listing) -> f64 {
    listing.normalized.price.unwrap_or(f64::INFINITY)
}

/// I-15 streets sort first because its addressing is street-major; every
/// other sector reads plot-major. Fields without digits sort last.
fn sort_for_display(members: &mut [&Listing]) {
    members.sort_by_key(|l| {
        let plot = first_number(&l.plot_no).unwrap_or(u64::MAX);
        let street = first_number(&l.street_no).unwrap_or(u64::MAX);
        if l.in_i15_family() {
            (street, plot)
        } else {
            (plot, street)
        }
    });
}

fn upper_trim(s: &str) -> String {
    s.trim().to_uppercase()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
