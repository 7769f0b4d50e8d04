//! Filter engine, duplicate detector and dealer directory over listing collections.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime};
use plotdesk_core::{is_canonical_contact, normalize_phone, Listing};
use serde::{Deserialize, Serialize};
use strsim::normalized_levenshtein;
use tracing::debug;

pub const CRATE_NAME: &str = "plotdesk-engine";

/// Closest-match similarity a selected feature token needs against one of a
/// listing's feature tags.
const FEATURE_MATCH_THRESHOLD: f64 = 0.7;

/// Duplicate groups cycle through this many display colors.
pub const GROUP_COLOR_COUNT: usize = 8;

/// One dashboard filter state. Everything is inactive by default. The caller
/// owns the state lifecycle and supplies a value per call; nothing in this
/// crate keeps session state between invocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FilterConfig {
    #[serde(default)]
    pub sectors: Vec<String>,
    #[serde(default)]
    pub plot_sizes: Vec<String>,
    #[serde(default)]
    pub street_query: String,
    #[serde(default)]
    pub plot_query: String,
    #[serde(default)]
    pub contact_query: String,
    #[serde(default)]
    pub price_from: Option<f64>,
    #[serde(default)]
    pub price_to: Option<f64>,
    #[serde(default)]
    pub features: Vec<String>,
    /// None means "All"; Some(n) keeps listings stamped within the last n days.
    #[serde(default)]
    pub date_window_days: Option<i64>,
    /// OFF by default: listings with neither a name nor a contact are hidden.
    #[serde(default)]
    pub include_missing_contact: bool,
    #[serde(default)]
    pub dealer: Option<String>,
}

/// Applies every active filter in one pass; active filters AND together.
/// Survivors keep their input order, so composition is order-independent.
pub fn apply_filters(
    listings: &[Listing],
    config: &FilterConfig,
    synonyms: &FeatureSynonyms,
    now: NaiveDateTime,
) -> Vec<Listing> {
    let any_price_parses = listings.iter().any(|l| l.normalized.price.is_some());
    let query_contact = canonical_query_contact(&config.contact_query);
    let dealer_contacts = config
        .dealer
        .as_deref()
        .map(|dealer| DealerDirectory::from_listings(listings).contacts_for(dealer));

    let kept: Vec<Listing> = listings
        .iter()
        .filter(|listing| {
            passes_membership(&listing.sector, &config.sectors)
                && passes_membership(&listing.plot_size, &config.plot_sizes)
                && passes_substring(&listing.street_no, &config.street_query)
                && passes_substring(&listing.plot_no, &config.plot_query)
                && passes_contact(listing, query_contact.as_deref())
                && passes_price(listing, config, any_price_parses)
                && passes_features(listing, &config.features, synonyms)
                && passes_date_window(listing, config.date_window_days, now)
                && passes_identity(listing, config.include_missing_contact)
                && passes_dealer(listing, dealer_contacts.as_ref())
        })
        .cloned()
        .collect();

    debug!(input = listings.len(), kept = kept.len(), "applied listing filters");
    kept
}

/// Dropdown filters match the raw cell value exactly: the choices offered to
/// the user are themselves raw values.
fn passes_membership(raw_value: &str, selected: &[String]) -> bool {
    selected.is_empty() || selected.iter().any(|s| s == raw_value)
}

fn passes_substring(field: &str, query: &str) -> bool {
    let query = query.trim();
    query.is_empty() || field.to_lowercase().contains(&query.to_lowercase())
}

fn canonical_query_contact(query: &str) -> Option<String> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(normalize_phone(trimmed))
}

fn passes_contact(listing: &Listing, query: Option<&str>) -> bool {
    match query {
        None => true,
        // A query that canonicalizes short of 10 digits matches nothing.
        Some(canonical) => {
            is_canonical_contact(canonical)
                && listing.normalized.contacts.iter().any(|c| c == canonical)
        }
    }
}

fn passes_price(listing: &Listing, config: &FilterConfig, any_price_parses: bool) -> bool {
    if config.price_from.is_none() && config.price_to.is_none() {
        return true;
    }
    // Until at least one listing in the collection parses a price, the range
    // filter is inert rather than hiding everything.
    if !any_price_parses {
        return true;
    }
    match listing.normalized.price {
        Some(price) => {
            config.price_from.map_or(true, |from| price >= from)
                && config.price_to.map_or(true, |to| price <= to)
        }
        None => false,
    }
}

/// Every selected token must match; a single token matches via exact tag
/// equality, a synonym phrase occurring in the feature text, or closest-match
/// similarity against any tag.
fn passes_features(listing: &Listing, selected: &[String], synonyms: &FeatureSynonyms) -> bool {
    if selected.is_empty() {
        return true;
    }
    let feature_text = listing.features.to_lowercase();
    let tags: Vec<String> = listing
        .features
        .split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    selected
        .iter()
        .all(|token| feature_token_matches(token, &feature_text, &tags, synonyms))
}

fn feature_token_matches(
    token: &str,
    feature_text: &str,
    tags: &[String],
    synonyms: &FeatureSynonyms,
) -> bool {
    let token = token.trim().to_lowercase();
    if token.is_empty() {
        return true;
    }
    if tags.iter().any(|tag| tag == &token) {
        return true;
    }
    if synonyms
        .variants(&token)
        .iter()
        .any(|variant| feature_text.contains(variant.as_str()))
    {
        return true;
    }
    tags.iter()
        .any(|tag| normalized_levenshtein(&token, tag) >= FEATURE_MATCH_THRESHOLD)
}

fn passes_date_window(listing: &Listing, window_days: Option<i64>, now: NaiveDateTime) -> bool {
    match window_days {
        None => true,
        Some(days) => match listing.normalized.timestamp {
            Some(ts) => ts >= now - Duration::days(days) && ts <= now,
            // An active window drops rows whose timestamp never parsed.
            None => false,
        },
    }
}

fn passes_identity(listing: &Listing, include_missing_contact: bool) -> bool {
    include_missing_contact
        || !(listing.extracted_contact.trim().is_empty()
            && listing.extracted_name.trim().is_empty())
}

fn passes_dealer(listing: &Listing, dealer_contacts: Option<&BTreeSet<String>>) -> bool {
    match dealer_contacts {
        None => true,
        Some(contacts) => listing
            .normalized
            .contacts
            .iter()
            .any(|c| contacts.contains(c)),
    }
}

/// One group of equivalent feature phrases ("ssr" and "south service road").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynonymGroup {
    pub token: String,
    pub variants: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SynonymRulesFile {
    #[allow(dead_code)]
    version: u32,
    #[serde(default)]
    groups: Vec<SynonymGroup>,
}

/// Feature synonym table. Plain data loaded once at startup from
/// rules/feature_synonyms.yaml, with a compiled-in fallback table.
#[derive(Debug, Clone, Default)]
pub struct FeatureSynonyms {
    groups: Vec<SynonymGroup>,
}

impl FeatureSynonyms {
    pub fn new(groups: Vec<SynonymGroup>) -> Self {
        Self { groups }
    }

    pub fn builtin() -> Self {
        let table: [(&str, &[&str]); 10] = [
            ("ssr", &["south service road"]),
            ("corner", &["corner plot", "cor plot"]),
            ("park facing", &["park face", "facing park"]),
            ("main road", &["main double road", "main boulevard", "main blvd", "mdr"]),
            ("west open", &["w open", "w.open"]),
            ("east open", &["e open", "e.open"]),
            ("level", &["levelled", "level plot", "solid land"]),
            ("possession", &["possession paid", "possession utility paid"]),
            ("heighted", &["heighted location"]),
            ("near masjid", &["masjid facing"]),
        ];
        Self {
            groups: table
                .into_iter()
                .map(|(token, variants)| SynonymGroup {
                    token: token.to_string(),
                    variants: variants.iter().map(|v| v.to_string()).collect(),
                })
                .collect(),
        }
    }

    pub fn from_workspace_root(root: &Path) -> Result<Self> {
        Self::from_yaml_file(&root.join("rules").join("feature_synonyms.yaml"))
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let file: SynonymRulesFile =
            serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        Ok(Self {
            groups: file.groups,
        })
    }

    pub fn groups(&self) -> &[SynonymGroup] {
        &self.groups
    }

    /// Every phrase of the group(s) the token belongs to, lower-cased. Empty
    /// when the token is not in the table.
    fn variants(&self, token: &str) -> Vec<String> {
        let mut out = Vec::new();
        for group in &self.groups {
            let member = group.token.eq_ignore_ascii_case(token)
                || group.variants.iter().any(|v| v.eq_ignore_ascii_case(token));
            if !member {
                continue;
            }
            for phrase in std::iter::once(&group.token).chain(group.variants.iter()) {
                let lower = phrase.to_lowercase();
                if !out.contains(&lower) {
                    out.push(lower);
                }
            }
        }
        out
    }
}

/// Which qualification rule duplicate groups use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    /// Any location key with two or more members is a duplicate group.
    Location,
    /// A group qualifies only when contact, name or demand differ within it.
    /// The mode used operationally.
    LocationWithVariance,
}

#[derive(Debug, Clone, Copy)]
pub struct DedupConfig {
    /// Above this many total duplicate rows the report skips color styling.
    pub style_row_limit: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            style_row_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    pub key: String,
    pub color_index: Option<usize>,
    pub listings: Vec<Listing>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateReport {
    pub groups: Vec<DuplicateGroup>,
    pub styled: bool,
}

pub struct DuplicateDetector {
    config: DedupConfig,
}

impl DuplicateDetector {
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    /// Location key: canonical sector plus upper/trim plot, street and size.
    pub fn location_key(listing: &Listing) -> String {
        format!(
            "{}|{}|{}|{}",
            listing.normalized.sector,
            upper_trim(&listing.plot_no),
            upper_trim(&listing.street_no),
            upper_trim(&listing.plot_size),
        )
    }

    pub fn detect(&self, listings: &[Listing], mode: KeyMode) -> DuplicateReport {
        let mut by_key: BTreeMap<String, Vec<Listing>> = BTreeMap::new();
        for listing in listings {
            by_key
                .entry(Self::location_key(listing))
                .or_default()
                .push(listing.clone());
        }

        let mut groups: Vec<DuplicateGroup> = Vec::new();
        for (key, mut members) in by_key {
            if members.len() < 2 {
                continue;
            }
            if mode == KeyMode::LocationWithVariance && !has_variance(&members) {
                continue;
            }
            members.sort_by_key(|l| {
                (
                    contact_signature(l),
                    upper_trim(&l.extracted_name),
                    upper_trim(&l.demand),
                )
            });
            groups.push(DuplicateGroup {
                key,
                color_index: None,
                listings: members,
            });
        }

        let duplicate_rows: usize = groups.iter().map(|g| g.listings.len()).sum();
        // Presentation guard only: grouping output is identical either way.
        let styled = duplicate_rows <= self.config.style_row_limit;
        if styled {
            for (index, group) in groups.iter_mut().enumerate() {
                group.color_index = Some(index % GROUP_COLOR_COUNT);
            }
        }
        debug!(groups = groups.len(), duplicate_rows, styled, "detected duplicate groups");
        DuplicateReport { groups, styled }
    }
}

fn has_variance(members: &[Listing]) -> bool {
    let contacts: BTreeSet<String> = members.iter().map(contact_signature).collect();
    let names: BTreeSet<String> = members.iter().map(|l| upper_trim(&l.extracted_name)).collect();
    let demands: BTreeSet<String> = members.iter().map(|l| upper_trim(&l.demand)).collect();
    contacts.len() > 1 || names.len() > 1 || demands.len() > 1
}

/// A listing's contact identity for variance checks: its canonical contacts,
/// sorted and joined, so reposts with the same numbers compare equal.
fn contact_signature(listing: &Listing) -> String {
    let mut contacts = listing.normalized.contacts.clone();
    contacts.sort();
    contacts.join(",")
}

fn upper_trim(s: &str) -> String {
    s.trim().to_uppercase()
}

/// Contact-to-name directory over the currently visible listings.
/// Query-scoped on purpose: the dealer picker only offers dealers present in
/// the active filter context, so callers rebuild it on every filter change.
#[derive(Debug, Clone, Default)]
pub struct DealerDirectory {
    names_by_contact: BTreeMap<String, String>,
    names: Vec<String>,
}

impl DealerDirectory {
    pub fn from_listings(listings: &[Listing]) -> Self {
        let mut directory = DealerDirectory::default();
        for listing in listings {
            let name = listing.extracted_name.trim();
            if name.is_empty() {
                continue;
            }
            for contact in &listing.normalized.contacts {
                // First name seen for a contact wins, in row order.
                directory
                    .names_by_contact
                    .entry(contact.clone())
                    .or_insert_with(|| name.to_string());
            }
            if !directory
                .names
                .iter()
                .any(|seen| seen.eq_ignore_ascii_case(name))
            {
                directory.names.push(name.to_string());
            }
        }
        directory
    }

    pub fn name_for(&self, canonical_contact: &str) -> Option<&str> {
        self.names_by_contact
            .get(canonical_contact)
            .map(String::as_str)
    }

    /// Display list for the dealer picker: deduplicated, alphabetical,
    /// numbered "1. Alice".
    pub fn numbered_names(&self) -> Vec<String> {
        let mut names = self.names.clone();
        names.sort_by_key(|n| n.to_lowercase());
        names
            .iter()
            .enumerate()
            .map(|(i, n)| format!("{}. {}", i + 1, n))
            .collect()
    }

    /// Resolves a picker selection, numbered label or bare name, to the set
    /// of canonical contacts reported under that name.
    pub fn contacts_for(&self, selection: &str) -> BTreeSet<String> {
        let name = strip_number_prefix(selection.trim());
        self.names_by_contact
            .iter()
            .filter(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(contact, _)| contact.clone())
            .collect()
    }
}

fn strip_number_prefix(selection: &str) -> &str {
    match selection.split_once(". ") {
        Some((prefix, rest))
            if !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_digit()) =>
        {
            rest
        }
        _ => selection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;

    fn mk_listing(sector: &str, plot_no: &str, street_no: &str, size: &str, demand: &str) -> Listing {
        Listing {
            row_id: format!("{sector}-{plot_no}-{street_no}"),
            sector: sector.to_string(),
            plot_no: plot_no.to_string(),
            street_no: street_no.to_string(),
            plot_size: size.to_string(),
            demand: demand.to_string(),
            extracted_name: "Ali Estate".to_string(),
            extracted_contact: "0300-1234567".to_string(),
            ..Listing::default()
        }
        .derive()
    }

    fn test_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 20)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn row_ids(listings: &[Listing]) -> Vec<String> {
        listings.iter().map(|l| l.row_id.clone()).collect()
    }

    #[test]
    fn dropdown_filters_match_raw_values_exactly() {
        let listings = vec![
            mk_listing("I-14", "1", "2", "5x10", "95"),
            mk_listing("i-14", "2", "2", "5x10", "95"),
            mk_listing("I-15/2", "3", "2", "5x10", "95"),
        ];
        let config = FilterConfig {
            sectors: vec!["I-14".to_string()],
            ..FilterConfig::default()
        };
        let kept = apply_filters(&listings, &config, &FeatureSynonyms::builtin(), test_now());
        assert_eq!(row_ids(&kept), vec!["I-14-1-2".to_string()]);
    }

    #[test]
    fn contact_filter_matches_canonical_forms_only() {
        let mut listing = mk_listing("I-14", "1", "2", "5x10", "95");
        listing.extracted_contact = "923001234567".to_string();
        let listing = listing.derive();
        let listings = vec![listing, mk_listing("I-14", "2", "2", "5x10", "95")];

        let config = FilterConfig {
            contact_query: "0300-1234567".to_string(),
            ..FilterConfig::default()
        };
        let kept = apply_filters(&listings, &config, &FeatureSynonyms::builtin(), test_now());
        assert_eq!(kept.len(), 2);

        let short = FilterConfig {
            contact_query: "12345".to_string(),
            ..FilterConfig::default()
        };
        let kept = apply_filters(&listings, &short, &FeatureSynonyms::builtin(), test_now());
        assert!(kept.is_empty());
    }

    #[test]
    fn price_filter_is_inert_until_any_listing_parses() {
        let unparsable = vec![
            mk_listing("I-14", "1", "2", "5x10", "offer required"),
            mk_listing("I-14", "2", "2", "5x10", "call for price"),
        ];
        let config = FilterConfig {
            price_from: Some(50.0),
            price_to: Some(100.0),
            ..FilterConfig::default()
        };
        let kept = apply_filters(&unparsable, &config, &FeatureSynonyms::builtin(), test_now());
        assert_eq!(kept.len(), 2);

        let mut mixed = unparsable;
        mixed.push(mk_listing("I-14", "3", "2", "5x10", "95 Lac"));
        mixed.push(mk_listing("I-14", "4", "2", "5x10", "150 Lac"));
        let kept = apply_filters(&mixed, &config, &FeatureSynonyms::builtin(), test_now());
        assert_eq!(row_ids(&kept), vec!["I-14-3-2".to_string()]);
    }

    #[test]
    fn feature_tokens_match_exactly_by_synonym_and_fuzzily() {
        let mut listing = mk_listing("I-14", "1", "2", "5x10", "95");
        listing.features = "Corner, South Service Road".to_string();
        let listings = vec![listing.derive()];
        let synonyms = FeatureSynonyms::builtin();

        for token in ["corner", "ssr", "cornr"] {
            let config = FilterConfig {
                features: vec![token.to_string()],
                ..FilterConfig::default()
            };
            let kept = apply_filters(&listings, &config, &synonyms, test_now());
            assert_eq!(kept.len(), 1, "token {token:?} should match");
        }

        let config = FilterConfig {
            features: vec!["corner".to_string(), "park facing".to_string()],
            ..FilterConfig::default()
        };
        let kept = apply_filters(&listings, &config, &synonyms, test_now());
        assert!(kept.is_empty(), "every selected token must match");
    }

    #[test]
    fn date_window_keeps_recent_and_drops_unparsable() {
        let mut recent = mk_listing("I-14", "1", "2", "5x10", "95");
        recent.timestamp = "2026-08-18 09:00:00".to_string();
        let mut stale = mk_listing("I-14", "2", "2", "5x10", "95");
        stale.timestamp = "2026-07-01 09:00:00".to_string();
        let unstamped = mk_listing("I-14", "3", "2", "5x10", "95");
        let listings = vec![recent.derive(), stale.derive(), unstamped];

        let config = FilterConfig {
            date_window_days: Some(7),
            ..FilterConfig::default()
        };
        let kept = apply_filters(&listings, &config, &FeatureSynonyms::builtin(), test_now());
        assert_eq!(row_ids(&kept), vec!["I-14-1-2".to_string()]);

        let all = FilterConfig::default();
        let kept = apply_filters(&listings, &all, &FeatureSynonyms::builtin(), test_now());
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn missing_contact_toggle_requires_an_identity_signal() {
        let mut anonymous = mk_listing("I-14", "1", "2", "5x10", "95");
        anonymous.extracted_name = String::new();
        anonymous.extracted_contact = String::new();
        let listings = vec![anonymous.derive(), mk_listing("I-14", "2", "2", "5x10", "95")];

        let default_off = FilterConfig::default();
        let kept = apply_filters(&listings, &default_off, &FeatureSynonyms::builtin(), test_now());
        assert_eq!(row_ids(&kept), vec!["I-14-2-2".to_string()]);

        let on = FilterConfig {
            include_missing_contact: true,
            ..FilterConfig::default()
        };
        let kept = apply_filters(&listings, &on, &FeatureSynonyms::builtin(), test_now());
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn dealer_filter_resolves_through_the_directory() {
        let mut other = mk_listing("I-14", "2", "2", "5x10", "95");
        other.extracted_name = "Bilal Marketing".to_string();
        other.extracted_contact = "0311-7654321".to_string();
        let listings = vec![mk_listing("I-14", "1", "2", "5x10", "95"), other.derive()];

        let config = FilterConfig {
            dealer: Some("2. Bilal Marketing".to_string()),
            ..FilterConfig::default()
        };
        let kept = apply_filters(&listings, &config, &FeatureSynonyms::builtin(), test_now());
        assert_eq!(row_ids(&kept), vec!["I-14-2-2".to_string()]);
    }

    #[test]
    fn filter_composition_is_order_independent() {
        let mut with_features = mk_listing("I-14", "12", "5", "5x10", "95");
        with_features.features = "Corner".to_string();
        let listings = vec![
            with_features.derive(),
            mk_listing("I-14", "13", "5", "5x10", "200"),
            mk_listing("I-15/2", "12", "5", "5x10", "95"),
        ];
        let synonyms = FeatureSynonyms::builtin();

        let sector = FilterConfig {
            sectors: vec!["I-14".to_string()],
            ..FilterConfig::default()
        };
        let price = FilterConfig {
            price_to: Some(100.0),
            ..FilterConfig::default()
        };
        let combined = FilterConfig {
            sectors: vec!["I-14".to_string()],
            price_to: Some(100.0),
            ..FilterConfig::default()
        };

        let ab = apply_filters(
            &apply_filters(&listings, &sector, &synonyms, test_now()),
            &price,
            &synonyms,
            test_now(),
        );
        let ba = apply_filters(
            &apply_filters(&listings, &price, &synonyms, test_now()),
            &sector,
            &synonyms,
            test_now(),
        );
        let once = apply_filters(&listings, &combined, &synonyms, test_now());

        assert_eq!(row_ids(&ab), row_ids(&ba));
        assert_eq!(row_ids(&ab), row_ids(&once));
    }

    #[test]
    fn contact_variance_flags_a_duplicate_pair() {
        let mut a = mk_listing("I-14", "12", "5", "5x10", "95");
        a.extracted_contact = "0300-1111111".to_string();
        let mut b = mk_listing("I-14", "12", "5", "5x10", "95");
        b.extracted_contact = "0300-2222222".to_string();
        let listings = vec![a.derive(), b.derive()];

        let detector = DuplicateDetector::new(DedupConfig::default());
        let report = detector.detect(&listings, KeyMode::LocationWithVariance);
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].listings.len(), 2);
        assert!(report.styled);
        assert_eq!(report.groups[0].color_index, Some(0));
    }

    #[test]
    fn identical_reposts_are_not_flagged_with_variance_mode() {
        let listings = vec![
            mk_listing("I-14", "12", "5", "5x10", "95"),
            mk_listing("I-14", "12", "5", "5x10", "95"),
        ];
        let detector = DuplicateDetector::new(DedupConfig::default());

        let with_variance = detector.detect(&listings, KeyMode::LocationWithVariance);
        assert!(with_variance.groups.is_empty());

        let location_only = detector.detect(&listings, KeyMode::Location);
        assert_eq!(location_only.groups.len(), 1);
    }

    #[test]
    fn sector_spelling_variants_share_a_location_key() {
        let a = mk_listing("i 14", "12", "5", "5x10", "95");
        let b = mk_listing("I-14", "12", "5", "5x10", "120");
        assert_eq!(
            DuplicateDetector::location_key(&a),
            DuplicateDetector::location_key(&b)
        );
    }

    #[test]
    fn oversized_duplicate_sets_degrade_to_plain_groups() {
        let mut listings = Vec::new();
        for plot in 0..26 {
            let mut a = mk_listing("I-14", &plot.to_string(), "5", "5x10", "95");
            a.extracted_contact = "0300-1111111".to_string();
            let mut b = mk_listing("I-14", &plot.to_string(), "5", "5x10", "95");
            b.extracted_contact = "0300-2222222".to_string();
            listings.push(a.derive());
            listings.push(b.derive());
        }

        let detector = DuplicateDetector::new(DedupConfig::default());
        let report = detector.detect(&listings, KeyMode::LocationWithVariance);
        assert_eq!(report.groups.len(), 26);
        assert!(!report.styled);
        assert!(report.groups.iter().all(|g| g.color_index.is_none()));
    }

    #[test]
    fn color_indexes_cycle_through_the_palette() {
        let mut listings = Vec::new();
        for plot in 0..GROUP_COLOR_COUNT + 1 {
            let mut a = mk_listing("I-14", &plot.to_string(), "5", "5x10", "95");
            a.extracted_contact = "0300-1111111".to_string();
            let mut b = mk_listing("I-14", &plot.to_string(), "5", "5x10", "95");
            b.extracted_contact = "0300-2222222".to_string();
            listings.push(a.derive());
            listings.push(b.derive());
        }

        let detector = DuplicateDetector::new(DedupConfig {
            style_row_limit: 100,
        });
        let report = detector.detect(&listings, KeyMode::LocationWithVariance);
        assert_eq!(report.groups.first().unwrap().color_index, Some(0));
        assert_eq!(report.groups.last().unwrap().color_index, Some(0));
    }

    #[test]
    fn dealer_directory_numbers_names_alphabetically() {
        let mut zee = mk_listing("I-14", "1", "2", "5x10", "95");
        zee.extracted_name = "Zee Traders".to_string();
        zee.extracted_contact = "0300-9999999".to_string();
        let mut ali = mk_listing("I-14", "2", "2", "5x10", "95");
        ali.extracted_name = "ali estate".to_string();
        ali.extracted_contact = "0300-1234567".to_string();
        let mut dup_casing = mk_listing("I-14", "3", "2", "5x10", "95");
        dup_casing.extracted_name = "ALI ESTATE".to_string();
        dup_casing.extracted_contact = "0300-8888888".to_string();
        let listings = vec![zee.derive(), ali.derive(), dup_casing.derive()];

        let directory = DealerDirectory::from_listings(&listings);
        assert_eq!(
            directory.numbered_names(),
            vec!["1. ali estate".to_string(), "2. Zee Traders".to_string()]
        );

        let by_label = directory.contacts_for("1. ali estate");
        let by_name = directory.contacts_for("Ali Estate");
        assert_eq!(by_label, by_name);
        assert_eq!(by_label.len(), 2);
        assert!(by_label.contains("3001234567"));
        assert!(by_label.contains("3008888888"));
    }

    #[test]
    fn first_name_seen_wins_for_a_contact() {
        let mut first = mk_listing("I-14", "1", "2", "5x10", "95");
        first.extracted_name = "Ali Estate".to_string();
        let mut second = mk_listing("I-14", "2", "2", "5x10", "95");
        second.extracted_name = "A. Estate".to_string();
        let listings = vec![first.derive(), second.derive()];

        let directory = DealerDirectory::from_listings(&listings);
        assert_eq!(directory.name_for("3001234567"), Some("Ali Estate"));
    }

    #[test]
    fn synonym_rules_load_from_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "version: 1\ngroups:\n  - token: ssr\n    variants: [\"south service road\"]\n"
        )
        .unwrap();

        let synonyms = FeatureSynonyms::from_yaml_file(file.path()).unwrap();
        assert_eq!(synonyms.groups().len(), 1);
        let variants = synonyms.variants("ssr");
        assert!(variants.contains(&"south service road".to_string()));

        let missing = FeatureSynonyms::from_yaml_file(Path::new("/nonexistent/rules.yaml"));
        assert!(missing.is_err());
    }

    #[test]
    fn workspace_rules_file_parses() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
        let synonyms = FeatureSynonyms::from_workspace_root(&root).unwrap();
        assert!(!synonyms.groups().is_empty());
        assert!(!synonyms.variants("ssr").is_empty());
    }

    #[test]
    fn empty_collections_yield_empty_results() {
        let synonyms = FeatureSynonyms::builtin();
        assert!(apply_filters(&[], &FilterConfig::default(), &synonyms, test_now()).is_empty());

        let detector = DuplicateDetector::new(DedupConfig::default());
        let report = detector.detect(&[], KeyMode::LocationWithVariance);
        assert!(report.groups.is_empty());
        assert!(report.styled);

        let directory = DealerDirectory::from_listings(&[]);
        assert!(directory.numbered_names().is_empty());
        assert!(directory.contacts_for("anyone").is_empty());
    }
}
