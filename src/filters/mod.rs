//! Pure predicate pipeline applied between resolution and validation
//!
//! Stages run in a fixed order — country, language, duplicate
//! suppression, cardinality cap — so each stage's removal count lands in
//! a distinct statistics field. The surviving set itself is independent of
//! country/language stage order; only the attribution differs.

use std::collections::HashSet;

use crate::models::{ImportStatistics, ResolvedEntry};

/// Caller-supplied filtering criteria for one run.
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    /// Country codes or free-text country names; empty allows all.
    pub allowed_countries: Vec<String>,
    /// ISO 639 language codes; empty allows all.
    pub allowed_languages: Vec<String>,
    /// Addresses already known to the caller; exact-match duplicates are
    /// suppressed.
    pub known_addresses: HashSet<String>,
    /// Hard cap on surviving entries; zero disables the cap.
    pub max_channels: usize,
}

/// Normalize a free-text country tag to an ISO-ish two-letter code.
///
/// Two-letter tags pass through uppercased; known country names map via a
/// lookup table; anything else is returned uppercased as-is so unknown
/// tags still compare consistently.
pub fn normalize_country(tag: &str) -> String {
    let trimmed = tag.trim();
    if trimmed.len() == 2 {
        return trimmed.to_uppercase();
    }

    match trimmed.to_lowercase().as_str() {
        "united states" | "usa" | "america" => "US".to_string(),
        "united kingdom" | "great britain" | "england" => "GB".to_string(),
        "germany" | "deutschland" => "DE".to_string(),
        "france" => "FR".to_string(),
        "spain" | "espana" | "españa" => "ES".to_string(),
        "italy" | "italia" => "IT".to_string(),
        "canada" => "CA".to_string(),
        "mexico" | "méxico" => "MX".to_string(),
        "brazil" | "brasil" => "BR".to_string(),
        "netherlands" | "holland" => "NL".to_string(),
        "portugal" => "PT".to_string(),
        "turkey" | "türkiye" => "TR".to_string(),
        "india" => "IN".to_string(),
        "australia" => "AU".to_string(),
        "argentina" => "AR".to_string(),
        _ => trimmed.to_uppercase(),
    }
}

/// Apply all filter stages in order, attributing each stage's removals to
/// its statistics field. Order within the surviving set is preserved.
pub fn apply_filters(
    entries: Vec<ResolvedEntry>,
    criteria: &FilterCriteria,
    stats: &mut ImportStatistics,
) -> Vec<ResolvedEntry> {
    let allowed_countries: HashSet<String> = criteria
        .allowed_countries
        .iter()
        .map(|c| normalize_country(c))
        .collect();
    let allowed_languages: HashSet<String> = criteria
        .allowed_languages
        .iter()
        .map(|l| l.trim().to_lowercase())
        .collect();

    let mut survivors = Vec::with_capacity(entries.len());

    for resolved in entries {
        if !passes_country(&resolved, &allowed_countries) {
            stats.filtered_country += 1;
            continue;
        }
        if !passes_language(&resolved, &allowed_languages) {
            stats.filtered_language += 1;
            continue;
        }
        if criteria.known_addresses.contains(&resolved.entry.address) {
            stats.filtered_duplicate += 1;
            continue;
        }
        survivors.push(resolved);
    }

    if criteria.max_channels > 0 && survivors.len() > criteria.max_channels {
        stats.filtered_cap += survivors.len() - criteria.max_channels;
        survivors.truncate(criteria.max_channels);
    }

    survivors
}

/// Untagged entries always pass.
fn passes_country(resolved: &ResolvedEntry, allowed: &HashSet<String>) -> bool {
    if allowed.is_empty() {
        return true;
    }
    match &resolved.entry.country {
        Some(country) => allowed.contains(&normalize_country(country)),
        None => true,
    }
}

/// Untagged entries always pass.
fn passes_language(resolved: &ResolvedEntry, allowed: &HashSet<String>) -> bool {
    if allowed.is_empty() {
        return true;
    }
    match &resolved.entry.language {
        Some(language) => allowed.contains(&language.trim().to_lowercase()),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlaylistEntry;

    fn entry(
        name: &str,
        address: &str,
        country: Option<&str>,
        language: Option<&str>,
    ) -> ResolvedEntry {
        let mut e = PlaylistEntry::new(name, address);
        e.country = country.map(|c| c.to_string());
        e.language = language.map(|l| l.to_string());
        ResolvedEntry::passthrough(e)
    }

    fn sample() -> Vec<ResolvedEntry> {
        vec![
            entry("A", "http://a/1", Some("US"), Some("en")),
            entry("B", "http://b/1", Some("United States"), Some("EN")),
            entry("C", "http://c/1", Some("DE"), Some("de")),
            entry("D", "http://d/1", None, None),
            entry("E", "http://e/1", Some("fr"), Some("en")),
        ]
    }

    #[test]
    fn test_normalize_country() {
        assert_eq!(normalize_country("us"), "US");
        assert_eq!(normalize_country("United States"), "US");
        assert_eq!(normalize_country("germany"), "DE");
        assert_eq!(normalize_country("Narnia"), "NARNIA");
    }

    #[test]
    fn test_country_filter_with_free_text_and_untagged_pass() {
        let criteria = FilterCriteria {
            allowed_countries: vec!["US".to_string()],
            ..Default::default()
        };
        let mut stats = ImportStatistics::default();
        let out = apply_filters(sample(), &criteria, &mut stats);

        // A and B match US (free text normalized), D is untagged and passes.
        let names: Vec<_> = out.iter().map(|r| r.entry.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "D"]);
        assert_eq!(stats.filtered_country, 2);
    }

    #[test]
    fn test_language_filter_case_insensitive() {
        let criteria = FilterCriteria {
            allowed_languages: vec!["EN".to_string()],
            ..Default::default()
        };
        let mut stats = ImportStatistics::default();
        let out = apply_filters(sample(), &criteria, &mut stats);

        let names: Vec<_> = out.iter().map(|r| r.entry.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "D", "E"]);
        assert_eq!(stats.filtered_language, 1);
    }

    #[test]
    fn test_surviving_set_is_stage_order_independent() {
        // Country-then-language and language-then-country attribute
        // removals differently but must agree on the final set.
        let both = FilterCriteria {
            allowed_countries: vec!["US".to_string()],
            allowed_languages: vec!["en".to_string()],
            ..Default::default()
        };
        let mut stats = ImportStatistics::default();
        let combined = apply_filters(sample(), &both, &mut stats);

        let country_only = FilterCriteria {
            allowed_countries: vec!["US".to_string()],
            ..Default::default()
        };
        let language_only = FilterCriteria {
            allowed_languages: vec!["en".to_string()],
            ..Default::default()
        };
        let mut s1 = ImportStatistics::default();
        let mut s2 = ImportStatistics::default();
        let swapped = apply_filters(
            apply_filters(sample(), &language_only, &mut s1),
            &country_only,
            &mut s2,
        );

        assert_eq!(combined, swapped);
    }

    #[test]
    fn test_duplicate_suppression_ignores_name_and_category() {
        let mut known = HashSet::new();
        known.insert("http://a/1".to_string());
        let criteria = FilterCriteria {
            known_addresses: known,
            ..Default::default()
        };
        let mut stats = ImportStatistics::default();
        let out = apply_filters(sample(), &criteria, &mut stats);

        assert!(out.iter().all(|r| r.entry.address != "http://a/1"));
        assert_eq!(stats.filtered_duplicate, 1);
    }

    #[test]
    fn test_cap_truncates_preserving_order() {
        let criteria = FilterCriteria {
            max_channels: 2,
            ..Default::default()
        };
        let mut stats = ImportStatistics::default();
        let out = apply_filters(sample(), &criteria, &mut stats);

        let names: Vec<_> = out.iter().map(|r| r.entry.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(stats.filtered_cap, 3);
    }

    #[test]
    fn test_zero_cap_means_unlimited() {
        let criteria = FilterCriteria::default();
        let mut stats = ImportStatistics::default();
        let out = apply_filters(sample(), &criteria, &mut stats);
        assert_eq!(out.len(), 5);
        assert_eq!(stats.total_filtered(), 0);
    }
}
