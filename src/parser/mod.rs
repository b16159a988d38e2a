//! Lenient M3U playlist parser
//!
//! Playlists in the wild are frequently non-conformant, so the parser
//! never returns an error: malformed input degrades to fewer entries.
//! The grammar is a two-line unit — an `#EXTINF:` metadata line followed
//! eventually by a non-comment line carrying the stream address.

use tracing::debug;

use crate::models::PlaylistEntry;
use crate::utils::url::UrlUtils;

const EXTINF_PREFIX: &str = "#EXTINF:";
const HEADER_PREFIX: &str = "#EXTM3U";
const UNKNOWN_CHANNEL: &str = "Unknown Channel";

/// Parse raw playlist text into an ordered sequence of entries.
///
/// Output order is input order. An `#EXTINF:` line resets the entry in
/// progress, so a metadata line that is never followed by an address line
/// is silently dropped rather than reported.
pub fn parse_playlist(content: &str) -> Vec<PlaylistEntry> {
    let mut entries = Vec::new();
    let mut pending: Option<PlaylistEntry> = None;

    for raw_line in content.lines() {
        let line = raw_line.trim();

        if line.is_empty() || line.starts_with(HEADER_PREFIX) {
            continue;
        }

        if let Some(rest) = line.strip_prefix(EXTINF_PREFIX) {
            // A new metadata line replaces any unterminated entry.
            if pending.is_some() {
                debug!("Dropping metadata line without an address line");
            }
            pending = Some(parse_extinf(rest));
            continue;
        }

        if line.starts_with('#') {
            // Other directives (#EXTGRP, #EXTVLCOPT, ...) are ignored.
            continue;
        }

        if UrlUtils::is_address_line(line) {
            if let Some(mut entry) = pending.take() {
                entry.address = UrlUtils::normalize_scheme(line);
                entries.push(entry);
            }
        }
        // A bare non-address line between units is noise; skip it without
        // consuming the pending entry.
    }

    entries
}

/// Parse the part of an `#EXTINF:` line after the prefix: a duration,
/// key="value" attributes, then a trailing free-text name after the last
/// comma.
fn parse_extinf(rest: &str) -> PlaylistEntry {
    let (attributes_part, display_name) = match rest.rfind(',') {
        Some(comma_pos) => (&rest[..comma_pos], rest[comma_pos + 1..].trim()),
        None => (rest, ""),
    };

    let name = if display_name.is_empty() {
        UNKNOWN_CHANNEL.to_string()
    } else {
        display_name.to_string()
    };

    let mut entry = PlaylistEntry::new(name, String::new());

    for (key, value) in parse_attributes(attributes_part) {
        if value.is_empty() {
            continue;
        }
        match key.as_str() {
            "tvg-country" => entry.country = Some(value),
            "tvg-language" => entry.language = Some(value),
            "tvg-logo" => entry.logo = Some(value),
            "group-title" => entry.group_label = Some(value),
            "tvg-category" => entry.category = Some(value),
            _ => {}
        }
    }

    if entry.category.is_none() {
        entry.category = entry.group_label.clone();
    }

    entry
}

/// Escape-aware key="value" attribute scanner.
fn parse_attributes(attributes: &str) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    let mut current_key = String::new();
    let mut current_value = String::new();
    let mut in_quotes = false;
    let mut in_value = false;
    let mut escape_next = false;

    for ch in attributes.chars() {
        if escape_next {
            if in_value {
                current_value.push(ch);
            } else {
                current_key.push(ch);
            }
            escape_next = false;
            continue;
        }

        match ch {
            '\\' => escape_next = true,
            '"' => {
                if in_value {
                    in_quotes = !in_quotes;
                }
            }
            '=' if !in_quotes && !in_value => {
                in_value = true;
            }
            ' ' | '\t' if !in_quotes => {
                if in_value {
                    // Empty-quoted values (`tvg-logo=""`) must close the
                    // pair too, or the next attribute gets absorbed.
                    if !current_value.is_empty() {
                        attrs.push((
                            current_key.trim().to_string(),
                            current_value.trim_matches('"').to_string(),
                        ));
                    }
                    current_key.clear();
                    current_value.clear();
                    in_value = false;
                } else {
                    // Duration token or stray word before the attributes.
                    current_key.clear();
                }
            }
            _ => {
                if in_value {
                    current_value.push(ch);
                } else {
                    current_key.push(ch);
                }
            }
        }
    }

    if in_value && !current_value.is_empty() {
        attrs.push((
            current_key.trim().to_string(),
            current_value.trim_matches('"').to_string(),
        ));
    }

    attrs
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"#EXTM3U
#EXTINF:-1 tvg-id="news24" tvg-country="US" tvg-language="en" group-title="News",News 24
http://example.com/news24.m3u8
#EXTINF:-1 group-title="Sports",Sports One
//cdn.example.com/sports1.m3u8
"#;

    #[test]
    fn test_parses_two_line_units() {
        let entries = parse_playlist(SAMPLE);
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].name, "News 24");
        assert_eq!(entries[0].address, "http://example.com/news24.m3u8");
        assert_eq!(entries[0].country.as_deref(), Some("US"));
        assert_eq!(entries[0].language.as_deref(), Some("en"));
        assert_eq!(entries[0].effective_category(), Some("News"));

        // Scheme-relative address gets the default scheme.
        assert_eq!(entries[1].address, "http://cdn.example.com/sports1.m3u8");
    }

    #[test]
    fn test_parsing_is_idempotent() {
        let first = parse_playlist(SAMPLE);
        let second = parse_playlist(SAMPLE);
        assert_eq!(first, second);
    }

    #[test]
    fn test_metadata_without_address_is_dropped() {
        let text = "#EXTM3U\n\
                    #EXTINF:-1,Orphaned Channel\n\
                    #EXTINF:-1,Real Channel\n\
                    http://example.com/real.m3u8\n";
        let entries = parse_playlist(text);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Real Channel");
    }

    #[test]
    fn test_trailing_metadata_without_address_is_dropped() {
        let text = "#EXTINF:-1,Only Metadata\n";
        assert!(parse_playlist(text).is_empty());
    }

    #[test]
    fn test_missing_name_gets_placeholder() {
        let text = "#EXTINF:-1 tvg-id=\"x\",\nhttp://example.com/x.m3u8\n";
        let entries = parse_playlist(text);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Unknown Channel");
    }

    #[test]
    fn test_extinf_without_comma_gets_placeholder() {
        let text = "#EXTINF:-1\nhttp://example.com/x.m3u8\n";
        let entries = parse_playlist(text);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Unknown Channel");
    }

    #[test]
    fn test_garbage_never_panics() {
        let entries = parse_playlist("complete garbage\nnot a playlist\n###\n");
        assert!(entries.is_empty());
    }

    #[test]
    fn test_other_directives_do_not_consume_entry() {
        let text = "#EXTINF:-1,With Group Directive\n\
                    #EXTGRP:Sports\n\
                    http://example.com/grp.m3u8\n";
        let entries = parse_playlist(text);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "With Group Directive");
    }

    #[test]
    fn test_empty_quoted_attribute_does_not_swallow_the_next() {
        let text = "#EXTINF:-1 tvg-logo=\"\" group-title=\"News\",Channel\nhttp://e.com/a.m3u8\n";
        let entries = parse_playlist(text);
        assert_eq!(entries[0].logo, None);
        assert_eq!(entries[0].group_label.as_deref(), Some("News"));
        assert_eq!(entries[0].effective_category(), Some("News"));
    }

    #[test]
    fn test_attribute_values_with_spaces() {
        let text = "#EXTINF:-1 group-title=\"US News & Talk\",Channel\nhttp://e.com/a.m3u8\n";
        let entries = parse_playlist(text);
        assert_eq!(entries[0].group_label.as_deref(), Some("US News & Talk"));
    }
}
