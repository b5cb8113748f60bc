//! Property-style tests for cache key slugs.
//!
//! Runs the slug rules over a corpus of awkward inputs: names, coordinate
//! strings, punctuation-only text, unicode and control characters.

use sky_common::{slugify, CacheKey, PositionQuery, DEFAULT_SLUG};

fn corpus() -> Vec<String> {
    let mut inputs: Vec<String> = [
        "",
        " ",
        "-",
        "---",
        "M51",
        "m51",
        " M 51 ",
        "NGC 1300",
        "DSS2 Red",
        "DSS2   red",
        "WISE 3.4",
        "2MASS-J",
        "GALEX Near UV",
        "10.5 41.2",
        "0 -90",
        "359.99999 89.5",
        "Alpha Carinae",
        "α Cen",
        "Ωmega",
        "tab\tseparated\nlines",
        "__under__score__",
        "a--b",
        "-leading",
        "trailing-",
        "UPPER_lower.123",
        "😀 emoji 😀",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    // Every printable ASCII character alone and wrapped in letters.
    for b in 0x20u8..0x7f {
        let c = b as char;
        inputs.push(c.to_string());
        inputs.push(format!("a{}b", c));
    }
    inputs
}

fn is_well_formed(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
}

#[test]
fn test_slug_is_idempotent() {
    for input in corpus() {
        let once = slugify(&input);
        assert_eq!(slugify(&once), once, "slug not idempotent for {:?}", input);
    }
}

#[test]
fn test_slug_charset_and_hyphens() {
    for input in corpus() {
        let slug = slugify(&input);
        assert!(is_well_formed(&slug), "bad slug {:?} for {:?}", slug, input);
    }
}

#[test]
fn test_case_and_whitespace_insensitive() {
    for input in corpus() {
        let variant = format!("  {}  ", input.to_uppercase());
        // Upper-casing non-ASCII may change characters; restrict to ASCII.
        if input.is_ascii() {
            assert_eq!(slugify(&variant), slugify(&input), "input {:?}", input);
        }
    }
}

#[test]
fn test_default_token_for_symbol_only_inputs() {
    for input in ["", "   ", "!!!", "-_-", "α"] {
        assert_eq!(slugify(input), DEFAULT_SLUG);
    }
}

#[test]
fn test_cache_key_for_named_scenario() {
    let pos = PositionQuery::resolve(Some("M51"), None, None).unwrap();
    let key = CacheKey::new(&pos.canonical(), "DSS2 Red");
    assert_eq!(key.as_str(), "m51-dss2-red");
}

#[test]
fn test_cache_key_is_well_formed() {
    let inputs = corpus();
    for position in inputs.iter().take(30) {
        for survey in inputs.iter().take(30) {
            let key = CacheKey::new(position, survey);
            assert!(is_well_formed(key.as_str()), "bad key {}", key);
        }
    }
}
