//! Field normalization, quality flags and deduplication
//!
//! These rules decide silver partition names, so they are kept exact:
//!
//! | field          | missing     | present                                 |
//! |----------------|-------------|-----------------------------------------|
//! | country        | `Unknown`   | trimmed, uppercased, spaces -> `_`      |
//! | state_province | `Unknown`   | trimmed, spaces -> `_`, case preserved  |
//! | brewery_type   | `unknown`   | trimmed, lowercased                     |

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::models::{CuratedBrewery, RawBrewery};

pub const UNKNOWN_LOCATION: &str = "Unknown";
pub const UNKNOWN_CATEGORY: &str = "unknown";

/// `None` for null, empty, unparsable or non-finite input
pub fn parse_coordinate(raw: Option<&str>) -> Option<f64> {
    let raw = raw.filter(|s| !s.is_empty())?;
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Whitespace-only text counts as missing, so it never yields an empty partition name
fn present(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

pub fn normalize_country(raw: Option<&str>) -> String {
    match present(raw) {
        Some(country) => country.to_uppercase().replace(' ', "_"),
        None => UNKNOWN_LOCATION.to_string(),
    }
}

pub fn normalize_region(raw: Option<&str>) -> String {
    match present(raw) {
        Some(region) => region.replace(' ', "_"),
        None => UNKNOWN_LOCATION.to_string(),
    }
}

pub fn normalize_category(raw: Option<&str>) -> String {
    match present(raw) {
        Some(category) => category.to_lowercase(),
        None => UNKNOWN_CATEGORY.to_string(),
    }
}

pub fn has_contact_info(phone: Option<&str>, website: Option<&str>) -> bool {
    phone.is_some_and(|p| !p.is_empty()) || website.is_some_and(|w| !w.is_empty())
}

/// Street, address line 1, city, region, postal code, country joined with `", "`.
/// Missing parts stay in place as empty segments.
pub fn full_address(raw: &RawBrewery) -> String {
    [
        &raw.street,
        &raw.address_1,
        &raw.city,
        &raw.state_province,
        &raw.postal_code,
        &raw.country,
    ]
    .iter()
    .map(|part| part.as_deref().unwrap_or(""))
    .collect::<Vec<_>>()
    .join(", ")
}

/// Derive every curated field. Records without an id cannot be deduplicated and yield `None`.
pub fn curate(raw: RawBrewery, processed_at: DateTime<Utc>) -> Option<CuratedBrewery> {
    let id = raw.id.clone().filter(|id| !id.is_empty())?;

    let longitude_numeric = parse_coordinate(raw.longitude.as_deref());
    let latitude_numeric = parse_coordinate(raw.latitude.as_deref());

    Some(CuratedBrewery {
        country_normalized: normalize_country(raw.country.as_deref()),
        state_province_normalized: normalize_region(raw.state_province.as_deref()),
        brewery_type_normalized: normalize_category(raw.brewery_type.as_deref()),
        has_coordinates: longitude_numeric.is_some() && latitude_numeric.is_some(),
        has_contact_info: has_contact_info(raw.phone.as_deref(), raw.website_url.as_deref()),
        full_address: full_address(&raw),
        longitude_numeric,
        latitude_numeric,
        processing_timestamp: processed_at,

        id,
        name: raw.name,
        brewery_type: raw.brewery_type,
        address_1: raw.address_1,
        address_2: raw.address_2,
        address_3: raw.address_3,
        city: raw.city,
        state_province: raw.state_province,
        postal_code: raw.postal_code,
        country: raw.country,
        longitude: raw.longitude,
        latitude: raw.latitude,
        phone: raw.phone,
        website_url: raw.website_url,
        state: raw.state,
        street: raw.street,
    })
}

/// Keep one row per id: the latest `processing_timestamp`, later input rows winning ties.
///
/// Output keeps the position where each id first appeared.
pub fn deduplicate(rows: Vec<CuratedBrewery>) -> Vec<CuratedBrewery> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(rows.len());
    let mut kept: Vec<CuratedBrewery> = Vec::with_capacity(rows.len());

    for row in rows {
        match index.get(&row.id) {
            Some(&slot) => {
                if row.processing_timestamp >= kept[slot].processing_timestamp {
                    kept[slot] = row;
                }
            },
            None => {
                index.insert(row.id.clone(), kept.len());
                kept.push(row);
            },
        }
    }

    kept
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw(id: &str) -> RawBrewery {
        RawBrewery {
            id: Some(id.to_string()),
            ..Default::default()
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_704_067_200 + secs, 0).unwrap()
    }

    #[test]
    fn test_parse_coordinate() {
        assert_eq!(parse_coordinate(Some("37.774929")), Some(37.774929));
        assert_eq!(parse_coordinate(Some(" -122.5 ")), Some(-122.5));
        assert_eq!(parse_coordinate(Some("")), None);
        assert_eq!(parse_coordinate(None), None);
        assert_eq!(parse_coordinate(Some("north")), None);
        assert_eq!(parse_coordinate(Some("NaN")), None);
        assert_eq!(parse_coordinate(Some("inf")), None);
    }

    #[test]
    fn test_missing_location_and_category() {
        assert_eq!(normalize_country(None), "Unknown");
        assert_eq!(normalize_country(Some("")), "Unknown");
        assert_eq!(normalize_region(None), "Unknown");
        assert_eq!(normalize_region(Some("")), "Unknown");
        assert_eq!(normalize_category(None), "unknown");
        assert_eq!(normalize_category(Some("")), "unknown");
    }

    #[test]
    fn test_blank_location_and_category_are_unknown() {
        assert_eq!(normalize_country(Some("   ")), "Unknown");
        assert_eq!(normalize_region(Some("\t ")), "Unknown");
        assert_eq!(normalize_category(Some("  ")), "unknown");

        let record = RawBrewery {
            country: Some("   ".to_string()),
            state_province: Some(" ".to_string()),
            brewery_type: Some("   ".to_string()),
            ..raw("blank")
        };
        let curated = curate(record, at(0)).unwrap();
        assert_eq!(curated.country_normalized, "Unknown");
        assert_eq!(curated.state_province_normalized, "Unknown");
        assert_eq!(curated.brewery_type_normalized, "unknown");
    }

    #[test]
    fn test_present_values() {
        assert_eq!(normalize_country(Some(" United States ")), "UNITED_STATES");
        assert_eq!(normalize_country(Some("Isle of Man")), "ISLE_OF_MAN");
        assert_eq!(normalize_region(Some(" New York ")), "New_York");
        assert_eq!(normalize_region(Some("Baden-Württemberg")), "Baden-Württemberg");
        assert_eq!(normalize_category(Some(" Micro ")), "micro");
        assert_eq!(normalize_category(Some("BREWPUB")), "brewpub");
    }

    #[test]
    fn test_contact_info() {
        assert!(has_contact_info(Some("4155551234"), None));
        assert!(has_contact_info(None, Some("http://example.com")));
        assert!(!has_contact_info(Some(""), Some("")));
        assert!(!has_contact_info(None, None));
    }

    #[test]
    fn test_full_address_keeps_empty_segments() {
        let record = RawBrewery {
            city: Some("Denver".to_string()),
            state_province: Some("Colorado".to_string()),
            postal_code: Some("80202".to_string()),
            country: Some("United States".to_string()),
            ..raw("b3")
        };
        assert_eq!(full_address(&record), ", , Denver, Colorado, 80202, United States");
    }

    #[test]
    fn test_curate_flags() {
        let record = RawBrewery {
            latitude: Some("45.520247".to_string()),
            longitude: Some("".to_string()),
            phone: Some("".to_string()),
            website_url: Some("http://b.example".to_string()),
            ..raw("b1")
        };
        let curated = curate(record, at(0)).unwrap();

        assert_eq!(curated.latitude_numeric, Some(45.520247));
        assert_eq!(curated.longitude_numeric, None);
        assert!(!curated.has_coordinates);
        assert!(curated.has_contact_info);
        assert_eq!(curated.country_normalized, "Unknown");
        assert_eq!(curated.brewery_type_normalized, "unknown");
    }

    #[test]
    fn test_curate_skips_missing_id() {
        assert!(curate(RawBrewery::default(), at(0)).is_none());
        assert!(curate(raw(""), at(0)).is_none());
    }

    #[test]
    fn test_dedup_keeps_latest_timestamp() {
        let mut newer = curate(raw("dup"), at(10)).unwrap();
        newer.name = Some("newer".to_string());
        let mut older = curate(raw("dup"), at(5)).unwrap();
        older.name = Some("older".to_string());

        let kept = deduplicate(vec![newer, older, curate(raw("other"), at(0)).unwrap()]);

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].id, "dup");
        assert_eq!(kept[0].name.as_deref(), Some("newer"));
        assert_eq!(kept[1].id, "other");
    }

    #[test]
    fn test_dedup_tie_goes_to_last_input_row() {
        let mut first = curate(raw("dup"), at(0)).unwrap();
        first.name = Some("first".to_string());
        let mut second = curate(raw("dup"), at(0)).unwrap();
        second.name = Some("second".to_string());

        let kept = deduplicate(vec![first, second]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name.as_deref(), Some("second"));
    }
}
