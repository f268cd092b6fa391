//! The three gold aggregations, computed in memory from curated rows
//!
//! Every table is recomputed from scratch. Ratios are rounded half away from
//! zero to two decimals.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::silver::models::CuratedBrewery;

pub const BY_TYPE_AND_LOCATION: &str = "brewery_by_type_and_location";
pub const BY_TYPE: &str = "brewery_by_type";
pub const BY_LOCATION: &str = "brewery_by_location";

/// Output directory names, in write order
pub const TABLE_NAMES: [&str; 3] = [BY_TYPE_AND_LOCATION, BY_TYPE, BY_LOCATION];

/// One (country, region, category) group
#[derive(Debug, Clone, PartialEq)]
pub struct TypeLocationAggregate {
    pub country: String,
    pub state_province: String,
    pub brewery_type: String,
    pub brewery_count: i64,
    pub with_coordinates: i64,
    pub with_contact_info: i64,
    pub unique_breweries: i64,
    /// Share of this category among all breweries of the same (country, region)
    pub percentage_of_location: f64,
    /// Coordinate and contact completeness, 0..=100
    pub data_quality_score: f64,
    pub aggregation_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeAggregate {
    pub brewery_type: String,
    pub brewery_count: i64,
    pub countries_count: i64,
    pub regions_count: i64,
    pub avg_coordinate_completeness: f64,
    pub percentage_of_total: f64,
    pub aggregation_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationAggregate {
    pub country: String,
    pub state_province: String,
    pub total_breweries: i64,
    pub brewery_types_count: i64,
    pub with_coordinates: i64,
    /// Distinct categories present, sorted
    pub brewery_types: Vec<String>,
    pub aggregation_timestamp: DateTime<Utc>,
}

/// Round half away from zero to two decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn percentage(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[derive(Default)]
struct GroupCounts<'a> {
    count: i64,
    with_coordinates: i64,
    with_contact_info: i64,
    ids: HashSet<&'a str>,
}

pub fn by_type_and_location(
    rows: &[CuratedBrewery],
    aggregated_at: DateTime<Utc>,
) -> Vec<TypeLocationAggregate> {
    let mut groups: HashMap<(&str, &str, &str), GroupCounts> = HashMap::new();
    let mut location_totals: HashMap<(&str, &str), i64> = HashMap::new();

    for row in rows {
        let key = (
            row.country_normalized.as_str(),
            row.state_province_normalized.as_str(),
            row.brewery_type_normalized.as_str(),
        );
        let group = groups.entry(key).or_default();
        group.count += 1;
        group.with_coordinates += i64::from(row.has_coordinates);
        group.with_contact_info += i64::from(row.has_contact_info);
        group.ids.insert(row.id.as_str());

        *location_totals.entry((key.0, key.1)).or_default() += 1;
    }

    let mut out: Vec<TypeLocationAggregate> = groups
        .into_iter()
        .map(|((country, region, category), group)| {
            let location_total = location_totals.get(&(country, region)).copied().unwrap_or(0);
            TypeLocationAggregate {
                country: country.to_string(),
                state_province: region.to_string(),
                brewery_type: category.to_string(),
                brewery_count: group.count,
                with_coordinates: group.with_coordinates,
                with_contact_info: group.with_contact_info,
                unique_breweries: group.ids.len() as i64,
                percentage_of_location: round2(percentage(group.count, location_total)),
                data_quality_score: round2(percentage(
                    group.with_coordinates + group.with_contact_info,
                    group.count * 2,
                )),
                aggregation_timestamp: aggregated_at,
            }
        })
        .collect();

    out.sort_by(|a, b| {
        a.country
            .cmp(&b.country)
            .then_with(|| a.state_province.cmp(&b.state_province))
            .then_with(|| b.brewery_count.cmp(&a.brewery_count))
            .then_with(|| a.brewery_type.cmp(&b.brewery_type))
    });
    out
}

pub fn by_type(rows: &[CuratedBrewery], aggregated_at: DateTime<Utc>) -> Vec<TypeAggregate> {
    #[derive(Default)]
    struct Acc<'a> {
        count: i64,
        with_coordinates: i64,
        countries: HashSet<&'a str>,
        regions: HashSet<&'a str>,
    }

    let mut groups: HashMap<&str, Acc> = HashMap::new();
    for row in rows {
        let acc = groups.entry(row.brewery_type_normalized.as_str()).or_default();
        acc.count += 1;
        acc.with_coordinates += i64::from(row.has_coordinates);
        acc.countries.insert(row.country_normalized.as_str());
        acc.regions.insert(row.state_province_normalized.as_str());
    }

    let total = rows.len() as i64;
    let mut out: Vec<TypeAggregate> = groups
        .into_iter()
        .map(|(category, acc)| TypeAggregate {
            brewery_type: category.to_string(),
            brewery_count: acc.count,
            countries_count: acc.countries.len() as i64,
            regions_count: acc.regions.len() as i64,
            avg_coordinate_completeness: acc.with_coordinates as f64 / acc.count as f64,
            percentage_of_total: round2(percentage(acc.count, total)),
            aggregation_timestamp: aggregated_at,
        })
        .collect();

    out.sort_by(|a, b| {
        b.brewery_count
            .cmp(&a.brewery_count)
            .then_with(|| a.brewery_type.cmp(&b.brewery_type))
    });
    out
}

pub fn by_location(rows: &[CuratedBrewery], aggregated_at: DateTime<Utc>) -> Vec<LocationAggregate> {
    #[derive(Default)]
    struct Acc<'a> {
        count: i64,
        with_coordinates: i64,
        categories: BTreeSet<&'a str>,
    }

    let mut groups: BTreeMap<(&str, &str), Acc> = BTreeMap::new();
    for row in rows {
        let acc = groups
            .entry((
                row.country_normalized.as_str(),
                row.state_province_normalized.as_str(),
            ))
            .or_default();
        acc.count += 1;
        acc.with_coordinates += i64::from(row.has_coordinates);
        acc.categories.insert(row.brewery_type_normalized.as_str());
    }

    let mut out: Vec<LocationAggregate> = groups
        .into_iter()
        .map(|((country, region), acc)| LocationAggregate {
            country: country.to_string(),
            state_province: region.to_string(),
            total_breweries: acc.count,
            brewery_types_count: acc.categories.len() as i64,
            with_coordinates: acc.with_coordinates,
            brewery_types: acc.categories.into_iter().map(str::to_string).collect(),
            aggregation_timestamp: aggregated_at,
        })
        .collect();

    // BTreeMap order already breaks ties by region
    out.sort_by(|a, b| {
        a.country
            .cmp(&b.country)
            .then_with(|| b.total_breweries.cmp(&a.total_breweries))
    });
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::silver::models::RawBrewery;
    use crate::silver::normalize::curate;

    fn row(id: &str, country: &str, region: &str, category: &str, coords: bool, contact: bool) -> CuratedBrewery {
        let raw = RawBrewery {
            id: Some(id.to_string()),
            country: Some(country.to_string()),
            state_province: Some(region.to_string()),
            brewery_type: Some(category.to_string()),
            latitude: coords.then(|| "1.0".to_string()),
            longitude: coords.then(|| "2.0".to_string()),
            phone: contact.then(|| "555".to_string()),
            ..Default::default()
        };
        curate(raw, Utc::now()).unwrap()
    }

    fn sample() -> Vec<CuratedBrewery> {
        vec![
            row("1", "United States", "Oregon", "micro", true, true),
            row("2", "United States", "Oregon", "micro", false, true),
            row("3", "United States", "Oregon", "brewpub", true, false),
            row("4", "United States", "Colorado", "micro", true, true),
            row("5", "Ireland", "Dublin", "micro", false, false),
            row("6", "United States", "Oregon", "large", true, true),
            row("7", "United States", "Oregon", "regional", false, false),
        ]
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(33.333_333), 33.33);
        assert_eq!(round2(66.666_666), 66.67);
        assert_eq!(round2(12.5), 12.5);
        assert_eq!(round2(0.125), 0.13);
    }

    #[test]
    fn test_type_and_location_groups() {
        let now = Utc::now();
        let table = by_type_and_location(&sample(), now);
        assert_eq!(table.len(), 6);

        let first = &table[0];
        assert_eq!(first.country, "IRELAND");
        assert_eq!(first.data_quality_score, 0.0);
        assert_eq!(first.percentage_of_location, 100.0);

        let micro_or = table
            .iter()
            .find(|r| r.state_province == "Oregon" && r.brewery_type == "micro")
            .unwrap();
        assert_eq!(micro_or.brewery_count, 2);
        assert_eq!(micro_or.with_coordinates, 1);
        assert_eq!(micro_or.with_contact_info, 2);
        assert_eq!(micro_or.unique_breweries, 2);
        assert_eq!(micro_or.percentage_of_location, 40.0);
        assert_eq!(micro_or.data_quality_score, 75.0);
        assert!(table.iter().all(|r| r.aggregation_timestamp == now));
    }

    #[test]
    fn test_percentage_of_location_sums_to_100() {
        let mut rows = sample();
        rows.push(row("8", "United States", "Oregon", "nano", false, false));
        rows.push(row("9", "United States", "Oregon", "nano", false, false));
        let table = by_type_and_location(&rows, Utc::now());

        let mut sums: HashMap<(String, String), f64> = HashMap::new();
        for r in &table {
            *sums.entry((r.country.clone(), r.state_province.clone())).or_default() += r.percentage_of_location;
        }
        for total in sums.values() {
            assert!((total - 100.0).abs() <= 0.05, "got {}", total);
        }
    }

    #[test]
    fn test_type_and_location_sort_order() {
        let table = by_type_and_location(&sample(), Utc::now());
        let keys: Vec<_> = table
            .iter()
            .map(|r| (r.country.as_str(), r.state_province.as_str(), r.brewery_type.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("IRELAND", "Dublin", "micro"),
                ("UNITED_STATES", "Colorado", "micro"),
                ("UNITED_STATES", "Oregon", "micro"),
                ("UNITED_STATES", "Oregon", "brewpub"),
                ("UNITED_STATES", "Oregon", "large"),
                ("UNITED_STATES", "Oregon", "regional"),
            ]
        );
    }

    #[test]
    fn test_by_type() {
        let table = by_type(&sample(), Utc::now());
        assert_eq!(table[0].brewery_type, "micro");
        assert_eq!(table[0].brewery_count, 4);
        assert_eq!(table[0].countries_count, 2);
        assert_eq!(table[0].regions_count, 3);
        assert_eq!(table[0].avg_coordinate_completeness, 0.5);
        assert_eq!(table[0].percentage_of_total, 57.14);

        let rest: Vec<_> = table[1..].iter().map(|r| r.brewery_type.as_str()).collect();
        assert_eq!(rest, vec!["brewpub", "large", "regional"]);
    }

    #[test]
    fn test_by_location() {
        let table = by_location(&sample(), Utc::now());
        let keys: Vec<_> = table
            .iter()
            .map(|r| (r.country.as_str(), r.state_province.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("IRELAND", "Dublin"),
                ("UNITED_STATES", "Oregon"),
                ("UNITED_STATES", "Colorado"),
            ]
        );

        let oregon = &table[1];
        assert_eq!(oregon.total_breweries, 5);
        assert_eq!(oregon.brewery_types_count, 4);
        assert_eq!(oregon.with_coordinates, 3);
        assert_eq!(oregon.brewery_types, vec!["brewpub", "large", "micro", "regional"]);
    }

    #[test]
    fn test_empty_input() {
        let now = Utc::now();
        assert!(by_type_and_location(&[], now).is_empty());
        assert!(by_type(&[], now).is_empty());
        assert!(by_location(&[], now).is_empty());
    }
}
