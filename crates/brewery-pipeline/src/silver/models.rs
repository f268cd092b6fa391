//! Raw and curated brewery records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One brewery as returned by the API
///
/// Every field is optional. Text fields also accept JSON numbers because
/// the upstream is inconsistent about coordinates and postal codes.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawBrewery {
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub brewery_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub address_1: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub address_2: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub address_3: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub state_province: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub postal_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub longitude: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub latitude: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub website_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub street: Option<String>,
}

/// Strings pass through, numbers and booleans are rendered as text, anything else is absent
fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// A raw record plus derived fields, one row of the silver layer
#[derive(Debug, Clone, PartialEq)]
pub struct CuratedBrewery {
    pub id: String,
    pub name: Option<String>,
    pub brewery_type: Option<String>,
    pub address_1: Option<String>,
    pub address_2: Option<String>,
    pub address_3: Option<String>,
    pub city: Option<String>,
    pub state_province: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub longitude: Option<String>,
    pub latitude: Option<String>,
    pub phone: Option<String>,
    pub website_url: Option<String>,
    pub state: Option<String>,
    pub street: Option<String>,

    pub longitude_numeric: Option<f64>,
    pub latitude_numeric: Option<f64>,
    pub country_normalized: String,
    pub state_province_normalized: String,
    pub brewery_type_normalized: String,
    pub has_coordinates: bool,
    pub has_contact_info: bool,
    pub full_address: String,
    pub processing_timestamp: DateTime<Utc>,
}
