//! Field-level coercion for model-generated itineraries.
//!
//! A language model drifts from declared types: costs come back as bare
//! numbers, list fields as a single string or `null`, event types as free-form
//! words. The helpers here run while the [`Itinerary`] is being deserialized,
//! so a value that makes it through construction already satisfies the output
//! contract. Anything that still cannot be coerced is rejected.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use crate::{
    error::{AgentError, Result},
    types::itinerary::{EventType, Itinerary},
};

/// Cost placeholder used when the generator did not provide one.
pub const UNKNOWN_COST: &str = "Unknown";

/// Synonym table for event types. Keys are lowercase, single-spaced.
const EVENT_TYPE_SYNONYMS: &[(&str, EventType)] = &[
    ("transport", EventType::Transport),
    ("transportation", EventType::Transport),
    ("transit", EventType::Transport),
    ("travel", EventType::Transport),
    ("commute", EventType::Transport),
    ("transfer", EventType::Transport),
    ("flight", EventType::Transport),
    ("train", EventType::Transport),
    ("bus", EventType::Transport),
    ("metro", EventType::Transport),
    ("subway", EventType::Transport),
    ("taxi", EventType::Transport),
    ("ferry", EventType::Transport),
    ("walk", EventType::Transport),
    ("walking", EventType::Transport),
    ("drive", EventType::Transport),
    ("stay", EventType::Stay),
    ("hotel", EventType::Stay),
    ("accommodation", EventType::Stay),
    ("lodging", EventType::Stay),
    ("hostel", EventType::Stay),
    ("ryokan", EventType::Stay),
    ("check in", EventType::Stay),
    ("check out", EventType::Stay),
    ("checkin", EventType::Stay),
    ("checkout", EventType::Stay),
    ("food", EventType::Food),
    ("meal", EventType::Food),
    ("breakfast", EventType::Food),
    ("brunch", EventType::Food),
    ("lunch", EventType::Food),
    ("dinner", EventType::Food),
    ("snack", EventType::Food),
    ("cafe", EventType::Food),
    ("coffee", EventType::Food),
    ("restaurant", EventType::Food),
    ("dining", EventType::Food),
    ("street food", EventType::Food),
    ("food market", EventType::Food),
    ("attraction", EventType::Attraction),
    ("sightseeing", EventType::Attraction),
    ("sight", EventType::Attraction),
    ("museum", EventType::Attraction),
    ("gallery", EventType::Attraction),
    ("temple", EventType::Attraction),
    ("shrine", EventType::Attraction),
    ("church", EventType::Attraction),
    ("castle", EventType::Attraction),
    ("palace", EventType::Attraction),
    ("landmark", EventType::Attraction),
    ("monument", EventType::Attraction),
    ("tour", EventType::Attraction),
    ("activity", EventType::Attraction),
    ("shopping", EventType::Attraction),
    ("nature", EventType::Nature),
    ("park", EventType::Nature),
    ("garden", EventType::Nature),
    ("hike", EventType::Nature),
    ("hiking", EventType::Nature),
    ("beach", EventType::Nature),
    ("mountain", EventType::Nature),
    ("lake", EventType::Nature),
    ("outdoor", EventType::Nature),
    ("outdoors", EventType::Nature),
    ("entertainment", EventType::Entertainment),
    ("show", EventType::Entertainment),
    ("nightlife", EventType::Entertainment),
    ("bar", EventType::Entertainment),
    ("club", EventType::Entertainment),
    ("concert", EventType::Entertainment),
    ("theater", EventType::Entertainment),
    ("theatre", EventType::Entertainment),
    ("performance", EventType::Entertainment),
    ("event", EventType::Event),
    ("festival", EventType::Event),
    ("ceremony", EventType::Event),
    ("exhibition", EventType::Event),
];

/// Map a free-form event type onto the closed vocabulary.
///
/// Matching is case-insensitive and treats `_`/`-` as spaces. A trailing
/// plural `s` is tolerated. Unrecognized words fall back to [`EventType::Event`].
pub fn normalize_event_type(raw: &str) -> EventType {
    let key = raw
        .trim()
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if let Some(kind) = lookup_event_type(&key) {
        return kind;
    }

    if let Some(singular) = key.strip_suffix('s') {
        if let Some(kind) = lookup_event_type(singular) {
            return kind;
        }
    }

    debug!(target: "itinerary::schema", event_type = raw, "unmapped event type, using `event`");
    EventType::Event
}

fn lookup_event_type(key: &str) -> Option<EventType> {
    EVENT_TYPE_SYNONYMS
        .iter()
        .find(|(synonym, _)| *synonym == key)
        .map(|(_, kind)| *kind)
}

/// Prefix `https://` onto a website that has no scheme. Blank input becomes `None`.
pub fn normalize_website(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Some(trimmed.to_string());
    }

    let without_slashes = trimmed.trim_start_matches('/');
    Some(format!("https://{}", without_slashes))
}

/// Render any cost value as a string.
pub fn stringify_cost(value: &Value) -> String {
    match value {
        Value::Null => UNKNOWN_COST.to_string(),
        Value::String(text) if text.trim().is_empty() => UNKNOWN_COST.to_string(),
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        other => other.to_string(),
    }
}

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").expect("valid number pattern"))
}

/// Parse a cost estimate such as `"350"`, `"$1,200"` or `"300-400 USD"`.
///
/// When two numbers are present the midpoint of the first two is returned.
pub fn parse_cost_estimate(raw: &str) -> Option<f64> {
    let numbers: Vec<f64> = number_pattern()
        .find_iter(raw)
        .filter_map(|m| m.as_str().replace(',', "").parse::<f64>().ok())
        .take(2)
        .collect();

    match numbers.as_slice() {
        [] => None,
        [single] => Some(*single),
        [low, high] => Some((low + high) / 2.0),
        _ => None,
    }
}

/// Coerce a scalar, list or null into a list of non-blank strings.
pub fn coerce_string_list(value: Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.into_iter().filter_map(scalar_text).collect(),
        other => scalar_text(other).into_iter().collect(),
    }
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        other => Some(other.to_string()),
    }
}

pub(crate) fn de_string_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(coerce_string_list(Value::deserialize(deserializer)?))
}

pub(crate) fn de_cost<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(stringify_cost(&Value::deserialize(deserializer)?))
}

pub(crate) fn default_cost() -> String {
    UNKNOWN_COST.to_string()
}

pub(crate) fn de_website<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(de_opt_text(deserializer)?.and_then(|site| normalize_website(&site)))
}

pub(crate) fn de_opt_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_text(Value::deserialize(deserializer)?))
}

pub(crate) fn de_total_cost<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(number) => Ok(number.as_f64()),
        Value::String(text) => Ok(parse_cost_estimate(&text)),
        _ => Ok(None),
    }
}

fn value_to_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(text) => text.trim().parse::<u32>().ok(),
        _ => None,
    }
}

pub(crate) fn de_u32<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_to_u32(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected a non-negative integer, got {}", value)))
}

pub(crate) fn de_opt_u32<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_to_u32(&Value::deserialize(deserializer)?))
}

/// Construct a typed [`Itinerary`] from raw generator output.
///
/// Coercion happens during deserialization; structural rules are checked
/// afterwards. Both kinds of failure surface as [`AgentError::SchemaValidation`].
pub fn itinerary_from_generated(raw: Value) -> Result<Itinerary> {
    let text = raw.to_string();
    let mut deserializer = serde_json::Deserializer::from_str(&text);
    let itinerary: Itinerary =
        serde_path_to_error::deserialize(&mut deserializer).map_err(|err| {
            let path = err.path().to_string();
            let location = if path.is_empty() || path == "." {
                "<root>".to_string()
            } else {
                path
            };
            AgentError::SchemaValidation {
                message: "generated itinerary could not be constructed".to_string(),
                details: Some(format!("{}: {}", location, err.inner())),
            }
        })?;

    itinerary.validate()?;
    Ok(itinerary)
}

/// Normalizer attached to the `Itinerary` completion schema.
pub fn normalize_itinerary_payload(raw: Value) -> Result<Value> {
    let itinerary = itinerary_from_generated(raw)?;
    Ok(serde_json::to_value(itinerary)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn synonyms_map_deterministically() {
        assert_eq!(normalize_event_type("museum"), EventType::Attraction);
        assert_eq!(normalize_event_type("Meal"), EventType::Food);
        assert_eq!(normalize_event_type("  LUNCH "), EventType::Food);
        assert_eq!(normalize_event_type("Hotel"), EventType::Stay);
        assert_eq!(normalize_event_type("check-in"), EventType::Stay);
        assert_eq!(normalize_event_type("temples"), EventType::Attraction);
        assert_eq!(normalize_event_type("street_food"), EventType::Food);
        assert_eq!(normalize_event_type("garden"), EventType::Nature);
        assert_eq!(normalize_event_type("theatre"), EventType::Entertainment);
        assert_eq!(normalize_event_type("metro"), EventType::Transport);
        assert_eq!(normalize_event_type("something odd"), EventType::Event);
    }

    #[test]
    fn canonical_names_map_to_themselves() {
        for kind in EventType::ALL {
            assert_eq!(normalize_event_type(kind.as_str()), kind);
        }
    }

    #[test]
    fn website_gets_scheme_once() {
        assert_eq!(
            normalize_website("example.com").as_deref(),
            Some("https://example.com")
        );
        assert_eq!(
            normalize_website("http://example.com").as_deref(),
            Some("http://example.com")
        );
        assert_eq!(
            normalize_website("HTTPS://Example.com/a").as_deref(),
            Some("HTTPS://Example.com/a")
        );
        assert_eq!(normalize_website("   "), None);

        let once = normalize_website("www.kyoto.travel").unwrap();
        assert_eq!(normalize_website(&once).unwrap(), once);
    }

    #[test]
    fn costs_are_always_strings() {
        assert_eq!(stringify_cost(&json!(25)), "25");
        assert_eq!(stringify_cost(&json!(10.5)), "10.5");
        assert_eq!(stringify_cost(&json!("Free")), "Free");
        assert_eq!(stringify_cost(&json!(null)), UNKNOWN_COST);
        assert_eq!(stringify_cost(&json!("")), UNKNOWN_COST);
    }

    #[test]
    fn cost_estimates_use_range_midpoint() {
        assert_eq!(parse_cost_estimate("350"), Some(350.0));
        assert_eq!(parse_cost_estimate("$1,200"), Some(1200.0));
        assert_eq!(parse_cost_estimate("300-400 USD"), Some(350.0));
        assert_eq!(parse_cost_estimate("between 100 and 150"), Some(125.0));
        assert_eq!(parse_cost_estimate("varies"), None);
    }

    #[test]
    fn list_fields_accept_scalars_and_null() {
        assert_eq!(coerce_string_list(json!(null)), Vec::<String>::new());
        assert_eq!(coerce_string_list(json!("temples")), vec!["temples"]);
        assert_eq!(coerce_string_list(json!("")), Vec::<String>::new());
        assert_eq!(
            coerce_string_list(json!(["a", null, " b ", 3])),
            vec!["a", "b", "3"]
        );
    }

    #[test]
    fn generated_payload_is_coerced_into_contract() {
        let raw = json!({
            "destination": "Kyoto, Japan",
            "duration_days": "2",
            "interests": "temples",
            "estimatedTotalCost": "300-400 USD",
            "days": [{
                "day": 1,
                "events": [{
                    "type": "museum",
                    "description": "Kyoto National Museum",
                    "cost": 1000,
                    "website": "www.kyohaku.go.jp"
                }]
            }],
            "notes": "Carry cash"
        });

        let normalized = normalize_itinerary_payload(raw).unwrap();
        assert_eq!(normalized["duration_days"], 2);
        assert_eq!(normalized["interests"], json!(["temples"]));
        assert_eq!(normalized["estimatedTotalCost"], 350.0);
        assert_eq!(normalized["general_notes"], json!(["Carry cash"]));
        let event = &normalized["days"][0]["events"][0];
        assert_eq!(event["type"], "attraction");
        assert_eq!(event["cost"], "1000");
        assert_eq!(event["website"], "https://www.kyohaku.go.jp");
    }

    #[test]
    fn missing_lists_materialize_empty() {
        let normalized =
            normalize_itinerary_payload(json!({ "destination": "Lisbon", "days": [] })).unwrap();
        assert_eq!(normalized["interests"], json!([]));
        assert_eq!(normalized["general_notes"], json!([]));
    }

    #[test]
    fn uncoercible_payload_is_rejected_with_path() {
        let err = normalize_itinerary_payload(json!({
            "destination": "Lisbon",
            "days": [{ "day": "first", "events": [] }]
        }))
        .unwrap_err();

        match err {
            AgentError::SchemaValidation { details, .. } => {
                assert!(details.unwrap().contains("days[0].day"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn blank_destination_fails_validation() {
        let err = normalize_itinerary_payload(json!({ "destination": " ", "days": [] })).unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_VALIDATION_ERROR");
    }
}
