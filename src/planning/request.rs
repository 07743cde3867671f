use std::{fmt, str::FromStr};

use chrono::{Duration as DateDelta, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    error::{AgentError, Result},
    schemas::normalize::coerce_string_list,
};

/// Longest trip the worker will plan, in days.
pub const MAX_TRIP_DAYS: u32 = 30;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetTier {
    Low,
    Medium,
    High,
    Luxury,
}

impl BudgetTier {
    pub fn as_str(self) -> &'static str {
        match self {
            BudgetTier::Low => "low",
            BudgetTier::Medium => "medium",
            BudgetTier::High => "high",
            BudgetTier::Luxury => "luxury",
        }
    }
}

impl fmt::Display for BudgetTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BudgetTier {
    type Err = AgentError;

    fn from_str(raw: &str) -> Result<Self> {
        let key = raw.trim().to_lowercase().replace(['_', ' '], "-");
        let tier = match key.as_str() {
            "low" | "budget" | "cheap" | "economy" | "inexpensive" | "backpacker" => {
                BudgetTier::Low
            }
            "medium" | "moderate" | "mid" | "mid-range" | "midrange" | "average" | "standard" => {
                BudgetTier::Medium
            }
            "high" | "expensive" | "premium" | "upscale" => BudgetTier::High,
            "luxury" | "luxurious" | "deluxe" | "lavish" => BudgetTier::Luxury,
            _ => {
                return Err(AgentError::InvalidRequest(format!(
                    "unknown budget level '{}'; expected low, medium, high or luxury",
                    raw.trim()
                )))
            }
        };
        Ok(tier)
    }
}

/// Requested budget: a known tier, or free text such as `"$2000"` passed
/// through to the agents as given.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Budget {
    Tier(BudgetTier),
    Other(String),
}

impl Budget {
    /// Best-effort tier recognition; never fails.
    pub fn parse(raw: &str) -> Self {
        raw.parse::<BudgetTier>()
            .map(Budget::Tier)
            .unwrap_or_else(|_| Budget::Other(raw.trim().to_string()))
    }

    pub fn tier(&self) -> Option<BudgetTier> {
        match self {
            Budget::Tier(tier) => Some(*tier),
            Budget::Other(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Budget::Tier(tier) => tier.as_str(),
            Budget::Other(text) => text,
        }
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How long the trip lasts, resolved before planning starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripSchedule {
    Dates { start: NaiveDate, end: NaiveDate },
    Duration(u32),
}

/// A validated, immutable travel request.
#[derive(Debug, Clone, PartialEq)]
pub struct TravelRequest {
    destination: String,
    schedule: TripSchedule,
    budget: Option<Budget>,
    interests: Vec<String>,
    preferences: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RawTravelRequest {
    #[serde(default)]
    destination: Option<String>,
    #[serde(default, rename = "startDate", alias = "start_date")]
    start_date: Option<String>,
    #[serde(default, rename = "endDate", alias = "end_date")]
    end_date: Option<String>,
    #[serde(default, alias = "durationDays")]
    duration_days: Option<Value>,
    #[serde(default)]
    budget: Option<String>,
    #[serde(default)]
    interests: Value,
    #[serde(default)]
    preferences: Value,
}

impl TravelRequest {
    /// Decode an inbound message body.
    ///
    /// Bytes that are not JSON are a [`AgentError::Decode`]; everything else
    /// that fails is an [`AgentError::InvalidRequest`].
    pub fn from_json_slice(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body).map_err(|err| {
            AgentError::Decode(format!(
                "Failed to decode JSON: {} ({})",
                String::from_utf8_lossy(body),
                err
            ))
        })?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(AgentError::InvalidRequest(
                "Invalid request format or missing 'destination'.".to_string(),
            ));
        }

        let raw: RawTravelRequest = serde_json::from_value(value)
            .map_err(|err| AgentError::InvalidRequest(format!("malformed field: {}", err)))?;

        let destination = raw
            .destination
            .as_deref()
            .map(str::trim)
            .filter(|dest| !dest.is_empty())
            .ok_or_else(|| {
                AgentError::InvalidRequest(
                    "Invalid request format or missing 'destination'.".to_string(),
                )
            })?
            .to_string();

        let schedule = resolve_schedule(
            blank_to_none(raw.start_date),
            blank_to_none(raw.end_date),
            raw.duration_days,
        )?;

        let budget = blank_to_none(raw.budget).map(|raw_budget| Budget::parse(&raw_budget));

        let preferences = match raw.preferences {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(AgentError::InvalidRequest(format!(
                    "'preferences' must be a JSON object, got {}",
                    other
                )))
            }
        };

        Ok(Self {
            destination,
            schedule,
            budget,
            interests: dedupe_interests(coerce_string_list(raw.interests)),
            preferences,
        })
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn schedule(&self) -> TripSchedule {
        self.schedule
    }

    pub fn budget(&self) -> Option<&Budget> {
        self.budget.as_ref()
    }

    pub fn interests(&self) -> &[String] {
        &self.interests
    }

    pub fn preferences(&self) -> &Map<String, Value> {
        &self.preferences
    }

    /// Number of itinerary days to produce.
    pub fn day_count(&self) -> u32 {
        match self.schedule {
            TripSchedule::Dates { start, end } => (end - start).num_days() as u32 + 1,
            TripSchedule::Duration(days) => days,
        }
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        match self.schedule {
            TripSchedule::Dates { start, .. } => Some(start),
            TripSchedule::Duration(_) => None,
        }
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        match self.schedule {
            TripSchedule::Dates { end, .. } => Some(end),
            TripSchedule::Duration(_) => None,
        }
    }

    /// Calendar date of a 1-based day, when the trip has dates.
    pub fn date_for_day(&self, day: u32) -> Option<NaiveDate> {
        if day == 0 || day > self.day_count() {
            return None;
        }
        self.start_date()
            .map(|start| start + DateDelta::days(i64::from(day) - 1))
    }

    /// Canonical JSON echo of the request, in the inbound field names.
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "destination": self.destination,
            "startDate": self.start_date().map(format_date),
            "endDate": self.end_date().map(format_date),
            "duration_days": self.day_count(),
            "budget": self.budget.as_ref().map(Budget::as_str),
            "interests": self.interests,
            "preferences": self.preferences,
        })
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| {
        AgentError::InvalidRequest(format!(
            "'{}' must be a date in YYYY-MM-DD format, got '{}'",
            field, raw
        ))
    })
}

fn parse_duration(value: &Value) -> Result<Option<u32>> {
    let days = match value {
        Value::Null => return Ok(None),
        Value::Number(number) => number.as_u64(),
        Value::String(text) if text.trim().is_empty() => return Ok(None),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    };

    match days {
        Some(0) | None => Err(AgentError::InvalidRequest(format!(
            "'duration_days' must be a positive integer, got {}",
            value
        ))),
        Some(days) if days > u64::from(MAX_TRIP_DAYS) => Err(AgentError::InvalidRequest(format!(
            "trips longer than {} days are not supported (duration_days = {})",
            MAX_TRIP_DAYS, days
        ))),
        Some(days) => Ok(Some(days as u32)),
    }
}

fn resolve_schedule(
    start: Option<String>,
    end: Option<String>,
    duration: Option<Value>,
) -> Result<TripSchedule> {
    match (start, end) {
        (Some(start), Some(end)) => {
            let start = parse_date("startDate", &start)?;
            let end = parse_date("endDate", &end)?;
            if end < start {
                return Err(AgentError::InvalidRequest(format!(
                    "'endDate' {} is before 'startDate' {}",
                    format_date(end),
                    format_date(start)
                )));
            }
            let days = (end - start).num_days() + 1;
            if days > i64::from(MAX_TRIP_DAYS) {
                return Err(AgentError::InvalidRequest(format!(
                    "trips longer than {} days are not supported ({} days requested)",
                    MAX_TRIP_DAYS, days
                )));
            }
            Ok(TripSchedule::Dates { start, end })
        }
        _ => {
            let days = match &duration {
                Some(value) => parse_duration(value)?,
                None => None,
            };
            days.map(TripSchedule::Duration).ok_or_else(|| {
                AgentError::InvalidRequest(
                    "Missing required fields: Provide either 'startDate'/'endDate' or 'duration_days'."
                        .to_string(),
                )
            })
        }
    }
}

fn dedupe_interests(interests: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    interests
        .into_iter()
        .map(|interest| interest.trim().to_string())
        .filter(|interest| !interest.is_empty() && seen.insert(interest.to_lowercase()))
        .collect()
}
