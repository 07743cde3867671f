use std::{collections::HashSet, fmt};

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{
    completion_schema,
    error::{AgentError, Result},
    schemas::normalize::{
        de_cost, de_opt_text, de_opt_u32, de_string_list, de_total_cost, de_u32, de_website,
        default_cost, normalize_event_type,
    },
};

/// Final day-by-day travel plan produced by the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[completion_schema(
    name = "FinalItinerary",
    normalize = "crate::schemas::normalize::normalize_itinerary_payload"
)]
pub struct Itinerary {
    /// Primary destination city and country (e.g., "Kyoto, Japan")
    pub destination: String,
    /// Total duration of the trip in days
    #[serde(default, alias = "durationDays", deserialize_with = "de_opt_u32")]
    pub duration_days: Option<u32>,
    /// Trip start date (YYYY-MM-DD)
    #[serde(default, alias = "startDate", deserialize_with = "de_opt_text")]
    pub start_date: Option<String>,
    /// Trip end date (YYYY-MM-DD)
    #[serde(default, alias = "endDate", deserialize_with = "de_opt_text")]
    pub end_date: Option<String>,
    /// Budget level (low, medium, high, luxury)
    #[serde(default, deserialize_with = "de_opt_text")]
    pub budget: Option<String>,
    /// User interests, always a list of strings (empty when none)
    #[serde(default, deserialize_with = "de_string_list")]
    pub interests: Vec<String>,
    /// Brief overall summary of the trip
    #[serde(default, deserialize_with = "de_opt_text")]
    pub summary: Option<String>,
    /// Ordered list of daily plans
    #[serde(default)]
    pub days: Vec<Day>,
    /// Overall cost estimate as a single number; use the midpoint when only a range is known
    #[serde(
        default,
        rename = "estimatedTotalCost",
        alias = "estimated_total_cost",
        deserialize_with = "de_total_cost"
    )]
    pub estimated_total_cost: Option<f64>,
    /// General travel notes and tips, always a list of strings (empty when none)
    #[serde(
        default,
        alias = "notes",
        alias = "generalNotes",
        deserialize_with = "de_string_list"
    )]
    pub general_notes: Vec<String>,
}

/// A single day of the itinerary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Day {
    /// 1-based day number
    #[serde(deserialize_with = "de_u32")]
    #[schemars(range(min = 1))]
    pub day: u32,
    /// Calendar date for the day (YYYY-MM-DD), if known
    #[serde(default, deserialize_with = "de_opt_text")]
    pub date: Option<String>,
    /// Short theme for the day's activities
    #[serde(default, deserialize_with = "de_opt_text")]
    pub theme: Option<String>,
    /// Events in chronological order
    #[serde(default)]
    pub events: Vec<Event>,
}

/// One scheduled item within a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Event {
    /// Event category
    #[serde(rename = "type")]
    pub kind: EventType,
    pub description: String,
    #[serde(
        default,
        rename = "startTime",
        alias = "start_time",
        deserialize_with = "de_opt_text"
    )]
    pub start_time: Option<String>,
    #[serde(
        default,
        rename = "endTime",
        alias = "end_time",
        deserialize_with = "de_opt_text"
    )]
    pub end_time: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub location: Option<String>,
    /// Cost as a string (e.g., "25", "Free", "Varies")
    #[serde(default = "default_cost", deserialize_with = "de_cost")]
    pub cost: String,
    #[serde(
        default,
        rename = "bookingInfo",
        alias = "booking_info",
        deserialize_with = "de_opt_text"
    )]
    pub booking_info: Option<String>,
    #[serde(
        default,
        rename = "travelTime",
        alias = "travel_time",
        deserialize_with = "de_opt_text"
    )]
    pub travel_time: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub distance: Option<String>,
    #[serde(
        default,
        rename = "transportMode",
        alias = "transport_mode",
        deserialize_with = "de_opt_text"
    )]
    pub transport_mode: Option<String>,
    /// Website including its scheme
    #[serde(default, deserialize_with = "de_website")]
    pub website: Option<String>,
    #[serde(
        default,
        rename = "opening_hours",
        alias = "openingHours",
        deserialize_with = "de_opt_text"
    )]
    pub opening_hours: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub details: Option<String>,
}

/// Closed event vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Transport,
    Stay,
    Food,
    Attraction,
    Nature,
    Entertainment,
    Event,
}

impl EventType {
    pub const ALL: [EventType; 7] = [
        EventType::Transport,
        EventType::Stay,
        EventType::Food,
        EventType::Attraction,
        EventType::Nature,
        EventType::Entertainment,
        EventType::Event,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Transport => "transport",
            EventType::Stay => "stay",
            EventType::Food => "food",
            EventType::Attraction => "attraction",
            EventType::Nature => "nature",
            EventType::Entertainment => "entertainment",
            EventType::Event => "event",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(raw) => Ok(normalize_event_type(&raw)),
            Value::Null => Ok(EventType::Event),
            other => Err(serde::de::Error::custom(format!(
                "event type must be a string, got {}",
                other
            ))),
        }
    }
}

impl Itinerary {
    /// An itinerary skeleton with explicit empty markers.
    pub fn empty(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            duration_days: None,
            start_date: None,
            end_date: None,
            budget: None,
            interests: Vec::new(),
            summary: None,
            days: Vec::new(),
            estimated_total_cost: None,
            general_notes: Vec::new(),
        }
    }

    /// Structural checks that run after coercion.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.destination.trim().is_empty() {
            problems.push("destination: must not be empty".to_string());
        }

        let mut seen = HashSet::new();
        for (idx, day) in self.days.iter().enumerate() {
            if day.day == 0 {
                problems.push(format!("days[{}].day: must be 1 or greater", idx));
            } else if !seen.insert(day.day) {
                problems.push(format!("days[{}].day: duplicate day number {}", idx, day.day));
            }

            for (event_idx, event) in day.events.iter().enumerate() {
                if event.description.trim().is_empty() {
                    problems.push(format!(
                        "days[{}].events[{}].description: must not be empty",
                        idx, event_idx
                    ));
                }
            }
        }

        if let Some(cost) = self.estimated_total_cost {
            if !cost.is_finite() || cost < 0.0 {
                problems.push(format!(
                    "estimatedTotalCost: must be a non-negative number, got {}",
                    cost
                ));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(AgentError::SchemaValidation {
                message: "itinerary failed structural validation".to_string(),
                details: Some(problems.join("; ")),
            })
        }
    }

    /// Number of events across all days.
    pub fn event_count(&self) -> usize {
        self.days.iter().map(|day| day.events.len()).sum()
    }

    /// Events of one category, in day order.
    pub fn events_of(&self, kind: EventType) -> impl Iterator<Item = &Event> {
        self.days
            .iter()
            .flat_map(|day| day.events.iter())
            .filter(move |event| event.kind == kind)
    }
}

impl Day {
    pub fn new(day: u32) -> Self {
        Self {
            day,
            date: None,
            theme: None,
            events: Vec::new(),
        }
    }
}
