use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::{
    agents::Coordinator,
    config::{PlannerSettings, WorkerConfig},
    core::backend::LlmHandle,
    error::Result,
    planning::{request::format_date, PlanningTask, TravelRequest},
    services::OpenAIClient,
    tools::CapabilitySet,
    types::{
        itinerary::{Day, Itinerary},
        result::RunResult,
    },
};

/// A finished plan together with the coordinator's trace.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub itinerary: Itinerary,
    pub trace: RunResult,
    /// `delegate_work` rounds spent on the job
    pub delegations: usize,
}

/// Anything that turns a validated request into one itinerary or one failure.
#[async_trait]
pub trait ItineraryPlanner: Send + Sync {
    async fn plan(&self, request: &TravelRequest) -> Result<PlanOutcome>;
}

/// Runs the coordinator against the planning task under a bounded
/// hierarchical delegation process.
#[derive(Debug, Clone)]
pub struct OrchestrationEngine {
    llm: LlmHandle,
    capabilities: CapabilitySet,
    settings: PlannerSettings,
}

impl OrchestrationEngine {
    pub fn new(llm: LlmHandle, capabilities: CapabilitySet, settings: PlannerSettings) -> Self {
        Self {
            llm,
            capabilities,
            settings,
        }
    }

    /// Wire the chat client and capability providers described by `config`.
    pub fn from_config(config: &WorkerConfig) -> Self {
        let llm: LlmHandle =
            Arc::new(OpenAIClient::new(config.api_key.clone()).with_base_url(config.base_url.clone()));
        let capabilities = CapabilitySet::from_config(&reqwest::Client::new(), &config.providers);
        Self::new(llm, capabilities, config.planner.clone())
    }

    pub fn settings(&self) -> &PlannerSettings {
        &self.settings
    }
}

#[async_trait]
impl ItineraryPlanner for OrchestrationEngine {
    async fn plan(&self, request: &TravelRequest) -> Result<PlanOutcome> {
        let task = PlanningTask::from_request(request);
        let coordinator = Coordinator::new(self.llm.clone(), &self.capabilities, &self.settings);

        info!(
            target: "itinerary::engine",
            destination = request.destination(),
            days = task.day_count(),
            max_delegations = self.settings.max_delegations,
            "planning started"
        );

        let trace = coordinator.run(&task).await?;
        let generated = trace.deserialize_structured::<Itinerary>()?;
        let itinerary = reconcile(generated, request);
        itinerary.validate()?;

        let delegations = coordinator.budget().used();
        info!(
            target: "itinerary::engine",
            destination = request.destination(),
            days = itinerary.days.len(),
            events = itinerary.event_count(),
            delegations,
            iterations = trace.iterations,
            "planning finished"
        );

        Ok(PlanOutcome {
            itinerary,
            trace,
            delegations,
        })
    }
}

fn push_note(itinerary: &mut Itinerary, note: String) {
    if !itinerary.general_notes.iter().any(|existing| *existing == note) {
        itinerary.general_notes.push(note);
    }
}

/// Align a generated itinerary with the request it answers.
///
/// Request fields override generated ones, the day list is forced to the
/// requested length, and every gap is recorded in `general_notes`.
pub fn reconcile(mut itinerary: Itinerary, request: &TravelRequest) -> Itinerary {
    let day_count = request.day_count();

    itinerary.destination = request.destination().to_string();
    itinerary.duration_days = Some(day_count);
    if let Some(start) = request.start_date() {
        itinerary.start_date = Some(format_date(start));
    }
    if let Some(end) = request.end_date() {
        itinerary.end_date = Some(format_date(end));
    }
    if let Some(budget) = request.budget() {
        itinerary.budget = Some(budget.to_string());
    }
    if !request.interests().is_empty() {
        itinerary.interests = request.interests().to_vec();
    }

    itinerary.days.sort_by_key(|day| day.day);

    let surplus = itinerary
        .days
        .iter()
        .filter(|day| day.day > day_count)
        .count();
    if surplus > 0 {
        warn!(target: "itinerary::engine", surplus, day_count, "dropping surplus days");
        itinerary.days.retain(|day| day.day <= day_count);
        push_note(
            &mut itinerary,
            format!(
                "Dropped {} generated day(s) beyond the requested {}-day trip.",
                surplus, day_count
            ),
        );
    }

    let mut padded = Vec::new();
    for number in 1..=day_count {
        if !itinerary.days.iter().any(|day| day.day == number) {
            itinerary.days.push(Day::new(number));
            padded.push(number);
        }
    }
    if !padded.is_empty() {
        warn!(target: "itinerary::engine", missing = ?padded, "padding missing days");
        itinerary.days.sort_by_key(|day| day.day);
    }

    for idx in 0..itinerary.days.len() {
        let number = itinerary.days[idx].day;
        if itinerary.days[idx].date.is_none() {
            itinerary.days[idx].date = request.date_for_day(number).map(format_date);
        }
        if itinerary.days[idx].events.is_empty() {
            let note = if padded.contains(&number) {
                format!(
                    "Day {}: no qualifying result (the generated plan did not cover this day).",
                    number
                )
            } else {
                format!("Day {}: no qualifying result.", number)
            };
            push_note(&mut itinerary, note);
        }
    }

    itinerary
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(body: serde_json::Value) -> TravelRequest {
        TravelRequest::from_value(body).unwrap()
    }

    fn generated(body: serde_json::Value) -> Itinerary {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn request_fields_override_generated_ones() {
        let request = request(json!({
            "destination": "Kyoto, Japan",
            "startDate": "2025-04-01",
            "endDate": "2025-04-01",
            "budget": "medium",
            "interests": ["temples"]
        }));
        let itinerary = reconcile(
            generated(json!({
                "destination": "Kyoto",
                "budget": "luxury",
                "days": [{ "day": 1, "events": [{ "type": "temple", "description": "Kiyomizu-dera" }] }]
            })),
            &request,
        );

        assert_eq!(itinerary.destination, "Kyoto, Japan");
        assert_eq!(itinerary.budget.as_deref(), Some("medium"));
        assert_eq!(itinerary.interests, vec!["temples"]);
        assert_eq!(itinerary.duration_days, Some(1));
        assert_eq!(itinerary.days[0].date.as_deref(), Some("2025-04-01"));
        assert!(itinerary.general_notes.is_empty());
    }

    #[test]
    fn missing_days_are_padded_and_noted() {
        let request = request(json!({ "destination": "Rome", "duration_days": 3 }));
        let itinerary = reconcile(
            generated(json!({
                "destination": "Rome",
                "days": [
                    { "day": 3, "events": [{ "type": "food", "description": "Trastevere dinner" }] },
                    { "day": 1, "events": [] }
                ]
            })),
            &request,
        );

        let numbers: Vec<u32> = itinerary.days.iter().map(|day| day.day).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(itinerary.days[1].date.is_none());
        assert_eq!(
            itinerary.general_notes,
            vec![
                "Day 1: no qualifying result.".to_string(),
                "Day 2: no qualifying result (the generated plan did not cover this day)."
                    .to_string(),
            ]
        );
    }

    #[test]
    fn surplus_days_are_dropped() {
        let request = request(json!({ "destination": "Paris", "duration_days": 1 }));
        let itinerary = reconcile(
            generated(json!({
                "destination": "Paris",
                "days": [
                    { "day": 1, "events": [{ "type": "museum", "description": "Louvre" }] },
                    { "day": 2, "events": [{ "type": "museum", "description": "Orsay" }] }
                ]
            })),
            &request,
        );

        assert_eq!(itinerary.days.len(), 1);
        assert!(itinerary.general_notes[0].starts_with("Dropped 1 generated day(s)"));
        itinerary.validate().unwrap();
    }
}
