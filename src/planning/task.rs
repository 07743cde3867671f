use serde_json::{json, Value};

use super::request::{format_date, TravelRequest};
use crate::agents::{delegation::DELEGATE_TOOL_NAME, role::SpecialistRole};
use crate::tools::Capability;

/// The goal statement handed to the coordinator for one job.
#[derive(Debug, Clone)]
pub struct PlanningTask {
    description: String,
    expected_output: String,
    day_count: u32,
}

impl PlanningTask {
    pub fn from_request(request: &TravelRequest) -> Self {
        let day_count = request.day_count();
        let period = match (request.start_date(), request.end_date()) {
            (Some(start), Some(end)) => format!(
                "between {} and {} ({} days)",
                format_date(start),
                format_date(end),
                day_count
            ),
            _ => format!("for a duration of {} days", day_count),
        };
        let budget = request
            .budget()
            .map(|tier| tier.to_string())
            .unwrap_or_else(|| "not specified".to_string());
        let interests = if request.interests().is_empty() {
            "general".to_string()
        } else {
            request.interests().join(", ")
        };
        let preferences = serde_json::to_string_pretty(request.preferences())
            .unwrap_or_else(|_| "{}".to_string());

        let specialists = SpecialistRole::ALL
            .iter()
            .map(|role| format!("    * `{}`: {}", role.as_str(), role.delegation_hint()))
            .collect::<Vec<_>>()
            .join("\n");

        let description = format!(
            "**Goal:** Create a detailed, optimized and coherent day-by-day travel itinerary.

**Inputs:**
* Destination: {destination}
* Travel Period: {period}
* Budget Level: {budget}
* User Interests: {interests}
* User Preferences: {preferences}

**Phase 1: Decompose and delegate**
1. Go through each of the {day_count} days and choose a logical theme or area based on the interests.
2. Use the `{delegate}` tool to gather findings from the specialists:
{specialists}
3. Every delegation MUST carry the full context object: location, timeframe (specific day or dates), budget and interests, plus any extra constraints in `notes`.

**Phase 2: Verify and optimize**
1. Critically review each finding for relevance, completeness and feasibility.
2. Use `{distance}` to check travel times between activities on the same day and adjust the schedule.
3. Use `{web}` to confirm opening hours, events and prices; use `{places}` to pin down ambiguous locations.
4. When a specialist reports no qualifying result or two findings conflict, re-delegate with revised context or adjust the plan. Do not invent places.

**Phase 3: Synthesize**
1. Build a time-boxed schedule for every day with a logical flow from one event to the next.
2. Estimate `estimatedTotalCost` as one number consistent with the budget level.
3. Put overall tips in `general_notes`. If information for a day is missing, say so in `general_notes` and keep the day with an empty `events` list.
4. Finish by calling the structured response tool with the complete itinerary.",
            destination = request.destination(),
            period = period,
            budget = budget,
            interests = interests,
            preferences = preferences,
            day_count = day_count,
            delegate = DELEGATE_TOOL_NAME,
            specialists = specialists,
            distance = Capability::DistanceTime.tool_name(),
            web = Capability::WebSearch.tool_name(),
            places = Capability::PlaceSearch.tool_name(),
        );

        let example = serde_json::to_string_pretty(&output_example(request))
            .unwrap_or_else(|_| "{}".to_string());

        let expected_output = format!(
            "A complete day-by-day itinerary for {day_count} days in {destination}, with exactly {day_count} entries in `days` numbered from 1.

**TYPE REQUIREMENTS (MANDATORY):**
* `estimatedTotalCost`: a single number such as 350.0. If you estimate a range, give the midpoint.
* `events[].cost`: ALWAYS a string, e.g. \"25\", \"Free\", \"Varies\", \"$5 (parking)\".
* `events[].type`: one of transport, stay, food, attraction, nature, entertainment, event.
* `interests` and `general_notes`: lists of strings; use [] when there are none.
* Populate `location`, `website`, `opening_hours` and `bookingInfo` whenever your research found them.

**Output example (illustrative):**
{example}",
            day_count = day_count,
            destination = request.destination(),
            example = example,
        );

        Self {
            description,
            expected_output,
            day_count,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn expected_output(&self) -> &str {
        &self.expected_output
    }

    pub fn day_count(&self) -> u32 {
        self.day_count
    }

    /// Full prompt sent to the coordinator.
    pub fn prompt(&self) -> String {
        format!(
            "{}\n\n**Expected output:**\n{}",
            self.description, self.expected_output
        )
    }
}

fn output_example(request: &TravelRequest) -> Value {
    let first_date = request
        .start_date()
        .map(format_date)
        .unwrap_or_else(|| "YYYY-MM-DD or null".to_string());

    json!({
        "destination": request.destination(),
        "duration_days": request.day_count(),
        "start_date": request.start_date().map(format_date),
        "end_date": request.end_date().map(format_date),
        "budget": request.budget().map(|tier| tier.as_str()),
        "interests": request.interests(),
        "summary": "A brief trip summary...",
        "days": [{
            "day": 1,
            "date": first_date,
            "theme": "Theme for Day 1",
            "events": [
                {
                    "type": "attraction",
                    "description": "Visit Place X",
                    "startTime": "10:00 AM",
                    "endTime": "12:00 PM",
                    "location": "123 Main St",
                    "cost": "25.00",
                    "website": "https://example.com",
                    "opening_hours": "10 AM - 5 PM Tue-Sun",
                    "bookingInfo": "Book online to skip the queue",
                    "details": "Why Place X fits the day's theme"
                },
                {
                    "type": "transport",
                    "description": "Walk to Lunch Spot",
                    "travelTime": "15 mins",
                    "distance": "1.1 km",
                    "transportMode": "walking",
                    "cost": "Free"
                },
                {
                    "type": "food",
                    "description": "Lunch Spot",
                    "startTime": "12:30 PM",
                    "endTime": "1:30 PM",
                    "location": "456 Side St",
                    "cost": "Varies",
                    "website": null,
                    "opening_hours": "11 AM - 10 PM Daily"
                }
            ]
        }],
        "estimatedTotalCost": 500.0,
        "general_notes": ["General tip 1.", "General tip 2."]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::itinerary::Itinerary;
    use serde_json::json;

    fn kyoto() -> TravelRequest {
        TravelRequest::from_value(json!({
            "destination": "Kyoto, Japan",
            "startDate": "2025-04-01",
            "endDate": "2025-04-02",
            "budget": "medium",
            "interests": ["temples", "food"],
            "preferences": { "pace": "relaxed" }
        }))
        .unwrap()
    }

    #[test]
    fn prompt_carries_request_constraints() {
        let task = PlanningTask::from_request(&kyoto());
        let prompt = task.prompt();

        assert_eq!(task.day_count(), 2);
        assert!(prompt.contains("Destination: Kyoto, Japan"));
        assert!(prompt.contains("between 2025-04-01 and 2025-04-02 (2 days)"));
        assert!(prompt.contains("User Interests: temples, food"));
        assert!(prompt.contains("\"pace\": \"relaxed\""));
        assert!(prompt.contains("`delegate_work`"));
        assert!(prompt.contains("`lodging`"));
        assert!(prompt.contains("exactly 2 entries"));
    }

    #[test]
    fn duration_requests_fall_back_to_general_interests() {
        let request = TravelRequest::from_value(json!({
            "destination": "Oslo",
            "duration_days": 4
        }))
        .unwrap();
        let task = PlanningTask::from_request(&request);
        assert!(task.description().contains("for a duration of 4 days"));
        assert!(task.description().contains("User Interests: general"));
        assert!(task.description().contains("Budget Level: not specified"));
    }

    #[test]
    fn free_text_budget_reaches_the_coordinator() {
        let request = TravelRequest::from_value(json!({
            "destination": "Kyoto, Japan",
            "duration_days": 2,
            "budget": "$2000"
        }))
        .unwrap();
        let task = PlanningTask::from_request(&request);
        assert!(task.description().contains("Budget Level: $2000"));
        assert!(task.expected_output().contains("\"budget\": \"$2000\""));
    }

    #[test]
    fn output_example_is_a_valid_itinerary() {
        let example = output_example(&kyoto());
        let itinerary: Itinerary = serde_json::from_value(example).unwrap();
        itinerary.validate().unwrap();
        assert_eq!(itinerary.days[0].date.as_deref(), Some("2025-04-01"));
    }
}
