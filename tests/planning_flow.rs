mod support;

use std::sync::Arc;

use itinerary_swarm::{
    config::PlannerSettings, AgentError, CapabilitySet, EventType, ItineraryPlanner,
    OrchestrationEngine, ProviderConfig, SpecialistRole, TravelRequest,
};
use mockito::Matcher;
use serde_json::json;
use support::{
    delegate, kyoto_itinerary, kyoto_request, submit, tool_call, Caller, ScriptedBackend,
};

fn engine(backend: &Arc<ScriptedBackend>, capabilities: CapabilitySet) -> OrchestrationEngine {
    OrchestrationEngine::new(backend.clone(), capabilities, PlannerSettings::default())
}

fn request() -> TravelRequest {
    TravelRequest::from_value(kyoto_request()).unwrap()
}

#[tokio::test]
async fn kyoto_two_day_plan_end_to_end() {
    let mut server = mockito::Server::new_async().await;
    let places = server
        .mock("GET", "/maps/api/place/textsearch/json")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            json!({
                "status": "OK",
                "results": [{ "name": "Kiyomizu-dera", "formatted_address": "Higashiyama, Kyoto", "rating": 4.6 }]
            })
            .to_string(),
        )
        .expect(3)
        .create_async()
        .await;

    let providers = ProviderConfig {
        google_api_key: Some("g-key".to_string()),
        google_base_url: server.url(),
        ..ProviderConfig::default()
    };
    let capabilities = CapabilitySet::from_config(&reqwest::Client::new(), &providers);

    let backend = ScriptedBackend::new(vec![
        delegate("c1", "attractions", "Two temples in Higashiyama for day 1 morning"),
        delegate("c2", "food", "Lunch near Nanzen-ji and a market walk for day 2"),
        tool_call("c3", "place_search", json!({ "query": "Nishiki Market Kyoto" })),
        submit("c4", kyoto_itinerary()),
    ])
    .with_answer(
        SpecialistRole::Attractions,
        "1. Kiyomizu-dera, 400 JPY, opens 06:00\n2. Nanzen-ji, free grounds",
    )
    .with_answer(
        SpecialistRole::Food,
        "1. Okutan Nanzenji (yudofu, 3000 JPY)\n2. Nishiki Market stalls",
    )
    .into_handle();

    let outcome = engine(&backend, capabilities).plan(&request()).await.unwrap();
    places.assert_async().await;

    let itinerary = &outcome.itinerary;
    assert_eq!(itinerary.destination, "Kyoto, Japan");
    assert_eq!(itinerary.duration_days, Some(2));
    assert_eq!(itinerary.days.len(), 2);
    assert_eq!(itinerary.days[0].date.as_deref(), Some("2025-04-01"));
    assert_eq!(itinerary.days[1].date.as_deref(), Some("2025-04-02"));
    assert_eq!(itinerary.interests, vec!["temples", "food"]);
    assert_eq!(itinerary.estimated_total_cost, Some(250.0));
    assert_eq!(itinerary.general_notes, vec!["Buy an ICOCA card on arrival."]);

    let first = &itinerary.days[0].events[0];
    assert_eq!(first.kind, EventType::Attraction);
    assert_eq!(first.cost, "400");
    assert_eq!(first.website.as_deref(), Some("https://www.kiyomizudera.or.jp"));
    assert_eq!(itinerary.days[0].events[1].kind, EventType::Food);
    assert_eq!(itinerary.days[1].events[1].cost, "Unknown");

    let value = serde_json::to_value(itinerary).unwrap();
    for day in value["days"].as_array().unwrap() {
        for event in day["events"].as_array().unwrap() {
            assert!(event["cost"].is_string());
        }
    }

    assert_eq!(outcome.delegations, 2);
    assert_eq!(outcome.trace.actions_named("delegate_work").count(), 2);
    assert_eq!(
        backend.calls_from(Caller::Specialist(SpecialistRole::Attractions)),
        2
    );
    assert_eq!(
        backend.calls_from(Caller::Specialist(SpecialistRole::Transport)),
        0
    );
    assert_eq!(backend.calls_from(Caller::Coordinator), 4);
}

#[tokio::test]
async fn unavailable_search_still_yields_a_complete_itinerary() {
    let backend = ScriptedBackend::new(vec![
        delegate("c1", "food", "Dinner near Gion for day 2"),
        submit(
            "c2",
            json!({
                "destination": "Kyoto, Japan",
                "days": [
                    { "day": 1, "events": [{ "type": "attraction", "description": "Fushimi Inari hike", "cost": "Free" }] },
                    { "day": 2, "events": [] }
                ],
                "general_notes": ["Dining options could not be verified."]
            }),
        ),
    ])
    .into_handle();

    let outcome = engine(&backend, CapabilitySet::unavailable("no API key configured"))
        .plan(&request())
        .await
        .unwrap();

    let observations = backend.last_coordinator_observations();
    assert!(observations[0].starts_with("[food specialist] NO_QUALIFYING_RESULT"));

    let itinerary = outcome.itinerary;
    assert_eq!(itinerary.days.len(), 2);
    assert!(itinerary
        .general_notes
        .contains(&"Day 2: no qualifying result.".to_string()));
    assert!(itinerary
        .general_notes
        .contains(&"Dining options could not be verified.".to_string()));
}

#[tokio::test]
async fn delegation_budget_forces_synthesis() {
    let backend = ScriptedBackend::new(vec![
        delegate("c1", "attractions", "Temples for day 1"),
        delegate("c2", "food", "Lunch for day 1"),
        submit("c3", kyoto_itinerary()),
    ])
    .with_answer(SpecialistRole::Attractions, "Kiyomizu-dera")
    .into_handle();

    let settings = PlannerSettings {
        max_delegations: 1,
        ..PlannerSettings::default()
    };
    let engine = OrchestrationEngine::new(
        backend.clone(),
        CapabilitySet::unavailable("offline"),
        settings,
    );

    let outcome = engine.plan(&request()).await.unwrap();
    assert_eq!(outcome.delegations, 1);
    assert_eq!(backend.calls_from(Caller::Specialist(SpecialistRole::Food)), 0);

    let observations = backend.last_coordinator_observations();
    assert!(observations[0].contains("last delegation round"));
    assert!(observations[1].starts_with("Delegation budget exhausted (1 of 1 rounds used)"));
}

#[tokio::test]
async fn invalid_structured_output_is_terminal() {
    let backend = ScriptedBackend::new(vec![submit(
        "c1",
        json!({
            "destination": "Kyoto, Japan",
            "days": [{ "day": 0, "events": [{ "type": "food", "description": "Ramen" }] }]
        }),
    )])
    .into_handle();

    let err = engine(&backend, CapabilitySet::unavailable("offline"))
        .plan(&request())
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::SchemaValidation { .. }));
    assert_eq!(err.error_code(), "SCHEMA_VALIDATION_ERROR");
    let payload = err.to_job_result();
    assert!(payload["details"]
        .as_str()
        .unwrap()
        .contains("days[0].day: must be 1 or greater"));
    assert_eq!(backend.calls_from(Caller::Coordinator), 1);
}

#[tokio::test]
async fn coordinator_that_never_submits_hits_max_iterations() {
    let backend = ScriptedBackend::new(vec![tool_call(
        "c1",
        "web_search",
        json!({ "query": "Kyoto weather in April" }),
    )])
    .into_handle();

    let settings = PlannerSettings {
        coordinator_max_iterations: 3,
        ..PlannerSettings::default()
    };
    let err = OrchestrationEngine::new(backend.clone(), CapabilitySet::unavailable("offline"), settings)
        .plan(&request())
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::MaxIterations(3)));
    assert_eq!(backend.calls_from(Caller::Coordinator), 3);
    assert!(err.to_job_result()["details"]
        .as_str()
        .unwrap()
        .contains("within 3 iterations"));
}
