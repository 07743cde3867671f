#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use itinerary_swarm::{ChatBackend, Result, SpecialistRole};
use serde_json::{json, Value};

/// Which agent a chat request came from, judged by its system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    Coordinator,
    Specialist(SpecialistRole),
}

fn caller_of(body: &Value) -> Caller {
    let system = body["messages"][0]["content"].as_str().unwrap_or_default();
    if system.contains("only agent who may delegate") {
        return Caller::Coordinator;
    }
    SpecialistRole::ALL
        .into_iter()
        .find(|role| system.starts_with(&format!("You are the {}.", role.profile().role)))
        .map(Caller::Specialist)
        .unwrap_or(Caller::Coordinator)
}

/// Number of tool replies already in the conversation, i.e. the turn index.
fn turn_of(body: &Value) -> usize {
    body["messages"]
        .as_array()
        .map(|messages| messages.iter().filter(|m| m["role"] == "tool").count())
        .unwrap_or(0)
}

pub fn tool_call(id: &str, name: &str, arguments: Value) -> Value {
    json!({
        "choices": [{
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": id,
                    "type": "function",
                    "function": { "name": name, "arguments": arguments.to_string() }
                }]
            }
        }],
        "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
    })
}

pub fn delegate(id: &str, specialist: &str, task: &str) -> Value {
    tool_call(
        id,
        "delegate_work",
        json!({
            "specialist": specialist,
            "task": task,
            "context": {
                "location": "Kyoto, Japan",
                "timeframe": "2025-04-01 to 2025-04-02",
                "budget": "medium",
                "interests": ["temples", "food"]
            }
        }),
    )
}

pub fn submit(id: &str, itinerary: Value) -> Value {
    tool_call(id, "structured_response", json!({ "structured": itinerary }))
}

pub fn final_answer(id: &str, answer: &str) -> Value {
    tool_call(id, "final_answer", json!({ "answer": answer }))
}

/// Chat backend replaying fixed coordinator turns and canned specialist answers.
///
/// Specialists first call their first granted tool, then answer with the
/// text registered for their role.
#[derive(Debug)]
pub struct ScriptedBackend {
    coordinator_turns: Vec<Value>,
    specialist_answers: Vec<(SpecialistRole, String)>,
    requests: Mutex<Vec<(Caller, Value)>>,
}

impl ScriptedBackend {
    pub fn new(coordinator_turns: Vec<Value>) -> Self {
        Self {
            coordinator_turns,
            specialist_answers: Vec::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_answer(mut self, role: SpecialistRole, answer: &str) -> Self {
        self.specialist_answers.push((role, answer.to_string()));
        self
    }

    pub fn into_handle(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls_from(&self, caller: Caller) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == caller)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Tool replies the coordinator saw in its last request.
    pub fn last_coordinator_observations(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(caller, _)| *caller == Caller::Coordinator)
            .and_then(|(_, body)| body["messages"].as_array().cloned())
            .unwrap_or_default()
            .iter()
            .filter(|m| m["role"] == "tool")
            .filter_map(|m| m["content"].as_str().map(str::to_string))
            .collect()
    }

    fn specialist_turn(&self, role: SpecialistRole, turn: usize) -> Value {
        if turn == 0 {
            let capability = role.capabilities()[0];
            return tool_call(
                "specialist-call-1",
                capability.tool_name(),
                json!({ "query": format!("{} options in Kyoto", role) }),
            );
        }
        let answer = self
            .specialist_answers
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, answer)| answer.clone())
            .unwrap_or_else(|| format!("NO_QUALIFYING_RESULT: nothing scripted for {}", role));
        final_answer("specialist-final", &answer)
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn chat_completion(&self, body: &Value, _timeout: Duration) -> Result<Value> {
        let caller = caller_of(body);
        let turn = turn_of(body);
        self.requests.lock().unwrap().push((caller, body.clone()));

        let reply = match caller {
            Caller::Coordinator => self
                .coordinator_turns
                .get(turn)
                .or_else(|| self.coordinator_turns.last())
                .cloned()
                .unwrap_or_else(|| json!({ "choices": [{ "message": { "content": "" } }] })),
            Caller::Specialist(role) => self.specialist_turn(role, turn),
        };
        Ok(reply)
    }
}

pub fn kyoto_request() -> Value {
    json!({
        "destination": "Kyoto, Japan",
        "startDate": "2025-04-01",
        "endDate": "2025-04-02",
        "budget": "medium",
        "interests": ["temples", "food"]
    })
}

/// A loosely typed itinerary the way a model tends to write it.
pub fn kyoto_itinerary() -> Value {
    json!({
        "destination": "Kyoto",
        "duration_days": "2",
        "budget": "medium",
        "interests": "temples, food",
        "summary": "Temples in the east, markets in the centre.",
        "days": [
            {
                "day": 1,
                "theme": "Higashiyama temples",
                "events": [
                    {
                        "type": "temple",
                        "description": "Kiyomizu-dera at opening time",
                        "startTime": "08:00",
                        "location": "1-294 Kiyomizu, Higashiyama",
                        "cost": 400,
                        "website": "www.kiyomizudera.or.jp"
                    },
                    {
                        "type": "lunch",
                        "description": "Yudofu lunch near Nanzen-ji",
                        "cost": "2000-3000 JPY"
                    }
                ]
            },
            {
                "day": "2",
                "theme": "Markets",
                "events": [
                    {
                        "type": "subway",
                        "description": "Karasuma line to Shijo",
                        "travelTime": "12 mins"
                    },
                    {
                        "type": "market",
                        "description": "Nishiki Market tasting walk"
                    }
                ]
            }
        ],
        "estimatedTotalCost": "$200-$300",
        "notes": "Buy an ICOCA card on arrival."
    })
}
