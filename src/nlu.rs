//! Slot extraction from free-text travel requests
//!
//! The worker never calls this module; it backs the `parse` CLI command and
//! any front end that needs to turn a chat message into a [`TravelRequest`].

use std::{sync::OnceLock, time::Duration};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{
    core::{agent::DEFAULT_MODEL, backend::LlmHandle},
    error::{AgentError, Result},
    planning::TravelRequest,
    schemas::normalize::{de_opt_text, de_opt_u32, de_string_list},
    services::openai_client::ChatCompletionRequest,
};

pub const REPHRASE_QUESTION: &str = "Sorry, I had trouble processing the details. Could you please rephrase your request clearly stating the destination and duration or dates?";

const ASK_DESTINATION: &str = "Where would you like to travel?";
const ASK_SCHEDULE: &str =
    "How many days will your trip last, or what are your start and end dates (YYYY-MM-DD)?";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NluStatus {
    Complete,
    #[default]
    NeedsClarification,
    ModificationRequest,
    Error,
}

impl NluStatus {
    /// Lenient status parsing; anything unrecognised asks for clarification.
    pub fn from_label(raw: &str) -> Self {
        match raw.trim().to_uppercase().replace([' ', '-'], "_").as_str() {
            "COMPLETE" => NluStatus::Complete,
            "MODIFICATION_REQUEST" | "MODIFICATION" => NluStatus::ModificationRequest,
            "ERROR" => NluStatus::Error,
            _ => NluStatus::NeedsClarification,
        }
    }
}

impl<'de> Deserialize<'de> for NluStatus {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .as_deref()
            .map(NluStatus::from_label)
            .unwrap_or(NluStatus::NeedsClarification))
    }
}

/// Trip parameters extracted so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripSlots {
    #[serde(default, deserialize_with = "de_opt_text")]
    pub destination: Option<String>,
    #[serde(default, alias = "durationDays", deserialize_with = "de_opt_u32")]
    pub duration_days: Option<u32>,
    #[serde(
        default,
        rename = "startDate",
        alias = "start_date",
        deserialize_with = "de_opt_text"
    )]
    pub start_date: Option<String>,
    #[serde(
        default,
        rename = "endDate",
        alias = "end_date",
        deserialize_with = "de_opt_text"
    )]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub budget: Option<String>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub interests: Vec<String>,
}

impl TripSlots {
    /// Overlay `self` on `prior`: values present here win, gaps keep the prior value.
    pub fn merged_over(self, prior: &TripSlots) -> TripSlots {
        TripSlots {
            destination: self.destination.or_else(|| prior.destination.clone()),
            duration_days: self.duration_days.or(prior.duration_days),
            start_date: self.start_date.or_else(|| prior.start_date.clone()),
            end_date: self.end_date.or_else(|| prior.end_date.clone()),
            budget: self.budget.or_else(|| prior.budget.clone()),
            interests: if self.interests.is_empty() {
                prior.interests.clone()
            } else {
                self.interests
            },
        }
    }

    pub fn has_schedule(&self) -> bool {
        self.duration_days.is_some() || (self.start_date.is_some() && self.end_date.is_some())
    }

    pub fn is_complete(&self) -> bool {
        self.destination.is_some() && self.has_schedule()
    }

    /// Question for the most critical missing slot, destination first.
    pub fn missing_slot_question(&self) -> Option<&'static str> {
        if self.destination.is_none() {
            Some(ASK_DESTINATION)
        } else if !self.has_schedule() {
            Some(ASK_SCHEDULE)
        } else {
            None
        }
    }
}

/// What the previous turn established.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NluContext {
    #[serde(flatten)]
    pub slots: TripSlots,
    #[serde(default)]
    pub previous_status: Option<NluStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NluResult {
    pub status: NluStatus,
    #[serde(flatten)]
    pub slots: TripSlots,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarification_question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification_instruction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NluResult {
    fn clarification(slots: TripSlots, question: impl Into<String>) -> Self {
        Self {
            status: NluStatus::NeedsClarification,
            slots,
            clarification_question: Some(question.into()),
            modification_instruction: None,
            error: None,
        }
    }

    /// A COMPLETE result as a validated travel request.
    pub fn to_travel_request(&self) -> Result<TravelRequest> {
        if self.status != NluStatus::Complete {
            return Err(AgentError::InvalidRequest(format!(
                "slot extraction is not complete (status {:?})",
                self.status
            )));
        }
        TravelRequest::from_value(json!({
            "destination": self.slots.destination,
            "duration_days": self.slots.duration_days,
            "startDate": self.slots.start_date,
            "endDate": self.slots.end_date,
            "budget": self.slots.budget,
            "interests": self.slots.interests,
        }))
    }
}

#[async_trait]
pub trait NluService: Send + Sync {
    async fn parse(&self, text: &str, context: Option<&NluContext>) -> Result<NluResult>;
}

/// Slot extraction through one chat completion.
#[derive(Debug, Clone)]
pub struct LlmNluService {
    llm: LlmHandle,
    model: String,
    timeout: Duration,
}

impl LlmNluService {
    pub fn new(llm: LlmHandle) -> Self {
        Self {
            llm,
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn prompt(text: &str, context: Option<&NluContext>) -> String {
        let mut prompt = String::from(
            "Analyze the following travel planning request and extract its parameters.\n\
             Respond ONLY with a JSON object with these keys:\n\
             - \"destination\": string (city, country or specific place) or null\n\
             - \"duration_days\": integer or null; compute it when possible (\"a week\" is 7)\n\
             - \"startDate\": string YYYY-MM-DD or null\n\
             - \"endDate\": string YYYY-MM-DD or null\n\
             - \"budget\": one of \"low\", \"medium\", \"high\", \"luxury\", or null\n\
             - \"interests\": list of short keywords, or null\n\
             - \"status\": \"COMPLETE\" when destination and dates or duration are known, \
             \"MODIFICATION_REQUEST\" when the user asks to change an existing plan, \
             otherwise \"NEEDS_CLARIFICATION\"\n\
             - \"clarification_question\": the question to ask when clarification is needed, else null; \
             ask for the destination first, then duration or dates\n\
             - \"modification_instruction\": the requested change when status is MODIFICATION_REQUEST, else null\n",
        );

        if let Some(context) = context {
            let known = serde_json::to_string(context).unwrap_or_default();
            prompt.push_str(&format!(
                "\nAlready known from earlier messages (keep unless the user changes it): {}\n",
                known
            ));
        }

        prompt.push_str(&format!("\nUser request: \"{}\"", text.trim()));
        prompt
    }

    fn interpret(raw: &str, context: Option<&NluContext>) -> NluResult {
        let prior = context.map(|ctx| ctx.slots.clone()).unwrap_or_default();

        let parsed = extract_json_object(raw)
            .and_then(|json| serde_json::from_str::<RawNluOutput>(json).ok());
        let Some(output) = parsed else {
            warn!(target: "itinerary::nlu", "model output was not a JSON object");
            return NluResult::clarification(prior, REPHRASE_QUESTION);
        };

        let slots = output.slots.merged_over(&prior);
        let question = output
            .clarification_question
            .filter(|question| !question.trim().is_empty());

        match output.status {
            NluStatus::Complete if slots.is_complete() => NluResult {
                status: NluStatus::Complete,
                slots,
                clarification_question: None,
                modification_instruction: None,
                error: None,
            },
            NluStatus::Complete | NluStatus::NeedsClarification => {
                let question = question
                    .or_else(|| slots.missing_slot_question().map(str::to_string))
                    .unwrap_or_else(|| REPHRASE_QUESTION.to_string());
                NluResult::clarification(slots, question)
            }
            NluStatus::ModificationRequest => NluResult {
                status: NluStatus::ModificationRequest,
                slots,
                clarification_question: None,
                modification_instruction: output
                    .modification_instruction
                    .or_else(|| Some(raw_text_fallback(raw))),
                error: None,
            },
            NluStatus::Error => NluResult {
                status: NluStatus::Error,
                slots,
                clarification_question: question,
                modification_instruction: None,
                error: Some("the model reported an extraction error".to_string()),
            },
        }
    }
}

#[async_trait]
impl NluService for LlmNluService {
    async fn parse(&self, text: &str, context: Option<&NluContext>) -> Result<NluResult> {
        if text.trim().is_empty() {
            return Err(AgentError::InvalidRequest(
                "Missing 'user_text' in request body".to_string(),
            ));
        }

        let body = ChatCompletionRequest::new(
            self.model.clone(),
            vec![json!({ "role": "user", "content": Self::prompt(text, context) })],
        )
        .into_value();

        let response = match self.llm.chat_completion(&body, self.timeout).await {
            Ok(response) => response,
            Err(err) => {
                warn!(target: "itinerary::nlu", error = %err, "slot extraction call failed");
                return Ok(NluResult {
                    status: NluStatus::Error,
                    slots: context.map(|ctx| ctx.slots.clone()).unwrap_or_default(),
                    clarification_question: None,
                    modification_instruction: None,
                    error: Some(err.to_string()),
                });
            }
        };

        let content = response
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let result = Self::interpret(content, context);
        info!(
            target: "itinerary::nlu",
            status = ?result.status,
            destination = result.slots.destination.as_deref().unwrap_or("-")
        );
        Ok(result)
    }
}

#[derive(Debug, Deserialize)]
struct RawNluOutput {
    #[serde(default)]
    status: NluStatus,
    #[serde(flatten)]
    slots: TripSlots,
    #[serde(default, deserialize_with = "de_opt_text")]
    clarification_question: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    modification_instruction: Option<String>,
}

fn raw_text_fallback(raw: &str) -> String {
    raw.trim().chars().take(500).collect()
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").expect("valid regex"))
}

/// Pull a JSON object out of fenced or chatty model output.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let candidate = match fence_regex().captures(trimmed).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str(),
        None => trimmed,
    };

    if candidate.starts_with('{') && candidate.ends_with('}') {
        return Some(candidate);
    }
    let start = candidate.find('{')?;
    let end = candidate.rfind('}')?;
    (end > start).then(|| &candidate[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backend::ChatBackend;
    use std::sync::{Arc, Mutex};

    #[derive(Debug)]
    struct Canned {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl Canned {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatBackend for Canned {
        async fn chat_completion(&self, body: &Value, _timeout: Duration) -> Result<Value> {
            let prompt = body["messages"][0]["content"].as_str().unwrap_or_default();
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(json!({ "choices": [{ "message": { "role": "assistant", "content": self.reply } }] }))
        }
    }

    #[test]
    fn extracts_fenced_and_chatty_json() {
        assert_eq!(
            extract_json_object("```json\n{\"a\": 1}\n```"),
            Some("{\"a\": 1}")
        );
        assert_eq!(
            extract_json_object("Sure! Here it is: {\"a\": 1} Hope that helps."),
            Some("{\"a\": 1}")
        );
        assert_eq!(extract_json_object("no braces here"), None);
    }

    #[tokio::test]
    async fn complete_result_becomes_a_travel_request() {
        let backend = Canned::new(
            "```json\n{\"destination\": \"Kyoto, Japan\", \"duration_days\": \"2\", \"budget\": \"medium\", \
             \"interests\": \"temples\", \"status\": \"COMPLETE\", \"clarification_question\": null}\n```",
        );
        let service = LlmNluService::new(backend);

        let result = service
            .parse("Two days in Kyoto looking at temples, mid budget", None)
            .await
            .unwrap();
        assert_eq!(result.status, NluStatus::Complete);
        assert_eq!(result.slots.interests, vec!["temples"]);

        let request = result.to_travel_request().unwrap();
        assert_eq!(request.destination(), "Kyoto, Japan");
        assert_eq!(request.day_count(), 2);
    }

    #[tokio::test]
    async fn complete_without_schedule_is_downgraded() {
        let service = LlmNluService::new(Canned::new(
            "{\"destination\": \"Lisbon\", \"status\": \"COMPLETE\"}",
        ));

        let result = service.parse("I want to see Lisbon", None).await.unwrap();
        assert_eq!(result.status, NluStatus::NeedsClarification);
        assert_eq!(result.clarification_question.as_deref(), Some(ASK_SCHEDULE));
        assert!(result.to_travel_request().is_err());
    }

    #[tokio::test]
    async fn prior_context_fills_gaps_and_new_values_win() {
        let backend = Canned::new(
            "{\"destination\": null, \"duration_days\": 4, \"budget\": \"low\", \"status\": \"COMPLETE\"}",
        );
        let service = LlmNluService::new(backend.clone());
        let context = NluContext {
            slots: TripSlots {
                destination: Some("Rome".to_string()),
                budget: Some("high".to_string()),
                interests: vec!["food".to_string()],
                ..TripSlots::default()
            },
            previous_status: Some(NluStatus::NeedsClarification),
        };

        let result = service
            .parse("four days, keep it cheap", Some(&context))
            .await
            .unwrap();
        assert_eq!(result.status, NluStatus::Complete);
        assert_eq!(result.slots.destination.as_deref(), Some("Rome"));
        assert_eq!(result.slots.duration_days, Some(4));
        assert_eq!(result.slots.budget.as_deref(), Some("low"));
        assert_eq!(result.slots.interests, vec!["food"]);
        assert!(backend.prompts.lock().unwrap()[0].contains("\"destination\":\"Rome\""));
    }

    #[tokio::test]
    async fn unparseable_output_asks_to_rephrase() {
        let service = LlmNluService::new(Canned::new("I could not understand that."));
        let result = service.parse("asdf", None).await.unwrap();
        assert_eq!(result.status, NluStatus::NeedsClarification);
        assert_eq!(result.clarification_question.as_deref(), Some(REPHRASE_QUESTION));
    }

    #[tokio::test]
    async fn modification_request_keeps_instruction() {
        let service = LlmNluService::new(Canned::new(
            "{\"status\": \"MODIFICATION_REQUEST\", \"modification_instruction\": \"swap day 2 museum for a hike\"}",
        ));
        let result = service.parse("change day 2 to a hike", None).await.unwrap();
        assert_eq!(result.status, NluStatus::ModificationRequest);
        assert_eq!(
            result.modification_instruction.as_deref(),
            Some("swap day 2 museum for a hike")
        );
    }
}
