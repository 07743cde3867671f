use std::{fmt, sync::Arc};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::{
    distance::DistanceTimeTool,
    search::{PlaceSearchTool, WebSearchTool},
    FunctionFactory, Tool, ToolFuture,
};
use crate::config::ProviderConfig;

/// Upper bound on the text a capability returns to the model.
pub const MAX_RESULT_CHARS: usize = 1500;

/// Prefix of the placeholder result when a provider has no credentials.
pub const UNAVAILABLE_PREFIX: &str = "Unavailable:";

/// External fact lookups an agent may be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    PlaceSearch,
    DistanceTime,
    WebSearch,
}

impl Capability {
    pub const ALL: &'static [Capability] = &[
        Capability::PlaceSearch,
        Capability::DistanceTime,
        Capability::WebSearch,
    ];

    /// Function name the model calls.
    pub fn tool_name(self) -> &'static str {
        match self {
            Capability::PlaceSearch => "place_search",
            Capability::DistanceTime => "distance_time",
            Capability::WebSearch => "web_search",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Capability::PlaceSearch => {
                "Search for specific places such as attractions, restaurants or hotels \
                 (e.g. 'museums in Kyoto', 'ramen near Kyoto Station'). Returns a list of \
                 place names with addresses."
            }
            Capability::DistanceTime => {
                "Estimate travel distance and time between two places. Phrase the query as \
                 'from <origin> to <destination> via <walking|transit|driving>'."
            }
            Capability::WebSearch => {
                "Search the web for up-to-date facts such as opening hours, ticket prices, \
                 event schedules or recent reviews."
            }
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tool_name())
    }
}

/// A stateless fact source: natural-language query in, bounded text out.
///
/// Implementations never fail across this boundary. Missing credentials,
/// empty result sets and upstream errors all come back as descriptive text
/// so the calling agent can reason about them.
#[async_trait]
pub trait CapabilityProvider: Send + Sync + fmt::Debug {
    fn capability(&self) -> Capability;

    async fn query(&self, query: &str) -> String;
}

pub type CapabilityHandle = Arc<dyn CapabilityProvider>;

/// Stand-in used when a provider has no credentials configured.
#[derive(Debug, Clone)]
pub struct UnavailableCapability {
    capability: Capability,
    reason: String,
}

impl UnavailableCapability {
    pub fn new(capability: Capability, reason: impl Into<String>) -> Self {
        Self {
            capability,
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl CapabilityProvider for UnavailableCapability {
    fn capability(&self) -> Capability {
        self.capability
    }

    async fn query(&self, query: &str) -> String {
        format!(
            "{} {} results for '{}' are not available ({}).",
            UNAVAILABLE_PREFIX, self.capability, query, self.reason
        )
    }
}

/// True when a capability result carries no usable facts.
pub fn is_no_data(result: &str) -> bool {
    let trimmed = result.trim_start();
    trimmed.is_empty()
        || trimmed.starts_with(UNAVAILABLE_PREFIX)
        || trimmed.starts_with("Error:")
        || trimmed.starts_with("No results")
}

/// Clip text to [`MAX_RESULT_CHARS`] on a character boundary.
pub fn bound_result(text: String) -> String {
    match text.char_indices().nth(MAX_RESULT_CHARS) {
        Some((idx, _)) => {
            let mut clipped = text[..idx].to_string();
            clipped.push_str("\n[truncated]");
            clipped
        }
        None => text,
    }
}

#[derive(Debug, Deserialize)]
struct CapabilityQuery {
    query: String,
}

/// Exposes a [`CapabilityProvider`] to the agent runtime as a function tool
/// taking `{ "query": string }`.
#[derive(Debug, Clone)]
pub struct CapabilityTool {
    provider: CapabilityHandle,
}

impl CapabilityTool {
    pub fn new(provider: CapabilityHandle) -> Self {
        Self { provider }
    }
}

impl Tool for CapabilityTool {
    fn name(&self) -> &'static str {
        self.provider.capability().tool_name()
    }

    fn description(&self) -> &'static str {
        self.provider.capability().description()
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Natural-language query"
                }
            },
            "required": ["query"]
        })
    }

    fn execute(&self, parameters: Value) -> ToolFuture<'_> {
        Box::pin(async move {
            let query = match serde_json::from_value::<CapabilityQuery>(parameters) {
                Ok(params) if !params.query.trim().is_empty() => params.query,
                Ok(_) => {
                    return Ok(Value::String(
                        "Error: the `query` parameter must not be empty.".to_string(),
                    ))
                }
                Err(err) => {
                    return Ok(Value::String(format!(
                        "Error: expected parameters {{\"query\": string}} ({}).",
                        err
                    )))
                }
            };

            let capability = self.provider.capability();
            debug!(target: "itinerary::tools", %capability, query = %query);
            let result = bound_result(self.provider.query(query.trim()).await);
            debug!(
                target: "itinerary::tools",
                %capability,
                no_data = is_no_data(&result),
                chars = result.len()
            );
            Ok(Value::String(result))
        })
    }
}

/// One provider per [`Capability`], shared by every agent of a job.
#[derive(Debug, Clone)]
pub struct CapabilitySet {
    place_search: CapabilityHandle,
    distance_time: CapabilityHandle,
    web_search: CapabilityHandle,
}

impl CapabilitySet {
    /// Every capability replaced by its unavailable placeholder.
    pub fn unavailable(reason: &str) -> Self {
        let placeholder = |capability| -> CapabilityHandle {
            Arc::new(UnavailableCapability::new(capability, reason))
        };
        Self {
            place_search: placeholder(Capability::PlaceSearch),
            distance_time: placeholder(Capability::DistanceTime),
            web_search: placeholder(Capability::WebSearch),
        }
    }

    /// Real HTTP providers where credentials exist, placeholders elsewhere.
    pub fn from_config(client: &Client, config: &ProviderConfig) -> Self {
        let mut set = Self::unavailable("no API key configured");

        match &config.google_api_key {
            Some(key) => {
                set = set
                    .with_provider(Arc::new(
                        PlaceSearchTool::new(client.clone(), key.clone())
                            .with_base_url(config.google_base_url.clone()),
                    ))
                    .with_provider(Arc::new(
                        DistanceTimeTool::new(client.clone(), key.clone())
                            .with_base_url(config.google_base_url.clone()),
                    ));
            }
            None => info!(
                target: "itinerary::tools",
                "GOOGLE_API_KEY not set; place search and distance/time are unavailable"
            ),
        }

        match &config.serper_api_key {
            Some(key) => {
                set = set.with_provider(Arc::new(
                    WebSearchTool::new(client.clone(), key.clone())
                        .with_url(config.serper_url.clone()),
                ));
            }
            None => info!(
                target: "itinerary::tools",
                "SERPER_API_KEY not set; web search is unavailable"
            ),
        }

        set
    }

    /// Replace the provider for whichever capability `provider` serves.
    pub fn with_provider(mut self, provider: CapabilityHandle) -> Self {
        match provider.capability() {
            Capability::PlaceSearch => self.place_search = provider,
            Capability::DistanceTime => self.distance_time = provider,
            Capability::WebSearch => self.web_search = provider,
        }
        self
    }

    pub fn get(&self, capability: Capability) -> CapabilityHandle {
        match capability {
            Capability::PlaceSearch => Arc::clone(&self.place_search),
            Capability::DistanceTime => Arc::clone(&self.distance_time),
            Capability::WebSearch => Arc::clone(&self.web_search),
        }
    }

    /// Register the given capabilities as function tools.
    pub fn register(&self, capabilities: &[Capability], factory: &mut FunctionFactory) {
        for capability in capabilities {
            factory.register_tool(CapabilityTool::new(self.get(*capability)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Echo;

    #[async_trait]
    impl CapabilityProvider for Echo {
        fn capability(&self) -> Capability {
            Capability::WebSearch
        }

        async fn query(&self, query: &str) -> String {
            "y".repeat(query.len() * 1000)
        }
    }

    #[tokio::test]
    async fn unavailable_capability_returns_marker() {
        let provider = UnavailableCapability::new(Capability::PlaceSearch, "GOOGLE_API_KEY not set");
        let result = provider.query("ramen in Kyoto").await;
        assert!(result.starts_with(UNAVAILABLE_PREFIX));
        assert!(result.contains("ramen in Kyoto"));
        assert!(is_no_data(&result));
    }

    #[tokio::test]
    async fn tool_bounds_result_length() {
        let tool = CapabilityTool::new(Arc::new(Echo));
        assert_eq!(tool.name(), "web_search");
        let result = tool.execute(json!({ "query": "kyoto" })).await.unwrap();
        let text = result.as_str().unwrap();
        assert!(text.ends_with("[truncated]"));
        assert!(text.chars().count() <= MAX_RESULT_CHARS + "\n[truncated]".len());
    }

    #[tokio::test]
    async fn malformed_parameters_become_error_text() {
        let tool = CapabilityTool::new(Arc::new(Echo));
        let result = tool.execute(json!({ "q": 1 })).await.unwrap();
        assert!(result.as_str().unwrap().starts_with("Error:"));

        let blank = tool.execute(json!({ "query": "   " })).await.unwrap();
        assert!(is_no_data(blank.as_str().unwrap()));
    }

    #[test]
    fn register_exposes_only_granted_capabilities() {
        let set = CapabilitySet::unavailable("offline").with_provider(Arc::new(Echo));
        let mut factory = FunctionFactory::new();
        set.register(&[Capability::DistanceTime, Capability::WebSearch], &mut factory);

        assert_eq!(factory.function_names(), vec!["distance_time", "web_search"]);
        assert!(!factory.has_function("place_search"));
    }

    #[test]
    fn missing_keys_yield_placeholders() {
        let config = ProviderConfig::default();
        let set = CapabilitySet::from_config(&Client::new(), &config);
        let rendered = format!("{:?}", set.get(Capability::PlaceSearch));
        assert!(rendered.contains("UnavailableCapability"));
    }

    #[test]
    fn no_data_detection() {
        assert!(is_no_data("No results found for 'x'"));
        assert!(is_no_data("Error: Could not parse origin"));
        assert!(!is_no_data("1. Kinkaku-ji - 1 Kinkakujicho, Kyoto"));
    }
}
