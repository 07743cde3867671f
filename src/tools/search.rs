use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use super::capability::{Capability, CapabilityProvider};

pub const GOOGLE_MAPS_BASE_URL: &str = "https://maps.googleapis.com";
pub const SERPER_SEARCH_URL: &str = "https://google.serper.dev/search";

const MAX_PLACES: usize = 8;
const MAX_WEB_HITS: usize = 5;

#[derive(Debug, Deserialize)]
struct PlacesResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<PlaceResult>,
}

#[derive(Debug, Deserialize)]
struct PlaceResult {
    name: Option<String>,
    formatted_address: Option<String>,
    rating: Option<f64>,
}

/// Google Places text search.
#[derive(Debug, Clone)]
pub struct PlaceSearchTool {
    client: Client,
    api_key: String,
    base_url: String,
}

impl PlaceSearchTool {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: GOOGLE_MAPS_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch(&self, query: &str) -> Result<PlacesResponse, reqwest::Error> {
        let url = format!(
            "{}/maps/api/place/textsearch/json",
            self.base_url.trim_end_matches('/')
        );
        let request = async {
            self.client
                .get(url)
                .query(&[("query", query), ("key", self.api_key.as_str())])
                .send()
                .await?
                .error_for_status()?
                .json::<PlacesResponse>()
                .await
        };
        // the request URL carries the API key
        request.await.map_err(reqwest::Error::without_url)
    }
}

#[async_trait]
impl CapabilityProvider for PlaceSearchTool {
    fn capability(&self) -> Capability {
        Capability::PlaceSearch
    }

    async fn query(&self, query: &str) -> String {
        let response = match self.fetch(query).await {
            Ok(response) => response,
            Err(err) => {
                warn!(target: "itinerary::tools", error = %err, "place search request failed");
                return format!("Error: place search request failed: {}", err);
            }
        };

        match response.status.as_str() {
            "OK" => format_places(query, &response.results),
            "ZERO_RESULTS" => format!("No results found for places matching '{}'.", query),
            status => {
                let detail = response
                    .error_message
                    .map(|msg| format!(" ({})", msg))
                    .unwrap_or_default();
                format!("Error: place search returned status {}{}.", status, detail)
            }
        }
    }
}

fn format_places(query: &str, results: &[PlaceResult]) -> String {
    let lines: Vec<String> = results
        .iter()
        .filter_map(|place| {
            let name = place.name.as_deref()?.trim();
            if name.is_empty() {
                return None;
            }
            let address = place.formatted_address.as_deref().unwrap_or("N/A");
            Some(match place.rating {
                Some(rating) => format!("- {} (Address: {}, rating {:.1})", name, address, rating),
                None => format!("- {} (Address: {})", name, address),
            })
        })
        .take(MAX_PLACES)
        .collect();

    if lines.is_empty() {
        format!("No results found for places matching '{}'.", query)
    } else {
        format!("Places matching '{}':\n{}", query, lines.join("\n"))
    }
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperHit>,
}

#[derive(Debug, Deserialize)]
struct SerperHit {
    title: Option<String>,
    link: Option<String>,
    snippet: Option<String>,
}

/// Serper.dev Google web search.
#[derive(Debug, Clone)]
pub struct WebSearchTool {
    client: Client,
    api_key: String,
    url: String,
}

impl WebSearchTool {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            url: SERPER_SEARCH_URL.to_string(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    async fn fetch(&self, query: &str) -> Result<SerperResponse, reqwest::Error> {
        self.client
            .post(&self.url)
            .header("X-API-KEY", &self.api_key)
            .json(&serde_json::json!({ "q": query }))
            .send()
            .await?
            .error_for_status()?
            .json::<SerperResponse>()
            .await
    }
}

#[async_trait]
impl CapabilityProvider for WebSearchTool {
    fn capability(&self) -> Capability {
        Capability::WebSearch
    }

    async fn query(&self, query: &str) -> String {
        match self.fetch(query).await {
            Ok(response) => format_hits(query, &response.organic),
            Err(err) => {
                warn!(target: "itinerary::tools", error = %err, "web search request failed");
                format!("Error: web search request failed: {}", err)
            }
        }
    }
}

fn format_hits(query: &str, hits: &[SerperHit]) -> String {
    let blocks: Vec<String> = hits
        .iter()
        .filter(|hit| hit.title.is_some() || hit.snippet.is_some())
        .take(MAX_WEB_HITS)
        .enumerate()
        .map(|(idx, hit)| {
            let mut block = format!("{}. {}", idx + 1, hit.title.as_deref().unwrap_or("Untitled"));
            if let Some(link) = &hit.link {
                block.push_str(&format!("\n   {}", link));
            }
            if let Some(snippet) = &hit.snippet {
                block.push_str(&format!("\n   {}", snippet.trim()));
            }
            block
        })
        .collect();

    if blocks.is_empty() {
        format!("No results found on the web for '{}'.", query)
    } else {
        format!("Web results for '{}':\n{}", query, blocks.join("\n"))
    }
}
