use std::{fmt, sync::OnceLock};

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use super::{
    capability::{Capability, CapabilityProvider},
    search::GOOGLE_MAPS_BASE_URL,
};

pub const PARSE_FAILURE: &str = "Error: Could not parse origin and destination from query. Please format as '... from [Origin] to [Destination] via [Mode]'.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TravelMode {
    Walking,
    Driving,
    #[default]
    Transit,
}

impl TravelMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TravelMode::Walking => "walking",
            TravelMode::Driving => "driving",
            TravelMode::Transit => "transit",
        }
    }

    /// Match a free-text mode phrase against the mode keywords.
    pub fn from_keywords(text: &str) -> Option<Self> {
        let text = text.to_lowercase();
        if text.contains("walk") {
            Some(TravelMode::Walking)
        } else if ["drive", "driving", "car", "taxi"]
            .iter()
            .any(|kw| text.contains(kw))
        {
            Some(TravelMode::Driving)
        } else if ["transit", "bus", "metro", "subway", "train"]
            .iter()
            .any(|kw| text.contains(kw))
        {
            Some(TravelMode::Transit)
        } else {
            None
        }
    }
}

impl fmt::Display for TravelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistanceQuery {
    pub origin: String,
    pub destination: String,
    pub mode: TravelMode,
}

fn query_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\bfrom\s+(?P<origin>.+?)\s+to\s+(?P<dest>.+?)(?:\s+(?:via|by)\s+(?P<mode>[^.?!]+))?[.?!]*\s*$",
        )
        .expect("distance query pattern is valid")
    })
}

/// Parse `... from <origin> to <destination> [via <mode>]`.
///
/// Without an explicit `via` clause the mode is inferred from the rest of
/// the query ("walking", "driving"), falling back to transit.
pub fn parse_distance_query(query: &str) -> Option<DistanceQuery> {
    let captures = query_pattern().captures(query.trim())?;
    let origin = captures.name("origin")?.as_str().trim();
    let destination = captures.name("dest")?.as_str().trim();
    if origin.is_empty() || destination.is_empty() {
        return None;
    }

    let mode = match captures.name("mode") {
        Some(mode) => TravelMode::from_keywords(mode.as_str()).unwrap_or_default(),
        None => {
            let lowered = query.to_lowercase();
            if lowered.contains("walking") {
                TravelMode::Walking
            } else if lowered.contains("driving") {
                TravelMode::Driving
            } else {
                TravelMode::default()
            }
        }
    };

    Some(DistanceQuery {
        origin: origin.to_string(),
        destination: destination.to_string(),
        mode,
    })
}

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    status: String,
    #[serde(default)]
    rows: Vec<MatrixRow>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    #[serde(default)]
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: String,
    distance: Option<TextValue>,
    duration: Option<TextValue>,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    text: String,
}

/// Google Distance Matrix lookup for a single origin/destination pair.
#[derive(Debug, Clone)]
pub struct DistanceTimeTool {
    client: Client,
    api_key: String,
    base_url: String,
}

impl DistanceTimeTool {
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

    async fn fetch(&self, parsed: &DistanceQuery) -> Result<MatrixResponse, reqwest::Error> {
        let url = format!(
            "{}/maps/api/distancematrix/json",
            self.base_url.trim_end_matches('/')
        );
        let request = async {
            self.client
                .get(url)
                .query(&[
                    ("origins", parsed.origin.as_str()),
                    ("destinations", parsed.destination.as_str()),
                    ("mode", parsed.mode.as_str()),
                    ("key", self.api_key.as_str()),
                ])
                .send()
                .await?
                .error_for_status()?
                .json::<MatrixResponse>()
                .await
        };
        // the request URL carries the API key
        request.await.map_err(reqwest::Error::without_url)
    }
}

#[async_trait]
impl CapabilityProvider for DistanceTimeTool {
    fn capability(&self) -> Capability {
        Capability::DistanceTime
    }

    async fn query(&self, query: &str) -> String {
        let Some(parsed) = parse_distance_query(query) else {
            return PARSE_FAILURE.to_string();
        };

        let response = match self.fetch(&parsed).await {
            Ok(response) => response,
            Err(err) => {
                warn!(target: "itinerary::tools", error = %err, "distance matrix request failed");
                return format!("Error: distance/time request failed: {}", err);
            }
        };

        if response.status != "OK" {
            return format!(
                "Error calculating distance/time: API status {}.",
                response.status
            );
        }

        let Some(element) = response
            .rows
            .first()
            .and_then(|row| row.elements.first())
        else {
            return format!(
                "No results found for a route from '{}' to '{}'.",
                parsed.origin, parsed.destination
            );
        };

        if element.status != "OK" {
            return format!(
                "No results found for a route from '{}' to '{}' via {} (status {}).",
                parsed.origin, parsed.destination, parsed.mode, element.status
            );
        }

        let text_or_na = |value: &Option<TextValue>| {
            value
                .as_ref()
                .map(|v| v.text.clone())
                .unwrap_or_else(|| "N/A".to_string())
        };

        format!(
            "Estimated travel from '{}' to '{}' via {}: Distance: {}, Duration: {}.",
            parsed.origin,
            parsed.destination,
            parsed.mode,
            text_or_na(&element.distance),
            text_or_na(&element.duration)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[test]
    fn parses_explicit_mode() {
        let parsed =
            parse_distance_query("Get travel time from Kyoto Station to Fushimi Inari via walking")
                .unwrap();
        assert_eq!(parsed.origin, "Kyoto Station");
        assert_eq!(parsed.destination, "Fushimi Inari");
        assert_eq!(parsed.mode, TravelMode::Walking);

        let taxi = parse_distance_query("from Gion to Arashiyama by taxi.").unwrap();
        assert_eq!(taxi.destination, "Arashiyama");
        assert_eq!(taxi.mode, TravelMode::Driving);

        let subway = parse_distance_query("from Shibuya to Asakusa via subway").unwrap();
        assert_eq!(subway.mode, TravelMode::Transit);
    }

    #[test]
    fn mode_defaults_to_transit_or_is_inferred() {
        let parsed = parse_distance_query("from Nijo Castle to Kinkaku-ji").unwrap();
        assert_eq!(parsed.mode, TravelMode::Transit);

        let driving = parse_distance_query("driving time from Osaka to Nara").unwrap();
        assert_eq!(driving.origin, "Osaka");
        assert_eq!(driving.mode, TravelMode::Driving);
    }

    #[test]
    fn missing_destination_is_unparsable() {
        assert!(parse_distance_query("how far is Kyoto Station").is_none());
        assert!(parse_distance_query("from Kyoto Station").is_none());
    }

    #[tokio::test]
    async fn unparsable_query_never_calls_upstream() {
        let tool = DistanceTimeTool::new(Client::new(), "k").with_base_url("http://127.0.0.1:9");
        assert_eq!(tool.query("Kyoto Station please").await, PARSE_FAILURE);
    }

    #[tokio::test]
    async fn formats_distance_and_duration() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/maps/api/distancematrix/json")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("origins".into(), "Kyoto Station".into()),
                Matcher::UrlEncoded("destinations".into(), "Fushimi Inari".into()),
                Matcher::UrlEncoded("mode".into(), "transit".into()),
            ]))
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "status": "OK",
                    "rows": [{ "elements": [{
                        "status": "OK",
                        "distance": { "text": "3.2 km", "value": 3200 },
                        "duration": { "text": "12 mins", "value": 720 }
                    }]}]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let tool = DistanceTimeTool::new(Client::new(), "k").with_base_url(server.url());
        let text = tool.query("from Kyoto Station to Fushimi Inari").await;

        mock.assert_async().await;
        assert_eq!(
            text,
            "Estimated travel from 'Kyoto Station' to 'Fushimi Inari' via transit: Distance: 3.2 km, Duration: 12 mins."
        );
    }

    #[tokio::test]
    async fn element_failure_reads_as_no_results() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/maps/api/distancematrix/json")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"status":"OK","rows":[{"elements":[{"status":"ZERO_RESULTS"}]}]}"#)
            .create_async()
            .await;

        let tool = DistanceTimeTool::new(Client::new(), "k").with_base_url(server.url());
        let text = tool.query("from Kyoto to Honolulu via driving").await;
        assert!(text.starts_with("No results found"));
        assert!(text.contains("ZERO_RESULTS"));
    }

    #[tokio::test]
    async fn server_error_hides_the_api_key() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/maps/api/distancematrix/json")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let key = "g-secret-key-456";
        let tool = DistanceTimeTool::new(Client::new(), key).with_base_url(server.url());
        let text = tool.query("from Gion to Arashiyama via transit").await;

        assert!(text.starts_with("Error: distance/time request failed"));
        assert!(text.contains("503"));
        assert!(!text.contains(key));
        assert!(!text.contains("key="));
    }
}
