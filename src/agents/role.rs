use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{error::AgentError, tools::Capability, types::itinerary::EventType};

/// Role, goal and backstory that shape an agent's system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleProfile {
    pub role: &'static str,
    pub goal: &'static str,
    pub backstory: &'static str,
}

impl RoleProfile {
    pub fn system_prompt(&self, instructions: &str) -> String {
        format!(
            "You are the {}.\n\nGoal: {}\n\nBackground: {}\n\n{}",
            self.role, self.goal, self.backstory, instructions
        )
    }
}

pub const COORDINATOR_PROFILE: RoleProfile = RoleProfile {
    role: "Senior Travel Itinerary Architect and Quality Assurance Lead",
    goal: "Design a comprehensive, day-by-day travel itinerary optimized for the traveller's destination, dates, budget, interests and preferences. Delegate distinct sub-tasks to the specialists for each day, verify their findings with your own tools, resolve conflicts, fill gaps and synthesize one coherent plan.",
    backstory: "You are a detail-oriented travel architect. You break complex requests down, delegate efficiently to your team of specialists, cross-check their contributions, optimize routes and timings between activities, and never present unverified guesses as facts.",
};

/// The four non-delegating travel domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialistRole {
    Attractions,
    Food,
    Transport,
    Lodging,
}

impl SpecialistRole {
    pub const ALL: [SpecialistRole; 4] = [
        SpecialistRole::Attractions,
        SpecialistRole::Food,
        SpecialistRole::Transport,
        SpecialistRole::Lodging,
    ];

    /// Capabilities each role may call; fixed at compile time.
    pub const fn capabilities(self) -> &'static [Capability] {
        match self {
            SpecialistRole::Attractions | SpecialistRole::Food | SpecialistRole::Lodging => {
                &[Capability::PlaceSearch, Capability::WebSearch]
            }
            SpecialistRole::Transport => &[Capability::DistanceTime, Capability::WebSearch],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SpecialistRole::Attractions => "attractions",
            SpecialistRole::Food => "food",
            SpecialistRole::Transport => "transport",
            SpecialistRole::Lodging => "lodging",
        }
    }

    /// Itinerary event category this role's findings become.
    pub fn event_type(self) -> EventType {
        match self {
            SpecialistRole::Attractions => EventType::Attraction,
            SpecialistRole::Food => EventType::Food,
            SpecialistRole::Transport => EventType::Transport,
            SpecialistRole::Lodging => EventType::Stay,
        }
    }

    /// One-line summary shown to the coordinator.
    pub fn delegation_hint(self) -> &'static str {
        match self {
            SpecialistRole::Attractions => {
                "sightseeing, museums, landmarks, parks and activities for a day's theme and area"
            }
            SpecialistRole::Food => {
                "restaurants, cafes and markets for specific meals, areas and budgets"
            }
            SpecialistRole::Transport => {
                "routes, travel times, passes and options between specific places"
            }
            SpecialistRole::Lodging => {
                "accommodation for specific nights, neighbourhoods and budgets"
            }
        }
    }

    pub fn profile(self) -> RoleProfile {
        match self {
            SpecialistRole::Attractions => RoleProfile {
                role: "Local Attraction Specialist",
                goal: "Find attractions such as sightseeing spots, museums, landmarks, parks, activities and hidden gems that match the location, interests and budget in your instruction. Give a brief description, why it fits, and cost or hours when your tools found them.",
                backstory: "You know attractions worldwide and use search tools to find places that match specific interests. You provide concise, factual information and report limitations clearly.",
            },
            SpecialistRole::Food => RoleProfile {
                role: "Local Culinary Guide",
                goal: "Recommend specific dining options (restaurants, cafes, markets) that match the location, cuisine, meal and budget in your instruction, with cuisine type and a price indication.",
                backstory: "You are a food enthusiast skilled at using search tools to find eateries matching precise criteria. You focus on quality and relevance.",
            },
            SpecialistRole::Transport => RoleProfile {
                role: "Transportation Logistics Specialist",
                goal: "Recommend the most suitable way to move between the places in your instruction (public transit, walking, taxi) with travel times from your tools, likely costs, and passes worth buying. Say so when a connection is impractical.",
                backstory: "You are an expert in urban transportation. You analyze routes and timings with your tools and prioritize efficiency and practicality.",
            },
            SpecialistRole::Lodging => RoleProfile {
                role: "Accommodation Advisor",
                goal: "Find accommodation matching the location, nights, budget and type preference in your instruction. Give names, type, neighbourhood and pros or cons.",
                backstory: "You specialize in matching travellers to places to stay, using search tools to find options by location, budget and type. You aim for comfort and value.",
            },
        }
    }
}

impl fmt::Display for SpecialistRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpecialistRole {
    type Err = AgentError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let key = raw.trim().to_lowercase();
        let role = match key.as_str() {
            "attractions" | "attraction" | "sightseeing" | "activities" => {
                SpecialistRole::Attractions
            }
            "food" | "dining" | "restaurants" | "culinary" => SpecialistRole::Food,
            "transport" | "transportation" | "transit" | "logistics" => SpecialistRole::Transport,
            "lodging" | "stay" | "accommodation" | "hotel" | "hotels" => SpecialistRole::Lodging,
            _ => {
                return Err(AgentError::InvalidFunctionCall(format!(
                    "unknown specialist '{}'; choose one of attractions, food, transport, lodging",
                    raw.trim()
                )))
            }
        };
        Ok(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_table_matches_roles() {
        assert_eq!(
            SpecialistRole::Transport.capabilities(),
            &[Capability::DistanceTime, Capability::WebSearch]
        );
        for role in [
            SpecialistRole::Attractions,
            SpecialistRole::Food,
            SpecialistRole::Lodging,
        ] {
            assert!(role.capabilities().contains(&Capability::PlaceSearch));
            assert!(!role.capabilities().contains(&Capability::DistanceTime));
        }
    }

    #[test]
    fn role_names_parse_with_synonyms() {
        assert_eq!(
            "Stay".parse::<SpecialistRole>().unwrap(),
            SpecialistRole::Lodging
        );
        assert_eq!(
            "attraction".parse::<SpecialistRole>().unwrap(),
            SpecialistRole::Attractions
        );
        assert!("weather".parse::<SpecialistRole>().is_err());
    }

    #[test]
    fn system_prompt_contains_profile() {
        let prompt = SpecialistRole::Food
            .profile()
            .system_prompt("Answer briefly.");
        assert!(prompt.starts_with("You are the Local Culinary Guide."));
        assert!(prompt.ends_with("Answer briefly."));
    }
}
