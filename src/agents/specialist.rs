use serde::Serialize;
use tracing::{info, warn};

use super::{delegation::DelegatedInstruction, role::SpecialistRole};
use crate::{
    config::PlannerSettings,
    core::{backend::LlmHandle, Agent},
    tools::{CapabilitySet, FunctionFactory},
};

/// Marker a specialist starts its answer with when nothing qualifies.
pub const NO_RESULT_MARKER: &str = "NO_QUALIFYING_RESULT";

/// What a specialist hands back to the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SpecialistFinding {
    Found {
        role: SpecialistRole,
        content: String,
    },
    NoResult {
        role: SpecialistRole,
        reason: String,
    },
}

impl SpecialistFinding {
    /// Classify a specialist's final answer. Empty output is never a finding.
    pub fn from_output(role: SpecialistRole, output: &str) -> Self {
        let trimmed = output.trim();
        if trimmed.is_empty() {
            return SpecialistFinding::NoResult {
                role,
                reason: "the specialist returned an empty answer".to_string(),
            };
        }

        match trimmed.strip_prefix(NO_RESULT_MARKER) {
            Some(rest) => {
                let reason = rest.trim_start_matches([':', '-', ' ', '.']).trim();
                SpecialistFinding::NoResult {
                    role,
                    reason: if reason.is_empty() {
                        "no option matched the instruction".to_string()
                    } else {
                        reason.to_string()
                    },
                }
            }
            None => SpecialistFinding::Found {
                role,
                content: trimmed.to_string(),
            },
        }
    }

    pub fn role(&self) -> SpecialistRole {
        match self {
            SpecialistFinding::Found { role, .. } | SpecialistFinding::NoResult { role, .. } => {
                *role
            }
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, SpecialistFinding::Found { .. })
    }

    /// Text returned to the coordinator as the tool observation.
    pub fn to_observation(&self) -> String {
        match self {
            SpecialistFinding::Found { role, content } => {
                format!("[{} specialist] {}", role, content)
            }
            SpecialistFinding::NoResult { role, reason } => format!(
                "[{} specialist] {}: {}. Re-delegate with different context, verify with your own tools, or record the gap in general_notes.",
                role, NO_RESULT_MARKER, reason
            ),
        }
    }
}

fn specialist_instructions(role: SpecialistRole) -> String {
    let tools = role
        .capabilities()
        .iter()
        .map(|capability| format!("`{}`", capability.tool_name()))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Work only on the instruction you are given and stay within the {} domain. \
         Use your tools ({}) to find real, current options; never invent places. \
         Respect the location, timeframe and budget in the context. \
         When you are done, call `final_answer` with a concise list of options and the key facts you found. \
         If nothing qualifies, start your answer with {} followed by the reason.",
        role, tools, NO_RESULT_MARKER
    )
}

/// A non-delegating agent bound to one travel domain.
#[derive(Debug)]
pub struct Specialist {
    role: SpecialistRole,
    agent: Agent,
}

impl Specialist {
    pub fn new(
        role: SpecialistRole,
        llm: LlmHandle,
        capabilities: &CapabilitySet,
        settings: &PlannerSettings,
    ) -> Self {
        let mut factory = FunctionFactory::new();
        capabilities.register(role.capabilities(), &mut factory);

        let agent = Agent::new(llm, factory)
            .with_name(format!("{}-specialist", role))
            .with_system_prompt(
                role.profile()
                    .system_prompt(&specialist_instructions(role)),
            )
            .with_model(settings.model.clone())
            .with_timeout(settings.request_timeout)
            .with_max_iterations(settings.specialist_max_iterations)
            .with_max_tokens(Some(settings.specialist_max_tokens));

        Self { role, agent }
    }

    pub fn role(&self) -> SpecialistRole {
        self.role
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Run one delegated instruction. Runtime failures are absorbed into
    /// [`SpecialistFinding::NoResult`] so the coordinator can decide what to do.
    pub async fn handle(&self, instruction: &DelegatedInstruction) -> SpecialistFinding {
        match self.agent.run(&instruction.render()).await {
            Ok(output) => {
                let finding = SpecialistFinding::from_output(self.role, &output);
                info!(
                    target: "itinerary::agents",
                    specialist = %self.role,
                    found = finding.is_found()
                );
                finding
            }
            Err(err) => {
                warn!(
                    target: "itinerary::agents",
                    specialist = %self.role,
                    error = %err,
                    "specialist run failed"
                );
                SpecialistFinding::NoResult {
                    role: self.role,
                    reason: format!("the specialist could not complete the task ({})", err),
                }
            }
        }
    }
}
