use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::{
    role::SpecialistRole,
    specialist::{Specialist, SpecialistFinding},
};
use crate::{
    error::AgentError,
    tools::{Tool, ToolFuture},
};

pub const DELEGATE_TOOL_NAME: &str = "delegate_work";

/// Constraints the coordinator must pass with every delegation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegationContext {
    pub location: String,
    pub timeframe: String,
    pub budget: String,
    #[serde(default, deserialize_with = "crate::schemas::normalize::de_string_list")]
    pub interests: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// One unit of work for one specialist.
#[derive(Debug, Clone, PartialEq)]
pub struct DelegatedInstruction {
    pub role: SpecialistRole,
    pub task: String,
    pub context: DelegationContext,
}

impl DelegatedInstruction {
    /// Prompt text the specialist receives.
    pub fn render(&self) -> String {
        let interests = if self.context.interests.is_empty() {
            "general".to_string()
        } else {
            self.context.interests.join(", ")
        };
        let mut prompt = format!(
            "Task: {}\n\nContext:\n- Location: {}\n- Timeframe: {}\n- Budget: {}\n- Interests: {}",
            self.task.trim(),
            self.context.location.trim(),
            self.context.timeframe.trim(),
            self.context.budget.trim(),
            interests
        );
        if let Some(notes) = self
            .context
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|notes| !notes.is_empty())
        {
            prompt.push_str(&format!("\n- Notes: {}", notes));
        }
        prompt
    }
}

#[derive(Debug, Deserialize)]
struct DelegateWorkArgs {
    specialist: String,
    task: String,
    context: Value,
}

impl DelegateWorkArgs {
    fn into_instruction(self) -> Result<DelegatedInstruction, AgentError> {
        let role = self.specialist.parse::<SpecialistRole>()?;

        if self.task.trim().is_empty() {
            return Err(AgentError::InvalidFunctionCall(
                "`task` must describe what the specialist should find".to_string(),
            ));
        }

        let context: DelegationContext = serde_json::from_value(self.context)
            .map_err(|err| {
                AgentError::InvalidFunctionCall(format!(
                    "`context` must include location, timeframe, budget and interests: {}",
                    err
                ))
            })?;

        let missing: Vec<&str> = [
            ("location", &context.location),
            ("timeframe", &context.timeframe),
            ("budget", &context.budget),
        ]
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();
        if !missing.is_empty() {
            return Err(AgentError::InvalidFunctionCall(format!(
                "`context` fields must not be empty: {}",
                missing.join(", ")
            )));
        }

        Ok(DelegatedInstruction {
            role,
            task: self.task,
            context,
        })
    }
}

/// Shared counter bounding `delegate_work` calls for one job.
#[derive(Debug, Clone)]
pub struct DelegationBudget {
    used: Arc<AtomicUsize>,
    max: usize,
}

impl DelegationBudget {
    pub fn new(max: usize) -> Self {
        Self {
            used: Arc::new(AtomicUsize::new(0)),
            max,
        }
    }

    /// Claim one delegation round; returns its 1-based number.
    pub fn try_acquire(&self) -> Option<usize> {
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                (used < self.max).then_some(used + 1)
            })
            .ok()
            .map(|previous| previous + 1)
    }

    pub fn used(&self) -> usize {
        self.used.load(Ordering::SeqCst)
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn remaining(&self) -> usize {
        self.max.saturating_sub(self.used())
    }
}

/// Exposes the specialists to the coordinator as one function tool.
#[derive(Debug)]
pub struct DelegateWorkTool {
    specialists: BTreeMap<SpecialistRole, Specialist>,
    budget: DelegationBudget,
}

impl DelegateWorkTool {
    pub fn new(specialists: Vec<Specialist>, budget: DelegationBudget) -> Self {
        Self {
            specialists: specialists
                .into_iter()
                .map(|specialist| (specialist.role(), specialist))
                .collect(),
            budget,
        }
    }

    pub fn budget(&self) -> &DelegationBudget {
        &self.budget
    }

    async fn delegate(&self, instruction: DelegatedInstruction) -> Result<Value, AgentError> {
        let Some(specialist) = self.specialists.get(&instruction.role) else {
            return Err(AgentError::InvalidFunctionCall(format!(
                "no {} specialist is available for this job",
                instruction.role
            )));
        };

        let Some(round) = self.budget.try_acquire() else {
            warn!(
                target: "itinerary::agents",
                max = self.budget.max(),
                "delegation budget exhausted"
            );
            return Ok(Value::String(format!(
                "Delegation budget exhausted ({} of {} rounds used). Do not call `{}` again. \
                 Verify remaining details with your own tools, record any gaps in general_notes, \
                 and synthesize the final itinerary now.",
                self.budget.used(),
                self.budget.max(),
                DELEGATE_TOOL_NAME
            )));
        };

        info!(
            target: "itinerary::agents",
            specialist = %instruction.role,
            round,
            max = self.budget.max(),
            task = %instruction.task
        );

        let finding: SpecialistFinding = specialist.handle(&instruction).await;
        let mut observation = finding.to_observation();
        if self.budget.remaining() == 0 {
            observation.push_str(
                "\n(This was the last delegation round; synthesize the itinerary next.)",
            );
        }
        Ok(Value::String(observation))
    }
}

impl Tool for DelegateWorkTool {
    fn name(&self) -> &'static str {
        DELEGATE_TOOL_NAME
    }

    fn description(&self) -> &'static str {
        "Delegate a focused information-gathering task to one specialist (attractions, food, transport or lodging). \
         Always pass the full context: location, timeframe, budget and interests."
    }

    fn parameters_schema(&self) -> Value {
        let roles: Vec<&str> = SpecialistRole::ALL.iter().map(|role| role.as_str()).collect();
        serde_json::json!({
            "type": "object",
            "properties": {
                "specialist": {
                    "type": "string",
                    "enum": roles,
                    "description": "Which specialist should do the work"
                },
                "task": {
                    "type": "string",
                    "description": "What to find, e.g. 'three temples near Higashiyama for the morning'"
                },
                "context": {
                    "type": "object",
                    "properties": {
                        "location": { "type": "string", "description": "City and area" },
                        "timeframe": { "type": "string", "description": "Day number and/or dates, time of day" },
                        "budget": { "type": "string", "description": "Budget level or amount" },
                        "interests": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Traveller interests relevant to the task"
                        },
                        "notes": { "type": "string", "description": "Extra constraints or earlier findings" }
                    },
                    "required": ["location", "timeframe", "budget", "interests"]
                }
            },
            "required": ["specialist", "task", "context"]
        })
    }

    fn execute(&self, parameters: Value) -> ToolFuture<'_> {
        Box::pin(async move {
            let args: DelegateWorkArgs = serde_json::from_value(parameters).map_err(|err| {
                AgentError::InvalidFunctionCall(format!("Invalid delegate_work arguments: {}", err))
            })?;
            let instruction = args.into_instruction()?;
            self.delegate(instruction).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn budget_stops_at_max() {
        let budget = DelegationBudget::new(2);
        let shared = budget.clone();
        assert_eq!(budget.try_acquire(), Some(1));
        assert_eq!(shared.try_acquire(), Some(2));
        assert_eq!(budget.try_acquire(), None);
        assert_eq!(shared.used(), 2);
        assert_eq!(shared.remaining(), 0);
    }

    #[test]
    fn arguments_require_full_context() {
        let args: DelegateWorkArgs = serde_json::from_value(json!({
            "specialist": "food",
            "task": "Lunch near Nishiki Market",
            "context": { "location": "Kyoto", "timeframe": "Day 1 lunch" }
        }))
        .unwrap();
        let err = args.into_instruction().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_FUNCTION_CALL");

        let args: DelegateWorkArgs = serde_json::from_value(json!({
            "specialist": "food",
            "task": "Lunch near Nishiki Market",
            "context": {
                "location": "Kyoto",
                "timeframe": "  ",
                "budget": "medium",
                "interests": ["food"]
            }
        }))
        .unwrap();
        assert!(args
            .into_instruction()
            .unwrap_err()
            .to_string()
            .contains("timeframe"));
    }

    #[test]
    fn instruction_renders_context() {
        let args: DelegateWorkArgs = serde_json::from_value(json!({
            "specialist": "Stay",
            "task": "Two nights near Kyoto Station",
            "context": {
                "location": "Kyoto, Japan",
                "timeframe": "2025-04-01 to 2025-04-02",
                "budget": "medium",
                "interests": "temples",
                "notes": "quiet rooms"
            }
        }))
        .unwrap();
        let instruction = args.into_instruction().unwrap();
        assert_eq!(instruction.role, SpecialistRole::Lodging);

        let prompt = instruction.render();
        assert!(prompt.starts_with("Task: Two nights near Kyoto Station"));
        assert!(prompt.contains("- Interests: temples"));
        assert!(prompt.contains("- Notes: quiet rooms"));
    }
}
