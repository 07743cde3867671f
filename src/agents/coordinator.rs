use super::{
    delegation::{DelegateWorkTool, DelegationBudget, DELEGATE_TOOL_NAME},
    role::{SpecialistRole, COORDINATOR_PROFILE},
    specialist::Specialist,
};
use crate::{
    config::PlannerSettings,
    core::{agent::SchemaPolicy, backend::LlmHandle, Agent},
    error::Result,
    planning::PlanningTask,
    tools::{Capability, CapabilitySet, FunctionFactory},
    types::{itinerary::Itinerary, result::RunResult},
};

fn coordinator_instructions() -> String {
    format!(
        "You are the only agent who may delegate. Use `{delegate}` to send focused tasks to the \
         specialists and your own tools (`{places}`, `{distance}`, `{web}`) to verify what they report. \
         Tool results that start with 'Unavailable:', 'Error:' or 'No results' carry no facts; \
         work around them and never fabricate details. \
         When the plan is complete, submit it through the structured response tool.",
        delegate = DELEGATE_TOOL_NAME,
        places = Capability::PlaceSearch.tool_name(),
        distance = Capability::DistanceTime.tool_name(),
        web = Capability::WebSearch.tool_name(),
    )
}

/// The delegating planner for one job.
///
/// Build a fresh coordinator per job: the delegation budget it owns is
/// spent across the whole run.
#[derive(Debug)]
pub struct Coordinator {
    agent: Agent,
    budget: DelegationBudget,
}

impl Coordinator {
    pub fn new(llm: LlmHandle, capabilities: &CapabilitySet, settings: &PlannerSettings) -> Self {
        let budget = DelegationBudget::new(settings.max_delegations);

        let specialists = SpecialistRole::ALL
            .iter()
            .map(|role| Specialist::new(*role, llm.clone(), capabilities, settings))
            .collect();

        let mut factory = FunctionFactory::new();
        capabilities.register(Capability::ALL, &mut factory);
        factory.register_tool(DelegateWorkTool::new(specialists, budget.clone()));

        let agent = Agent::new(llm, factory)
            .with_name("coordinator")
            .with_system_prompt(COORDINATOR_PROFILE.system_prompt(&coordinator_instructions()))
            .with_model(settings.model.clone())
            .with_timeout(settings.request_timeout)
            .with_max_iterations(settings.coordinator_max_iterations)
            .with_max_tokens(Some(settings.coordinator_max_tokens))
            .with_completion_schema::<Itinerary>()
            .with_schema_policy(SchemaPolicy::Terminal);

        Self { agent, budget }
    }

    pub fn budget(&self) -> &DelegationBudget {
        &self.budget
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Run the planning task to a validated structured itinerary payload.
    pub async fn run(&self, task: &PlanningTask) -> Result<RunResult> {
        self.agent.run_with_steps(&task.prompt()).await
    }
}
