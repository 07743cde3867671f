//! The coordinator and its specialists

pub mod coordinator;
pub mod delegation;
pub mod role;
pub mod specialist;

pub use coordinator::Coordinator;
pub use delegation::{
    DelegateWorkTool, DelegatedInstruction, DelegationBudget, DelegationContext,
    DELEGATE_TOOL_NAME,
};
pub use role::{RoleProfile, SpecialistRole, COORDINATOR_PROFILE};
pub use specialist::{Specialist, SpecialistFinding, NO_RESULT_MARKER};
