//! Function tools exposed to agents and the external capability providers behind them

pub mod capability;
pub mod distance;
pub mod function_factory;
pub mod search;
pub mod tool;

pub use capability::{
    is_no_data, Capability, CapabilityHandle, CapabilityProvider, CapabilitySet, CapabilityTool,
    UnavailableCapability,
};
pub use distance::{parse_distance_query, DistanceQuery, DistanceTimeTool, TravelMode};
pub use function_factory::FunctionFactory;
pub use search::{PlaceSearchTool, WebSearchTool};
pub use tool::{Tool, ToolFuture, ToolRegistry};
