pub mod itinerary;
pub mod response;
pub mod result;

pub use itinerary::{Day, Event, EventType, Itinerary};
pub use response::deserialize_structured_response;
pub use result::{RunResult, TokenUsage};
