pub mod engine;
pub mod request;
pub mod response;

pub use engine::{InvocationResult, SandboxEngine};
pub use request::InboundRequest;
