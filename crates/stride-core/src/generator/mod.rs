//! Adapter interface for the external generation service.
//!
//! ```text
//! orchestrator
//!     |
//!     |  GenerationRequest { instructions, tool_name, output_schema }
//!     v
//! &dyn PlanGenerator --generate()--> GenerationReply { structured, text }
//!     |
//!     +-- AnthropicGenerator (Messages API, forced tool call)
//! ```
//!
//! One request, one reply: no streaming, no multi-turn exchange, no retry.

pub mod anthropic;

use async_trait::async_trait;
use serde_json::Value;

pub use anthropic::{AnthropicGenerator, GeneratorConfig};

/// Everything the service needs to produce a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Natural-language instructions.
    pub instructions: String,
    /// Name of the tool the service must answer through.
    pub tool_name: String,
    /// JSON Schema of the tool input.
    pub output_schema: Value,
}

/// What came back from the service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationReply {
    /// Tool input, when the service answered through the structured channel.
    pub structured: Option<Value>,
    /// Any free text the service produced alongside or instead.
    pub text: Option<String>,
}

impl GenerationReply {
    pub fn structured(value: Value) -> Self {
        Self {
            structured: Some(value),
            text: None,
        }
    }

    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            structured: None,
            text: Some(text.into()),
        }
    }
}

/// The call to the service could not complete.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request to generation service failed: {0}")]
    Request(String),
    #[error("generation service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode generation service response: {0}")]
    Decode(String),
    #[error("generation service is not configured: {0}")]
    NotConfigured(String),
}

/// A service that turns a [`GenerationRequest`] into a [`GenerationReply`].
///
/// Object-safe so the orchestrator can hold an `Arc<dyn PlanGenerator>`.
#[async_trait]
pub trait PlanGenerator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Perform exactly one call.
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationReply, TransportError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn PlanGenerator) {}
};
