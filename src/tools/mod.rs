//! Tools the conversational model may ask to run.

pub mod describe_image;
pub mod errors;
pub mod explain_diagram;
pub mod registry;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::diagram::UploadStore;
use crate::llm::provider::{TextCompleter, VisionModel};

pub use describe_image::{DESCRIBE_IMAGE_TOOL, DescribeImageTool};
pub use errors::{ToolError, ToolFailureKind};
pub use explain_diagram::{EXPLAIN_DIAGRAM_TOOL, ExplainDiagramTool};
pub use registry::{ToolContext, ToolDescriptor, ToolFuture, ToolHandler, ToolOutcome, ToolRegistry};

/// Tools that must be present before the loop accepts turns.
pub const REQUIRED_TOOLS: [&str; 2] = [EXPLAIN_DIAGRAM_TOOL, DESCRIBE_IMAGE_TOOL];

/// Build the registry with both flowchart tools and check it is complete.
///
/// `describe-image` only reads images stored under `uploads`.
///
/// # Errors
/// Returns an error if registration or the completeness check fails.
pub fn flowchart_tools(
    explainer: Arc<dyn TextCompleter>,
    vision: Arc<dyn VisionModel>,
    uploads: UploadStore,
) -> Result<ToolRegistry, ToolError> {
    let handlers: Vec<Arc<dyn ToolHandler>> = vec![
        Arc::new(ExplainDiagramTool::new(explainer)),
        Arc::new(DescribeImageTool::new(vision, uploads)),
    ];
    let registry = ToolRegistry::new(handlers)?;
    registry.verify_complete(&REQUIRED_TOOLS)?;
    Ok(registry)
}

/// Decode tool arguments; `null` means "no arguments".
pub(crate) fn parse_arguments<T>(tool: &'static str, arguments: &Value) -> Result<T, ToolError>
where
    T: DeserializeOwned + Default,
{
    if arguments.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(arguments.clone()).map_err(|err| ToolError::InvalidArguments {
        tool,
        reason: err.to_string(),
    })
}

/// First of the two values that holds non-whitespace text.
pub(crate) fn first_non_blank<'a>(primary: Option<&'a str>, fallback: Option<&'a str>) -> Option<&'a str> {
    primary
        .filter(|value| !value.trim().is_empty())
        .or_else(|| fallback.filter(|value| !value.trim().is_empty()))
}
