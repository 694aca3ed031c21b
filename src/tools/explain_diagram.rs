//! `explain-diagram-source`: asks a text model to explain PlantUML source.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::llm::provider::TextCompleter;
use crate::tools::errors::ToolError;
use crate::tools::registry::{ToolContext, ToolDescriptor, ToolFuture, ToolHandler};
use crate::tools::{first_non_blank, parse_arguments};

/// Tool name declared to the model.
pub const EXPLAIN_DIAGRAM_TOOL: &str = "explain-diagram-source";

const EXPLAIN_PREAMBLE: &str = "You explain flowcharts written in PlantUML to readers who may not know the notation. \
Walk through the flow from start to end, covering every decision, branch and loop.";

/// Build the instruction sent with the diagram text.
#[must_use]
pub fn explanation_prompt(diagram_source: &str) -> String {
    format!("Explain in detail the following PlantUML code.\nThis is the PlantUML code:\n{diagram_source}")
}

#[derive(Debug, Default, Deserialize)]
struct ExplainArguments {
    #[serde(default)]
    diagram_source: Option<String>,
}

/// Explains diagram source through an injected [`TextCompleter`].
pub struct ExplainDiagramTool {
    completer: Arc<dyn TextCompleter>,
}

impl ExplainDiagramTool {
    /// Wrap a completer.
    #[must_use]
    pub fn new(completer: Arc<dyn TextCompleter>) -> Self {
        Self { completer }
    }
}

impl ToolHandler for ExplainDiagramTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: EXPLAIN_DIAGRAM_TOOL,
            description: "Explains the flowchart given as PlantUML code. Use it when the user asks for a \
                          description or explanation of the flowchart in PlantUML format.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "diagram_source": {
                        "type": "string",
                        "description": "PlantUML code to explain. Defaults to the diagram attached to the conversation."
                    }
                }
            }),
        }
    }

    fn call<'a>(
        &'a self,
        arguments: &'a Value,
        context: &'a ToolContext,
    ) -> ToolFuture<'a, Result<String, ToolError>> {
        Box::pin(async move {
            let args: ExplainArguments = parse_arguments(EXPLAIN_DIAGRAM_TOOL, arguments)?;
            let source = first_non_blank(
                args.diagram_source.as_deref(),
                context.diagram_source.as_deref(),
            )
            .ok_or(ToolError::EmptyDiagram)?;

            let prompt = explanation_prompt(source);
            let explanation = self.completer.complete(Some(EXPLAIN_PREAMBLE), &prompt).await?;
            Ok(explanation)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingCompleter;

    const SOURCE: &str = "@startuml\nA->B\n@enduml";

    #[tokio::test]
    async fn test_prompt_embeds_argument() {
        let completer = Arc::new(RecordingCompleter::replying("A calls B."));
        let tool = ExplainDiagramTool::new(completer.clone());

        let result = tool
            .call(&json!({ "diagram_source": SOURCE }), &ToolContext::default())
            .await;

        assert_eq!(result.ok().as_deref(), Some("A calls B."));
        let prompts = completer.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains(SOURCE));
    }

    #[tokio::test]
    async fn test_falls_back_to_context() {
        let completer = Arc::new(RecordingCompleter::replying("ok"));
        let tool = ExplainDiagramTool::new(completer.clone());
        let context = ToolContext {
            diagram_source: Some(SOURCE.to_string()),
            image_reference: None,
        };

        let result = tool.call(&json!({ "diagram_source": "  " }), &context).await;

        assert!(result.is_ok());
        assert_eq!(completer.prompts()[0], explanation_prompt(SOURCE));
    }

    #[tokio::test]
    async fn test_empty_diagram() {
        let completer = Arc::new(RecordingCompleter::replying("unused"));
        let tool = ExplainDiagramTool::new(completer.clone());

        let result = tool.call(&Value::Null, &ToolContext::default()).await;

        assert!(matches!(result, Err(ToolError::EmptyDiagram)));
        assert!(completer.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_is_execution_error() {
        let tool = ExplainDiagramTool::new(Arc::new(RecordingCompleter::failing()));

        let result = tool
            .call(&json!({ "diagram_source": SOURCE }), &ToolContext::default())
            .await;

        assert!(matches!(result, Err(ToolError::Execution(_))));
    }

    #[test]
    fn test_descriptor_name() {
        let tool = ExplainDiagramTool::new(Arc::new(RecordingCompleter::replying("")));
        let descriptor = tool.descriptor();
        assert_eq!(descriptor.name, EXPLAIN_DIAGRAM_TOOL);
        assert_eq!(descriptor.parameters["type"], "object");
    }
}
