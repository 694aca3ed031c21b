//! System context handed to the conversational model on every invocation.

const ASSISTANT_SYSTEM_PROMPT: &str = "You are a helpful assistant specialized in explaining flowcharts.
Your role is to answer questions based on the provided flowchart, which may be available in PlantUML format and/or as an image.

Guidelines:
1. If the user requests a description or explanation of the flowchart in PlantUML format, use the tool 'explain-diagram-source' to generate the explanation.
2. If an image path is provided, use the tool 'describe-image' when:
   - The user asks questions about the image.
   - The user requests a description of the image.
   - The user asks for an explanation of a specific section of the flowchart in the image.
3. If a tool reports an error, tell the user what went wrong and what they can do about it.";

const NOT_PROVIDED: &str = "(not provided)";

/// Build the system context for the current thread resources.
#[must_use]
pub fn system_context(diagram_source: Option<&str>, image_reference: Option<&str>) -> String {
    format!(
        "{ASSISTANT_SYSTEM_PROMPT}\n\nResources:\n- PlantUML code: {}\n- Image path: {}\n",
        diagram_source.unwrap_or(NOT_PROVIDED),
        image_reference.unwrap_or(NOT_PROVIDED),
    )
}
