//! `describe-image`: sends an uploaded image to a vision model.
//!
//! Only images inside the upload directory are ever read.

use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::diagram::UploadStore;
use crate::llm::provider::VisionModel;
use crate::llm::types::EncodedImage;
use crate::tools::errors::ToolError;
use crate::tools::registry::{ToolContext, ToolDescriptor, ToolFuture, ToolHandler};
use crate::tools::{first_non_blank, parse_arguments};

/// Tool name declared to the model.
pub const DESCRIBE_IMAGE_TOOL: &str = "describe-image";

/// Fixed instruction sent with every image.
pub const DESCRIBE_IMAGE_PROMPT: &str = "Describe the image in detail.";

#[derive(Debug, Default, Deserialize)]
struct DescribeArguments {
    #[serde(default)]
    image_reference: Option<String>,
    #[serde(default)]
    focus: Option<String>,
}

/// MIME type for an image path, from its extension.
#[must_use]
pub fn media_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

/// Read and base64-encode the image behind `reference`, confined to `uploads`.
///
/// # Errors
/// Returns [`ToolError::ImageNotFound`] if the reference does not resolve to an
/// accepted image inside the upload directory, or the file is unreadable or empty.
pub async fn load_image(uploads: &UploadStore, reference: &str) -> Result<EncodedImage, ToolError> {
    let path = uploads
        .resolve_image(reference)
        .await
        .ok_or_else(|| ToolError::ImageNotFound(reference.to_string()))?;
    let bytes = tokio::fs::read(&path).await.map_err(|err| {
        debug!(reference, "cannot read image: {err}");
        ToolError::ImageNotFound(reference.to_string())
    })?;

    if bytes.is_empty() {
        return Err(ToolError::ImageNotFound(reference.to_string()));
    }

    Ok(EncodedImage {
        media_type: media_type_for(&path),
        data: STANDARD.encode(bytes),
    })
}

/// Describes images through an injected [`VisionModel`].
pub struct DescribeImageTool {
    vision: Arc<dyn VisionModel>,
    uploads: UploadStore,
}

impl DescribeImageTool {
    /// Wrap a vision model that may only see images under `uploads`.
    #[must_use]
    pub fn new(vision: Arc<dyn VisionModel>, uploads: UploadStore) -> Self {
        Self { vision, uploads }
    }
}

impl ToolHandler for DescribeImageTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: DESCRIBE_IMAGE_TOOL,
            description: "Describes the uploaded image. Use it when the user asks questions about the image, \
                          requests a description of it, or asks about a specific section of the flowchart shown in it.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "image_reference": {
                        "type": "string",
                        "description": "Path of the image to describe. Defaults to the image attached to the conversation."
                    },
                    "focus": {
                        "type": "string",
                        "description": "Optional part of the image to pay particular attention to."
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
            let args: DescribeArguments = parse_arguments(DESCRIBE_IMAGE_TOOL, arguments)?;
            let reference = first_non_blank(
                args.image_reference.as_deref(),
                context.image_reference.as_deref(),
            )
            .ok_or_else(|| ToolError::ImageNotFound("no image attached".to_string()))?;

            let image = load_image(&self.uploads, reference).await?;
            let prompt = match args.focus.as_deref().map(str::trim) {
                Some(focus) if !focus.is_empty() => {
                    format!("{DESCRIBE_IMAGE_PROMPT} Pay particular attention to: {focus}")
                }
                _ => DESCRIBE_IMAGE_PROMPT.to_string(),
            };

            let description = self.vision.describe(&prompt, &image).await?;
            Ok(description)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubVision;
    use tempfile::TempDir;

    fn tool(vision: &Arc<StubVision>) -> (TempDir, UploadStore, DescribeImageTool) {
        let dir = tempfile::tempdir().expect("temp dir");
        let uploads = UploadStore::new(dir.path());
        let tool = DescribeImageTool::new(vision.clone(), uploads.clone());
        (dir, uploads, tool)
    }

    #[test]
    fn test_media_types() {
        assert_eq!(media_type_for(Path::new("out/flow.PNG")), "image/png");
        assert_eq!(media_type_for(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(media_type_for(Path::new("noext")), "image/jpeg");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let vision = Arc::new(StubVision::replying("unused"));
        let (_dir, _uploads, tool) = tool(&vision);

        let result = tool
            .call(
                &json!({ "image_reference": "definitely/not/here.png" }),
                &ToolContext::default(),
            )
            .await;

        assert!(matches!(result, Err(ToolError::ImageNotFound(path)) if path == "definitely/not/here.png"));
        assert!(vision.images().is_empty());
    }

    #[tokio::test]
    async fn test_no_reference_at_all() {
        let vision = Arc::new(StubVision::replying("unused"));
        let (_dir, _uploads, tool) = tool(&vision);
        let result = tool.call(&json!({}), &ToolContext::default()).await;
        assert!(matches!(result, Err(ToolError::ImageNotFound(_))));
    }

    #[tokio::test]
    async fn test_describes_context_image() {
        let vision = Arc::new(StubVision::replying("A box and an arrow."));
        let (_dir, uploads, tool) = tool(&vision);
        let saved = uploads.save_image("t1", "flow.png", b"hello").await.expect("saved");
        let context = ToolContext {
            diagram_source: None,
            image_reference: Some(saved.reference()),
        };

        let result = tool.call(&json!({ "focus": "the loop" }), &context).await;

        assert_eq!(result.ok().as_deref(), Some("A box and an arrow."));
        let images = vision.images();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].0, "Describe the image in detail. Pay particular attention to: the loop");
        assert_eq!(images[0].1.media_type, "image/png");
        assert_eq!(images[0].1.data, "aGVsbG8=");
    }

    #[tokio::test]
    async fn test_refuses_files_outside_upload_dir() {
        let vision = Arc::new(StubVision::replying("leaked"));
        let (dir, _uploads, tool) = tool(&vision);
        let secret = tempfile::Builder::new()
            .suffix(".png")
            .tempfile()
            .expect("outside file");
        std::fs::write(secret.path(), b"secret").expect("write");
        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, b"secret").expect("write");

        for reference in [
            secret.path().to_string_lossy().into_owned(),
            notes.to_string_lossy().into_owned(),
            "/etc/passwd".to_string(),
        ] {
            let result = tool
                .call(&json!({ "image_reference": reference }), &ToolContext::default())
                .await;
            assert!(matches!(result, Err(ToolError::ImageNotFound(_))), "{reference}");
        }
        assert!(vision.images().is_empty());
    }
}
