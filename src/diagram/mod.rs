//! Diagram rendering and upload storage.

pub mod errors;
pub mod plantuml;
pub mod uploads;

pub use errors::{DiagramError, DiagramResult};
pub use plantuml::{DiagramRenderer, PlantUmlRenderer, RenderFuture};
pub use uploads::{FILES_ROUTE, SavedFile, UploadStore, image_extension, sanitize_file_name};
