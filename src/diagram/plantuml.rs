//! Client for a PlantUML rendering server.
//!
//! Sources travel in the server's compact URL form: raw deflate, then base64
//! over PlantUML's own alphabet (`0-9A-Za-z-_`) in whole 4-character groups.

use std::future::Future;
use std::io::Write as _;
use std::pin::Pin;

use base64::Engine;
use base64::alphabet::Alphabet;
use base64::engine::general_purpose::{GeneralPurpose, NO_PAD};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use tracing::debug;

use crate::config::PlantUmlConfig;
use crate::diagram::errors::{DiagramError, DiagramResult};

/// Boxed future returned by [`DiagramRenderer`].
pub type RenderFuture<'a> = Pin<Box<dyn Future<Output = DiagramResult<Vec<u8>>> + Send + 'a>>;

/// Turns diagram source into PNG bytes.
pub trait DiagramRenderer: Send + Sync {
    /// Render `source` to a PNG image.
    fn render_png<'a>(&'a self, source: &'a str) -> RenderFuture<'a>;
}

/// Renders through a remote PlantUML server.
#[derive(Clone, Debug)]
pub struct PlantUmlRenderer {
    client: reqwest::Client,
    server_url: String,
    engine: GeneralPurpose,
}

impl PlantUmlRenderer {
    /// Build a renderer for the configured server.
    ///
    /// # Errors
    /// Returns [`DiagramError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &PlantUmlConfig) -> DiagramResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            server_url: config.server_url.trim_end_matches('/').to_string(),
            engine: plantuml_engine()?,
        })
    }

    /// URL the PNG for `source` is fetched from.
    ///
    /// # Errors
    /// Returns [`DiagramError::Io`] if compression fails.
    pub fn png_url(&self, source: &str) -> DiagramResult<String> {
        let encoded = encode_source(&self.engine, source)?;
        Ok(format!("{}/png/{encoded}", self.server_url))
    }
}

const PLANTUML_ALPHABET: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz-_";

fn plantuml_engine() -> DiagramResult<GeneralPurpose> {
    let alphabet = Alphabet::new(PLANTUML_ALPHABET)
        .map_err(|e| DiagramError::Encoding(e.to_string()))?;
    Ok(GeneralPurpose::new(&alphabet, NO_PAD))
}

/// Deflate `source` and base64 it in whole 3-byte groups. The zero bytes
/// padding the last group sit after the end of the deflate stream.
fn encode_source(engine: &GeneralPurpose, source: &str) -> DiagramResult<String> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(source.as_bytes())?;
    let mut compressed = encoder.finish()?;

    let padded_len = compressed.len().div_ceil(3) * 3;
    compressed.resize(padded_len, 0);
    Ok(engine.encode(compressed))
}

impl DiagramRenderer for PlantUmlRenderer {
    fn render_png<'a>(&'a self, source: &'a str) -> RenderFuture<'a> {
        Box::pin(async move {
            let url = self.png_url(source)?;
            debug!(bytes = source.len(), "rendering diagram");

            let response = self.client.get(&url).send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(DiagramError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let png = response.bytes().await?;
            if png.is_empty() {
                return Err(DiagramError::EmptyImage);
            }
            Ok(png.to_vec())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::DeflateDecoder;
    use std::io::Read as _;

    fn decode(encoded: &str) -> String {
        let engine = plantuml_engine().expect("engine");
        let compressed = engine.decode(encoded).expect("valid base64");
        let mut source = String::new();
        DeflateDecoder::new(compressed.as_slice())
            .read_to_string(&mut source)
            .expect("valid deflate");
        source
    }

    #[test]
    fn test_encoding_decodes_back_to_source() {
        let engine = plantuml_engine().expect("engine");
        for source in ["A->B", "@startuml\nAlice -> Bob: héllo\n@enduml", ""] {
            let encoded = encode_source(&engine, source).expect("encoded");
            assert_eq!(encoded.len() % 4, 0);
            assert!(encoded.chars().all(|c| PLANTUML_ALPHABET.contains(c)));
            assert_eq!(decode(&encoded), source);
        }
    }

    #[test]
    fn test_large_diagram_url_stays_short() {
        let mut source = String::from("@startuml\n");
        for step in 0..400 {
            source.push_str(&format!(":step {step};\nif (check {step}?) then (yes)\n  :handle;\nendif\n"));
        }
        source.push_str("@enduml\n");
        assert!(source.len() > 20_000);

        let renderer = PlantUmlRenderer::new(&PlantUmlConfig::default()).expect("renderer");
        let url = renderer.png_url(&source).expect("url");
        assert!(url.len() < source.len() / 2, "url is {} bytes", url.len());
    }

    #[test]
    fn test_png_url_trims_trailing_slash() {
        let config = PlantUmlConfig {
            server_url: "http://localhost:8080/plantuml/".to_string(),
            ..PlantUmlConfig::default()
        };
        let renderer = PlantUmlRenderer::new(&config).expect("renderer");
        let url = renderer.png_url("A->B").expect("url");
        let encoded = url
            .strip_prefix("http://localhost:8080/plantuml/png/")
            .expect("server prefix");
        assert_eq!(decode(encoded), "A->B");
    }
}
