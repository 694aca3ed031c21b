//! Interactive terminal chat about one PlantUML file.
//!
//! Run with: `cargo run --bin flowchart-agent-chat -- flow.puml [image.png]`
//! Type `exit` to quit.

use std::process::ExitCode;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use flowchart_agent::config::AppConfig;
use flowchart_agent::diagram::UploadStore;
use flowchart_agent::start_flowchart_agent::{build_assistant, init_tracing};

const USAGE: &str = "usage: flowchart-agent-chat <diagram.puml> [image]";

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    match chat().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn chat() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let diagram_path = args.next().context(USAGE)?;
    let image_path = args.next();

    let diagram_source = tokio::fs::read_to_string(&diagram_path)
        .await
        .with_context(|| format!("cannot read {diagram_path}"))?;

    let config = AppConfig::from_env()?;
    let uploads = UploadStore::new(config.server.out_dir.clone());
    let assistant = build_assistant(&config, uploads.clone())?;
    let thread_id = assistant.create_thread();
    assistant
        .set_diagram_source(&thread_id, Some(diagram_source))
        .await;

    // The vision tool only reads the upload directory, so the image is copied there.
    if let Some(image_path) = image_path {
        let bytes = tokio::fs::read(&image_path)
            .await
            .with_context(|| format!("cannot read {image_path}"))?;
        let saved = uploads
            .save_image(thread_id.as_str(), &image_path, &bytes)
            .await
            .with_context(|| format!("cannot store {image_path}"))?;
        assistant
            .set_image_reference(&thread_id, Some(saved.reference()))
            .await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"You: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") {
            break;
        }
        if message.is_empty() {
            continue;
        }

        let output = match assistant.submit(&thread_id, message, None, None).await {
            Ok(reply) => format!("Assistant: {reply}\n"),
            Err(e) => format!("Assistant error: {e}\n"),
        };
        stdout.write_all(output.as_bytes()).await?;
    }

    if let Err(e) = uploads.remove_thread(thread_id.as_str()).await {
        eprintln!("cannot clean up {}: {e}", uploads.root().display());
    }
    Ok(())
}
