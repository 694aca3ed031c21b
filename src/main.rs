//! Binary entrypoint that serves the flowchart agent HTTP API.

use std::process::ExitCode;

use flowchart_agent::start_flowchart_agent;

/// Load configuration from the environment and serve until Ctrl+C.
fn main() -> ExitCode {
    start_flowchart_agent::run()
}
