//! `echo-container` handler

use anyhow::{Context, Result};
use biomego::Biomego;
use biomego_engine::Engine;

use super::Output;

/// Builds the echo container and either describes or resolves it
///
/// The description is printed as JSON; with `resolve` the engine runs it and
/// the captured stdout is printed instead.
pub async fn echo_container(
    module: &Biomego,
    engine: &dyn Engine,
    string_arg: &str,
    resolve: bool,
) -> Result<Output> {
    let container = module.echo_container(string_arg);

    if resolve {
        let stdout = engine
            .stdout(&container)
            .await
            .context("Failed to run echo container")?;
        return Ok(Output::Text(stdout));
    }

    let description =
        serde_json::to_string_pretty(&container).context("Failed to serialize container")?;
    Ok(Output::Text(format!("{}\n", description)))
}
