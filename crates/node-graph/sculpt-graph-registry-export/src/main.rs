//! Print the built-in node registry as JSON, or write it to the path given as the first
//! argument.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use sculpt_graph_core::NodeRegistry;

fn main() -> Result<()> {
    let registry = NodeRegistry::with_builtins();
    let json = serde_json::to_string_pretty(&registry.export())
        .context("failed to serialize node registry")?;

    match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => fs::write(&path, json)
            .with_context(|| format!("failed to write registry to {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}
