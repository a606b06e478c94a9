use anyhow::{Context, Result};

fn main() -> Result<()> {
    let doc = authgate::api::openapi();
    let json = serde_json::to_string_pretty(&doc).context("Failed to serialize OpenAPI document")?;
    println!("{json}");
    Ok(())
}
