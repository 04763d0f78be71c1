use anyhow::Context;
use puzzle_sync_back::services::documentation::ApiDoc;
use utoipa::OpenApi;

/// Print the OpenAPI document of the game API, or write it to the path given as first argument.
fn main() -> anyhow::Result<()> {
    let doc = ApiDoc::openapi()
        .to_pretty_json()
        .context("serializing OpenAPI document")?;

    match std::env::args().nth(1) {
        Some(path) => std::fs::write(&path, doc).with_context(|| format!("writing {path}"))?,
        None => println!("{doc}"),
    }
    Ok(())
}
