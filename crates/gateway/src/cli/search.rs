use lt_domain::config::Config;

use crate::bootstrap::build_retriever;

/// Query the search index once and print what a turn would receive.
/// Useful for checking index ids and credentials.
pub async fn run(config: &Config, query: &str) -> anyhow::Result<()> {
    let retriever = build_retriever(config)?;
    if !retriever.is_enabled() {
        anyhow::bail!("search is not configured (set VERTEX_PROJECT_ID and VERTEX_ENGINE_ID, plus Google credentials)");
    }

    let block = retriever.retrieve(query).await;
    if block.is_empty() {
        eprintln!("no context returned for {query:?} (see warnings above)");
    } else {
        println!("{block}");
    }
    Ok(())
}
