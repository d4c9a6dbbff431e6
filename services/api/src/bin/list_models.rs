//! services/api/src/bin/list_models.rs
//!
//! Diagnostic utility: prints the models the configured GEMINI_API_KEY can use.
//!
//! Usage: `list_models [--generate-only]`

use api_lib::{adapters::GeminiAdapter, config::GeminiConfig, error::ApiError};
use study_assistant_core::GenerativeModelService;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let generate_only = std::env::args().any(|a| a == "--generate-only");

    let config = GeminiConfig::from_env()?;
    let adapter = GeminiAdapter::new(&config)?;
    let models = adapter.list_models().await?;

    let mut shown = 0;
    for model in models
        .iter()
        .filter(|m| !generate_only || m.supports_generate_content())
    {
        match &model.display_name {
            Some(display) => println!("{:<40} {}", model.id(), display),
            None => println!("{}", model.id()),
        }
        shown += 1;
    }

    eprintln!("{} model(s) listed.", shown);
    for candidate in &config.models {
        if !models.iter().any(|m| m.id() == candidate.as_str()) {
            eprintln!("warning: configured candidate '{}' is not available to this key", candidate);
        }
    }

    Ok(())
}
