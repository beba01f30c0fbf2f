//! `parley clear` — Clear a user's chat history.

use parley_agent::build_chat_service;
use std::path::Path;

pub async fn run(config_path: Option<&Path>, user_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    super::require_api_key(&config, config_path)?;
    let user = super::resolve_user(&config, user_id)?;

    build_chat_service(&config)
        .await?
        .clear_history(Some(&user))
        .await?;

    println!("Chat history cleared successfully.");
    Ok(())
}
