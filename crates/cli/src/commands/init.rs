//! `parley init` — First-time setup.

use parley_config::AppConfig;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let path = super::config_path(config_path);

    println!("Parley — First-Time Setup");
    println!("=========================\n");

    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
        && !dir.exists()
    {
        std::fs::create_dir_all(dir)?;
        println!("Created config directory: {}", dir.display());
    }

    if path.exists() {
        println!("\nConfig already exists at: {}", path.display());
        println!("   Edit it manually or delete and re-run init.\n");
        return Ok(());
    }

    std::fs::write(&path, AppConfig::default_toml())?;
    println!("Created config.toml at: {}", path.display());
    println!("\nNext steps:");
    println!("   1. Add your API key (or set PARLEY_API_KEY)");
    println!("   2. Add a [[users]] entry with an id and token");
    println!("   3. Run: parley chat --user <id>\n");

    Ok(())
}
