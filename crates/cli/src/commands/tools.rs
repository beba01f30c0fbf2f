//! `parley tools` — List the tools the model can call.

use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let registry = parley_tools::registry_from_config(&config);

    println!("Available tools ({}):", registry.len());
    println!();
    for spec in registry.for_model() {
        println!("  {}", spec.name);
        println!("      {}", spec.description);
    }
    if !config.tools.disabled.is_empty() {
        println!();
        println!("Disabled: {}", config.tools.disabled.join(", "));
    }
    Ok(())
}
