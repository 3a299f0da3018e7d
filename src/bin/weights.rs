use anyhow::{Context, Result};

use set_edge::config::{self, RunSettings, has_flag};

fn main() -> Result<()> {
    config::load_dotenv();
    config::init_logging();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let settings = RunSettings::resolve(&args).context("resolve settings")?;
    let registry = settings.load_registry().with_context(|| match &settings.registry_path {
        Some(path) => format!("invalid weight registry {}", path.display()),
        None => "invalid built-in weight registry".to_string(),
    })?;

    if has_flag(&args, "--validate") {
        println!("OK: {} profile(s)", registry.len());
        return Ok(());
    }

    let active = settings
        .profile
        .as_deref()
        .or(registry.active_code_name())
        .unwrap_or_default();
    for profile in registry.profiles() {
        let marker = if profile.code_name() == active { "*" } else { " " };
        println!("{marker} {} ({})", profile.code_name(), profile.name());
        if !profile.description().is_empty() {
            println!("    {}", profile.description());
        }
        let top = profile
            .top_factors(3)
            .into_iter()
            .map(|(factor, weight)| format!("{factor}={weight:.2}"))
            .collect::<Vec<_>>()
            .join(", ");
        println!("    top: {top}");
        let features = profile
            .features()
            .iter()
            .filter(|(_, on)| **on)
            .map(|(flag, _)| flag.as_str())
            .collect::<Vec<_>>();
        if !features.is_empty() {
            println!("    features: {}", features.join(", "));
        }
    }
    Ok(())
}
