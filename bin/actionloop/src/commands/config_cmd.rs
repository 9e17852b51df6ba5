use actionloop_core::{Config, Paths};

/// `sk-a...wxyz` for long keys, `(set)` for short ones, `(empty)` otherwise.
fn mask_key(key: &str) -> String {
    let key = key.trim();
    if key.is_empty() {
        return "(empty)".to_string();
    }
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        "(set)".to_string()
    }
}

/// A copy of `config` that is safe to print.
fn redacted(config: &Config) -> Config {
    let mut config = config.clone();
    for provider in config.providers.values_mut() {
        provider.api_key = mask_key(&provider.api_key);
    }
    config
}

/// Show the current configuration as pretty-printed JSON, API keys masked.
pub async fn show() -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    let exists = paths.config_file().exists();

    println!();
    println!("📋 Current Configuration");
    println!(
        "  File: {}{}",
        paths.config_file().display(),
        if exists { "" } else { " (not found, showing defaults)" }
    );
    println!();
    println!("{}", serde_json::to_string_pretty(&redacted(&config))?);
    Ok(())
}

/// Write the default configuration file.
pub async fn init(force: bool) -> anyhow::Result<()> {
    let paths = Paths::new();
    let config_path = paths.config_file();

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    Config::default().save(&config_path)?;
    println!("✓ Wrote {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Add an API key under providers (or export OPENAI_API_KEY)");
    println!("  2. Run: actionloop run --task \"What does this project do?\"");
    Ok(())
}
