//! Config command handler
//!
//! View and modify configuration settings.

use crate::config::Config;
use crate::error::Result;
use clap::Args;

/// Config command arguments
#[derive(Args)]
pub struct ConfigArgs {
    /// Configuration key (e.g., "location.fallback")
    pub key: Option<String>,

    /// Value to set (if not provided, shows current value)
    pub value: Option<String>,

    /// Show config file path
    #[arg(long)]
    pub path: bool,

    /// Reset config to defaults
    #[arg(long)]
    pub reset: bool,
}

/// Run the config command
pub fn run(args: ConfigArgs) -> Result<()> {
    // Show path
    if args.path {
        let path = Config::config_path()?;
        println!("{}", path.display());
        return Ok(());
    }

    // Reset config
    if args.reset {
        let config = Config::default();
        config.save()?;
        println!("Configuration reset to defaults");
        return Ok(());
    }

    let mut config = Config::load()?;

    match (&args.key, &args.value) {
        // No arguments: show all config
        (None, None) => {
            show_all_config(&config);
        }

        // Key only: show that value
        (Some(key), None) => {
            if let Some(value) = config.get(key) {
                println!("{}", value);
            } else {
                eprintln!("Unknown config key: {}", key);
                eprintln!("\nAvailable keys:");
                for k in Config::available_keys() {
                    eprintln!("  {}", k);
                }
                std::process::exit(1);
            }
        }

        // Key and value: set the value
        (Some(key), Some(value)) => {
            config.set(key, value)?;
            config.save()?;
            println!("{} = {}", key, value);
        }

        // Value without key: not valid
        (None, Some(_)) => {
            eprintln!("Error: Must specify a key to set a value");
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Mask all but the last four characters of a key
fn mask_key(key: &str) -> String {
    if key.is_empty() {
        return String::new();
    }
    let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    format!("***{}", tail)
}

fn optional(value: Option<f64>) -> String {
    value.map_or_else(|| "# not set".to_string(), |v| v.to_string())
}

/// Display all configuration values
fn show_all_config(config: &Config) {
    println!("[api]");
    if config.api.key.is_empty() {
        println!("key = \"\" # not configured");
    } else {
        println!("key = \"{}\" # configured", mask_key(&config.api.key));
    }
    println!("base_url = \"{}\"", config.api.base_url);
    println!("timeout_secs = {}", config.api.timeout_secs);
    println!();

    println!("[location]");
    println!("timeout_secs = {}", config.location.timeout_secs);
    println!("max_attempts = {}", config.location.max_attempts);
    println!("backoff_base_ms = {}", config.location.backoff_base_ms);
    println!(
        "switch_after_transient_failures = {}",
        config.location.switch_after_transient_failures
    );
    println!("fallback = \"{}\"", config.location.fallback);
    println!("fixed_longitude = {}", optional(config.location.fixed_longitude));
    println!("fixed_latitude = {}", optional(config.location.fixed_latitude));
    println!();

    println!("[cache]");
    println!("ttl_secs = {}", config.cache.ttl_secs);
    println!("persist = {}", config.cache.persist);
    println!();

    println!("[map]");
    println!("backend = \"{}\"", config.map.backend);
    println!("style = \"{}\"", config.map.style);
    println!();

    println!("[server]");
    println!("host = \"{}\"", config.server.host);
    println!("port = {}", config.server.port);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key(""), "");
        assert_eq!(mask_key("abc"), "***abc");
        assert_eq!(mask_key("0123456789abcdef"), "***cdef");
    }
}
