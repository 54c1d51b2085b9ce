use crate::output::print_json;
use clap::Subcommand;
use insight_core::config::{Config, WarnLevel};
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective configuration (file plus environment overrides)
    Show,
    /// Check the configuration for mistakes
    Validate,
}

pub fn run(root: &Path, subcommand: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    let cfg = Config::resolve(root)?;
    match subcommand {
        ConfigSubcommand::Show => {
            if json {
                print_json(&cfg)?;
            } else {
                print!("{}", serde_yaml::to_string(&cfg)?);
            }
            Ok(())
        }
        ConfigSubcommand::Validate => {
            let warnings = cfg.validate();
            if json {
                print_json(&warnings)?;
            } else if warnings.is_empty() {
                println!("config ok");
            } else {
                for w in &warnings {
                    let tag = match w.level {
                        WarnLevel::Warning => "warning",
                        WarnLevel::Error => "error",
                    };
                    println!("{tag}: {}", w.message);
                }
            }
            let errors = warnings
                .iter()
                .filter(|w| w.level == WarnLevel::Error)
                .count();
            if errors > 0 {
                anyhow::bail!("{errors} config error(s)");
            }
            Ok(())
        }
    }
}
