//! Config command implementation.

use anyhow::Result;

use crate::cli::ConfigAction;
use crate::config::Config;
use crate::format::FormatOptions;

use super::notice;

pub fn cmd_config(action: ConfigAction, config: &Config, opts: &FormatOptions) -> Result<()> {
    let path = Config::path();
    match action {
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Show => {
            if opts.is_json() {
                print!("{}", opts.as_json(config)?);
            } else {
                print!("{}", toml::to_string_pretty(config)?);
            }
        }
        ConfigAction::Init => {
            if path.exists() {
                notice(
                    opts,
                    &format!("Config already exists at {}", path.display()),
                );
            } else {
                Config::default().save()?;
                notice(opts, &format!("Wrote {}", path.display()));
            }
        }
    }
    Ok(())
}
