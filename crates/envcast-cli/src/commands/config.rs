use super::{effective_options, json_pretty, EXIT_SUCCESS};
use crate::OverrideArgs;
use std::path::Path;

/// Print the options a `generate` run in `context` would use.
pub fn run(config: Option<&Path>, context: &Path, json: bool) -> Result<u8, String> {
    let options = effective_options(config, context, &OverrideArgs::default())?;
    if json {
        println!("{}", json_pretty(&options)?);
    } else {
        let text = toml::to_string_pretty(&options)
            .map_err(|e| format!("TOML serialization failed: {e}"))?;
        print!("{text}");
    }
    Ok(EXIT_SUCCESS)
}
