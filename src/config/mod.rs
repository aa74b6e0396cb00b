// Configuration management module
// Handles the TOML settings file, environment overrides and display

pub mod display;
pub mod settings;

#[cfg(test)]
mod tests;

pub use display::{render_config, show_config};
pub use settings::{
    CONFIG_FILE_NAME, Config, ConfigError, OpenAiConfig, PathsConfig, RetrievalConfig,
};

/// Mask all but the last four characters of a secret for display
#[inline]
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }

    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), visible)
}
