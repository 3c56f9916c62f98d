use anyhow::{Context, Result};
use std::path::Path;

use pulsewatch::config::{secret, Config};

use super::read_password;

/// Encrypt a plain TOML config file
///
/// The input is parsed first so a broken config is never encrypted.
pub fn encrypt_config(input: &Path, output: Option<&Path>, password_env: &str) -> Result<()> {
    let plaintext = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    Config::from_toml_str(&plaintext)?
        .validate()
        .context("Refusing to encrypt an invalid configuration")?;

    let password = read_password(password_env)?;
    let encoded = secret::encrypt(&plaintext, &password)?;

    write_or_print(output, &encoded)
}

/// Decrypt an encrypted config file
pub fn decrypt_config(input: &Path, output: Option<&Path>, password_env: &str) -> Result<()> {
    let encoded = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let password = read_password(password_env)?;
    let plaintext = secret::decrypt(&encoded, &password)
        .with_context(|| format!("Failed to decrypt {}", input.display()))?;

    write_or_print(output, &plaintext)
}

fn write_or_print(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "Config written");
        }
        None => println!("{content}"),
    }
    Ok(())
}
