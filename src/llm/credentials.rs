//! API key discovery: process environment first, then a local env file

use secrecy::SecretString;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Credential errors
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("No API key found: set {var} or add {var}=... to {}", env_file.display())]
    Missing { var: String, env_file: PathBuf },

    #[error("Failed to read {}: {message}", path.display())]
    EnvFile { path: PathBuf, message: String },
}

/// Resolve `var` from the environment, falling back to `env_file`.
///
/// A value found in the file is exported into the process environment so
/// later lookups see it directly.
pub fn resolve_api_key(var: &str, env_file: &Path) -> Result<SecretString, CredentialError> {
    if let Some(value) = non_empty_env(var) {
        debug!("Using {} from environment", var);
        return Ok(SecretString::new(value));
    }

    if !env_file.exists() {
        return Err(CredentialError::Missing {
            var: var.to_string(),
            env_file: env_file.to_path_buf(),
        });
    }

    let contents = std::fs::read_to_string(env_file).map_err(|e| CredentialError::EnvFile {
        path: env_file.to_path_buf(),
        message: e.to_string(),
    })?;

    for (line_no, line) in contents.lines().enumerate() {
        let Some(value) = env_line_value(line, var) else {
            continue;
        };
        if value.is_empty() {
            debug!("Empty {} on line {} of {}", var, line_no + 1, env_file.display());
            continue;
        }
        std::env::set_var(var, value);
        info!("Loaded {} from {}", var, env_file.display());
        return Ok(SecretString::new(value.to_string()));
    }

    Err(CredentialError::Missing {
        var: var.to_string(),
        env_file: env_file.to_path_buf(),
    })
}

/// Value of a `NAME=value` line when `NAME` is `var`, quotes stripped.
///
/// Anything after the first `=` is taken literally; lines that do not
/// assign `var` are ignored whatever their shape.
fn env_line_value<'a>(line: &'a str, var: &str) -> Option<&'a str> {
    let line = line.trim_start();
    let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);
    let (name, value) = line.split_once('=')?;
    if name.trim_end() != var {
        return None;
    }
    Some(value.trim().trim_matches(|c: char| c == '"' || c == '\''))
}

fn non_empty_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}
