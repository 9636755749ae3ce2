use serde::de::DeserializeOwned;
use std::io::{self, Read};

/// Read piped JSON or YAML from stdin into a typed struct.
/// Returns None if stdin is a TTY (interactive) or empty.
pub fn read_stdin<T: DeserializeOwned>() -> Result<Option<T>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;

    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    // JSON first; anything else is treated as YAML
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        Ok(Some(serde_json::from_str(trimmed)?))
    } else {
        Ok(Some(serde_yaml::from_str(trimmed)?))
    }
}
