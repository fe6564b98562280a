//! Secrets file loading
//!
//! Secrets are consumed by the engine as an ordered list of KEY=VALUE
//! entries; the file format is one entry per line, with blank lines and
//! `#` comments ignored.

use std::path::Path;

use crate::error::{Error, Result};

/// Loads secrets from a line-oriented file.
///
/// Entries keep their declared order; the engine passes them through to
/// backends verbatim.
pub fn from_file(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| Error::SecretsRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse(&contents))
}

fn parse(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_order_and_skips_noise() {
        let contents = "\n# registry credentials\nREGISTRY_USER=ci\nREGISTRY_PASSWORD=hunter2\n\nAPI_TOKEN=abc123\n";
        let secrets = parse(contents);
        assert_eq!(
            secrets,
            vec![
                "REGISTRY_USER=ci".to_string(),
                "REGISTRY_PASSWORD=hunter2".to_string(),
                "API_TOKEN=abc123".to_string(),
            ]
        );
    }

    #[test]
    fn test_missing_file_is_a_read_error() {
        let err = from_file("/definitely/not/here.env").unwrap_err();
        assert!(matches!(err, Error::SecretsRead { .. }));
    }
}
