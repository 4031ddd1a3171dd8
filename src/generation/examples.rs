// src/generation/examples.rs
use crate::error::{BotError, Result};
use log::{info, warn};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct ExampleFile {
    pro_crypto: Vec<String>,
}

/// Parses `{"pro_crypto": [...]}`, dropping blank entries.
pub fn parse_examples(json: &str) -> Result<Vec<String>> {
    let file: ExampleFile = serde_json::from_str(json)?;
    Ok(file
        .pro_crypto
        .into_iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect())
}

pub fn load_examples(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| {
        BotError::ConfigError(format!("Cannot read example file {}: {}", path.display(), e))
    })?;
    let examples = parse_examples(&raw)?;
    info!("Loaded {} example posts from {}", examples.len(), path.display());
    Ok(examples)
}

/// Like [`load_examples`] but never fails: generation still works without examples.
pub fn load_examples_or_empty(path: impl AsRef<Path>) -> Vec<String> {
    load_examples(path).unwrap_or_else(|e| {
        warn!("Continuing without example posts: {}", e);
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_examples() {
        let examples =
            parse_examples(r#"{"pro_crypto": ["gm builders", "  ", "ship it"], "other": []}"#)
                .unwrap();
        assert_eq!(examples, vec!["gm builders", "ship it"]);
    }

    #[test]
    fn test_missing_key_is_parse_error() {
        assert!(matches!(
            parse_examples(r#"{"bearish": []}"#),
            Err(BotError::ParseError(_))
        ));
    }

    #[test]
    fn test_missing_file_falls_back_to_empty() {
        assert!(load_examples_or_empty("/definitely/not/here.json").is_empty());
    }
}
