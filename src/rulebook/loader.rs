use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::domain::RuleBook;
use crate::error::ConfigurationError;
use crate::rules::RuleRegistry;

/// Errors that can occur during rule book loading.
#[derive(Error, Debug)]
pub enum RuleBookError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

/// Load a rule book from a YAML file.
pub fn load_rule_book(path: impl AsRef<Path>) -> Result<RuleBook, RuleBookError> {
    let content = fs::read_to_string(path)?;
    parse_rule_book(&content)
}

/// Parse and validate a rule book from YAML text.
pub fn parse_rule_book(content: &str) -> Result<RuleBook, RuleBookError> {
    let book: RuleBook = serde_yaml::from_str(content)?;
    validate_rule_book(&book)?;
    Ok(book)
}

/// Validate rule book structure.
fn validate_rule_book(book: &RuleBook) -> Result<(), RuleBookError> {
    if book.version.is_empty() {
        return Err(RuleBookError::Validation(
            "Rule book version cannot be empty".to_string(),
        ));
    }

    let mut seen_keys = HashSet::new();
    for set in &book.rule_sets {
        if !seen_keys.insert((set.product_type.clone(), set.campaign_id.clone())) {
            return Err(RuleBookError::Validation(format!(
                "Duplicate rule set: {}/{}",
                set.product_type, set.campaign_id
            )));
        }

        let mut seen_ids = HashSet::new();
        for rule in &set.rules {
            if !seen_ids.insert(&rule.id) {
                return Err(RuleBookError::Validation(format!(
                    "Duplicate rule ID {} in {}/{}",
                    rule.id, set.product_type, set.campaign_id
                )));
            }
        }
    }

    Ok(())
}

/// Loads the rule book from a fixed path and compiles it.
#[derive(Debug, Clone)]
pub struct RuleBookLoader {
    path: String,
}

impl RuleBookLoader {
    pub fn new(path: impl Into<String>) -> Self {
        RuleBookLoader { path: path.into() }
    }

    /// Load and compile, returning both the book and its registry.
    pub fn load(&self) -> Result<(RuleBook, RuleRegistry), RuleBookError> {
        let book = load_rule_book(&self.path)?;
        let registry = RuleRegistry::from_rule_book(&book)?;
        Ok((book, registry))
    }

    /// Load only the rule book (without compiling).
    pub fn load_rule_book(&self) -> Result<RuleBook, RuleBookError> {
        load_rule_book(&self.path)
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}
