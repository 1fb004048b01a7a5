//! Shared executor helpers: required-config validation, configuration
//! resolution and result post-processing. Executors compose these instead
//! of inheriting from a base class.

use crate::context::ExecutionContext;
use crate::executor::{ExecutorError, ExecutorResult};
use crate::models::TaskDefinition;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;

/// Verify that every required configuration key is present and non-empty.
pub fn require_config(
    definition: &TaskDefinition,
    required_keys: &[&str],
) -> Result<(), ExecutorError> {
    for key in required_keys {
        match definition.configuration.get(*key) {
            Some(value) if !value.trim().is_empty() => {}
            _ => {
                return Err(ExecutorError::Configuration(format!(
                    "task '{}' is missing required configuration key '{}'",
                    definition.name, key
                )))
            }
        }
    }
    Ok(())
}

/// Resolve `${var}` placeholders in every configuration value.
pub fn resolve_configuration(
    definition: &TaskDefinition,
    context: &ExecutionContext,
) -> HashMap<String, String> {
    context.substitute_map(&definition.configuration)
}

/// Fetch a resolved configuration value, failing with a configuration
/// error when absent.
pub fn required_value(
    configuration: &HashMap<String, String>,
    key: &str,
) -> Result<String, ExecutorError> {
    configuration
        .get(key)
        .cloned()
        .ok_or_else(|| ExecutorError::Configuration(format!("missing configuration value '{key}'")))
}

/// Stamp the result map with the execution timestamp (epoch millis).
pub fn finalize_result(mut result: ExecutorResult) -> ExecutorResult {
    result.insert(
        "execution_timestamp".to_string(),
        Value::from(Utc::now().timestamp_millis()),
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition_with(config: &[(&str, &str)]) -> TaskDefinition {
        let mut definition = TaskDefinition::new("call-api", "http", 0);
        for (k, v) in config {
            definition
                .configuration
                .insert((*k).to_string(), (*v).to_string());
        }
        definition
    }

    #[test]
    fn require_config_accepts_present_keys() {
        let definition = definition_with(&[("url", "https://example.com"), ("method", "GET")]);
        assert!(require_config(&definition, &["url", "method"]).is_ok());
    }

    #[test]
    fn require_config_rejects_missing_and_blank_keys() {
        let definition = definition_with(&[("url", "  ")]);
        let err = require_config(&definition, &["url"]).unwrap_err();
        assert!(matches!(err, ExecutorError::Configuration(_)));
        assert!(require_config(&definition, &["method"]).is_err());
    }

    #[test]
    fn configuration_resolution_substitutes_variables() {
        let definition = definition_with(&[("url", "https://${host}/v1")]);
        let mut context = ExecutionContext::new();
        context.set_variable("host", json!("api.example.com"));
        let resolved = resolve_configuration(&definition, &context);
        assert_eq!(resolved["url"], "https://api.example.com/v1");
    }

    #[test]
    fn finalize_stamps_timestamp() {
        let result = finalize_result(HashMap::from([(
            "success".to_string(),
            Value::Bool(true),
        )]));
        assert!(result["execution_timestamp"].as_i64().unwrap() > 0);
        assert_eq!(result["success"], Value::Bool(true));
    }
}
