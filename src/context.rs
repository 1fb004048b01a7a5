//! # Execution Context
//!
//! Mutable variable bag scoped to one workflow execution. Seeded from the
//! execution's variables, updated as tasks complete, and used for
//! `${name}` substitution in task configuration before dispatch.

use serde_json::Value;
use std::collections::HashMap;

/// Per-run variable store used for substitution and cross-task data
/// passing.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    variables: HashMap<String, Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a context from a workflow execution's string variables.
    pub fn from_variables(variables: &HashMap<String, String>) -> Self {
        let variables = variables
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        Self { variables }
    }

    /// Set a variable, replacing any previous value.
    pub fn set_variable(&mut self, key: impl Into<String>, value: Value) {
        self.variables.insert(key.into(), value);
    }

    pub fn get_variable(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    /// String rendering of a variable: strings render bare, other values
    /// as compact JSON.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get_variable(key).map(render_value)
    }

    /// Replace every `${name}` in `input` with the context value when
    /// present; unknown names are left literal. Idempotent on strings
    /// without placeholders.
    pub fn substitute(&self, input: &str) -> String {
        let mut result = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(start) = rest.find("${") {
            result.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find('}') {
                Some(end) => {
                    let name = &after[..end];
                    match self.variables.get(name) {
                        Some(value) => result.push_str(&render_value(value)),
                        None => {
                            result.push_str("${");
                            result.push_str(name);
                            result.push('}');
                        }
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    // Unterminated placeholder, keep it literal
                    result.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }

        result.push_str(rest);
        result
    }

    /// Apply substitution to every value of a configuration map.
    pub fn substitute_map(&self, configuration: &HashMap<String, String>) -> HashMap<String, String> {
        configuration
            .iter()
            .map(|(k, v)| (k.clone(), self.substitute(v)))
            .collect()
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
