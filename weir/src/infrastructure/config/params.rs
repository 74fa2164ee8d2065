// /////////////////////////////////////////////////////////////////////////////
// Weir Incremental Pipeline Engine
// Copyright (c) 2025 Weir Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Parameter Resolution
//!
//! Declarative configs reference values they cannot embed: secrets from
//! the process environment and values defined elsewhere in the resolved
//! document. Two reference forms are supported:
//!
//! - `"${ENV_VAR}"` or `{"resolver_": "ENV", "var_": "ENV_VAR"}` resolves
//!   against the process environment;
//! - `{"resolver_": "CONFIG_KEY", "key_": "a.b.c"}` resolves a dot-path
//!   within the fully-resolved config document.
//!
//! Resolution recurses through arrays and plain objects, so references can
//! appear anywhere inside a parameter tree.

use serde_json::{Map, Value};

use weir_domain::error::PipelineError;

const RESOLVER_FIELD: &str = "resolver_";
const ENV_RESOLVER: &str = "ENV";
const CONFIG_KEY_RESOLVER: &str = "CONFIG_KEY";
const KEY_SEPARATOR: char = '.';

/// Resolve every parameter in a map against the environment and the given
/// document.
pub fn resolve_params(
    params: &Map<String, Value>,
    document: &Value,
) -> Result<Map<String, Value>, PipelineError> {
    params
        .iter()
        .map(|(name, value)| Ok((name.clone(), resolve_value(value, document)?)))
        .collect()
}

/// Resolve a single parameter value.
pub fn resolve_value(value: &Value, document: &Value) -> Result<Value, PipelineError> {
    match value {
        Value::String(s) => {
            if let Some(var) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
                resolve_env(var)
            } else {
                Ok(value.clone())
            }
        }
        Value::Object(map) => match map.get(RESOLVER_FIELD).and_then(Value::as_str) {
            Some(ENV_RESOLVER) => {
                let var = map.get("var_").and_then(Value::as_str).ok_or_else(|| {
                    PipelineError::invalid_config("ENV resolver requires a 'var_' field")
                })?;
                resolve_env(var)
            }
            Some(CONFIG_KEY_RESOLVER) => {
                let key = map.get("key_").and_then(Value::as_str).ok_or_else(|| {
                    PipelineError::invalid_config("CONFIG_KEY resolver requires a 'key_' field")
                })?;
                resolve_key(key, document)
            }
            Some(other) => Err(PipelineError::invalid_config(format!(
                "Unknown parameter resolver '{other}'"
            ))),
            None => {
                let resolved = map
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), resolve_value(v, document)?)))
                    .collect::<Result<Map<String, Value>, PipelineError>>()?;
                Ok(Value::Object(resolved))
            }
        },
        Value::Array(values) => {
            let resolved = values
                .iter()
                .map(|v| resolve_value(v, document))
                .collect::<Result<Vec<Value>, PipelineError>>()?;
            Ok(Value::Array(resolved))
        }
        other => Ok(other.clone()),
    }
}

fn resolve_env(var: &str) -> Result<Value, PipelineError> {
    std::env::var(var).map(Value::String).map_err(|_| {
        PipelineError::invalid_config(format!("Environment variable '{var}' is not set"))
    })
}

fn resolve_key(key: &str, document: &Value) -> Result<Value, PipelineError> {
    let mut current = document;
    for part in key.split(KEY_SEPARATOR) {
        current = current.get(part).ok_or_else(|| {
            PipelineError::invalid_config(format!(
                "Config key '{key}' not found (missing segment '{part}')"
            ))
        })?;
    }
    Ok(current.clone())
}
