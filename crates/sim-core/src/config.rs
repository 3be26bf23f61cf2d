//! Configuration file loading.
//!
//! A simulation config is a TOML document whose keys are parameter names.
//! Nested tables are flattened with `_`, so
//!
//! ```toml
//! steps = 500
//!
//! [graph]
//! type = "dense"
//! ```
//!
//! yields the parameters `steps` and `graph_type`. Dashes in keys are read as
//! underscores.

use std::path::Path;

use sim_agents::{Params, Value};

use crate::error::ConfigurationError;

/// Loads parameters from a TOML file.
pub fn from_file(path: &Path) -> Result<Params, ConfigurationError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    from_str(&content)
}

/// Parses parameters from a TOML string.
pub fn from_str(content: &str) -> Result<Params, ConfigurationError> {
    let table: toml::Table = toml::from_str(content)?;
    let mut params = Params::new();
    flatten("", table, &mut params);
    Ok(params)
}

/// Renders parameters as a flat TOML document.
pub fn to_toml(params: &Params) -> Result<String, ConfigurationError> {
    let mut table = toml::Table::new();
    for (key, value) in params.iter() {
        if let Some(converted) = to_toml_value(value) {
            table.insert(key.to_string(), converted);
        }
    }
    toml::to_string_pretty(&table).map_err(|e| ConfigurationError::InvalidValue {
        name: "config".into(),
        reason: e.to_string(),
    })
}

fn flatten(prefix: &str, table: toml::Table, out: &mut Params) {
    for (key, value) in table {
        let key = key.replace('-', "_");
        let name = if prefix.is_empty() {
            key
        } else {
            format!("{prefix}_{key}")
        };
        match value {
            toml::Value::Table(inner) => flatten(&name, inner, out),
            other => {
                out.insert(name, from_toml_value(other));
            }
        }
    }
}

fn from_toml_value(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::Str(s),
        toml::Value::Integer(i) => Value::Int(i),
        toml::Value::Float(x) => Value::Float(x),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(d) => Value::Str(d.to_string()),
        toml::Value::Array(items) => Value::List(items.into_iter().map(from_toml_value).collect()),
        toml::Value::Table(table) => Value::Map(
            table
                .into_iter()
                .map(|(key, value)| (key, from_toml_value(value)))
                .collect(),
        ),
    }
}

fn to_toml_value(value: &Value) -> Option<toml::Value> {
    Some(match value {
        Value::Null => return None,
        Value::Bool(b) => toml::Value::Boolean(*b),
        Value::Int(i) => toml::Value::Integer(*i),
        Value::Float(x) => toml::Value::Float(*x),
        Value::Str(s) => toml::Value::String(s.clone()),
        Value::List(items) | Value::Set(items) => {
            toml::Value::Array(items.iter().filter_map(to_toml_value).collect())
        }
        Value::Map(map) => toml::Value::Table(
            map.iter()
                .filter_map(|(key, value)| Some((key.clone(), to_toml_value(value)?)))
                .collect(),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_nested_tables_flatten() {
        let params = from_str(
            r#"
            steps = 12
            serializer = "json"

            [graph]
            type = "dense"
            max-nodes = 64

            [rewire]
            p = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(params.get("steps"), Some(&Value::Int(12)));
        assert_eq!(params.get("graph_type"), Some(&Value::from("dense")));
        assert_eq!(params.get("graph_max_nodes"), Some(&Value::Int(64)));
        assert_eq!(params.get("rewire_p"), Some(&Value::Float(0.5)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "seed = 7\nsync-activator = true").unwrap();
        let params = from_file(file.path()).unwrap();
        assert_eq!(params.get("seed"), Some(&Value::Int(7)));
        assert_eq!(params.get("sync_activator"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            from_file(Path::new("/nonexistent/sim.toml")),
            Err(ConfigurationError::Io { .. })
        ));
        assert!(matches!(
            from_str("steps = = 3"),
            Err(ConfigurationError::Toml(_))
        ));
    }

    #[test]
    fn test_rendered_toml_reads_back() {
        let params = Params::new()
            .with("steps", 5)
            .with("graph_type", "sparse")
            .with("rewire", 0.1);
        let text = to_toml(&params).unwrap();
        assert_eq!(from_str(&text).unwrap(), params);
    }
}
