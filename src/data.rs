//! Data provider files.
//!
//! A scenario lists the JSON files it reads its fixtures from as path templates such
//! as `DataProviders/{env}{browser}/users.json`. The templates are resolved through an
//! [`Environment`] and the files are merged, in order, into one [`DataSet`].

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::environment::Environment;
use crate::error::{HarnessError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataSources {
    root: PathBuf,
    templates: Vec<String>,
}

impl DataSources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            templates: Vec::new(),
        }
    }

    pub fn read_from(mut self, template: &str) -> Self {
        self.templates.push(template.to_string());
        self
    }

    pub fn templates(&self) -> &[String] {
        &self.templates
    }

    pub fn resolve_paths(&self, environment: &Environment) -> Result<Vec<PathBuf>> {
        self.templates
            .iter()
            .map(|template| Ok(self.root.join(environment.resolve(template)?)))
            .collect()
    }

    /// Read every source; keys in later files replace keys from earlier ones.
    pub fn load(&self, environment: &Environment) -> Result<DataSet> {
        let mut data = DataSet::default();
        for path in self.resolve_paths(environment)? {
            let text = std::fs::read_to_string(&path).map_err(|e| {
                HarnessError::DataSource(format!("cannot read {}: {e}", path.display()))
            })?;
            let value: Value = serde_json::from_str(&text).map_err(|e| {
                HarnessError::DataSource(format!("{} is not valid JSON: {e}", path.display()))
            })?;
            let Value::Object(entries) = value else {
                return Err(HarnessError::DataSource(format!(
                    "{} must contain a JSON object",
                    path.display()
                )));
            };
            log::debug!("Loaded {} entries from {}", entries.len(), path.display());
            data.merge(entries);
        }
        Ok(data)
    }
}

/// Merged fixture entries keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSet {
    entries: Map<String, Value>,
}

impl DataSet {
    pub fn merge(&mut self, entries: Map<String, Value>) {
        self.entries.extend(entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Deserialize the entry named `key`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .entries
            .get(key)
            .ok_or_else(|| HarnessError::DataSource(format!("no entry named {key}")))?;
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Scalar entries as template variables. Objects and arrays are skipped.
    pub fn variables(&self) -> Environment {
        let mut environment = Environment::new();
        for (key, value) in &self.entries {
            match value {
                Value::String(s) => environment.define(key, s),
                Value::Number(n) => environment.define(key, &n.to_string()),
                Value::Bool(b) => environment.define(key, &b.to_string()),
                _ => {}
            }
        }
        environment
    }
}
