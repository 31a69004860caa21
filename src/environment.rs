//! Named variables for endpoint templates.
//!
//! Scopes nest: a scope created with [`Environment::with_enclosing`] sees every name
//! of its enclosing scope and may shadow them. Enclosing scopes are shared behind an
//! `Arc` and copied on write, so assigning through a child never changes what other
//! holders of the parent see.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{HarnessError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    enclosing: Option<Arc<Environment>>,
    values: BTreeMap<String, String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enclosing(enclosing: Arc<Environment>) -> Self {
        Self {
            enclosing: Some(enclosing),
            values: BTreeMap::new(),
        }
    }

    /// Parse `NAME=value` lines.
    ///
    /// Blank lines and lines starting with `#` are skipped, surrounding double quotes
    /// are stripped, and a later definition of a name replaces an earlier one.
    pub fn parse_globals(text: &str) -> Self {
        let mut environment = Self::new();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((name, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            environment.define(name.trim(), value);
        }
        environment
    }

    pub fn define(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
    }

    /// Resolve `template` in this scope, then define `name` with the result.
    pub fn define_resolved(&mut self, name: &str, template: &str) -> Result<()> {
        let value = self.resolve(template)?;
        self.define(name, &value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(value) => Some(value.as_str()),
            None => self.enclosing.as_ref().and_then(|env| env.get(name)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Update the nearest scope that defines `name`. Returns false if none does.
    pub fn assign(&mut self, name: &str, value: &str) -> bool {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = value.to_string();
            return true;
        }
        match self.enclosing.as_mut() {
            Some(enclosing) if enclosing.contains(name) => {
                Arc::make_mut(enclosing).assign(name, value)
            }
            _ => false,
        }
    }

    /// Replace every `{name}` placeholder with its value.
    ///
    /// `{{` and `}}` produce literal braces. Unknown names fail with
    /// [`HarnessError::UnresolvedVariable`].
    pub fn resolve(&self, template: &str) -> Result<String> {
        let mut resolved = String::with_capacity(template.len());
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    resolved.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    resolved.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => name.push(ch),
                            None => {
                                return Err(HarnessError::InvalidConfig(format!(
                                    "unterminated placeholder in {template}"
                                )))
                            }
                        }
                    }
                    let name = name.trim();
                    let value = self
                        .get(name)
                        .ok_or_else(|| HarnessError::UnresolvedVariable(name.to_string()))?;
                    resolved.push_str(value);
                }
                other => resolved.push(other),
            }
        }

        Ok(resolved)
    }
}
