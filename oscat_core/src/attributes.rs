//! Path attributes read from the store's `attributes` file.
//!
//! Each non-empty, non-comment line is `<pattern> <attr>...`, where an attr is
//! `name` (set), `-name` (unset) or `name=value`. Patterns follow gitignore
//! matching rules. When several lines match a path, later lines win per
//! attribute.

use crate::error::{Error, Result};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use tracing::warn;

/// File name of the attributes file at the store root.
pub const ATTRIBUTES_FILE: &str = "attributes";

/// State of one attribute for a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Set,
    Unset,
    Value(String),
}

/// Attributes that apply to one path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttrSet {
    values: BTreeMap<String, AttrValue>,
}

impl AttrSet {
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.values.get(name)
    }

    /// `name` was given as a bare `name`.
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name) == Some(&AttrValue::Set)
    }

    /// `name` was given as `-name`.
    pub fn is_unset(&self, name: &str) -> bool {
        self.get(name) == Some(&AttrValue::Unset)
    }

    /// The value of a `name=value` attribute.
    pub fn value(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(AttrValue::Value(value)) => Some(value),
            _ => None,
        }
    }

    fn apply(&mut self, attrs: &[(String, AttrValue)]) {
        for (name, value) in attrs {
            self.values.insert(name.clone(), value.clone());
        }
    }
}

struct Rule {
    matcher: Gitignore,
    attrs: Vec<(String, AttrValue)>,
}

/// Parsed attributes file.
#[derive(Default)]
pub struct Attributes {
    rules: Vec<Rule>,
}

impl Attributes {
    /// Load `attributes` from the store root. A missing file means no rules.
    pub fn load(root: &Path) -> Result<Self> {
        match fs::read_to_string(root.join(ATTRIBUTES_FILE)) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut rules = Vec::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.split_whitespace();
            let Some(pattern) = fields.next() else {
                continue;
            };
            if pattern.starts_with('!') {
                warn!(pattern, "negative patterns are ignored in attributes");
                continue;
            }

            let mut attrs = Vec::new();
            for field in fields {
                parse_attr(field, &mut attrs)?;
            }

            let mut builder = GitignoreBuilder::new(".");
            builder.add_line(None, pattern)?;
            rules.push(Rule {
                matcher: builder.build()?,
                attrs,
            });
        }

        Ok(Self { rules })
    }

    /// Attributes in effect for `path` (relative, `/`-separated).
    pub fn lookup(&self, path: &str) -> AttrSet {
        let path = path.trim_start_matches('/');
        let mut set = AttrSet::default();
        if path.is_empty() {
            return set;
        }

        for rule in &self.rules {
            if rule.matcher.matched_path_or_any_parents(path, false).is_ignore() {
                set.apply(&rule.attrs);
            }
        }
        set
    }
}

fn parse_attr(field: &str, attrs: &mut Vec<(String, AttrValue)>) -> Result<()> {
    let (name, value) = if let Some(name) = field.strip_prefix('-') {
        (name, AttrValue::Unset)
    } else if let Some((name, value)) = field.split_once('=') {
        (name, AttrValue::Value(value.to_string()))
    } else {
        (field, AttrValue::Set)
    };

    if name.is_empty() {
        return Err(Error::invalid_config(format!(
            "invalid attribute '{}'",
            field
        )));
    }

    // `binary` is shorthand for `-text -diff`.
    if name == "binary" && value == AttrValue::Set {
        attrs.push(("text".into(), AttrValue::Unset));
        attrs.push(("diff".into(), AttrValue::Unset));
    }
    attrs.push((name.to_string(), value));
    Ok(())
}
