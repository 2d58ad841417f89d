//! Reader for the sectioned server configuration format.
//!
//! ```text
//! # comment
//! top-level-key value
//!
//! <section-type optional-name>
//!     key value
//!     <nested-type>
//!         key value
//!     </nested-type>
//! </section-type>
//! ```
//!
//! Section types and keys are case-insensitive and are stored in lower case.
//! Values keep their case, with surrounding whitespace removed.

use crate::error::{Error, Result};

/// A `key value` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub value: String,
    pub line: usize,
}

/// A `<type name>` ... `</type>` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub type_name: String,
    pub name: Option<String>,
    /// Line of the opening tag.
    pub line: usize,
    pub entries: Vec<Entry>,
    pub sections: Vec<Section>,
}

impl Section {
    fn new(type_name: String, name: Option<String>, line: usize) -> Self {
        Self {
            type_name,
            name,
            line,
            entries: Vec::new(),
            sections: Vec::new(),
        }
    }

    /// All values given for `key`, in file order.
    pub fn values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Entry> + 'a {
        self.entries.iter().filter(move |e| e.key == key)
    }
}

/// A parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub entries: Vec<Entry>,
    pub sections: Vec<Section>,
}

impl Document {
    /// Every section of `type_name`, at any depth, in file order.
    pub fn find_sections(&self, type_name: &str) -> Vec<&Section> {
        fn walk<'a>(sections: &'a [Section], type_name: &str, found: &mut Vec<&'a Section>) {
            for section in sections {
                if section.type_name == type_name {
                    found.push(section);
                }
                walk(&section.sections, type_name, found);
            }
        }

        let type_name = type_name.to_ascii_lowercase();
        let mut found = Vec::new();
        walk(&self.sections, &type_name, &mut found);
        found
    }
}

fn parse_tag(inner: &str, line: usize) -> Result<(String, Option<String>)> {
    let inner = inner.trim();
    let (type_name, name) = match inner.split_once(char::is_whitespace) {
        Some((type_name, name)) => (type_name, Some(name.trim().to_string())),
        None => (inner, None),
    };

    if type_name.is_empty() {
        return Err(Error::config_at(line, "section tag without a type"));
    }
    if !type_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(Error::config_at(
            line,
            format!("'{}' is not a valid section type", type_name),
        ));
    }

    Ok((type_name.to_ascii_lowercase(), name.filter(|n| !n.is_empty())))
}

/// Parse configuration text into its sections and entries.
pub fn parse_sections(text: &str) -> Result<Document> {
    let mut document = Document::default();
    let mut stack: Vec<Section> = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(tag) = trimmed.strip_prefix("</") {
            let inner = tag
                .strip_suffix('>')
                .ok_or_else(|| Error::config_at(line, "closing tag is missing '>'"))?;
            let type_name = inner.trim().to_ascii_lowercase();

            let section = stack.pop().ok_or_else(|| {
                Error::config_at(line, format!("</{}> without an open section", type_name))
            })?;
            if section.type_name != type_name {
                return Err(Error::config_at(
                    line,
                    format!(
                        "</{}> does not close <{}> opened on line {}",
                        type_name, section.type_name, section.line
                    ),
                ));
            }

            match stack.last_mut() {
                Some(parent) => parent.sections.push(section),
                None => document.sections.push(section),
            }
            continue;
        }

        if let Some(tag) = trimmed.strip_prefix('<') {
            let inner = tag
                .strip_suffix('>')
                .ok_or_else(|| Error::config_at(line, "section tag is missing '>'"))?;
            let (type_name, name) = parse_tag(inner, line)?;
            stack.push(Section::new(type_name, name, line));
            continue;
        }

        let (key, value) = trimmed
            .split_once(char::is_whitespace)
            .map(|(key, value)| (key, value.trim()))
            .ok_or_else(|| Error::config_at(line, format!("'{}' has no value", trimmed)))?;
        let entry = Entry {
            key: key.to_ascii_lowercase(),
            value: value.to_string(),
            line,
        };

        match stack.last_mut() {
            Some(section) => section.entries.push(entry),
            None => document.entries.push(entry),
        }
    }

    if let Some(section) = stack.pop() {
        return Err(Error::config_at(
            section.line,
            format!("<{}> is never closed", section.type_name),
        ));
    }

    Ok(document)
}
