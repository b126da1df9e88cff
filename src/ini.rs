//! INI parsing for the runtime's `socket.ini`-equivalent configuration file.
//!
//! Grounded directly in `original_source/src/runtime/ini/parse.cc`: lines
//! are trimmed, `#`/`;` lines (after trimming) are comments, `[section]`
//! lines open a section whose name prefixes subsequent keys as
//! `section.key`, and `key = value` pairs are split on the first `=`, with
//! one layer of surrounding quotes stripped from the value.

use std::collections::BTreeMap;

use crate::utils::unquote;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ini {
    entries: BTreeMap<String, String>,
}

impl Ini {
    pub fn parse(source: &str) -> Self {
        let mut entries = BTreeMap::new();
        let mut section = String::new();

        for raw_line in source.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                section = line[1..line.len() - 1].trim().to_string();
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = unquote(value.trim());

            let full_key = if section.is_empty() {
                key.to_string()
            } else {
                format!("{section}.{key}")
            };
            entries.insert(full_key, value.to_string());
        }

        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Every key under `section.` with the prefix stripped.
    pub fn section(&self, section: &str) -> BTreeMap<String, String> {
        let prefix = format!("{section}.");
        self.entries
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(&prefix).map(|stripped| (stripped.to_string(), v.clone())))
            .collect()
    }

    /// Re-serializes into `[section]` blocks sorted by key, matching the
    /// order `BTreeMap` already provides.
    pub fn to_string_pretty(&self) -> String {
        let mut out = String::new();
        let mut current_section: Option<&str> = None;

        for (key, value) in &self.entries {
            let (section, short_key) = match key.rsplit_once('.') {
                Some((s, k)) => (Some(s), k),
                None => (None, key.as_str()),
            };
            if section != current_section {
                if let Some(s) = section {
                    if !out.is_empty() {
                        out.push('\n');
                    }
                    out.push_str(&format!("[{s}]\n"));
                }
                current_section = section;
            }
            out.push_str(&format!("{short_key} = {value}\n"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sections_and_comments() {
        let source = "\
# comment
[build]
name = \"my-app\"
; another comment
version = 1.0.0

[window]
width = 800
";
        let ini = Ini::parse(source);
        assert_eq!(ini.get("build.name"), Some("my-app"));
        assert_eq!(ini.get("build.version"), Some("1.0.0"));
        assert_eq!(ini.get("window.width"), Some("800"));
    }

    #[test]
    fn top_level_keys_have_no_prefix() {
        let ini = Ini::parse("debug = true\n[a]\nx = 1\n");
        assert_eq!(ini.get("debug"), Some("true"));
        assert_eq!(ini.get("a.x"), Some("1"));
    }

    #[test]
    fn section_extracts_stripped_keys() {
        let ini = Ini::parse("[window]\nwidth = 800\nheight = 600\n");
        let window = ini.section("window");
        assert_eq!(window.get("width"), Some(&"800".to_string()));
        assert_eq!(window.get("height"), Some(&"600".to_string()));
    }
}
