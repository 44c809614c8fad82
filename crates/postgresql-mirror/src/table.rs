//! Entity name → table name resolution.
//!
//! Explicit overrides win. Otherwise the entity name is converted the way the
//! primary's ORM names its tables: last namespace segment, `CamelCase` to
//! `snake_case`, last word pluralized (`TaxStatus` → `tax_statuses`).

use crate::error::{MirrorError, Result};
use std::collections::HashMap;

const UNCOUNTABLE: &[&str] = &[
    "equipment",
    "information",
    "rice",
    "money",
    "species",
    "series",
    "fish",
    "sheep",
    "jeans",
    "police",
];

const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("man", "men"),
    ("child", "children"),
    ("sex", "sexes"),
    ("move", "moves"),
    ("zombie", "zombies"),
    ("ox", "oxen"),
    ("mouse", "mice"),
    ("louse", "lice"),
];

#[derive(Debug, Clone, Default)]
pub struct TableResolver {
    overrides: HashMap<String, String>,
}

impl TableResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `entity` to `table` explicitly.
    pub fn with_override(mut self, entity: impl Into<String>, table: impl Into<String>) -> Self {
        self.overrides.insert(entity.into(), table.into());
        self
    }

    /// Parse `Entity=table` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut resolver = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (entity, table) = pair
                .split_once('=')
                .map(|(e, t)| (e.trim(), t.trim()))
                .filter(|(e, t)| !e.is_empty() && !t.is_empty())
                .ok_or_else(|| {
                    MirrorError::Config(format!("Invalid table mapping {pair:?}, expected Entity=table"))
                })?;
            resolver = resolver.with_override(entity, table);
        }
        Ok(resolver)
    }

    /// Table name for `entity` (unquoted).
    pub fn resolve(&self, entity: &str) -> Result<String> {
        if let Some(table) = self.overrides.get(entity) {
            return Ok(table.clone());
        }
        let base = entity.rsplit("::").next().unwrap_or_default().trim();
        if base.is_empty() {
            return Err(MirrorError::UnknownEntity(entity.to_string()));
        }
        Ok(tableize(base))
    }
}

fn tableize(name: &str) -> String {
    let snake = snake_case(name);
    match snake.rfind('_') {
        Some(idx) => format!("{}{}", &snake[..=idx], pluralize(&snake[idx + 1..])),
        None => pluralize(&snake),
    }
}

fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &ch) in chars.iter().enumerate() {
        if ch.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
                _ => false,
            };
            if boundary {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn pluralize(word: &str) -> String {
    if word.is_empty() || UNCOUNTABLE.contains(&word) {
        return word.to_string();
    }
    if let Some((_, plural)) = IRREGULAR.iter().find(|(singular, _)| *singular == word) {
        return plural.to_string();
    }

    if word.ends_with("status") || word.ends_with("alias") || word.ends_with("bus") {
        return format!("{word}es");
    }
    if let Some(stem) = word
        .strip_suffix("octopus")
        .map(|s| format!("{s}octop"))
        .or_else(|| word.strip_suffix("virus").map(|s| format!("{s}vir")))
    {
        return format!("{stem}i");
    }
    if let Some(stem) = word.strip_suffix("sis") {
        return format!("{stem}ses");
    }
    if word.ends_with("tum") || word.ends_with("ium") {
        return format!("{}a", &word[..word.len() - 2]);
    }
    for (suffix, stem) in [("matrix", "matr"), ("vertex", "vert"), ("index", "ind")] {
        if let Some(prefix) = word.strip_suffix(suffix) {
            return format!("{prefix}{stem}ices");
        }
    }
    if ["ss", "x", "ch", "sh", "z"].iter().any(|s| word.ends_with(s)) {
        return if word.ends_with("quiz") {
            format!("{word}zes")
        } else {
            format!("{word}es")
        };
    }
    if word.ends_with('s') {
        return word.to_string();
    }
    if let Some(stem) = word.strip_suffix('y') {
        let before = stem.chars().last();
        if stem.ends_with("qu") || before.is_some_and(|c| !"aeiouy".contains(c)) {
            return format!("{stem}ies");
        }
    }
    if word.ends_with("hive") {
        return format!("{word}s");
    }
    if let Some(stem) = word.strip_suffix("fe") {
        if !stem.ends_with('f') {
            return format!("{stem}ves");
        }
    }
    if let Some(stem) = word.strip_suffix("lf").or_else(|| word.strip_suffix("rf")) {
        let kept = &word[stem.len()..stem.len() + 1];
        return format!("{stem}{kept}ves");
    }
    if word.ends_with("tomato") || word.ends_with("buffalo") {
        return format!("{word}es");
    }
    format!("{word}s")
}
