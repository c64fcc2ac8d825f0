// dbpull/src/credentials/template.rs
//! Expands the embedded-Ruby tags found in committed `database.yml` files.
//!
//! Only environment-variable interpolation and literals are understood; the
//! values are looked up on this machine, not on the server.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::errors::{AppError, Result};

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<%(=|#)?(.*?)(-?)%>\n?").expect("template tag pattern is valid")
});

static ENV_INDEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^ENV\[\s*['"]([^'"]+)['"]\s*\](?:\s*\|\|\s*(.+))?$"#)
        .expect("ENV[] pattern is valid")
});

static ENV_FETCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^ENV\.fetch\(\s*['"]([^'"]+)['"]\s*(?:,\s*(.+?))?\s*\)(?:\s*\{\s*(.*?)\s*\})?$"#)
        .expect("ENV.fetch pattern is valid")
});

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("number pattern is valid"));

/// Expands every template tag in `text`, resolving variables with `lookup`.
pub fn expand<F>(text: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut output = String::with_capacity(text.len());
    let mut last = 0;

    for caps in TAG.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        output.push_str(&text[last..whole.start()]);
        last = whole.end();

        let trims_newline = caps.get(3).is_some_and(|m| !m.as_str().is_empty());
        let swallowed_newline = whole.as_str().ends_with('\n');

        // Code and comment tags produce no output.
        if caps.get(1).map(|m| m.as_str()) == Some("=") {
            output.push_str(&evaluate(caps[2].trim(), &lookup)?);
        }

        if swallowed_newline && !trims_newline {
            output.push('\n');
        }
    }

    output.push_str(&text[last..]);
    Ok(output)
}

fn evaluate<F>(expression: &str, lookup: &F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(caps) = ENV_INDEX.captures(expression) {
        let value = lookup(&caps[1]);
        return match (value, caps.get(2)) {
            (Some(value), _) => Ok(value),
            (None, Some(default)) => literal(default.as_str().trim(), expression),
            (None, None) => Ok(String::new()),
        };
    }

    if let Some(caps) = ENV_FETCH.captures(expression) {
        if let Some(value) = lookup(&caps[1]) {
            return Ok(value);
        }
        return match fetch_default(&caps) {
            Some(default) => literal(default, expression),
            None => Err(AppError::Template(format!(
                "environment variable {} is not set (required by `{}`)",
                &caps[1], expression
            ))),
        };
    }

    literal(expression, expression)
}

fn fetch_default<'t>(caps: &Captures<'t>) -> Option<&'t str> {
    caps.get(2)
        .or_else(|| caps.get(3))
        .map(|m| m.as_str().trim())
}

fn literal(value: &str, expression: &str) -> Result<String> {
    let quoted = ['\'', '"'].iter().find_map(|&q| {
        value
            .strip_prefix(q)
            .and_then(|rest| rest.strip_suffix(q))
    });
    if let Some(inner) = quoted {
        return Ok(inner.to_string());
    }
    if value == "nil" {
        return Ok(String::new());
    }
    if value == "true" || value == "false" || NUMBER.is_match(value) {
        return Ok(value.to_string());
    }
    Err(AppError::Template(format!(
        "unsupported expression `{}`; only ENV lookups and literals can be expanded locally",
        expression
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_plain_text_is_unchanged() -> anyhow::Result<()> {
        let text = "production:\n  adapter: postgresql\n";
        assert_eq!(expand(text, env(&[]))?, text);
        Ok(())
    }

    #[test]
    fn test_env_index_lookup() -> anyhow::Result<()> {
        let text = "password: <%= ENV['DB_PASSWORD'] %>\nuser: <%= ENV[\"DB_USER\"] %>\n";
        let expanded = expand(text, env(&[("DB_PASSWORD", "s3cret"), ("DB_USER", "srv")]))?;
        assert_eq!(expanded, "password: s3cret\nuser: srv\n");
        Ok(())
    }

    #[test]
    fn test_env_index_unset_is_empty_or_default() -> anyhow::Result<()> {
        let expanded = expand(
            "a: <%= ENV['MISSING'] %>\nb: <%= ENV['MISSING'] || 'fallback' %>\n",
            env(&[]),
        )?;
        assert_eq!(expanded, "a: \nb: fallback\n");
        Ok(())
    }

    #[test]
    fn test_env_fetch_defaults() -> anyhow::Result<()> {
        let text = "pool: <%= ENV.fetch(\"RAILS_MAX_THREADS\") { 5 } %>\nhost: <%= ENV.fetch('DB_HOST', 'localhost') %>\n";
        assert_eq!(expand(text, env(&[]))?, "pool: 5\nhost: localhost\n");
        assert_eq!(
            expand(text, env(&[("RAILS_MAX_THREADS", "10"), ("DB_HOST", "db")]))?,
            "pool: 10\nhost: db\n"
        );
        Ok(())
    }

    #[test]
    fn test_env_fetch_without_default_requires_variable() {
        let err = expand("password: <%= ENV.fetch('DB_PASSWORD') %>", env(&[])).unwrap_err();
        assert!(matches!(err, AppError::Template(ref msg) if msg.contains("DB_PASSWORD")));
    }

    #[test]
    fn test_code_and_comment_tags_are_dropped() -> anyhow::Result<()> {
        let text = "<%# generated %>\n<% if true -%>\nproduction:\n<% end -%>\n  adapter: mysql2\n";
        assert_eq!(expand(text, env(&[]))?, "\nproduction:\n  adapter: mysql2\n");
        Ok(())
    }

    #[test]
    fn test_unsupported_expression_fails() {
        let err = expand(
            "password: <%= Rails.application.credentials.db_password %>",
            env(&[]),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Template(_)));
    }
}
