//! Placeholder substitution for file contributions.
//!
//! File contributions are opaque text. The only thing the engine understands
//! inside them is `{{NAME}}`, where `NAME` is an identifier
//! (`[A-Za-z_][A-Za-z0-9_]*`, surrounding spaces allowed). Anything else
//! between double braces is copied through verbatim, so payloads that use
//! their own brace syntax (JSX, Go templates, Handlebars) survive.
//!
//! Substituted values are escaped for the structural format of the file they
//! land in, which guarantees that a value containing quotes or backslashes can
//! never break a JSON, TOML, YAML or `.env` document. Templates are expected
//! to place string placeholders inside double quotes.
//!
//! # Built-in variables
//!
//! | Variable | Example | Source |
//! |----------|---------|--------|
//! | `PROJECT_NAME` | "My Awesome App" | request |
//! | `PROJECT_NAME_SNAKE` | "my_awesome_app" | computed |
//! | `PROJECT_NAME_KEBAB` | "my-awesome-app" | computed |
//! | `PROJECT_NAME_PASCAL` | "MyAwesomeApp" | computed |
//! | `FRAMEWORK` | "web-app" | request target |
//! | `ARCHETYPE` | "business" | request target |
//! | `MODULE_ID` | "auth-jwt" | module being rendered |
//! | `MODULE_VERSION` | "1.0.0" | module being rendered |
//!
//! There are deliberately no clock-derived variables: output must be a pure
//! function of the request.

use std::collections::BTreeMap;

use crate::domain::entities::common::FileFormat;
use crate::domain::entities::target::Target;

/// Longest accepted variable name.
pub const MAX_VARIABLE_LEN: usize = 128;

/// Whether `s` is a valid placeholder / variable name.
pub fn is_variable_name(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    s.len() <= MAX_VARIABLE_LEN
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A placeholder with no value in the render context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unbound(pub String);

/// Variables available while rendering one module.
///
/// Backed by a `BTreeMap` so debug output and iteration are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderContext {
    variables: BTreeMap<String, String>,
}

impl RenderContext {
    /// Context holding the project-level built-ins.
    pub fn for_project(project_name: &str, target: &Target) -> Self {
        let mut vars = BTreeMap::new();
        vars.insert("PROJECT_NAME".to_string(), project_name.to_string());
        vars.insert("PROJECT_NAME_SNAKE".to_string(), to_snake_case(project_name));
        vars.insert("PROJECT_NAME_KEBAB".to_string(), to_kebab_case(project_name));
        vars.insert("PROJECT_NAME_PASCAL".to_string(), to_pascal_case(project_name));
        vars.insert("FRAMEWORK".to_string(), target.framework().to_string());
        vars.insert("ARCHETYPE".to_string(), target.archetype().to_string());
        Self { variables: vars }
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Overlay a layer of variables; later layers win.
    pub fn layer<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.variables
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Render `template`, escaping every substituted value for `format`.
    ///
    /// # Errors
    ///
    /// The first placeholder without a binding.
    pub fn render(&self, template: &str, format: FileFormat) -> Result<String, Unbound> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after_open = &rest[start + 2..];

            let Some(end) = after_open.find("}}") else {
                out.push_str(&rest[start..]);
                return Ok(out);
            };

            let name = after_open[..end].trim();
            if is_variable_name(name) {
                let value = self.get(name).ok_or_else(|| Unbound(name.to_string()))?;
                out.push_str(&escape(value, format));
                rest = &after_open[end + 2..];
            } else {
                // Not a placeholder: keep one brace and rescan from the next,
                // so `{{{NAME}}}` still substitutes the inner name.
                out.push('{');
                rest = &rest[start + 1..];
            }
        }

        out.push_str(rest);
        Ok(out)
    }
}

/// Names of every placeholder in `template`, in order of first appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            break;
        };
        let name = after_open[..end].trim();
        if is_variable_name(name) {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
            rest = &after_open[end + 2..];
        } else {
            rest = &rest[start + 1..];
        }
    }
    names
}

// ============================================================================
// Escaping
// ============================================================================

/// Escape `value` so it can sit inside a double-quoted string of `format`.
pub fn escape(value: &str, format: FileFormat) -> String {
    match format {
        // YAML double-quoted scalars and JS/TS string literals accept JSON
        // escapes. In a `//` comment the escaped value stays on one line.
        FileFormat::Json | FileFormat::Yaml | FileFormat::SlashComment => escape_json(value),
        FileFormat::Toml => escape_toml(value),
        FileFormat::Env => escape_env(value),
        FileFormat::HashComment | FileFormat::Text => value.to_string(),
    }
}

fn escape_json(value: &str) -> String {
    // Serializing a &str cannot fail.
    let quoted = serde_json::to_string(value).unwrap_or_default();
    quoted
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(&quoted)
        .to_string()
}

fn escape_toml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

fn escape_env(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

// ============================================================================
// String Case Conversion Helpers
// ============================================================================

/// `"MyApp"` → `"my_app"`, `"XMLHttpRequest"` → `"xml_http_request"`.
pub fn to_snake_case(s: &str) -> String {
    split_words(s).join("_")
}

/// Same as [`to_snake_case`] but joined with `-`.
pub fn to_kebab_case(s: &str) -> String {
    split_words(s).join("-")
}

/// `"my-app"` → `"MyApp"`, `"HTTPRequest"` → `"HttpRequest"`.
pub fn to_pascal_case(s: &str) -> String {
    split_words(s)
        .into_iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => {
                    let mut out = String::new();
                    out.extend(first.to_uppercase());
                    out.push_str(chars.as_str());
                    out
                }
                None => String::new(),
            }
        })
        .collect()
}

/// Split on separators (`_`, `-`, `.`, whitespace), camelCase transitions and
/// acronym boundaries (`HTTPServer` → `http` + `server`).
fn split_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '_' || c == '-' || c == '.' || c.is_whitespace() {
            if !current.is_empty() {
                words.push(current.to_lowercase());
                current.clear();
            }
            continue;
        }

        if let Some(next) = chars.peek() {
            if c.is_lowercase() && next.is_uppercase() {
                current.push(c);
                words.push(current.to_lowercase());
                current.clear();
                continue;
            }

            if c.is_uppercase()
                && next.is_uppercase()
                && chars.clone().nth(1).is_some_and(|n| n.is_lowercase())
            {
                current.push(c);
                words.push(current.to_lowercase());
                current.clear();
                continue;
            }
        }

        current.push(c);
    }

    if !current.is_empty() {
        words.push(current.to_lowercase());
    }

    words
}
