//! Filename sanitization and folder/track name templates.

use std::collections::HashMap;

/// Sentinel substituted for template fields with no usable value.
pub const MISSING_FIELD: &str = "n/a";
/// Cap applied to the formatted path (without extension).
pub const MAX_PATH_CHARS: usize = 250;

/// Strips characters that are illegal or troublesome in file names.
pub fn sanitize_filename(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => {}
            ch if ch.is_control() => {}
            ch => sanitized.push(ch),
        }
    }
    sanitized
        .trim()
        .trim_end_matches(['.', ' '])
        .to_string()
}

/// Values available to the folder/track name templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    values: HashMap<&'static str, String>,
}

impl TemplateContext {
    pub fn new() -> Self {
        TemplateContext::default()
    }

    /// Sets a placeholder value; empty strings count as missing.
    pub fn set(&mut self, key: &'static str, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        if !value.trim().is_empty() {
            self.values.insert(key, value);
        }
        self
    }

    pub fn set_opt(&mut self, key: &'static str, value: Option<impl Into<String>>) -> &mut Self {
        if let Some(value) = value {
            self.set(key, value);
        }
        self
    }

    fn value_for_key(&self, key: &str) -> Option<&str> {
        self.values.get(key.trim()).map(String::as_str)
    }
}

/// Renders `{placeholder}` templates against the context.
///
/// A missing or empty field degrades to the `n/a` sentinel instead of failing;
/// unmatched braces pass through as literal text.
pub fn render_template(template: &str, context: &TemplateContext) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '{' {
            rendered.push(ch);
            continue;
        }
        let mut key = String::new();
        let mut closed = false;
        for inner in chars.by_ref() {
            if inner == '}' {
                closed = true;
                break;
            }
            key.push(inner);
        }
        if !closed {
            rendered.push('{');
            rendered.push_str(&key);
            continue;
        }
        match context.value_for_key(&key) {
            Some(value) => rendered.push_str(value),
            None => rendered.push_str(MISSING_FIELD),
        }
    }
    rendered
}

/// True when a template references lossless-only fields that MP3 items lack.
pub fn references_lossless_fields(template: &str) -> bool {
    template.contains("{bit_depth}") || template.contains("{sampling_rate}")
}

/// Truncates a formatted path to the cap, respecting char boundaries.
pub fn cap_path_chars(path: String) -> String {
    if path.chars().count() <= MAX_PATH_CHARS {
        return path;
    }
    path.chars().take(MAX_PATH_CHARS).collect()
}

/// Renders a sampling rate without a trailing `.0` (`44.1`, `96`).
pub fn format_sampling_rate(rate: f64) -> String {
    if rate.fract() == 0.0 {
        format!("{}", rate as u64)
    } else {
        format!("{rate}")
    }
}
