use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::html::escape;

/// Receives the submitted values once they pass validation.
pub type SubmitCallback = Arc<dyn Fn(&Map<String, Value>) + Send + Sync>;

/// Validation messages keyed by field name.
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Text,
    Email,
    Number,
    Tel,
    Date,
    TextArea,
    /// `(value, label)` pairs.
    Select(Vec<(String, String)>),
    Checkbox,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    pub required: bool,
    pub placeholder: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind,
            required: false,
            placeholder: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn placeholder(mut self, text: impl Into<String>) -> Self {
        self.placeholder = Some(text.into());
        self
    }

    fn check(&self, value: Option<&Value>) -> Option<String> {
        let value = value.filter(|v| !is_blank(v));
        let Some(value) = value else {
            return self
                .required
                .then(|| format!("{} is required", self.label));
        };

        match &self.kind {
            FieldKind::Email => {
                let valid = value.as_str().is_some_and(looks_like_email);
                (!valid).then(|| format!("{} must be a valid email address", self.label))
            }
            FieldKind::Number => {
                let valid = value.is_number()
                    || value
                        .as_str()
                        .is_some_and(|s| s.trim().parse::<f64>().is_ok());
                (!valid).then(|| format!("{} must be a number", self.label))
            }
            FieldKind::Select(options) => {
                let valid = value
                    .as_str()
                    .is_some_and(|v| options.iter().any(|(option, _)| option == v));
                (!valid).then(|| format!("{} has an unknown option", self.label))
            }
            _ => None,
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

fn looks_like_email(text: &str) -> bool {
    let Some((local, domain)) = text.trim().split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains('@')
}

#[derive(Clone, Default)]
pub struct FormConfig {
    pub id: String,
    pub fields: Vec<Field>,
    pub submit_label: String,
    pub on_submit: Option<SubmitCallback>,
}

/// Declarative form with field validation.
pub struct Form {
    config: FormConfig,
    errors: FieldErrors,
}

impl Form {
    pub fn new(config: FormConfig) -> Self {
        Self {
            config,
            errors: FieldErrors::new(),
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.config.fields
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn validate(&self, values: &Map<String, Value>) -> FieldErrors {
        self.config
            .fields
            .iter()
            .filter_map(|field| {
                field
                    .check(values.get(&field.name))
                    .map(|message| (field.name.clone(), message))
            })
            .collect()
    }

    /// Validate and, if clean, hand the values to `on_submit`.
    pub fn submit(&mut self, values: &Map<String, Value>) -> bool {
        self.errors = self.validate(values);
        if !self.errors.is_empty() {
            return false;
        }
        if let Some(on_submit) = &self.config.on_submit {
            on_submit(values);
        }
        true
    }

    pub fn render(&self, values: &Map<String, Value>) -> String {
        let mut html = String::new();
        let _ = write!(html, r#"<form id="{}" novalidate>"#, escape(&self.config.id));

        for field in &self.config.fields {
            let name = escape(&field.name);
            let current = values.get(&field.name).map(input_text).unwrap_or_default();
            let required = if field.required { " required" } else { "" };
            let placeholder = field
                .placeholder
                .as_deref()
                .map(|p| format!(r#" placeholder="{}""#, escape(p)))
                .unwrap_or_default();

            html.push_str(r#"<div class="form-group">"#);
            let _ = write!(
                html,
                r#"<label for="{id}-{name}">{label}{marker}</label>"#,
                id = escape(&self.config.id),
                label = escape(&field.label),
                marker = if field.required { " *" } else { "" },
            );
            let id = format!("{}-{name}", escape(&self.config.id));

            match &field.kind {
                FieldKind::TextArea => {
                    let _ = write!(
                        html,
                        r#"<textarea id="{id}" name="{name}"{required}{placeholder}>{}</textarea>"#,
                        escape(&current)
                    );
                }
                FieldKind::Select(options) => {
                    let _ = write!(html, r#"<select id="{id}" name="{name}"{required}>"#);
                    for (value, label) in options {
                        let selected = if *value == current { " selected" } else { "" };
                        let _ = write!(
                            html,
                            r#"<option value="{}"{selected}>{}</option>"#,
                            escape(value),
                            escape(label)
                        );
                    }
                    html.push_str("</select>");
                }
                FieldKind::Checkbox => {
                    let checked = values
                        .get(&field.name)
                        .and_then(Value::as_bool)
                        .unwrap_or(false);
                    let _ = write!(
                        html,
                        r#"<input type="checkbox" id="{id}" name="{name}"{}>"#,
                        if checked { " checked" } else { "" }
                    );
                }
                kind => {
                    let _ = write!(
                        html,
                        r#"<input type="{}" id="{id}" name="{name}" value="{}"{required}{placeholder}>"#,
                        input_type(kind),
                        escape(&current)
                    );
                }
            }

            if let Some(error) = self.errors.get(&field.name) {
                let _ = write!(html, r#"<div class="field-error">{}</div>"#, escape(error));
            }
            html.push_str("</div>");
        }

        let label = if self.config.submit_label.is_empty() {
            "Save"
        } else {
            &self.config.submit_label
        };
        let _ = write!(html, r#"<button type="submit">{}</button></form>"#, escape(label));
        html
    }
}

fn input_type(kind: &FieldKind) -> &'static str {
    match kind {
        FieldKind::Email => "email",
        FieldKind::Number => "number",
        FieldKind::Tel => "tel",
        FieldKind::Date => "date",
        _ => "text",
    }
}

fn input_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
