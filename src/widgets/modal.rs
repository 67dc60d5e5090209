use std::fmt::Write;
use std::sync::Arc;

use super::html::escape;

pub type Callback = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonVariant {
    #[default]
    Secondary,
    Primary,
    Danger,
}

impl ButtonVariant {
    fn class(self) -> &'static str {
        match self {
            ButtonVariant::Primary => "btn btn-primary",
            ButtonVariant::Secondary => "btn btn-secondary",
            ButtonVariant::Danger => "btn btn-danger",
        }
    }
}

#[derive(Clone)]
pub struct ModalButton {
    pub label: String,
    pub variant: ButtonVariant,
    pub on_click: Option<Callback>,
    /// Close the modal after `on_click` runs.
    pub closes: bool,
}

impl ModalButton {
    pub fn new(label: impl Into<String>, variant: ButtonVariant) -> Self {
        Self {
            label: label.into(),
            variant,
            on_click: None,
            closes: true,
        }
    }

    pub fn on_click<F: Fn() + Send + Sync + 'static>(mut self, callback: F) -> Self {
        self.on_click = Some(Arc::new(callback));
        self
    }

    pub fn keep_open(mut self) -> Self {
        self.closes = false;
        self
    }
}

/// Modal content: plain text is escaped, HTML is inserted as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalBody {
    Text(String),
    Html(String),
}

impl Default for ModalBody {
    fn default() -> Self {
        ModalBody::Text(String::new())
    }
}

#[derive(Clone, Default)]
pub struct ModalConfig {
    pub title: String,
    pub body: ModalBody,
    pub buttons: Vec<ModalButton>,
    /// Show the close control in the header.
    pub closable: bool,
    pub on_close: Option<Callback>,
}

pub struct Modal {
    config: ModalConfig,
    open: bool,
}

impl Modal {
    pub fn new(config: ModalConfig) -> Self {
        Self { config, open: false }
    }

    /// Two-button confirmation dialog.
    pub fn confirm<F>(title: &str, message: &str, on_confirm: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::new(ModalConfig {
            title: title.to_string(),
            body: ModalBody::Text(message.to_string()),
            buttons: vec![
                ModalButton::new("Cancel", ButtonVariant::Secondary),
                ModalButton::new("Confirm", ButtonVariant::Danger).on_click(on_confirm),
            ],
            closable: true,
            on_close: None,
        })
    }

    pub fn open(&mut self) {
        self.open = true;
    }

    /// Close the modal, running `on_close` if it was open.
    pub fn close(&mut self) {
        if !std::mem::replace(&mut self.open, false) {
            return;
        }
        if let Some(on_close) = &self.config.on_close {
            on_close();
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Activate button `index`. Ignored while closed.
    pub fn press(&mut self, index: usize) -> bool {
        if !self.open {
            return false;
        }
        let Some(button) = self.config.buttons.get(index) else {
            return false;
        };
        if let Some(on_click) = &button.on_click {
            on_click();
        }
        if button.closes {
            self.close();
        }
        true
    }

    /// Markup for the modal; empty while closed.
    pub fn render(&self) -> String {
        if !self.open {
            return String::new();
        }

        let mut html = String::from(r#"<div class="modal" role="dialog"><div class="modal-header">"#);
        let _ = write!(html, "<h2>{}</h2>", escape(&self.config.title));
        if self.config.closable {
            html.push_str(r#"<button class="modal-close" aria-label="Close">&times;</button>"#);
        }
        html.push_str(r#"</div><div class="modal-body">"#);
        match &self.config.body {
            ModalBody::Text(text) => {
                let _ = write!(html, "<p>{}</p>", escape(text));
            }
            ModalBody::Html(markup) => html.push_str(markup),
        }
        html.push_str(r#"</div><div class="modal-footer">"#);
        for (index, button) in self.config.buttons.iter().enumerate() {
            let _ = write!(
                html,
                r#"<button class="{}" data-button="{index}">{}</button>"#,
                button.variant.class(),
                escape(&button.label)
            );
        }
        html.push_str("</div></div>");
        html
    }
}
