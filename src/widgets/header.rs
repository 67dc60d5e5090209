use std::fmt::Write;

use super::html::escape;

/// Page header with the current title and signed-in user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    pub title: String,
    pub user: Option<String>,
}

impl Header {
    pub fn render(&self) -> String {
        let mut html = String::from(r#"<header class="topbar">"#);
        let _ = write!(html, "<h1>{}</h1>", escape(&self.title));
        match &self.user {
            Some(user) => {
                let _ = write!(html, r#"<span class="user">{}</span>"#, escape(user));
            }
            None => html.push_str(r##"<a class="login" href="#/login">Sign in</a>"##),
        }
        html.push_str("</header>");
        html
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_user_or_sign_in() {
        let mut header = Header {
            title: "Clients".into(),
            user: None,
        };
        assert!(header.render().contains("Sign in"));

        header.user = Some("Marta & Co".into());
        let html = header.render();
        assert!(html.contains("<h1>Clients</h1>"));
        assert!(html.contains("Marta &amp; Co"));
    }
}
