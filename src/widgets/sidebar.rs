use std::fmt::Write;

use super::html::escape;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavItem {
    pub label: String,
    pub route: String,
    /// Icon name; resolving it to markup is left to the host.
    pub icon: String,
}

impl NavItem {
    pub fn new(label: &str, route: &str, icon: &str) -> Self {
        Self {
            label: label.to_string(),
            route: route.to_string(),
            icon: icon.to_string(),
        }
    }
}

/// Main navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sidebar {
    pub brand: String,
    pub items: Vec<NavItem>,
}

impl Sidebar {
    pub fn new(brand: impl Into<String>, items: Vec<NavItem>) -> Self {
        Self {
            brand: brand.into(),
            items,
        }
    }

    /// Navigation for the shop sections.
    pub fn shop() -> Self {
        Self::new(
            "Shopdesk",
            vec![
                NavItem::new("Dashboard", "/dashboard", "gauge"),
                NavItem::new("Clients", "/clients", "users"),
                NavItem::new("Vehicles", "/vehicles", "car"),
                NavItem::new("Appointments", "/appointments", "calendar"),
                NavItem::new("Inventory", "/inventory", "package"),
                NavItem::new("Invoices", "/invoices", "receipt"),
            ],
        )
    }

    /// Index of the item whose route is the longest prefix of `path`, on a
    /// segment boundary.
    pub fn active_index(&self, path: &str) -> Option<usize> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| {
                path == item.route
                    || path
                        .strip_prefix(item.route.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .max_by_key(|(_, item)| item.route.len())
            .map(|(index, _)| index)
    }

    pub fn render(&self, path: &str) -> String {
        let active = self.active_index(path);
        let mut html = String::from(r#"<aside class="sidebar">"#);
        let _ = write!(html, r#"<div class="brand">{}</div><nav><ul>"#, escape(&self.brand));
        for (index, item) in self.items.iter().enumerate() {
            let class = if Some(index) == active { " class=\"active\"" } else { "" };
            let _ = write!(
                html,
                r##"<li{class}><a href="#{}"><i data-icon="{}"></i>{}</a></li>"##,
                escape(&item.route),
                escape(&item.icon),
                escape(&item.label)
            );
        }
        html.push_str("</ul></nav></aside>");
        html
    }
}
