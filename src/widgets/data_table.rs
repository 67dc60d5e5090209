use std::fmt::Write;
use std::sync::Arc;

use serde_json::Value;

use super::html::escape;
use crate::api::PageMeta;

/// Turns a cell value into display text. The output is escaped.
pub type CellFormatter = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Called with the row index and the row when a row is clicked.
pub type RowCallback = Arc<dyn Fn(usize, &Value) + Send + Sync>;

#[derive(Clone)]
pub struct Column {
    /// Field to read; dots descend into nested objects (`vehicle.make`).
    pub key: String,
    pub label: String,
    pub formatter: Option<CellFormatter>,
}

impl Column {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            formatter: None,
        }
    }

    pub fn format<F>(mut self, formatter: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.formatter = Some(Arc::new(formatter));
        self
    }

    fn cell_text(&self, row: &Value) -> String {
        let value = lookup(row, &self.key).unwrap_or(&Value::Null);
        match &self.formatter {
            Some(formatter) => formatter(value),
            None => plain_text(value),
        }
    }
}

#[derive(Clone)]
pub struct DataTableConfig {
    pub columns: Vec<Column>,
    pub empty_message: String,
    pub css_class: String,
    pub on_row_click: Option<RowCallback>,
}

impl Default for DataTableConfig {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            empty_message: "No records found".to_string(),
            css_class: "table".to_string(),
            on_row_click: None,
        }
    }
}

/// Tabular listing of JSON rows with an optional pagination footer.
pub struct DataTable {
    config: DataTableConfig,
    rows: Vec<Value>,
    pagination: Option<PageMeta>,
}

impl DataTable {
    pub fn new(config: DataTableConfig) -> Self {
        Self {
            config,
            rows: Vec::new(),
            pagination: None,
        }
    }

    pub fn set_rows(&mut self, rows: Vec<Value>, pagination: Option<PageMeta>) {
        self.rows = rows;
        self.pagination = pagination;
    }

    pub fn rows(&self) -> &[Value] {
        &self.rows
    }

    /// Run the row-click callback. Returns `false` for an unknown row or
    /// when no callback is configured.
    pub fn click_row(&self, index: usize) -> bool {
        match (self.rows.get(index), &self.config.on_row_click) {
            (Some(row), Some(callback)) => {
                callback(index, row);
                true
            }
            _ => false,
        }
    }

    pub fn render(&self) -> String {
        let mut html = String::new();
        let _ = write!(html, r#"<table class="{}"><thead><tr>"#, escape(&self.config.css_class));
        for column in &self.config.columns {
            let _ = write!(html, r#"<th data-key="{}">{}</th>"#, escape(&column.key), escape(&column.label));
        }
        html.push_str("</tr></thead><tbody>");

        if self.rows.is_empty() {
            let _ = write!(
                html,
                r#"<tr class="empty"><td colspan="{}">{}</td></tr>"#,
                self.config.columns.len().max(1),
                escape(&self.config.empty_message)
            );
        }
        for (index, row) in self.rows.iter().enumerate() {
            let _ = write!(html, r#"<tr data-row="{index}">"#);
            for column in &self.config.columns {
                let _ = write!(html, "<td>{}</td>", escape(&column.cell_text(row)));
            }
            html.push_str("</tr>");
        }
        html.push_str("</tbody></table>");

        if let Some(meta) = &self.pagination {
            html.push_str(&render_pagination(meta));
        }
        html
    }
}

fn render_pagination(meta: &PageMeta) -> String {
    let disabled = |flag: bool| if flag { "" } else { " disabled" };
    format!(
        concat!(
            r#"<nav class="pagination">"#,
            r#"<span>Showing {start}-{end} of {total}</span>"#,
            r#"<button data-page="{prev}"{prev_disabled}>Previous</button>"#,
            r#"<span>Page {page} of {pages}</span>"#,
            r#"<button data-page="{next}"{next_disabled}>Next</button>"#,
            "</nav>"
        ),
        start = meta.start_item,
        end = meta.end_item,
        total = meta.total,
        prev = meta.page.saturating_sub(1).max(1),
        prev_disabled = disabled(meta.has_prev),
        page = meta.page,
        pages = meta.total_pages.max(1),
        next = meta.page + 1,
        next_disabled = disabled(meta.has_next),
    )
}

fn lookup<'a>(row: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.').try_fold(row, |value, part| value.get(part))
}

fn plain_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => (if *flag { "Yes" } else { "No" }).to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    fn table() -> DataTable {
        DataTable::new(DataTableConfig {
            columns: vec![
                Column::new("name", "Name"),
                Column::new("vehicle.make", "Make"),
                Column::new("balance", "Balance").format(|v| {
                    format!("${:.2}", v.as_f64().unwrap_or_default())
                }),
            ],
            ..Default::default()
        })
    }

    #[test]
    fn renders_rows_with_nested_keys_and_formatters() {
        let mut table = table();
        table.set_rows(
            vec![json!({ "name": "<Ana>", "vehicle": { "make": "Honda" }, "balance": 12.5 })],
            None,
        );
        let html = table.render();
        assert!(html.contains("<td>&lt;Ana&gt;</td><td>Honda</td><td>$12.50</td>"));
        assert!(!html.contains("pagination"));
    }

    #[test]
    fn empty_state_spans_all_columns() {
        let html = table().render();
        assert!(html.contains(r#"<td colspan="3">No records found</td>"#));
    }

    #[test]
    fn pagination_footer() {
        let mut table = table();
        table.set_rows(vec![json!({ "name": "A" })], Some(PageMeta::compute(1, 20, 45)));
        let html = table.render();
        assert!(html.contains("Showing 1-20 of 45"));
        assert!(html.contains(r#"<button data-page="1" disabled>Previous</button>"#));
        assert!(html.contains(r#"<button data-page="2">Next</button>"#));
    }

    #[test]
    fn row_click_callback() {
        let clicked = Arc::new(Mutex::new(None));
        let c = clicked.clone();
        let mut table = DataTable::new(DataTableConfig {
            columns: vec![Column::new("id", "Id")],
            on_row_click: Some(Arc::new(move |index: usize, row: &Value| {
                *c.lock() = Some((index, row["id"].clone()));
            })),
            ..Default::default()
        });
        table.set_rows(vec![json!({ "id": 1 }), json!({ "id": 2 })], None);

        assert!(table.click_row(1));
        assert!(!table.click_row(5));
        assert_eq!(*clicked.lock(), Some((1, json!(2))));
    }
}
