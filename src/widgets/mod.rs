//! Declarative UI pieces rendered to HTML strings.
//!
//! Each widget is driven by an explicit configuration struct; callbacks are
//! typed fields rather than loose options.

mod data_table;
mod form;
mod header;
pub mod html;
mod modal;
mod sidebar;

pub use data_table::{CellFormatter, Column, DataTable, DataTableConfig, RowCallback};
pub use form::{Field, FieldErrors, FieldKind, Form, FormConfig, SubmitCallback};
pub use header::Header;
pub use modal::{ButtonVariant, Callback, Modal, ModalBody, ModalButton, ModalConfig};
pub use sidebar::{NavItem, Sidebar};
