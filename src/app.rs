//! Application wiring.
//!
//! [`App`] builds the store, router, API client and services once and hands
//! out references, so nothing in the crate relies on global state.

use std::sync::Arc;

use anyhow::Context;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::api::{ApiClient, ListQuery, PageMeta, ResourceService, Services};
use crate::config::ClientConfig;
use crate::logging;
use crate::router::{Dispatch, History, RouteParams, Router, WeakRouter, WILDCARD};
use crate::store::{StorageBackend, Store, Subscription};
use crate::widgets::{Header, Sidebar};

/// Store keys written by the application shell.
pub mod keys {
    pub const CURRENT_PAGE: &str = "currentPage";
    pub const CURRENT_PATH: &str = "currentPath";
    pub const ROUTE_PARAMS: &str = "routeParams";
    pub const LAST_ERROR: &str = "lastError";
    pub const USER: &str = "user";
    /// Bearer token of the signed-in user, kept beside [`USER`].
    pub const AUTH_TOKEN: &str = "authToken";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Page {
    Dashboard,
    Clients,
    ClientNew,
    ClientDetail,
    ClientEdit,
    Vehicles,
    VehicleNew,
    VehicleDetail,
    Appointments,
    AppointmentNew,
    AppointmentDetail,
    Inventory,
    InventoryItem,
    Invoices,
    InvoiceDetail,
    Error,
    NotFound,
}

impl Page {
    pub fn title(self) -> &'static str {
        match self {
            Page::Dashboard => "Dashboard",
            Page::Clients => "Clients",
            Page::ClientNew => "New client",
            Page::ClientDetail => "Client",
            Page::ClientEdit => "Edit client",
            Page::Vehicles => "Vehicles",
            Page::VehicleNew => "New vehicle",
            Page::VehicleDetail => "Vehicle",
            Page::Appointments => "Appointments",
            Page::AppointmentNew => "New appointment",
            Page::AppointmentDetail => "Appointment",
            Page::Inventory => "Inventory",
            Page::InventoryItem => "Inventory item",
            Page::Invoices => "Invoices",
            Page::InvoiceDetail => "Invoice",
            Page::Error => "Something went wrong",
            Page::NotFound => "Page not found",
        }
    }
}

/// Shop routes in precedence order: fixed segments before `:id`.
pub const ROUTES: &[(&str, Page)] = &[
    ("/dashboard", Page::Dashboard),
    ("/clients", Page::Clients),
    ("/clients/new", Page::ClientNew),
    ("/clients/:id", Page::ClientDetail),
    ("/clients/:id/edit", Page::ClientEdit),
    ("/vehicles", Page::Vehicles),
    ("/vehicles/new", Page::VehicleNew),
    ("/vehicles/:id", Page::VehicleDetail),
    ("/appointments", Page::Appointments),
    ("/appointments/new", Page::AppointmentNew),
    ("/appointments/:id", Page::AppointmentDetail),
    ("/inventory", Page::Inventory),
    ("/inventory/:id", Page::InventoryItem),
    ("/invoices", Page::Invoices),
    ("/invoices/:id", Page::InvoiceDetail),
];

/// Latest header and sidebar markup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chrome {
    pub header: String,
    pub sidebar: String,
}

pub struct App {
    config: ClientConfig,
    store: Store,
    router: Router,
    api: ApiClient,
    services: Services,
    chrome: Arc<Mutex<Chrome>>,
    subscriptions: Vec<Subscription>,
}

impl App {
    pub fn new(
        config: ClientConfig,
        history: impl History + 'static,
        storage: Arc<dyn StorageBackend>,
    ) -> anyhow::Result<Self> {
        config.validate()?;

        let store = Store::with_options(storage, config.store.max_notify_depth);
        let router = match config.router.error_route() {
            Some(error_route) => Router::with_error_route(history, error_route),
            None => Router::new(history),
        };
        let api = ApiClient::new(&config.api).context("building HTTP client")?;
        let services = Services::new(&api);

        Ok(Self {
            config,
            store,
            router,
            api,
            services,
            chrome: Arc::new(Mutex::new(Chrome::default())),
            subscriptions: Vec::new(),
        })
    }

    /// Install the `tracing` subscriber using the configured filter.
    ///
    /// Returns `false` when the host already installed one.
    pub fn init_logging(&self) -> bool {
        logging::init(&self.config.log_filter)
    }

    /// Register routes, restore persisted state and resolve the current hash.
    ///
    /// Also installs the logging subscriber unless one is already present.
    pub fn start(&mut self) -> anyhow::Result<Dispatch> {
        self.init_logging();
        self.register_routes()?;
        self.watch_chrome();

        if self.store.restore(&self.config.store.persist_key) {
            info!(entries = self.store.len(), "restored persisted state");
        }
        self.resume_session();
        Ok(self.router.init())
    }

    /// Persist state and detach the shell's listeners.
    pub fn shutdown(&mut self) -> bool {
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        self.store.persist(&self.config.store.persist_key)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn chrome(&self) -> Chrome {
        self.chrome.lock().clone()
    }

    pub fn current_page(&self) -> Option<Page> {
        self.store.get_as(keys::CURRENT_PAGE)
    }

    /// Record the user and hand their token to the API client.
    ///
    /// Both are persisted with the rest of the state, so a restart resumes
    /// the session.
    pub fn sign_in(&self, name: &str, token: String) -> anyhow::Result<()> {
        self.store.set(keys::AUTH_TOKEN, &token)?;
        self.store.set(keys::USER, json!({ "name": name }))?;
        self.api.set_token(Some(token));
        Ok(())
    }

    pub fn sign_out(&self) -> anyhow::Result<()> {
        self.api.set_token(None);
        self.store.delete(keys::AUTH_TOKEN)?;
        self.store.delete(keys::USER)?;
        Ok(())
    }

    /// Fetch one page of `service`'s collection into the store.
    pub async fn load_page<T>(
        &self,
        service: &ResourceService<T>,
        query: &ListQuery,
    ) -> anyhow::Result<PageMeta>
    where
        T: Serialize + DeserializeOwned,
    {
        let resource = service.resource();
        let page = service
            .list(query)
            .await
            .with_context(|| format!("loading {}", resource.path()))?;
        self.store.set(resource.state_key(), &page)?;
        Ok(page.pagination)
    }

    /// Reattach a restored token; a user without one is signed out.
    fn resume_session(&self) {
        match self.store.get_as::<String>(keys::AUTH_TOKEN) {
            Some(token) => self.api.set_token(Some(token)),
            None if self.store.has(keys::USER) => {
                warn!("restored user has no token; signing out");
                if let Err(err) = self.sign_out() {
                    warn!(error = %err, "could not clear the stale session");
                }
            }
            None => {}
        }
    }

    fn register_routes(&self) -> anyhow::Result<()> {
        self.router
            .add_redirect("/", &self.config.router.default_route)?;

        for &(pattern, page) in ROUTES {
            self.add_page(pattern, page)?;
        }
        if let Some(error_route) = self.config.router.error_route() {
            self.add_page(error_route, Page::Error)?;
        }
        self.add_page(WILDCARD, Page::NotFound)?;
        Ok(())
    }

    fn add_page(&self, pattern: &str, page: Page) -> anyhow::Result<()> {
        let store = self.store.clone();
        let router = self.router.downgrade();
        self.router
            .add_route(pattern, move |params| mount(&store, &router, page, params))
            .with_context(|| format!("registering route {pattern}"))?;
        Ok(())
    }

    fn watch_chrome(&mut self) {
        let sidebar = Sidebar::shop();
        let redraw = {
            let store = self.store.clone();
            let chrome = Arc::clone(&self.chrome);
            move || *chrome.lock() = render_chrome(&store, &sidebar)
        };
        redraw();

        let redraw = Arc::new(redraw);
        for key in [keys::CURRENT_PAGE, keys::USER] {
            let redraw = Arc::clone(&redraw);
            self.subscriptions
                .push(self.store.subscribe(key, move |_| redraw()));
        }
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("store", &self.store)
            .field("router", &self.router)
            .field("api", &self.api)
            .finish_non_exhaustive()
    }
}

/// Record the mounted page in the store.
fn mount(
    store: &Store,
    router: &WeakRouter,
    page: Page,
    params: &RouteParams,
) -> anyhow::Result<()> {
    if let Some(id) = params.get("id") {
        id.parse::<u64>()
            .with_context(|| format!("`{id}` is not a valid record id"))?;
    }

    let router = router.upgrade();
    let path = router
        .as_ref()
        .map(Router::current_path)
        .unwrap_or_else(|| "/".to_string());

    if page == Page::Error {
        match router.as_ref().and_then(Router::last_failure) {
            Some(failure) => store.set(
                keys::LAST_ERROR,
                json!({ "path": failure.path, "message": failure.message }),
            )?,
            None => warn!("error page mounted without a recorded failure"),
        }
    }

    store.set(keys::ROUTE_PARAMS, params.to_json())?;
    store.set(keys::CURRENT_PATH, &path)?;
    store.set(keys::CURRENT_PAGE, page)?;
    info!(?page, %path, "page mounted");
    Ok(())
}

fn render_chrome(store: &Store, sidebar: &Sidebar) -> Chrome {
    let title = store
        .get_as::<Page>(keys::CURRENT_PAGE)
        .map_or("Shopdesk", Page::title);
    let path = store
        .get_as::<String>(keys::CURRENT_PATH)
        .unwrap_or_else(|| "/".to_string());
    let user = store
        .get(keys::USER)
        .and_then(|user| user.get("name")?.as_str().map(str::to_string));

    Chrome {
        header: Header {
            title: title.to_string(),
            user,
        }
        .render(),
        sidebar: sidebar.render(&path),
    }
}
