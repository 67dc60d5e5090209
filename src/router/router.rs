use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, warn};

use super::history::{normalize_path, History};
use super::pattern::{PathPattern, RouteParams};
use crate::error::{panic_message, RouterError};

/// Pattern that matches any path no other route matched.
pub const WILDCARD: &str = "*";

/// Callback run when its route matches.
pub type RouteHandler = Arc<dyn Fn(&RouteParams) -> anyhow::Result<()> + Send + Sync>;

struct Route {
    pattern: String,
    matcher: Option<PathPattern>,
    handler: RouteHandler,
}

/// Where the router currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterState {
    Idle,
    Routed { pattern: String, path: String },
}

/// What a resolution pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// A registered route matched and its handler succeeded.
    Matched { pattern: String, params: RouteParams },
    /// Nothing matched; the wildcard handler ran.
    Fallback,
    /// Nothing matched and no wildcard is registered.
    Unmatched { path: String },
    /// The handler for `pattern` returned an error or panicked.
    Failed { pattern: String },
    /// No resolution happened: the router is not listening yet or the hash
    /// did not change.
    Skipped,
}

/// Last handler failure, kept for the error page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteFailure {
    pub path: String,
    pub pattern: String,
    pub message: String,
}

struct RouterInner {
    routes: RwLock<Vec<Route>>,
    history: Mutex<Box<dyn History>>,
    state: RwLock<RouterState>,
    last_failure: RwLock<Option<RouteFailure>>,
    listening: AtomicBool,
    error_route: Option<String>,
}

/// Hash-fragment router.
///
/// Routes are tried in registration order and the first match wins, so
/// register `/clients/new` before `/clients/:id`.
///
/// # Examples
///
/// ```
/// use shopdesk::router::{Dispatch, MemoryHistory, Router};
///
/// let router = Router::new(MemoryHistory::new());
/// router.add_route("/clients/:id", |params| {
///     assert_eq!(params.get("id"), Some("42"));
///     Ok(())
/// }).unwrap();
///
/// router.init();
/// assert!(matches!(router.navigate("/clients/42"), Dispatch::Matched { .. }));
/// ```
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl Router {
    pub fn new(history: impl History + 'static) -> Self {
        Self::build(Box::new(history), None)
    }

    /// Router that navigates to `error_route` when a handler fails.
    pub fn with_error_route(history: impl History + 'static, error_route: &str) -> Self {
        Self::build(Box::new(history), Some(normalize_path(error_route)))
    }

    fn build(history: Box<dyn History>, error_route: Option<String>) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                routes: RwLock::new(Vec::new()),
                history: Mutex::new(history),
                state: RwLock::new(RouterState::Idle),
                last_failure: RwLock::new(None),
                listening: AtomicBool::new(false),
                error_route,
            }),
        }
    }

    /// Register `handler` for `pattern`.
    ///
    /// Registering a pattern that already exists swaps its handler but keeps
    /// its original precedence.
    pub fn add_route<F>(&self, pattern: &str, handler: F) -> Result<(), RouterError>
    where
        F: Fn(&RouteParams) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.add_route_handler(pattern, Arc::new(handler))
    }

    pub fn add_route_handler(&self, pattern: &str, handler: RouteHandler) -> Result<(), RouterError> {
        let matcher = if pattern == WILDCARD {
            None
        } else {
            Some(PathPattern::compile(pattern)?)
        };

        let mut routes = self.inner.routes.write();
        if let Some(existing) = routes.iter_mut().find(|route| route.pattern == pattern) {
            warn!(pattern, "route registered twice; replacing its handler");
            existing.handler = handler;
            existing.matcher = matcher;
        } else {
            routes.push(Route {
                pattern: pattern.to_string(),
                matcher,
                handler,
            });
        }
        Ok(())
    }

    /// Register a route that replaces the current entry with `target`.
    pub fn add_redirect(&self, pattern: &str, target: &str) -> Result<(), RouterError> {
        let router = self.downgrade();
        let target = target.to_string();
        self.add_route(pattern, move |_| {
            if let Some(router) = router.upgrade() {
                router.replace(&target);
            }
            Ok(())
        })
    }

    pub fn has_route(&self, pattern: &str) -> bool {
        self.inner
            .routes
            .read()
            .iter()
            .any(|route| route.pattern == pattern)
    }

    /// Patterns in precedence order.
    pub fn patterns(&self) -> Vec<String> {
        self.inner
            .routes
            .read()
            .iter()
            .map(|route| route.pattern.clone())
            .collect()
    }

    /// Start reacting to hash changes and resolve the current hash once.
    pub fn init(&self) -> Dispatch {
        if self.inner.listening.swap(true, Ordering::SeqCst) {
            debug!("router already initialised");
        }
        self.handle_route()
    }

    pub fn is_listening(&self) -> bool {
        self.inner.listening.load(Ordering::SeqCst)
    }

    /// Entry point for hosts whose environment changed the hash itself.
    pub fn on_hash_change(&self) -> Dispatch {
        if !self.is_listening() {
            return Dispatch::Skipped;
        }
        self.handle_route()
    }

    /// Add a history entry for `path` and resolve it.
    pub fn navigate(&self, path: &str) -> Dispatch {
        let changed = self.inner.history.lock().push(path);
        self.after_change(changed)
    }

    /// Swap the current history entry for `path` and resolve it.
    pub fn replace(&self, path: &str) -> Dispatch {
        let changed = self.inner.history.lock().replace(path);
        self.after_change(changed)
    }

    pub fn back(&self) -> Dispatch {
        let changed = self.inner.history.lock().back();
        self.after_change(changed)
    }

    pub fn forward(&self) -> Dispatch {
        let changed = self.inner.history.lock().forward();
        self.after_change(changed)
    }

    /// Current path, `/` when the hash is empty.
    pub fn current_path(&self) -> String {
        normalize_path(&self.inner.history.lock().hash())
    }

    pub fn state(&self) -> RouterState {
        self.inner.state.read().clone()
    }

    pub fn last_failure(&self) -> Option<RouteFailure> {
        self.inner.last_failure.read().clone()
    }

    pub fn error_route(&self) -> Option<&str> {
        self.inner.error_route.as_deref()
    }

    /// Resolve the current hash and run the first matching handler.
    pub fn handle_route(&self) -> Dispatch {
        let path = self.current_path();

        let found = self.inner.routes.read().iter().find_map(|route| {
            let params = route.matcher.as_ref()?.captures(&path)?;
            Some((route.pattern.clone(), Arc::clone(&route.handler), params))
        });

        if let Some((pattern, handler, params)) = found {
            debug!(%path, %pattern, "route matched");
            self.enter(&pattern, &path);
            return if self.invoke(&pattern, &path, &handler, &params) {
                Dispatch::Matched { pattern, params }
            } else {
                Dispatch::Failed { pattern }
            };
        }

        let fallback = self
            .inner
            .routes
            .read()
            .iter()
            .find(|route| route.pattern == WILDCARD)
            .map(|route| Arc::clone(&route.handler));

        match fallback {
            Some(handler) => {
                debug!(%path, "no route matched; using wildcard");
                self.enter(WILDCARD, &path);
                if self.invoke(WILDCARD, &path, &handler, &RouteParams::new()) {
                    Dispatch::Fallback
                } else {
                    Dispatch::Failed {
                        pattern: WILDCARD.to_string(),
                    }
                }
            }
            None => {
                warn!(%path, "no route found");
                Dispatch::Unmatched { path }
            }
        }
    }

    fn after_change(&self, changed: bool) -> Dispatch {
        if changed && self.is_listening() {
            self.handle_route()
        } else {
            Dispatch::Skipped
        }
    }

    fn enter(&self, pattern: &str, path: &str) {
        *self.inner.state.write() = RouterState::Routed {
            pattern: pattern.to_string(),
            path: path.to_string(),
        };
    }

    fn invoke(&self, pattern: &str, path: &str, handler: &RouteHandler, params: &RouteParams) -> bool {
        let message = match catch_unwind(AssertUnwindSafe(|| handler(params))) {
            Ok(Ok(())) => return true,
            Ok(Err(err)) => format!("{err:#}"),
            Err(payload) => panic_message(payload.as_ref()),
        };

        error!(%path, %pattern, error = %message, "route handler failed");
        *self.inner.last_failure.write() = Some(RouteFailure {
            path: path.to_string(),
            pattern: pattern.to_string(),
            message,
        });

        if let Some(error_route) = self.inner.error_route.as_deref() {
            if error_route != path {
                self.navigate(error_route);
            }
        }
        false
    }

    /// Handle that does not keep the router alive, for handlers that
    /// navigate.
    pub fn downgrade(&self) -> WeakRouter {
        WeakRouter(Arc::downgrade(&self.inner))
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.patterns())
            .field("state", &self.state())
            .field("listening", &self.is_listening())
            .finish()
    }
}

/// Non-owning router handle.
#[derive(Clone)]
pub struct WeakRouter(Weak<RouterInner>);

impl WeakRouter {
    pub fn upgrade(&self) -> Option<Router> {
        self.0.upgrade().map(|inner| Router { inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::MemoryHistory;
    use std::sync::atomic::AtomicUsize;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> RouteHandler) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let make = move |name: &str| -> RouteHandler {
            let log = log_clone.clone();
            let name = name.to_string();
            Arc::new(move |params: &RouteParams| -> anyhow::Result<()> {
                let rendered: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
                log.lock().push(format!("{name}({})", rendered.join(",")));
                Ok(())
            })
        };
        (log, make)
    }

    #[test]
    fn first_registration_wins() {
        let (log, handler) = recorder();
        let router = Router::new(MemoryHistory::new());
        router.add_route_handler("/clients/new", handler("new")).unwrap();
        router.add_route_handler("/clients/:id", handler("show")).unwrap();
        router.init();

        router.navigate("#/clients/new");
        router.navigate("/clients/9");
        assert_eq!(*log.lock(), vec!["new()", "show(id=9)"]);
    }

    #[test]
    fn nothing_dispatches_before_init() {
        let (log, handler) = recorder();
        let router = Router::new(MemoryHistory::new());
        router.add_route_handler("/a", handler("a")).unwrap();

        assert_eq!(router.navigate("/a"), Dispatch::Skipped);
        assert!(log.lock().is_empty());
        assert_eq!(router.state(), RouterState::Idle);

        router.init();
        assert_eq!(*log.lock(), vec!["a()"]);
    }

    #[test]
    fn empty_hash_resolves_to_root() {
        let (log, handler) = recorder();
        let router = Router::new(MemoryHistory::starting_at("#"));
        router.add_route_handler("/", handler("root")).unwrap();

        assert!(matches!(router.init(), Dispatch::Matched { .. }));
        assert_eq!(*log.lock(), vec!["root()"]);
        assert_eq!(
            router.state(),
            RouterState::Routed {
                pattern: "/".into(),
                path: "/".into()
            }
        );
    }

    #[test]
    fn wildcard_runs_once_for_unknown_paths() {
        let (log, handler) = recorder();
        let router = Router::new(MemoryHistory::new());
        router.add_route_handler(WILDCARD, handler("missing")).unwrap();
        router.add_route_handler("/clients", handler("clients")).unwrap();
        router.init();
        log.lock().clear();

        assert_eq!(router.navigate("/nope"), Dispatch::Fallback);
        assert_eq!(*log.lock(), vec!["missing()"]);

        router.navigate("/clients");
        assert_eq!(log.lock().last().map(String::as_str), Some("clients()"));
    }

    #[test]
    fn unmatched_without_wildcard_is_not_fatal() {
        let router = Router::new(MemoryHistory::new());
        router.init();
        assert_eq!(
            router.navigate("/ghost"),
            Dispatch::Unmatched {
                path: "/ghost".into()
            }
        );
    }

    #[test]
    fn trailing_slash_is_significant() {
        let (log, handler) = recorder();
        let router = Router::new(MemoryHistory::new());
        router.add_route_handler("/clients", handler("clients")).unwrap();
        router.init();

        assert_eq!(
            router.navigate("/clients/"),
            Dispatch::Unmatched {
                path: "/clients/".into()
            }
        );
        assert!(log.lock().is_empty());
    }

    #[test]
    fn navigating_to_current_path_does_not_redispatch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let router = Router::new(MemoryHistory::new());
        router
            .add_route("/a", move |_| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        router.init();

        router.navigate("/a");
        assert_eq!(router.navigate("/a"), Dispatch::Skipped);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(matches!(router.on_hash_change(), Dispatch::Matched { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn duplicate_pattern_replaces_handler_in_place() {
        let (log, handler) = recorder();
        let router = Router::new(MemoryHistory::new());
        router.add_route_handler("/clients/:id", handler("old")).unwrap();
        router.add_route_handler("/clients/new", handler("new")).unwrap();
        router.add_route_handler("/clients/:id", handler("replacement")).unwrap();
        router.init();

        assert_eq!(router.patterns(), vec!["/clients/:id", "/clients/new"]);
        router.navigate("/clients/new");
        assert_eq!(*log.lock(), vec!["replacement(id=new)"]);
    }

    #[test]
    fn failing_handler_redirects_to_error_route() {
        let (log, handler) = recorder();
        let router = Router::with_error_route(MemoryHistory::new(), "/error");
        router
            .add_route("/broken", |_| Err(anyhow::anyhow!("database offline")))
            .unwrap();
        router.add_route("/panics", |_| panic!("bad template")).unwrap();
        router.add_route_handler("/error", handler("error")).unwrap();
        router.init();

        assert_eq!(
            router.navigate("/broken"),
            Dispatch::Failed {
                pattern: "/broken".into()
            }
        );
        assert_eq!(router.current_path(), "/error");
        assert_eq!(*log.lock(), vec!["error()"]);
        let failure = router.last_failure().unwrap();
        assert_eq!(failure.path, "/broken");
        assert!(failure.message.contains("database offline"));

        router.navigate("/panics");
        assert_eq!(router.current_path(), "/error");
        assert!(router.last_failure().unwrap().message.contains("bad template"));
    }

    #[test]
    fn failing_error_route_does_not_loop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let router = Router::with_error_route(MemoryHistory::new(), "/error");
        router
            .add_route("/error", move |_| {
                c.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("error page is broken too")
            })
            .unwrap();
        router.init();

        router.navigate("/error");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn back_forward_and_replace() {
        let (log, handler) = recorder();
        let router = Router::new(MemoryHistory::new());
        router.add_route_handler("/a", handler("a")).unwrap();
        router.add_route_handler("/b", handler("b")).unwrap();
        router.add_route_handler("/c", handler("c")).unwrap();
        router.init();
        log.lock().clear();

        router.navigate("/a");
        router.navigate("/b");
        router.back();
        router.forward();
        router.replace("/c");
        router.back();
        assert_eq!(*log.lock(), vec!["a()", "b()", "a()", "b()", "c()", "a()"]);
    }

    #[test]
    fn redirect_replaces_entry() {
        let (log, handler) = recorder();
        let history = MemoryHistory::new();
        let router = Router::new(history);
        router.add_redirect("/", "/dashboard").unwrap();
        router.add_route_handler("/dashboard", handler("dashboard")).unwrap();

        router.init();
        assert_eq!(router.current_path(), "/dashboard");
        assert_eq!(*log.lock(), vec!["dashboard()"]);
        assert_eq!(router.back(), Dispatch::Skipped);
    }
}
