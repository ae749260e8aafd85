use std::net::IpAddr;
use std::sync::Arc;

use crate::frontend::HttpBackend;
use crate::pattern::Pattern;
use crate::routing::restriction::{self, Restriction};

/// A (host, path) pattern pair bound to a backend, with an optional
/// access-control list.
#[derive(Clone)]
pub struct Route {
    pub host: Pattern,
    pub path: Pattern,
    pub backend: Arc<dyn HttpBackend>,
    pub restrictions: Vec<Restriction>,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("host", &self.host)
            .field("path", &self.path)
            .field("backend", &self.backend.name())
            .field("restrictions", &self.restrictions)
            .finish()
    }
}

/// First-match lookup over compiled route patterns, falling back to the
/// default backend. Immutable once built; shared freely across connections.
pub struct RouteTable {
    routes: Vec<Route>,
    default_backend: Arc<dyn HttpBackend>,
}

/// Outcome of a lookup: the backend to dispatch to, the pattern strings that
/// go into metric labels, and the restriction verdict.
pub struct RouteDecision<'a> {
    pub backend: &'a Arc<dyn HttpBackend>,
    pub host_label: &'a str,
    pub path_label: &'a str,
    pub allowed: bool,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>, default_backend: Arc<dyn HttpBackend>) -> Self {
        Self { routes, default_backend }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn default_backend(&self) -> &Arc<dyn HttpBackend> {
        &self.default_backend
    }

    /// Find the first route, in definition order, whose host and path
    /// patterns both accept the lowercased request values. Requests matching
    /// no route go to the default backend unrestricted, labeled `*`/`*`.
    pub fn find(&self, host: &str, path: &str, remote_ip: Option<IpAddr>) -> RouteDecision<'_> {
        for route in &self.routes {
            if !route.host.matches(host) || !route.path.matches_path(path) {
                continue;
            }
            return RouteDecision {
                backend: &route.backend,
                host_label: route.host.as_str(),
                path_label: route.path.as_str(),
                allowed: !restriction::denies(&route.restrictions, remote_ip, path),
            };
        }
        RouteDecision {
            backend: &self.default_backend,
            host_label: "*",
            path_label: "*",
            allowed: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServeError;
    use crate::frontend::{BufConn, RequestDescriptor};
    use async_trait::async_trait;

    struct NullBackend(&'static str);

    #[async_trait]
    impl HttpBackend for NullBackend {
        fn name(&self) -> &str {
            self.0
        }

        async fn serve(
            &self,
            _conn: &mut BufConn,
            _req: &mut RequestDescriptor,
        ) -> Result<(), ServeError> {
            Ok(())
        }
    }

    fn backend(name: &'static str) -> Arc<dyn HttpBackend> {
        Arc::new(NullBackend(name))
    }

    fn route(host: &str, path: &str, be: &'static str) -> Route {
        Route {
            host: Pattern::compile(host).expect("host pattern compiles"),
            path: Pattern::compile(path).expect("path pattern compiles"),
            backend: backend(be),
            restrictions: vec![],
        }
    }

    #[test]
    fn first_matching_route_wins() {
        let table = RouteTable::new(
            vec![
                route("*", "/api/*", "api"),
                route("*", "/api/v1/*", "api-v1"),
            ],
            backend("default"),
        );
        let decision = table.find("example.com", "/api/v1/users", None);
        assert_eq!(decision.backend.name(), "api");
        assert_eq!(decision.path_label, "/api/*");
        assert!(decision.allowed);
    }

    #[test]
    fn both_patterns_must_match() {
        let table = RouteTable::new(
            vec![route("api.example.com", "/v1/*", "api")],
            backend("default"),
        );
        assert_eq!(table.find("api.example.com", "/v2/x", None).backend.name(), "default");
        assert_eq!(table.find("web.example.com", "/v1/x", None).backend.name(), "default");
        assert_eq!(table.find("api.example.com", "/v1/x", None).backend.name(), "api");
    }

    #[test]
    fn no_match_falls_back_to_default_with_wildcard_labels() {
        let table =
            RouteTable::new(vec![route("example.com", "*", "site")], backend("default"));
        let decision = table.find("other.test", "/", None);
        assert_eq!(decision.backend.name(), "default");
        assert_eq!(decision.host_label, "*");
        assert_eq!(decision.path_label, "*");
        assert!(decision.allowed);
    }

    #[test]
    fn trailing_slash_pattern_accepts_bare_path() {
        let table = RouteTable::new(vec![route("*", "/foo/", "foo")], backend("default"));
        assert_eq!(table.find("example.com", "/foo", None).backend.name(), "foo");
    }

    #[test]
    fn restrictions_set_verdict_without_falling_through() {
        let deny_all = Restriction {
            network: None,
            path: Some(Pattern::compile("*").expect("pattern compiles")),
            invert: false,
            and_after: false,
        };
        let mut restricted = route("*", "/admin/*", "admin");
        restricted.restrictions = vec![deny_all];
        let table =
            RouteTable::new(vec![restricted, route("*", "*", "open")], backend("default"));

        let decision = table.find("example.com", "/admin/panel", None);
        // The matching route is still selected; only the verdict changes.
        assert_eq!(decision.backend.name(), "admin");
        assert!(!decision.allowed);
    }
}
