use ipnet::IpNet;
use serde::Deserialize;

/// Frontend configuration as loaded from TOML.
///
/// Patterns stay textual here; they are compiled when the config is resolved
/// into frontend options against a backend registry.
#[derive(Debug, Deserialize, Clone)]
pub struct FrontendConfig {
    /// Frontend name, carried into every metric label set.
    pub name: String,
    /// Request timeout in milliseconds, header read to backend completion.
    /// Default: 0 (no deadline).
    #[serde(default)]
    pub timeout_ms: u64,
    /// Idle keep-alive timeout in milliseconds between requests on one
    /// connection. 0 keeps idle connections forever.
    /// Default: 60000 (60 seconds)
    #[serde(default = "default_keep_alive_timeout_ms")]
    pub keep_alive_timeout_ms: u64,
    /// Backend serving requests that match no route.
    pub default_backend: String,
    /// Routes, matched first to last; the first whose host and path patterns
    /// both accept the request wins.
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// One route: a host/path glob pair bound to a named backend.
#[derive(Debug, Deserialize, Clone)]
pub struct RouteConfig {
    /// Host glob (`*` and `?` metacharacters). Blank matches every host.
    #[serde(default)]
    pub host: String,
    /// Path glob. Blank matches every path.
    #[serde(default)]
    pub path: String,
    /// Name of the backend serving this route.
    pub backend: String,
    /// Access-control clauses, evaluated as any-of-ANDed-groups.
    #[serde(default)]
    pub restrictions: Vec<RestrictionConfig>,
}

/// One access-control clause.
#[derive(Debug, Deserialize, Clone)]
pub struct RestrictionConfig {
    /// CIDR the peer address must fall into for the clause to match.
    /// Example: "10.0.0.0/8" or "2001:db8::/32"
    #[serde(default, deserialize_with = "deserialize_opt_network")]
    pub network: Option<IpNet>,
    /// Path glob the request path must match.
    #[serde(default)]
    pub path: Option<String>,
    /// Negate each enabled predicate before it contributes.
    #[serde(default)]
    pub invert: bool,
    /// Chain this clause with the next one into an AND group.
    #[serde(default)]
    pub and_after: bool,
}

fn default_keep_alive_timeout_ms() -> u64 {
    60_000
}

/// Deserialize an optional CIDR from its string form with a readable error.
fn deserialize_opt_network<'de, D>(deserializer: D) -> Result<Option<IpNet>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(s) => s
            .parse::<IpNet>()
            .map(Some)
            .map_err(|e| serde::de::Error::custom(format!("invalid IP network '{s}': {e}"))),
    }
}
