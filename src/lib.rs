#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod frontend;
pub mod pattern;
pub mod routing;
pub mod telemetry;

pub use config::{load_from_path, FrontendConfig, RestrictionConfig, RouteConfig};
pub use error::{ErrorGroup, FrontendError, HttpError, ServeError};
pub use frontend::{BufConn, Frontend, FrontendOptions, HttpBackend, RequestDescriptor};
pub use pattern::Pattern;
pub use routing::{Restriction, Route, RouteTable};
pub use telemetry::{init_tracing, Metrics};
