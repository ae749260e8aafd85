use ahash::AHashMap;
use async_trait::async_trait;
use http::StatusCode;

use crate::error::ServeError;
use crate::frontend::conn::BufConn;

/// Contract for the downstream component that owns upstream selection and
/// relay.
///
/// An implementation reads the remaining request body from the client
/// connection, forwards the exchange, writes the response back, and fills
/// the descriptor's `be_name`, `be_server_name` and `be_status_code` fields.
/// It returns `Ok` on success, [`ServeError::ExpectedEof`] for a clean
/// upstream close after a full response, [`ServeError::GracefulTermination`]
/// to end the connection without an error label, or a grouped
/// [`HttpError`](crate::error::HttpError) for everything else.
#[async_trait]
pub trait HttpBackend: Send + Sync {
    /// Stable backend name, used for config resolution and metric labels.
    fn name(&self) -> &str;

    /// Serve one matched request over the client connection.
    async fn serve(
        &self,
        conn: &mut BufConn,
        req: &mut RequestDescriptor,
    ) -> Result<(), ServeError>;
}

/// Per-request scratch state, created by the pipeline and discarded when the
/// request completes. Backends fill in the `be_*` fields.
#[derive(Debug, Default)]
pub struct RequestDescriptor {
    /// Owning frontend's name, copied in so the descriptor carries no
    /// back-reference.
    pub frontend: String,
    pub method: String,
    pub uri: String,
    pub version: String,
    /// Header fields with lowercased names.
    pub headers: AHashMap<String, String>,
    /// Pattern string of the matched route's host, `*` for the default
    /// backend, empty before routing.
    pub host_label: String,
    /// Pattern string of the matched route's path, `*` for the default
    /// backend, empty before routing.
    pub path_label: String,
    pub be_name: String,
    pub be_server_name: String,
    pub be_status_code: Option<StatusCode>,
    /// Bytes the header splitter consumed for this request.
    pub(crate) header_bytes: usize,
}

impl RequestDescriptor {
    pub(crate) fn new(frontend: &str) -> Self {
        Self { frontend: frontend.to_string(), ..Self::default() }
    }
}
