use std::time::Instant;

use tracing::debug;

use crate::error::{HttpError, ServeError};
use crate::frontend::conn::{BufConn, TransferSnapshot};
use crate::frontend::http::{
    parse_status_line, split_http_header, uri_to_path, HTTP_BAD_REQUEST, HTTP_FORBIDDEN,
};
use crate::frontend::{Frontend, RequestDescriptor};
use crate::telemetry::RequestLabels;

impl Frontend {
    /// Drive one request over an already-open connection: header read,
    /// routing, dispatch and the buffer-order check, under the request
    /// deadline when one is configured.
    ///
    /// On any terminating cause the connection is flushed and closed; on
    /// success it stays open for keep-alive reuse. Metrics for the request
    /// are recorded exactly once on every path out.
    pub(crate) async fn serve_request(
        &self,
        conn: &mut BufConn,
        address: &str,
        transferred: &mut TransferSnapshot,
    ) -> Result<(), ServeError> {
        let started = Instant::now();
        let mut desc = RequestDescriptor::new(&self.name);

        let result = if self.timeout.is_zero() {
            self.serve_inner(conn, &mut desc).await
        } else {
            match tokio::time::timeout(self.timeout, self.serve_inner(conn, &mut desc)).await {
                Ok(result) => result,
                // The serve future is dropped here, releasing the
                // connection so it can be closed below.
                Err(_) => Err(HttpError::frontend_timeout("request deadline").into()),
            }
        };

        if result.is_err() {
            let _ = conn.flush().await;
            conn.close().await;
        }
        self.record(conn, address, &desc, &result, transferred, started);
        result
    }

    async fn serve_inner(
        &self,
        conn: &mut BufConn,
        desc: &mut RequestDescriptor,
    ) -> Result<(), ServeError> {
        let (header_bytes, header) = split_http_header(conn).await;
        desc.header_bytes = header_bytes;
        let header = match header {
            // Zero bytes means the peer closed between requests.
            Err(_) if header_bytes == 0 => return Err(ServeError::GracefulTermination),
            Err(e) => {
                let _ = conn.write_all(HTTP_BAD_REQUEST).await;
                return Err(HttpError::communication("read request header", e).into());
            }
            Ok(header) => header,
        };

        let status = parse_status_line(&header.status_line)?;
        desc.method = status.method;
        desc.uri = status.uri;
        desc.version = status.version;
        desc.headers = header.fields;

        let host = desc.headers.get("host").map(|h| h.to_lowercase()).unwrap_or_default();
        let path = uri_to_path(&desc.uri).to_lowercase();
        let remote_ip = conn.peer_addr().ok().map(|a| a.ip());
        let decision = self.table.find(&host, &path, remote_ip);
        desc.host_label = decision.host_label.to_string();
        desc.path_label = decision.path_label.to_string();
        if !decision.allowed {
            debug!(frontend = %self.name, %host, %path, "request denied by restriction");
            let _ = conn.write_all(HTTP_FORBIDDEN).await;
            return Err(ServeError::GracefulTermination);
        }
        let backend = decision.backend.clone();

        backend.serve(conn, desc).await?;

        if conn.buffered() > 0 {
            return Err(HttpError::protocol(
                "finish request",
                "client bytes buffered past request end",
            )
            .into());
        }
        Ok(())
    }

    /// Record telemetry for one pipeline pass: byte deltas since the prior
    /// emission, the requests counter with its error label, and the duration
    /// histogram for clean completions.
    fn record(
        &self,
        conn: &BufConn,
        address: &str,
        desc: &RequestDescriptor,
        result: &Result<(), ServeError>,
        transferred: &mut TransferSnapshot,
        started: Instant,
    ) {
        let (read_total, write_total) = conn.stats();
        let read_delta = read_total.saturating_sub(transferred.read);
        let write_delta = write_total.saturating_sub(transferred.written);
        *transferred = TransferSnapshot { read: read_total, written: write_total };

        let code = match desc.be_status_code {
            Some(code) => code.as_str().to_string(),
            None => String::new(),
        };
        let labels = RequestLabels {
            address,
            host: &desc.host_label,
            path: &desc.path_label,
            method: &desc.method,
            backend: &desc.be_name,
            server: &desc.be_server_name,
            code: &code,
        };
        self.metrics.add_transfer(&labels, read_delta, write_delta);

        // A peer that closed while idle left no request to count; its bytes
        // are still accounted above.
        let idle_close =
            matches!(result, Err(ServeError::GracefulTermination)) && desc.header_bytes == 0;
        if idle_close {
            return;
        }

        let error_label = match result {
            Ok(()) => "",
            Err(e) => e.error_label(),
        };
        self.metrics.inc_requests(&labels, error_label);
        if error_label.is_empty() {
            self.metrics.observe_duration(&labels, started.elapsed().as_secs_f64());
        }
    }
}
