use std::io;

use ahash::AHashMap;

use crate::error::HttpError;
use crate::frontend::conn::BufConn;

/// Hard cap on one request's header block, status line included.
const MAX_HEADER_BYTES: usize = 64 * 1024;

pub(crate) const HTTP_BAD_REQUEST: &[u8] =
    b"HTTP/1.1 400 Bad Request\r\nConnection: close\r\nContent-Length: 0\r\n\r\n";
pub(crate) const HTTP_FORBIDDEN: &[u8] =
    b"HTTP/1.1 403 Forbidden\r\nConnection: close\r\nContent-Length: 0\r\n\r\n";

/// A parsed request header block: the status line plus the header fields
/// with lowercased names.
pub(crate) struct HttpHeader {
    pub status_line: String,
    pub fields: AHashMap<String, String>,
}

/// Split one HTTP/1.x header block off the connection.
///
/// Returns the bytes this request consumed alongside the parse result. Zero
/// bytes with an error means the peer closed while the connection was idle;
/// partial bytes left buffered by a failed read are counted but not parsed.
pub(crate) async fn split_http_header(conn: &mut BufConn) -> (usize, io::Result<HttpHeader>) {
    let mut consumed = 0;
    let mut status_line = String::new();
    let mut fields = AHashMap::new();

    loop {
        if consumed >= MAX_HEADER_BYTES {
            let err = io::Error::new(io::ErrorKind::InvalidData, "header block exceeds limit");
            return (consumed, Err(err));
        }
        let line = match conn.read_line(MAX_HEADER_BYTES - consumed).await {
            Ok(line) => line,
            Err(e) => return (consumed + conn.buffered(), Err(e)),
        };
        consumed += line.len();

        let text = trim_line(&line);
        if consumed == line.len() {
            // First line; an empty one is left for the status-line parser
            // to reject.
            status_line = text.to_string();
            continue;
        }
        if text.is_empty() {
            return (consumed, Ok(HttpHeader { status_line, fields }));
        }
        match text.split_once(':') {
            Some((name, value)) => {
                fields.insert(name.trim().to_lowercase(), value.trim().to_string());
            }
            None => {
                let err = io::Error::new(io::ErrorKind::InvalidData, "malformed header field");
                return (consumed, Err(err));
            }
        }
    }
}

fn trim_line(line: &[u8]) -> std::borrow::Cow<'_, str> {
    let mut end = line.len();
    while end > 0 && (line[end - 1] == b'\n' || line[end - 1] == b'\r') {
        end -= 1;
    }
    String::from_utf8_lossy(&line[..end])
}

/// The three parts of a request line, method and version uppercased.
pub(crate) struct StatusLine {
    pub method: String,
    pub uri: String,
    pub version: String,
}

/// Parse `METHOD URI VERSION`. Only HTTP/1.0 and HTTP/1.1 are accepted.
pub(crate) fn parse_status_line(line: &str) -> Result<StatusLine, HttpError> {
    let mut parts = line.splitn(3, ' ');
    let (Some(method), Some(uri), Some(version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(HttpError::protocol(
            "parse status line",
            format!("malformed status line {line:?}"),
        ));
    };
    let version = version.to_uppercase();
    if version != "HTTP/1.0" && version != "HTTP/1.1" {
        return Err(HttpError::protocol(
            "parse status line",
            format!("unsupported version {version:?}"),
        ));
    }
    Ok(StatusLine { method: method.to_uppercase(), uri: uri.to_string(), version })
}

/// Derive the routing path from a request URI by dropping the query and
/// fragment parts.
pub(crate) fn uri_to_path(uri: &str) -> &str {
    let end = uri.find(['?', '#']).unwrap_or(uri.len());
    &uri[..end]
}
