//! HTTP front end
//!
//! `sonal-aura serve` → one-file-per-request analysis over HTTP
//!
//! ```text
//! Route          | Body              | Response
//! ---------------|-------------------|------------------------------------
//! GET  /         | -                 | 200 welcome message
//! POST /analyze  | raw audio bytes   | 200 report, 400/413/422/500 error
//! anything else  | -                 | 404
//! ```
//!
//! Uploads must carry an `audio/*` Content-Type. The original file name can
//! be passed as `?filename=track.flac`; its extension is used as a decoder
//! hint. Error bodies are `{"error": "<message>"}`.

use crate::error::{Error, ResourceError};
use crate::Analyzer;
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tiny_http::{Header, Method, Request, Response, Server};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 200;

const WELCOME: &str = "Welcome to the Sonal Aura API! POST audio to /analyze.";
const UPLOAD_PREFIX: &str = "sonal-aura-upload-";

/// Where to listen, how much to accept and where uploads are staged.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: u64,
    /// Staging directory for uploads (system temp dir when `None`).
    pub upload_dir: Option<PathBuf>,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            upload_dir: None,
        }
    }
}

#[derive(Serialize)]
struct MessageBody<'a> {
    message: &'a str,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize, Debug, Default)]
struct UploadParams {
    filename: Option<String>,
}

/// Status and JSON body of a response.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self { status, body },
            Err(e) => Self::error(500, format!("cannot serialize response: {}", e)),
        }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        let body = ErrorBody { error: message.into() };
        Self {
            status,
            body: serde_json::to_string(&body).unwrap_or_else(|_| "{}".to_string()),
        }
    }
}

/// Start the server and handle requests until the process exits.
pub fn start(config: ServeConfig, analyzer: Analyzer) -> io::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let server = Server::http(&addr).map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    log::info!("listening on http://{}", addr);

    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, &analyzer, &config) {
            log::error!("failed to respond: {}", e);
        }
    }

    Ok(())
}

fn handle_request(mut request: Request, analyzer: &Analyzer, config: &ServeConfig) -> io::Result<()> {
    let method = request.method().clone();
    let url = request.url().to_string();
    let content_type = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Content-Type"))
        .map(|h| h.value.as_str().to_string());

    // Reject oversized uploads on the declared length before reading anything.
    let reply = match request.body_length() {
        Some(len) if len as u64 > config.max_upload_bytes && method == Method::Post => {
            too_large(config.max_upload_bytes)
        }
        _ => dispatch(
            analyzer,
            config,
            &method,
            &url,
            content_type.as_deref(),
            request.as_reader(),
        ),
    };

    log::info!("{} {} → {}", method, url, reply.status);

    let mut response = Response::from_string(reply.body).with_status_code(reply.status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        response = response.with_header(header);
    }
    request.respond(response)
}

/// Route one request. `body` is only read for uploads.
pub fn dispatch(
    analyzer: &Analyzer,
    config: &ServeConfig,
    method: &Method,
    url: &str,
    content_type: Option<&str>,
    body: &mut dyn Read,
) -> Reply {
    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, query),
        None => (url, ""),
    };

    match (method, path) {
        (&Method::Get, "/") => Reply::json(200, &MessageBody { message: WELCOME }),
        (&Method::Post, "/analyze") => {
            let params: UploadParams = serde_urlencoded::from_str(query).unwrap_or_default();
            analyze_upload(analyzer, config, content_type, params.filename.as_deref(), body)
        }
        _ => Reply::error(404, "Not found"),
    }
}

fn too_large(max_upload_bytes: u64) -> Reply {
    Reply::error(
        413,
        format!("File too large. Maximum upload size is {} bytes.", max_upload_bytes),
    )
}

fn analyze_upload(
    analyzer: &Analyzer,
    config: &ServeConfig,
    content_type: Option<&str>,
    filename: Option<&str>,
    body: &mut dyn Read,
) -> Reply {
    let max_upload_bytes = config.max_upload_bytes;
    let content_type = content_type.unwrap_or("none");
    if !content_type.starts_with("audio/") {
        return Reply::error(
            400,
            format!("Invalid file type. Please upload an audio file. Got {}.", content_type),
        );
    }

    let mut data = Vec::new();
    if let Err(e) = body.take(max_upload_bytes + 1).read_to_end(&mut data) {
        return Reply::error(400, format!("Could not read upload: {}", e));
    }
    if data.len() as u64 > max_upload_bytes {
        return too_large(max_upload_bytes);
    }
    if data.is_empty() {
        return Reply::error(400, "Empty upload. Please send the audio file as the request body.");
    }

    let extension = filename.and_then(upload_extension);
    log::info!(
        "analyzing upload {} ({} bytes)",
        filename.unwrap_or("<unnamed>"),
        data.len()
    );

    match stage_and_analyze(analyzer, config.upload_dir.as_deref(), &data, extension.as_deref()) {
        Ok(report) => Reply::json(200, &report),
        Err(e) => {
            let status = if e.is_input_error() { 422 } else { 500 };
            log::warn!("analysis failed ({}): {}", status, e);
            Reply::error(status, e.to_string())
        }
    }
}

/// Write the upload to a temporary file and analyze it from there.
fn stage_and_analyze(
    analyzer: &Analyzer,
    upload_dir: Option<&Path>,
    data: &[u8],
    extension: Option<&str>,
) -> crate::Result<crate::AnalysisReport> {
    let suffix = extension.map(|ext| format!(".{}", ext)).unwrap_or_default();
    let mut builder = tempfile::Builder::new();
    builder.prefix(UPLOAD_PREFIX).suffix(&suffix);

    let mut staged = match upload_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(ResourceError::Acquire)?;

    staged
        .write_all(data)
        .and_then(|_| staged.flush())
        .map_err(ResourceError::Acquire)?;

    // On error the staged file is dropped, which removes it.
    let report = analyzer.analyze(staged.path())?;
    staged.close().map_err(|e| Error::Resource(ResourceError::Release(e)))?;

    Ok(report)
}

/// Lower-cased alphanumeric extension of an uploaded file name.
fn upload_extension(filename: &str) -> Option<String> {
    let ext = Path::new(filename).extension()?.to_str()?;
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
