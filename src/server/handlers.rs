use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::DuplexStream;
use tokio_util::io::ReaderStream;
use tracing::{Instrument, info, info_span, warn};

use crate::archive::path::DOWNLOAD_FALLBACK;
use crate::archive::{ArchiveStreamer, FileDescriptor, sanitize_download_name};
use crate::resolver::FileSetResolver;

/// Body returned when no reference is given
pub const USAGE: &str = "S3 File Zipper. Pass ?ref= to use.";

/// Bytes buffered between the archive writer and the response body.
/// Once full, the writer waits for the client to read.
pub const PIPE_CAPACITY: usize = 64 * 1024;

/// Shared, read-only handles for request handlers
#[derive(Clone)]
pub struct AppState {
    resolver: Arc<dyn FileSetResolver>,
    streamer: Arc<ArchiveStreamer>,
    request_timeout: Option<Duration>,
}

impl AppState {
    pub fn new(resolver: Arc<dyn FileSetResolver>, streamer: ArchiveStreamer) -> Self {
        AppState {
            resolver,
            streamer: Arc::new(streamer),
            request_timeout: None,
        }
    }

    /// Abort archive builds that run longer than `timeout`
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ZipQuery {
    #[serde(rename = "ref")]
    pub reference: Option<String>,
    pub downloadas: Option<String>,
}

/// `GET /?ref=...&downloadas=...`
pub async fn zip_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    Query(query): Query<ZipQuery>,
) -> Response {
    let start = Instant::now();

    let Some(reference) = query.reference.filter(|r| !r.is_empty()) else {
        warn!(%method, %uri, "request without ref");
        return (StatusCode::INTERNAL_SERVER_ERROR, USAGE).into_response();
    };

    let download_name = sanitize_download_name(query.downloadas.as_deref().unwrap_or(""));

    let files = match state.resolver.resolve(&reference).await {
        Ok(files) => files,
        Err(err) => {
            warn!(%method, %uri, error = %err, elapsed = ?start.elapsed(), "file list lookup failed");
            return (StatusCode::FORBIDDEN, err.user_message()).into_response();
        }
    };

    let (sink, body) = tokio::io::duplex(PIPE_CAPACITY);
    let span = info_span!("archive", %method, %uri, files = files.len());
    tokio::spawn(stream_archive(state, files, sink, start).instrument(span));

    let headers = [
        (header::CONTENT_DISPOSITION, content_disposition(&download_name)),
        (header::CONTENT_TYPE, HeaderValue::from_static("application/zip")),
    ];
    (headers, Body::from_stream(ReaderStream::new(body))).into_response()
}

/// Build the archive into the response pipe and log how it ended
async fn stream_archive(
    state: AppState,
    files: Vec<FileDescriptor>,
    mut sink: DuplexStream,
    start: Instant,
) {
    let build = state.streamer.build(&files, &mut sink);
    let outcome = match state.request_timeout {
        Some(limit) => tokio::time::timeout(limit, build).await.ok(),
        None => Some(build.await),
    };

    match outcome {
        Some(Ok(report)) => info!(
            entries = report.entries_written,
            not_found = report.not_found,
            fetch_failed = report.fetch_failed,
            truncated = report.truncated,
            bytes = report.bytes_copied,
            elapsed = ?start.elapsed(),
            "archive complete"
        ),
        Some(Err(err)) => warn!(error = %err, elapsed = ?start.elapsed(), "archive aborted"),
        None => warn!(
            timeout = ?state.request_timeout,
            elapsed = ?start.elapsed(),
            "archive aborted: request deadline exceeded"
        ),
    }
}

fn content_disposition(file_name: &str) -> HeaderValue {
    HeaderValue::from_bytes(format!("attachment; filename=\"{file_name}\"").as_bytes())
        .unwrap_or_else(|_| {
            HeaderValue::from_str(&format!("attachment; filename=\"{DOWNLOAD_FALLBACK}\""))
                .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
        })
}
