use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tokio_util::io::ReaderStream;

use crate::error::{Result, ServerError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VideoQuery {
    pub filename: String,
}

struct ByteRange {
    start: u64,
    end: Option<u64>,
}

/// Parses a single-range `Range: bytes=a-b | a- | -N` header. Multi-range
/// requests are rejected as malformed;
/// callers fall back to a full-body response when no header is present.
fn parse_range(header: &str, total_len: u64) -> Option<ByteRange> {
    let spec = header.strip_prefix("bytes=")?;
    if spec.contains(',') {
        return None;
    }
    let (start_str, end_str) = spec.split_once('-')?;
    if start_str.is_empty() {
        let suffix_len: u64 = end_str.parse().ok()?;
        let start = total_len.saturating_sub(suffix_len);
        return Some(ByteRange { start, end: None });
    }
    let start: u64 = start_str.parse().ok()?;
    let end = if end_str.is_empty() {
        None
    } else {
        Some(end_str.parse().ok()?)
    };
    Some(ByteRange { start, end })
}

/// Serves a transcoded artifact out of the temp directory with HTTP
/// byte-range support. The filename query parameter is
/// reduced to its basename before joining the temp directory, so a
/// traversal attempt like `../../etc/passwd` can only ever resolve inside
/// `temp_dir`.
pub async fn serve_video(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VideoQuery>,
    headers: HeaderMap,
) -> Result<Response> {
    let basename = Path::new(&query.filename)
        .file_name()
        .ok_or_else(|| ServerError::BadRequest("invalid filename".to_string()))?;
    let path: PathBuf = state.temp_dir.join(basename);

    let mut file = File::open(&path)
        .await
        .map_err(|_| ServerError::NotFound(format!("video file not found: {}", query.filename)))?;
    let total_len = file
        .metadata()
        .await
        .map_err(|err| ServerError::Internal(err.into()))?
        .len();

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| parse_range(value, total_len));

    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(mime.as_ref()).unwrap());
    response_headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    response_headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));

    let (status, start, len) = match range {
        Some(range) => {
            let end = range.end.unwrap_or(total_len.saturating_sub(1)).min(total_len.saturating_sub(1));
            if range.start > end || range.start >= total_len {
                return Ok((
                    StatusCode::RANGE_NOT_SATISFIABLE,
                    [(header::CONTENT_RANGE, format!("bytes */{total_len}"))],
                )
                    .into_response());
            }
            let len = end - range.start + 1;
            response_headers.insert(
                header::CONTENT_RANGE,
                HeaderValue::from_str(&format!("bytes {}-{}/{}", range.start, end, total_len)).unwrap(),
            );
            (StatusCode::PARTIAL_CONTENT, range.start, len)
        }
        None => (StatusCode::OK, 0, total_len),
    };

    if start > 0 {
        file.seek(SeekFrom::Start(start))
            .await
            .map_err(|err| ServerError::Internal(err.into()))?;
    }
    response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from_str(&len.to_string()).unwrap());

    let limited = file.take(len);
    let stream = ReaderStream::new(limited);
    let body = Body::from_stream(stream);

    let mut response = Response::builder().status(status).body(body).unwrap();
    response.headers_mut().extend(response_headers);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_bounded_range() {
        let range = parse_range("bytes=100-199", 1000).unwrap();
        assert_eq!(range.start, 100);
        assert_eq!(range.end, Some(199));
    }

    #[test]
    fn parses_an_open_ended_range() {
        let range = parse_range("bytes=500-", 1000).unwrap();
        assert_eq!(range.start, 500);
        assert_eq!(range.end, None);
    }

    #[test]
    fn parses_a_suffix_range() {
        let range = parse_range("bytes=-200", 1000).unwrap();
        assert_eq!(range.start, 800);
        assert_eq!(range.end, None);
    }

    #[test]
    fn rejects_multi_range_requests() {
        assert!(parse_range("bytes=0-10,20-30", 1000).is_none());
    }

    #[test]
    fn rejects_malformed_header() {
        assert!(parse_range("not-a-range", 1000).is_none());
    }
}
