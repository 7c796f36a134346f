//! HTTP request handlers for the proxy endpoint.

use axum::{
    extract::Extension,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use percent_encoding::percent_decode_str;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use tile_common::{CorrectorError, CorrectorResult, LayerConfig};

use crate::metrics::Timer;
use crate::state::AppState;

/// Path prefix of proxied tile requests.
pub const PROXY_PREFIX: &str = "/proxy/";

const DEFAULT_CONTENT_TYPE: &str = "image/png";

/// Upstream tile response.
#[derive(Debug, Clone)]
pub struct UpstreamTile {
    pub content_type: Option<String>,
    pub body: Bytes,
}

// ============================================================================
// Proxy
// ============================================================================

/// GET /proxy/{percent-encoded original tile URL}
#[instrument(skip_all, fields(path = %uri.path()))]
pub async fn proxy_handler(Extension(state): Extension<Arc<AppState>>, uri: Uri) -> Response {
    state.metrics.record_request();

    let target = match target_url(&uri) {
        Ok(target) => target,
        Err(e) => {
            state.metrics.record_bad_request();
            debug!(error = %e, "Rejecting proxy request");
            return error_response(&e);
        }
    };

    let upstream = match fetch_upstream(&state.client, &target).await {
        Ok(upstream) => upstream,
        Err(e) => {
            state.metrics.record_upstream_error();
            warn!(url = %target, error = %e, "Upstream fetch failed");
            return error_response(&e);
        }
    };

    let content_type = upstream
        .content_type
        .clone()
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

    let body = match correct_tile(&state, &target, &upstream.body).await {
        Some(corrected) => Bytes::from(corrected),
        None => {
            state.metrics.record_passthrough();
            upstream.body
        }
    };

    tile_response(content_type, body)
}

/// Any other path.
pub async fn not_found_handler(uri: Uri) -> Response {
    (StatusCode::NOT_FOUND, format!("No route for {}", uri.path())).into_response()
}

/// Decode the original tile URL from the request path.
///
/// A query string left unencoded by the client is kept on the target.
pub fn target_url(uri: &Uri) -> CorrectorResult<String> {
    let encoded = uri
        .path()
        .strip_prefix(PROXY_PREFIX)
        .ok_or_else(|| CorrectorError::BadRequest("not a proxy path".to_string()))?;

    let mut target = decode_target(encoded)?;
    if let Some(query) = uri.query() {
        target.push('?');
        target.push_str(query);
    }
    Ok(target)
}

/// Strictly percent-decode an original tile URL.
///
/// Fails on a `%` not followed by two hex digits, on bytes that are not
/// UTF-8, and on anything that is not an absolute http(s) URL.
pub fn decode_target(encoded: &str) -> CorrectorResult<String> {
    let bytes = encoded.as_bytes();
    let mut i = 0;
    while let Some(pos) = bytes[i..].iter().position(|&b| b == b'%') {
        let at = i + pos;
        let valid = bytes
            .get(at + 1..at + 3)
            .map_or(false, |hex| hex.iter().all(u8::is_ascii_hexdigit));
        if !valid {
            return Err(CorrectorError::BadRequest(format!(
                "malformed percent-encoding at byte {}",
                at
            )));
        }
        i = at + 3;
    }

    let decoded = percent_decode_str(encoded)
        .decode_utf8()
        .map_err(|_| CorrectorError::BadRequest("target URL is not valid UTF-8".to_string()))?
        .into_owned();

    if decoded.is_empty() {
        return Err(CorrectorError::BadRequest("empty target URL".to_string()));
    }

    let parsed = reqwest::Url::parse(&decoded)
        .map_err(|e| CorrectorError::BadRequest(format!("invalid target URL: {}", e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(CorrectorError::BadRequest(format!(
            "unsupported scheme '{}'",
            parsed.scheme()
        )));
    }

    Ok(decoded)
}

/// Fetch the original tile. Transport failures, timeouts and non-success
/// statuses are all network errors.
pub async fn fetch_upstream(client: &reqwest::Client, url: &str) -> CorrectorResult<UpstreamTile> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| CorrectorError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(CorrectorError::Network(format!("upstream returned {}", status)));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let body = response
        .bytes()
        .await
        .map_err(|e| CorrectorError::Network(e.to_string()))?;

    Ok(UpstreamTile { content_type, body })
}

/// Draw corrections onto a fetched tile.
///
/// `None` means the original bytes should be served: the URL belongs to no
/// known provider, the zoom is below the provider's start zoom, there is
/// nothing to draw, or something failed along the way.
async fn correct_tile(state: &AppState, target: &str, tile: &Bytes) -> Option<Vec<u8>> {
    let config = state.styles.match_url(target)?;
    let coord = config.extract_coords(target)?;
    if coord.z < config.start_zoom {
        debug!(tile = %coord, config = %config.id, "Below start zoom, passing through");
        return None;
    }

    let (corrections, outcome) = match state.corrector.corrections(coord).await {
        Ok(Some(found)) => found,
        Ok(None) => return None,
        Err(e) => {
            state.metrics.record_render_fallback();
            warn!(tile = %coord, error = %e, "Correction lookup failed, serving original");
            return None;
        }
    };
    state.metrics.record_cache_outcome(outcome);

    let timer = Timer::start();
    let config: LayerConfig = config.clone();
    let image = tile.clone();
    let rendered = tokio::task::spawn_blocking(move || {
        renderer::fix_tile(&image, &config, coord, &corrections)
    })
    .await;

    match rendered {
        Ok(Ok(Some(corrected))) => {
            state.metrics.record_corrected(timer.elapsed_ms());
            debug!(tile = %coord, bytes = corrected.len(), "Served corrected tile");
            Some(corrected)
        }
        Ok(Ok(None)) => None,
        Ok(Err(e)) => {
            state.metrics.record_render_fallback();
            warn!(tile = %coord, error = %e, "Rendering failed, serving original");
            None
        }
        Err(e) => {
            state.metrics.record_render_fallback();
            warn!(tile = %coord, error = %e, "Render task failed, serving original");
            None
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

fn tile_response(content_type: String, body: Bytes) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_LENGTH, body.len().to_string()),
        ],
        body,
    )
        .into_response()
}

fn error_response(err: &CorrectorError) -> Response {
    let status = StatusCode::from_u16(err.http_status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, err.to_string()).into_response()
}
