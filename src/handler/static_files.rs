//! Static file serving module
//!
//! Turns a routed asset into a response: conditional checks, byte ranges,
//! headers, and a streamed body that owns the open file handle.

use crate::assets::{AssetStore, ResolvedAsset, Resolution};
use crate::config::AppState;
use crate::error::ServeError;
use crate::handler::router::RequestContext;
use crate::http::cache::{self, CachePolicy};
use crate::http::range::{ByteRange, RangeParseResult};
use crate::http::response::{empty, ResponseBody};
use crate::http::{self, parse_range_header};
use crate::logger;
use futures::TryStreamExt;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use hyper::header::{
    ACCEPT_RANGES, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG,
    LAST_MODIFIED,
};
use hyper::{Response, StatusCode};
use std::io::SeekFrom;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

/// Read buffer size for streamed bodies
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Response extension marking a fallback document answer
#[derive(Debug, Clone, Copy)]
pub struct FallbackServed;

/// Serve the asset a request path routes to
pub async fn serve(ctx: &RequestContext<'_>, state: &AppState) -> Response<ResponseBody> {
    let resolution = match state.router.route(ctx.path).await {
        Ok(resolution) => resolution,
        Err(e) => return error_response(ctx.path, &e),
    };

    let asset = match &resolution {
        Resolution::Hit(asset) | Resolution::Fallback(asset) => asset,
        Resolution::Redirect(location) => return redirect_response(location, ctx.query),
    };

    let policy = state
        .router
        .cache_policy(&resolution, state.config.http.cache_max_age);

    let mut response = match serve_asset(ctx, asset, policy, state.router.store()).await {
        Ok(response) => response,
        Err(e) => return error_response(ctx.path, &e),
    };

    if resolution.is_fallback() {
        response.extensions_mut().insert(FallbackServed);
    }
    response
}

/// Permanent redirect to the slash-terminated directory, keeping the query
fn redirect_response(location: &str, query: Option<&str>) -> Response<ResponseBody> {
    match query {
        Some(query) => http::build_301_response(&format!("{location}?{query}")),
        None => http::build_301_response(location),
    }
}

/// Map a per-request error onto a generic status response
fn error_response(path: &str, err: &ServeError) -> Response<ResponseBody> {
    match err {
        ServeError::NotFound => http::build_404_response(),
        ServeError::TraversalRejected => {
            logger::log_warning(&format!("Rejected path outside asset root: {path}"));
            http::build_404_response()
        }
        ServeError::MalformedPath => http::build_400_response(),
        ServeError::Io { .. } => {
            logger::log_error(&format!("Failed to serve {path}: {err}"));
            http::build_500_response()
        }
    }
}

async fn serve_asset(
    ctx: &RequestContext<'_>,
    asset: &ResolvedAsset,
    policy: CachePolicy,
    store: &AssetStore,
) -> Result<Response<ResponseBody>, ServeError> {
    let etag = cache::generate_etag(asset.len, asset.modified);
    let cache_control = policy.to_header_value();

    // If-None-Match takes precedence over If-Modified-Since
    let not_modified = match ctx.if_none_match {
        Some(_) => cache::check_etag_match(ctx.if_none_match, &etag),
        None => cache::not_modified_since(ctx.if_modified_since, asset.modified),
    };
    if not_modified {
        return Ok(http::build_304_response(&etag, &cache_control));
    }

    let range = match parse_range_header(ctx.range_header, asset.len) {
        RangeParseResult::Valid(range) => Some(range),
        RangeParseResult::NotSatisfiable => return Ok(http::build_416_response(asset.len)),
        RangeParseResult::None => None,
    };

    // HEAD opens the file too so it fails exactly where GET would
    let body = if ctx.is_head {
        drop(store.open(asset).await?);
        empty()
    } else {
        stream_body(store, asset, range).await?
    };

    let mut builder = Response::builder()
        .status(if range.is_some() {
            StatusCode::PARTIAL_CONTENT
        } else {
            StatusCode::OK
        })
        .header(CONTENT_TYPE, asset.content_type)
        .header(CONTENT_LENGTH, range.map_or(asset.len, |r| r.len()))
        .header(ACCEPT_RANGES, "bytes")
        .header(ETAG, &etag)
        .header(CACHE_CONTROL, cache_control);

    if let Some(modified) = asset.modified {
        builder = builder.header(LAST_MODIFIED, cache::format_http_date(modified));
    }
    if let Some(range) = range {
        builder = builder.header(CONTENT_RANGE, range.content_range(asset.len));
    }

    Ok(builder.body(body).unwrap_or_else(|e| {
        logger::log_error(&format!("Failed to build asset response: {e}"));
        http::build_500_response()
    }))
}

/// Open the asset and wrap it in a streaming body
///
/// The file handle lives inside the body: it is closed when the body is
/// fully sent, fails, or is dropped because the client went away.
async fn stream_body(
    store: &AssetStore,
    asset: &ResolvedAsset,
    range: Option<ByteRange>,
) -> Result<ResponseBody, ServeError> {
    let mut file = store.open(asset).await?;

    let (start, len) = range.map_or((0, asset.len), |r| (r.start, r.len()));
    if start > 0 {
        file.seek(SeekFrom::Start(start))
            .await
            .map_err(|e| ServeError::from_io(&asset.path, e))?;
    }

    let stream = ReaderStream::with_capacity(file.take(len), STREAM_CHUNK_SIZE);
    Ok(StreamBody::new(stream.map_ok(Frame::data)).boxed_unsync())
}
