//! Proxy handler
//!
//! Forwards every request that no other route claims to the upstream API,
//! accounting tokens and cost, writing the audit log and caching successful
//! non-streaming POST responses whose body is JSON.

use crate::api::endpoints::AppState;
use crate::core::cache::cache_key;
use crate::core::constants::{header as proxy_header, message, model as model_const};
use crate::core::upstream::{UpstreamBody, UpstreamError, UpstreamRequest};
use axum::{
    Json,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Errors returned to the client by the proxy handler
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Bad Request: Missing or malformed authorization header")]
    MissingAuthorization,

    #[error("Bad Request: Invalid JSON body")]
    InvalidJson,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match self {
            ProxyError::MissingAuthorization | ProxyError::InvalidJson => {
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
            ProxyError::Upstream(ref e) => {
                let status = match e {
                    UpstreamError::Timeout => StatusCode::GATEWAY_TIMEOUT,
                    _ => StatusCode::BAD_GATEWAY,
                };
                let body = json!({
                    "error": {
                        "message": self.to_string(),
                        "type": "proxy_error",
                    }
                });
                (status, Json(body)).into_response()
            }
            ProxyError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, message::INTERNAL_ERROR).into_response()
            }
        }
    }
}

/// Check the Authorization header carries a bearer token
fn check_authorization(headers: &HeaderMap) -> Result<(), ProxyError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| v.starts_with(proxy_header::BEARER_PREFIX))
        .map(|_| ())
        .ok_or(ProxyError::MissingAuthorization)
}

/// Total tokens reported in a response's `usage` object, or 0
pub fn extract_token_usage(response: &Value) -> u64 {
    response
        .pointer("/usage/total_tokens")
        .and_then(|tokens| {
            tokens
                .as_u64()
                .or_else(|| tokens.as_f64().filter(|t| *t >= 0.0).map(|t| t as u64))
        })
        .unwrap_or(0)
}

/// Prompt text carried by a request body
///
/// Collects the string `content` of every chat message plus a legacy
/// completions `prompt` field.
pub fn extract_prompts(body: &Value) -> Vec<&str> {
    let mut prompts: Vec<&str> = body
        .get("messages")
        .and_then(Value::as_array)
        .map(|messages| {
            messages
                .iter()
                .filter_map(|m| m.get("content").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    if let Some(prompt) = body.get("prompt").and_then(Value::as_str) {
        prompts.push(prompt);
    }
    prompts
}

fn cache_status(value: &'static str) -> (header::HeaderName, HeaderValue) {
    (
        header::HeaderName::from_static(proxy_header::CACHE_STATUS),
        HeaderValue::from_static(value),
    )
}

/// Fallback handler forwarding everything to the upstream API
pub async fn proxy(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let request_id = uuid::Uuid::new_v4();
    let span = info_span!("proxy", %request_id, %method, path = %uri.path());
    forward(state, method, uri, headers, body).instrument(span).await
}

async fn forward(
    state: AppState,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProxyError> {
    check_authorization(&headers)?;

    let request_body: Value = if method == Method::POST {
        serde_json::from_slice(&body).map_err(|_| ProxyError::InvalidJson)?
    } else {
        Value::Null
    };

    let model = request_body
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or(model_const::FALLBACK)
        .to_string();
    let stream = request_body
        .get("stream")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let path = uri.path().to_string();
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| path.clone());

    let key = match state.cache {
        Some(_) if method == Method::POST && !stream => Some(cache_key(
            method.as_str(),
            &path_and_query,
            &request_body,
        )),
        _ => None,
    };

    if let (Some(cache), Some(key)) = (&state.cache, &key) {
        match cache.get(key).await {
            Ok(Some(cached)) if serde_json::from_slice::<Value>(&cached).is_ok() => {
                info!("Cache hit for {} (model={})", path, model);
                state.stats.record_request();
                state.audit.log_request(method.as_str(), &path, &request_body);
                return Ok((
                    StatusCode::OK,
                    [
                        (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
                        cache_status(proxy_header::CACHE_HIT),
                    ],
                    cached,
                )
                    .into_response());
            }
            Ok(Some(_)) => {
                warn!("Discarding unreadable cache entry {}", key);
                if let Err(e) = cache.delete(key).await {
                    warn!("Cache delete failed: {}", e);
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Cache read failed: {}", e),
        }
    }

    info!(
        "Proxying request to {}{}",
        state.upstream.base_url(),
        path_and_query
    );

    let upstream_response = state
        .upstream
        .forward(UpstreamRequest {
            method: method.clone(),
            path_and_query,
            headers,
            body,
            stream,
        })
        .await
        .map_err(|e| {
            error!("Upstream request failed: {}", e);
            ProxyError::from(e)
        })?;

    let status = upstream_response.status;
    let content_type = upstream_response
        .content_type
        .unwrap_or_else(|| HeaderValue::from_static("application/json"));

    let bytes = match upstream_response.body {
        UpstreamBody::Stream(stream) => {
            info!("Streaming response: model={}, status={}", model, status);
            state.stats.record_request();
            state.audit.log_request(method.as_str(), &path, &request_body);
            for prompt in extract_prompts(&request_body) {
                state.audit.log_prompt(prompt);
            }
            return Response::builder()
                .status(status)
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from_stream(stream))
                .map_err(|e| ProxyError::Internal(e.to_string()));
        }
        UpstreamBody::Full(bytes) => bytes,
    };

    let parsed = serde_json::from_slice::<Value>(&bytes).ok();
    let is_json = parsed.is_some();
    let response_body = parsed
        .unwrap_or_else(|| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    let tokens = extract_token_usage(&response_body);
    let cost = state.pricing.calculate_cost(&model, tokens);

    state.stats.record_request();
    state.stats.add_tokens(tokens);
    state.stats.add_cost(cost);

    info!(
        "Model: {} | Tokens Used: {} | Cost: ${:.5} | Response Status: {}",
        model,
        tokens,
        cost,
        status.as_u16()
    );
    debug!("Request body: {}", request_body);
    debug!("Response body: {}", String::from_utf8_lossy(&bytes));

    state.audit.log_request(method.as_str(), &path, &request_body);
    state.audit.log_response(status.as_u16(), &response_body);
    for prompt in extract_prompts(&request_body) {
        state.audit.log_prompt(prompt);
    }
    state.audit.log_cost(&model, tokens, cost);

    if let (Some(cache), Some(key)) = (&state.cache, &key) {
        if status.is_success() && is_json {
            if let Err(e) = cache.set(key, &bytes).await {
                warn!("Cache write failed: {}", e);
            }
        }
    }

    let mut response = (status, [(header::CONTENT_TYPE, content_type)], bytes).into_response();
    if key.is_some() {
        let (name, value) = cache_status(proxy_header::CACHE_MISS);
        response.headers_mut().insert(name, value);
    }
    Ok(response)
}
