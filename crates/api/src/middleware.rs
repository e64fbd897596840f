use std::time::Instant;

use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::info;

use siteledger_core::{Actor, UserId};

use crate::context::CallerContext;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";

/// Attach the caller identity supplied by the upstream identity layer.
///
/// Requests without a parseable `x-user-id` and a non-empty `x-user-name`
/// are rejected with 401.
pub async fn identity_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let actor = extract_actor(req.headers())?;
    req.extensions_mut().insert(CallerContext::new(actor));
    Ok(next.run(req).await)
}

fn extract_actor(headers: &HeaderMap) -> Result<Actor, StatusCode> {
    let id = header_str(headers, USER_ID_HEADER)?
        .parse::<UserId>()
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let name = header_str(headers, USER_NAME_HEADER)?;

    Ok(Actor::new(id, name))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, StatusCode> {
    let value = headers
        .get(name)
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_str()
        .map_err(|_| StatusCode::UNAUTHORIZED)?
        .trim();

    if value.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(value)
}

/// One log line per request.
pub async fn trace_requests(req: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let res = next.run(req).await;

    info!(
        method = %method,
        path = %path,
        status = res.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request handled"
    );
    res
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(id: Option<&str>, name: Option<&str>) -> HeaderMap {
        let mut h = HeaderMap::new();
        if let Some(id) = id {
            h.insert(USER_ID_HEADER, HeaderValue::from_str(id).unwrap());
        }
        if let Some(name) = name {
            h.insert(USER_NAME_HEADER, HeaderValue::from_str(name).unwrap());
        }
        h
    }

    #[test]
    fn extracts_actor_from_headers() {
        let id = UserId::new();
        let actor = extract_actor(&headers(Some(&id.to_string()), Some(" Site Engineer "))).unwrap();
        assert_eq!(actor.id, id);
        assert_eq!(actor.name, "Site Engineer");
    }

    #[test]
    fn missing_or_malformed_identity_is_unauthorized() {
        let id = UserId::new().to_string();
        for h in [
            headers(None, Some("someone")),
            headers(Some(&id), None),
            headers(Some(&id), Some("   ")),
            headers(Some("not-a-uuid"), Some("someone")),
        ] {
            assert_eq!(extract_actor(&h), Err(StatusCode::UNAUTHORIZED));
        }
    }
}
