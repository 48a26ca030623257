use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use arledger_core::TenantId;

use crate::app::errors::json_error;
use crate::context::TenantContext;

/// Header carrying the caller's tenant. Authentication happens upstream.
pub const TENANT_HEADER: &str = "x-tenant-id";

pub async fn tenant_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let tenant_id = match extract_tenant(req.headers()) {
        Ok(tenant_id) => tenant_id,
        Err(message) => return json_error(StatusCode::BAD_REQUEST, "missing_tenant", message),
    };

    req.extensions_mut().insert(TenantContext::new(tenant_id));
    next.run(req).await
}

fn extract_tenant(headers: &HeaderMap) -> Result<TenantId, &'static str> {
    let header = headers
        .get(TENANT_HEADER)
        .ok_or("x-tenant-id header is required")?;

    let raw = header.to_str().map_err(|_| "x-tenant-id must be ASCII")?;
    if raw.trim().is_empty() {
        return Err("x-tenant-id header is required");
    }

    raw.parse().map_err(|_| "x-tenant-id must be a UUID")
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn tenant_header_is_parsed() {
        let tenant = TenantId::new();
        let mut headers = HeaderMap::new();
        headers.insert(TENANT_HEADER, HeaderValue::from_str(&tenant.to_string()).unwrap());
        assert_eq!(extract_tenant(&headers), Ok(tenant));
    }

    #[test]
    fn missing_or_malformed_tenant_is_rejected() {
        assert!(extract_tenant(&HeaderMap::new()).is_err());

        let mut headers = HeaderMap::new();
        headers.insert(TENANT_HEADER, HeaderValue::from_static("acme"));
        assert_eq!(extract_tenant(&headers), Err("x-tenant-id must be a UUID"));
    }
}
