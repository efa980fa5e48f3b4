//! Shared test helper macro for setting tenant headers quickly.
//! Usage: test_request_headers!(req, tenant="<uuid>", user="<uuid>");
#[macro_export]
macro_rules! test_request_headers {
    ($req:expr, tenant=$tenant:expr, user=$user:expr) => {{
        let h = $req.headers_mut();
        h.insert("X-Tenant-ID", ::axum::http::HeaderValue::from_str($tenant).unwrap());
        h.insert("X-User-ID", ::axum::http::HeaderValue::from_str($user).unwrap());
    }};
    ($req:expr, tenant=$tenant:expr) => {{
        let h = $req.headers_mut();
        h.insert("X-Tenant-ID", ::axum::http::HeaderValue::from_str($tenant).unwrap());
    }};
}
