use actix_web::HttpRequest;

/// Proxy headers consulted in priority order.
pub const FORWARDED_HEADERS: [&str; 4] = [
    "cf-connecting-ip",
    "x-forwarded-for",
    "x-real-ip",
    "x-client-ip",
];

/// Extract the client's IP address from the request.
/// With `trust_proxy_headers`, the first non-empty forwarding header wins and
/// only its first comma-separated entry is used.
pub fn get_client_ip(req: &HttpRequest, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        for name in FORWARDED_HEADERS {
            let Some(value) = req.headers().get(name).and_then(|v| v.to_str().ok()) else {
                continue;
            };
            let first = value.split(',').next().unwrap_or("").trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
