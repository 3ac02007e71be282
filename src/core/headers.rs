//! Header reconciliation between client, gateway and backend.
//!
//! Two directions with deliberately different rules. Outgoing request
//! overrides replace whole value lists. Incoming response reconciliation
//! lets the backend win everywhere except the gateway's own CORS decision
//! headers, which backends must not override.
use std::collections::HashMap;

use hyper::{
    HeaderMap,
    header::{self, HeaderName, HeaderValue},
};

/// CORS decision headers owned by the gateway. A backend copy of one of
/// these is dropped when the client-facing set already carries it.
const PROTECTED_RESPONSE_HEADERS: [HeaderName; 4] = [
    header::ACCESS_CONTROL_ALLOW_ORIGIN,
    header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
    header::ACCESS_CONTROL_ALLOW_HEADERS,
    header::ACCESS_CONTROL_MAX_AGE,
];

fn is_protected(name: &HeaderName) -> bool {
    PROTECTED_RESPONSE_HEADERS.contains(name)
}

/// Apply configured overrides to the outgoing request header set.
///
/// Replace-not-merge: an override replaces the entire value list of its
/// name, absent names are appended. Unparsable pairs are skipped with a
/// warning.
pub fn apply_overrides(headers: &mut HeaderMap, overrides: &HashMap<String, String>) {
    for (name, value) in overrides {
        if let (Ok(header_name), Ok(header_value)) =
            (name.parse::<HeaderName>(), HeaderValue::from_str(value))
        {
            headers.insert(header_name, header_value);
        } else {
            tracing::warn!("Invalid header override: {} = {}", name, value);
        }
    }
}

/// Merge backend response headers into the client-facing set.
///
/// For each backend header name: absent on the client side it is copied
/// with all its values, present and protected it is skipped, present and
/// unprotected the backend's values overwrite the client's. Name matching
/// is case-insensitive through `HeaderName`.
pub fn reconcile_response(client: &mut HeaderMap, backend: &HeaderMap) {
    for name in backend.keys() {
        if client.contains_key(name) && is_protected(name) {
            continue;
        }

        client.remove(name);
        for value in backend.get_all(name) {
            client.append(name.clone(), value.clone());
        }
    }
}
