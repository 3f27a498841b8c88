//! Outbound header rewriting.
//!
//! Control headers let the browser side steer the proxy without those
//! headers ever reaching the target: every inbound header whose name starts
//! with [`CONTROL_HEADER_PREFIX`] is consumed here. The only directive
//! currently understood is [`REMOVE_HEADERS_DIRECTIVE`], whose value is a
//! comma-separated list of header names to drop from the outbound request.
//!
//! Header names arrive lowercased from the HTTP stack, so the prefix match
//! is case-insensitive by construction; names inside a remove list are
//! matched case-insensitively by the header map itself.

use axum::http::HeaderMap;

/// Prefix marking a header as addressed to the proxy itself.
pub const CONTROL_HEADER_PREFIX: &str = "x-corsgate-";

/// Control directive listing header names to drop from the outbound request.
pub const REMOVE_HEADERS_DIRECTIVE: &str = "removeheaders";

/// Headers the outbound HTTP stack sets itself for the rewritten request.
const HOP_MANAGED: [&str; 2] = ["host", "content-length"];

/// Build the outbound header map for a relayed request.
///
/// Non-control headers are copied verbatim, including repeated values.
#[must_use]
pub fn rewrite_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut outbound = HeaderMap::new();
    let mut remove_lists: Vec<String> = Vec::new();

    for (name, value) in inbound {
        let name_str = name.as_str();
        if HOP_MANAGED.contains(&name_str) {
            continue;
        }
        if let Some(directive) = name_str.strip_prefix(CONTROL_HEADER_PREFIX) {
            if directive == REMOVE_HEADERS_DIRECTIVE {
                if let Ok(list) = value.to_str() {
                    remove_lists.push(list.to_owned());
                }
            }
            // Unknown directives are consumed and ignored.
            continue;
        }
        outbound.append(name.clone(), value.clone());
    }

    for list in &remove_lists {
        for target in list.split(',') {
            let target = target.trim();
            if !target.is_empty() {
                outbound.remove(target);
            }
        }
    }

    outbound
}
