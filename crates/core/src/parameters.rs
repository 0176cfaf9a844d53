//! Request parameter identifiers.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Parameters id used for tiles requested without parameters.
pub const DEFAULT_PARAMETERS_ID: &str = "default";

/// Derive the identifier of a parameter set.
///
/// Pairs are hashed in key order as `k1=v1&k2=v2`, so the id does not depend
/// on the order the request supplied them in. Returns `None` for an empty set.
pub fn parameters_id(parameters: &BTreeMap<String, String>) -> Option<String> {
    if parameters.is_empty() {
        return None;
    }

    let canonical = parameters
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    Some(digest.iter().map(|b| format!("{b:02x}")).collect())
}

/// Resolve the id a tile is stored under: the explicit id, else the derived one,
/// else [`DEFAULT_PARAMETERS_ID`].
pub fn resolve_parameters_id(
    explicit: Option<&str>,
    parameters: &BTreeMap<String, String>,
) -> String {
    match explicit {
        Some(id) => id.to_string(),
        None => parameters_id(parameters).unwrap_or_else(|| DEFAULT_PARAMETERS_ID.to_string()),
    }
}
