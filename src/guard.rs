//! Tenant isolation guard.
//!
//! The shared bucket has no native per-tenant partition, so every read,
//! write, list and delete must prove that the key it is about to touch
//! belongs to the calling tenant. These checks are pure string functions
//! with no I/O; the enforcement points are the call sites in the upload,
//! download, ingestion and deletion paths, all of which go through
//! [`guard`] or [`filter_valid`] before issuing a backend call.
//!
//! Predicates (`validate*`) return booleans so callers can choose skip
//! semantics; [`guard`] is the throwing variant for fail-closed paths.

use tracing::warn;

use crate::errors::ApiError;
use crate::keys;

/// Strip disallowed characters from a tenant identifier. `None` when nothing
/// survives, which callers must treat as a hard parameter error rather than
/// falling back to any shared path.
pub fn sanitize_tenant_id(raw: &str) -> Option<String> {
    keys::sanitize_identifier(raw)
}

/// Strip control characters and traversal sequences from a key. Never fails;
/// an empty result is simply a key no validator will accept.
pub fn sanitize_key(raw: &str) -> String {
    let mut cleaned: String = raw.chars().filter(|c| !c.is_control()).collect();
    while cleaned.contains("../") || cleaned.contains("..\\") {
        cleaned = cleaned.replace("../", "").replace("..\\", "");
    }
    cleaned
}

/// True iff the sanitized key sits under the sanitized tenant's prefix.
pub fn validate_ownership(key: &str, tenant_id: &str) -> bool {
    let tenant = match sanitize_tenant_id(tenant_id) {
        Some(t) => t,
        None => return false,
    };
    sanitize_key(key).starts_with(&format!("tenants/{}/", tenant))
}

/// True iff the key has the canonical anchors: at least four segments, with
/// `tenants` first and `documents` third.
pub fn validate_structure(key: &str) -> bool {
    let sanitized = sanitize_key(key);
    let parts: Vec<&str> = sanitized.split('/').collect();
    parts.len() >= 4 && parts[0] == "tenants" && parts[2] == "documents"
}

/// Combined ownership and structure check.
pub fn validate(key: &str, tenant_id: &str) -> bool {
    validate_ownership(key, tenant_id) && validate_structure(key)
}

/// Fail-closed variant of [`validate`]: rejects with `UnauthorizedAccess` and
/// leaves a security-audit trail naming the operation that was denied.
pub fn guard(key: &str, tenant_id: &str, operation: &str) -> Result<(), ApiError> {
    if validate(key, tenant_id) {
        Ok(())
    } else {
        warn!(
            operation = operation,
            key = key,
            tenant_id = tenant_id,
            "tenant isolation violation blocked"
        );
        Err(ApiError::UnauthorizedAccess)
    }
}

/// Keep only the keys that validate for the tenant. Applied before every
/// batch operation so a corrupted or foreign key can never ride along in a
/// bulk request.
pub fn filter_valid(keys: &[String], tenant_id: &str) -> Vec<String> {
    keys.iter()
        .filter(|k| validate(k, tenant_id))
        .cloned()
        .collect()
}

/// Tenant segment of a key, if it has one. Delegates to the key codec.
pub fn extract_tenant_id(key: &str) -> Option<&str> {
    keys::extract_tenant_id(key)
}
