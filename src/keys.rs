//! Storage key codec for the shared document bucket.
//!
//! Every object the application ever writes or reads lives under a key of the
//! canonical shape:
//!
//! ```text
//! tenants/{tenant_id}/documents/{stage}/{document_id}/{filename}
//! ```
//!
//! This module is the only place allowed to construct or deconstruct such a
//! key. Everything else goes through the typed accessors here, so the format
//! cannot drift between call sites.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;

use crate::errors::ApiError;

/// Pipeline stage a stored object belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Raw,
    Extracted,
    Chunks,
    Embeddings,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Raw => "raw",
            Stage::Extracted => "extracted",
            Stage::Chunks => "chunks",
            Stage::Embeddings => "embeddings",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Stage::Raw),
            "extracted" => Ok(Stage::Extracted),
            "chunks" => Ok(Stage::Chunks),
            "embeddings" => Ok(Stage::Embeddings),
            other => Err(ApiError::InvalidParameter(format!(
                "unknown storage stage: {}",
                other
            ))),
        }
    }
}

/// Strip everything but alphanumerics, hyphens and underscores from an
/// identifier segment. Returns `None` when nothing survives.
pub fn sanitize_identifier(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Sanitize a caller-supplied filename for use as the final key segment.
///
/// Traversal sequences and null bytes are stripped before the name is split
/// into base and extension; the base keeps `[A-Za-z0-9 _-]`, the extension
/// keeps `[A-Za-z0-9.]`.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let mut cleaned = raw.replace('\0', "");
    while cleaned.contains("../") || cleaned.contains("..\\") {
        cleaned = cleaned.replace("../", "").replace("..\\", "");
    }
    // Whatever path remains, only the last component is a filename
    let cleaned = cleaned
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .to_string();

    let (base, ext) = match cleaned.rfind('.') {
        Some(idx) if idx > 0 => (&cleaned[..idx], &cleaned[idx + 1..]),
        _ => (cleaned.as_str(), ""),
    };

    let base: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect();
    let ext: String = ext
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.')
        .collect();

    let base = base.trim().to_string();
    if base.is_empty() {
        return None;
    }
    if ext.is_empty() {
        Some(base)
    } else {
        Some(format!("{}.{}", base, ext))
    }
}

/// Build the canonical storage key for a document artifact.
///
/// All three identifier components are sanitized; an empty component after
/// sanitization is rejected rather than silently producing a shorter key.
pub fn build_key(
    tenant_id: &str,
    document_id: &str,
    filename: &str,
    stage: Stage,
) -> Result<String, ApiError> {
    let tenant = sanitize_identifier(tenant_id)
        .ok_or_else(|| ApiError::InvalidParameter("tenant id is empty after sanitization".into()))?;
    let document = sanitize_identifier(document_id).ok_or_else(|| {
        ApiError::InvalidParameter("document id is empty after sanitization".into())
    })?;
    let name = sanitize_filename(filename)
        .ok_or_else(|| ApiError::InvalidParameter("filename is empty after sanitization".into()))?;

    Ok(format!(
        "tenants/{}/documents/{}/{}/{}",
        tenant, stage, document, name
    ))
}

/// Key for the extracted-text artifact of a document.
pub fn extracted_text_key(tenant_id: &str, document_id: &str) -> Result<String, ApiError> {
    build_key(
        tenant_id,
        document_id,
        &format!("{}.txt", document_id),
        Stage::Extracted,
    )
}

/// Key for a chunk artifact. Embeds a generation timestamp, so repeated
/// calls intentionally produce distinct keys.
pub fn chunk_artifact_key(tenant_id: &str, document_id: &str) -> Result<String, ApiError> {
    build_key(
        tenant_id,
        document_id,
        &format!("chunk_{}.json", Utc::now().timestamp_millis()),
        Stage::Chunks,
    )
}

/// The listing prefix covering one stage of one tenant's documents.
pub fn stage_prefix(tenant_id: &str, stage: Stage) -> Result<String, ApiError> {
    let tenant = sanitize_identifier(tenant_id)
        .ok_or_else(|| ApiError::InvalidParameter("tenant id is empty after sanitization".into()))?;
    Ok(format!("tenants/{}/documents/{}/", tenant, stage))
}

/// The prefix covering everything a tenant has ever stored.
pub fn tenant_prefix(tenant_id: &str) -> Result<String, ApiError> {
    let tenant = sanitize_identifier(tenant_id)
        .ok_or_else(|| ApiError::InvalidParameter("tenant id is empty after sanitization".into()))?;
    Ok(format!("tenants/{}/", tenant))
}

/// Pull the tenant segment out of a key, if the key has the canonical
/// `tenants/{id}/...` front.
pub fn extract_tenant_id(key: &str) -> Option<&str> {
    let mut parts = key.split('/');
    match (parts.next(), parts.next()) {
        (Some("tenants"), Some(id)) if !id.is_empty() => Some(id),
        _ => None,
    }
}

/// Parse the stage segment (4th path component) out of a key.
pub fn parse_stage(key: &str) -> Result<Stage, ApiError> {
    let parts: Vec<&str> = key.split('/').collect();
    if parts.len() < 4 {
        return Err(ApiError::InvalidParameter(format!(
            "storage key has too few segments: {}",
            key
        )));
    }
    parts[3].parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_key_canonical_shape() {
        let key = build_key("t_123", "doc_456", "report.pdf", Stage::Raw).unwrap();
        assert_eq!(key, "tenants/t_123/documents/raw/doc_456/report.pdf");
    }

    #[test]
    fn test_build_key_strips_traversal() {
        let key = build_key("t_1", "doc_1", "../../secret.pdf", Stage::Raw).unwrap();
        assert!(!key.contains(".."));
        assert!(key.starts_with("tenants/t_1/documents/raw/"));
        assert!(key.ends_with("/secret.pdf"));
    }

    #[test]
    fn test_build_key_rejects_symbolic_tenant() {
        let result = build_key("???", "doc_1", "a.pdf", Stage::Raw);
        assert!(matches!(result, Err(ApiError::InvalidParameter(_))));
    }

    #[test]
    fn test_build_key_rejects_empty_filename() {
        assert!(build_key("t_1", "doc_1", "../..", Stage::Raw).is_err());
        assert!(build_key("t_1", "doc_1", "", Stage::Raw).is_err());
    }

    #[test]
    fn test_build_key_deterministic() {
        let a = build_key("t_1", "d_1", "file one.txt", Stage::Extracted).unwrap();
        let b = build_key("t_1", "d_1", "file one.txt", Stage::Extracted).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_extract_tenant_id() {
        assert_eq!(
            extract_tenant_id("tenants/t_9/documents/raw/d/f.pdf"),
            Some("t_9")
        );
        assert_eq!(extract_tenant_id("thumbnails/t_9/x.jpg"), None);
        assert_eq!(extract_tenant_id("tenants//documents/raw/d/f.pdf"), None);
        assert_eq!(extract_tenant_id(""), None);
    }

    #[test]
    fn test_parse_stage() {
        let stage = parse_stage("tenants/t_1/documents/embeddings/d/e.json").unwrap();
        assert_eq!(stage, Stage::Embeddings);
        assert!(parse_stage("invalid/key/format").is_err());
        assert!(parse_stage("tenants/t_1/documents/thumbnails/d/x.jpg").is_err());
    }

    #[test]
    fn test_sanitize_filename_allows_common_names() {
        assert_eq!(
            sanitize_filename("my-file_2023 final.docx").as_deref(),
            Some("my-file_2023 final.docx")
        );
        assert_eq!(sanitize_filename("report.pdf").as_deref(), Some("report.pdf"));
    }

    #[test]
    fn test_sanitize_filename_strips_null_bytes() {
        assert_eq!(sanitize_filename("rep\0ort.pdf").as_deref(), Some("report.pdf"));
    }
}
