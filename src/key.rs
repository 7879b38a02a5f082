use crate::weather::OriginError;

/// Canonical cache form of a location: trimmed and lowercased.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// A location as it arrived on the request, paired with its cache form.
///
/// The normalized form is computed once, here, and used for every store
/// operation. The original is what gets sent to the origin, which may care
/// about case or formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupKey {
    original: String,
    normalized: String,
}

impl LookupKey {
    pub fn parse(raw: &str) -> Result<Self, OriginError> {
        let normalized = normalize(raw);
        if normalized.is_empty() {
            return Err(OriginError::InvalidKey);
        }

        Ok(Self {
            original: raw.to_string(),
            normalized,
        })
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn cache_key(&self) -> &str {
        &self.normalized
    }
}

impl std::fmt::Display for LookupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.normalized)
    }
}
