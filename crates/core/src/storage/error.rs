use std::fmt;

/// Carries the raw upstream body so callers can log or persist it.
#[derive(Debug, Clone)]
pub struct StoreDiagnosticsError {
    pub backend: &'static str,
    pub stage: &'static str,
    pub detail: String,
    pub raw_body: Option<String>,
}

impl fmt::Display for StoreDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "store error (backend={}, stage={}): {}",
            self.backend, self.stage, self.detail
        )
    }
}

impl std::error::Error for StoreDiagnosticsError {}
