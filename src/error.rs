use thiserror::Error;

/// Failure of a single collector during one cycle.
///
/// These never stop the scheduler; they are logged at the cycle boundary.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The OS facility could not be read at all
    #[error("{source_name} unavailable: {source}")]
    SourceUnavailable {
        source_name: String,
        #[source]
        source: std::io::Error,
    },

    /// The data was read but does not have the expected structure
    #[error("{source_name} malformed: {detail}")]
    MalformedSource { source_name: String, detail: String },

    /// A subprocess or derived computation failed
    #[error("{adapter} failed: {detail}")]
    AdapterFailure { adapter: String, detail: String },
}

impl CollectError {
    pub fn unavailable(source_name: impl Into<String>, source: std::io::Error) -> Self {
        CollectError::SourceUnavailable { source_name: source_name.into(), source }
    }

    pub fn malformed(source_name: impl Into<String>, detail: impl Into<String>) -> Self {
        CollectError::MalformedSource { source_name: source_name.into(), detail: detail.into() }
    }

    pub fn adapter(adapter: impl Into<String>, detail: impl Into<String>) -> Self {
        CollectError::AdapterFailure { adapter: adapter.into(), detail: detail.into() }
    }

    /// Short label for structured log fields
    pub fn kind(&self) -> &'static str {
        match self {
            CollectError::SourceUnavailable { .. } => "source_unavailable",
            CollectError::MalformedSource { .. } => "malformed_source",
            CollectError::AdapterFailure { .. } => "adapter_failure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_source() {
        let err = CollectError::malformed("/proc/meminfo", "MemTotal missing");
        assert_eq!(err.to_string(), "/proc/meminfo malformed: MemTotal missing");
        assert_eq!(err.kind(), "malformed_source");

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = CollectError::unavailable("/proc/loadavg", io);
        assert_eq!(err.kind(), "source_unavailable");
        assert!(err.to_string().contains("gone"));
    }
}
