use thiserror::Error;

/// Top-level errors surfaced by the CLI layer. Workflow-internal failures
/// never take this path; they become task state transitions instead.
#[derive(Debug, Error)]
pub enum BureauError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Intake error: {0}")]
    Intake(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intake_error_display() {
        let err = BureauError::Intake("no tasks defined".to_string());
        assert_eq!(err.to_string(), "Intake error: no tasks defined");
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: BureauError = io.into();
        assert!(err.to_string().starts_with("IO error"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BureauError>();
    }
}
