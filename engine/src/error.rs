use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Connection refused, DNS failure, timeout, unreadable body.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    // The exchange answered, but with an error object instead of data.
    #[error("Exchange API error: {0}")]
    ApiError(String),

    #[error("All endpoints failed after {attempts} attempts for {path}")]
    EndpointsExhausted { attempts: u32, path: String },

    #[error("Malformed payload: {0}")]
    Payload(String),

    #[error("Indicator calculation error: {0}")]
    IndicatorError(String),

    #[error("Alert delivery failed: {0}")]
    AlertDelivery(String),

    #[error("CSV system error: {source}")]
    CsvSystemError {
        #[from]
        source: csv::Error,
    },

    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error(transparent)]
    AnyhowError(#[from] anyhow::Error),
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            EngineError::HttpStatus {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else if err.is_timeout() {
            EngineError::Transport(format!("request timed out: {}", err))
        } else {
            EngineError::Transport(err.to_string())
        }
    }
}

impl EngineError {
    /// Whether the fail-over router should move on to the next endpoint.
    pub fn is_endpoint_fault(&self) -> bool {
        matches!(
            self,
            EngineError::Transport(_) | EngineError::HttpStatus { .. } | EngineError::ApiError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_fault_classification() {
        assert!(EngineError::Transport("refused".into()).is_endpoint_fault());
        assert!(EngineError::HttpStatus { status: 502, url: "x".into() }.is_endpoint_fault());
        assert!(EngineError::ApiError("-1121 Invalid symbol".into()).is_endpoint_fault());
        assert!(!EngineError::ConfigError("bad".into()).is_endpoint_fault());
        assert!(!EngineError::Payload("not a list".into()).is_endpoint_fault());
    }

    #[test]
    fn test_exhausted_message() {
        let err = EngineError::EndpointsExhausted { attempts: 3, path: "/api/v3/klines".into() };
        assert_eq!(err.to_string(), "All endpoints failed after 3 attempts for /api/v3/klines");
    }
}
