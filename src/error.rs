use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodesmithError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("upstream error from {provider}: {message}")]
    Upstream {
        provider: String,
        message: String,
        status: Option<u16>,
    },

    #[error("schema parse error: {0}")]
    SchemaParse(String),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("AI generation failed: {0}")]
    Generation(Box<CodesmithError>),

    #[error("AI generation stream failed: {0}")]
    Stream(Box<CodesmithError>),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("unauthorized: you do not own this project")]
    Forbidden,

    #[error("{0}")]
    Other(String),
}

impl CodesmithError {
    /// Wrap a failure from the buffered generation path.
    pub fn generation(inner: CodesmithError) -> Self {
        Self::Generation(Box::new(inner))
    }

    /// Wrap a failure from the streaming generation path.
    pub fn stream(inner: CodesmithError) -> Self {
        Self::Stream(Box::new(inner))
    }

    /// Extract provider name from structured error variants.
    /// Looks through generation/stream wrappers.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::Upstream { provider, .. } => Some(provider),
            Self::Generation(inner) | Self::Stream(inner) => inner.provider(),
            _ => None,
        }
    }

    /// Innermost error, with generation/stream wrappers removed.
    pub fn root(&self) -> &CodesmithError {
        match self {
            Self::Generation(inner) | Self::Stream(inner) => inner.root(),
            other => other,
        }
    }

    /// True when the caller (not the vendor or the network) is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.root(),
            Self::Configuration(_) | Self::Validation(_) | Self::NotFound(_) | Self::Forbidden
        )
    }

    /// Produce a sanitized error message safe for returning to tool clients.
    /// Does not leak internal URLs or connection details.
    pub fn user_message(&self) -> String {
        match self {
            Self::Configuration(msg) => msg.clone(),
            Self::Upstream { message, .. } => message.clone(),
            Self::SchemaParse(_) => "failed to parse provider response".to_string(),
            Self::Request(_) => "request to provider failed".to_string(),
            Self::Generation(inner) => format!("AI generation failed: {}", inner.user_message()),
            Self::Stream(inner) => {
                format!("AI generation stream failed: {}", inner.user_message())
            }
            Self::Validation(msg) => msg.clone(),
            Self::NotFound(what) => format!("{what} not found"),
            Self::Forbidden => "unauthorized: you do not own this project".to_string(),
            Self::Other(msg) => msg.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_errors_keep_provider() {
        let err = CodesmithError::generation(CodesmithError::Upstream {
            provider: "openai".to_string(),
            message: "OpenAI API error: bad key".to_string(),
            status: Some(401),
        });
        assert_eq!(err.provider(), Some("openai"));
        assert_eq!(
            err.user_message(),
            "AI generation failed: OpenAI API error: bad key"
        );
        assert!(!err.is_client_error());
    }

    #[test]
    fn configuration_errors_are_client_errors() {
        let err = CodesmithError::stream(CodesmithError::Configuration(
            "Provider 'nope' not found in configuration".to_string(),
        ));
        assert!(err.is_client_error());
        assert!(err.to_string().starts_with("AI generation stream failed: "));
    }
}
