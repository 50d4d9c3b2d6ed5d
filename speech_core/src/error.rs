use thiserror::Error;

/// Synthesis error types
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// Input rejected before any model call or numeric pass.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// An executor failed or handed back something we cannot use.
    #[error("Model invocation failed at {stage}: {source}")]
    ModelInvocation {
        stage: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Signal processing error: {0}")]
    Signal(String),

    #[error("Waveform sink error: {0}")]
    Sink(#[source] anyhow::Error),
}

impl SynthesisError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        SynthesisError::Validation(msg.into())
    }

    pub(crate) fn model(stage: impl Into<String>, source: anyhow::Error) -> Self {
        SynthesisError::ModelInvocation {
            stage: stage.into(),
            source,
        }
    }

    /// True for errors that are the caller's fault rather than the backend's.
    pub fn is_validation(&self) -> bool {
        matches!(self, SynthesisError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, SynthesisError>;
