pub type SlidecastResult<T> = Result<T, SlidecastError>;

/// Error taxonomy for one export run.
///
/// Preparing-phase errors abort the run back to idle; recording-phase errors
/// stop the render loop without ever surfacing partial output as finished.
#[derive(thiserror::Error, Debug)]
pub enum SlidecastError {
    #[error("validation error: {0}")]
    Validation(String),

    /// A slide reached recording without synthesized audio. Fatal, caught
    /// while building the timeline, before any frame is drawn.
    #[error("slide {index} has no synthesized audio")]
    MissingAudio { index: usize },

    /// Speech/script collaborator rejected the request for quota reasons.
    /// Recoverable by the caller, never retried automatically.
    #[error("synthesis quota exhausted: {0}")]
    SynthesisQuota(String),

    /// Speech/script collaborator rejected the credentials.
    #[error("synthesis auth rejected: {0}")]
    SynthesisAuth(String),

    /// A slide image failed to decode. Non-fatal per slide: the slide keeps
    /// its timeline slot and renders the letterbox background only.
    #[error("image decode error: {0}")]
    ImageDecode(String),

    /// None of the requested container/codec combinations are supported by
    /// the runtime. Fatal, surfaced before recording starts.
    #[error("no supported encoder: {0}")]
    EncoderUnsupported(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("export cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SlidecastError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn image_decode(msg: impl Into<String>) -> Self {
        Self::ImageDecode(msg.into())
    }

    pub fn encoder_unsupported(msg: impl Into<String>) -> Self {
        Self::EncoderUnsupported(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }
}
