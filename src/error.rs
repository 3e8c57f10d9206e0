use crate::order::MessageId;

/// Why an envelope was rejected before any state was touched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeDefect {
    #[error("sender {sender} is out of range for {n} processes")]
    SenderOutOfRange { sender: usize, n: usize },
    #[error("metadata has dimension {found}, expected {expected}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("metadata carries sequence {found} for the sender, id says {expected}")]
    SequenceMismatch { expected: usize, found: usize },
    #[error("sequence numbers start at 1")]
    ZeroSequence,
    #[error("dependency {dep} names a process out of range for {n} processes")]
    DependencyOutOfRange { dep: MessageId, n: usize },
    #[error("dependency {dep} is not older than the message itself")]
    FutureDependency { dep: MessageId },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CausalError {
    #[error("process id {id} is out of range for {n} processes")]
    InvalidProcess { id: usize, n: usize },
    #[error("invalid envelope {id}: {defect}")]
    InvalidEnvelope { id: MessageId, defect: EnvelopeDefect },
    #[error("unknown message label `{0}`")]
    UnknownLabel(String),
    #[error("message label `{0}` is already in use")]
    DuplicateLabel(String),
}

pub type Result<T, E = CausalError> = std::result::Result<T, E>;
