use super::record::RecordId;

/// Reasons the directory reducer refuses an action.
///
/// A rejected action leaves the store's state exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// A required field of a new record is missing or blank.
    #[error("required field `{0}` is missing")]
    MissingField(&'static str),

    /// The action names a record that is not in the directory.
    #[error("no record with id {0}")]
    UnknownRecord(RecordId),

    /// Every record id has been handed out.
    #[error("record ids exhausted")]
    IdsExhausted,

    /// An action envelope's payload does not fit its kind.
    #[error("invalid payload for `{kind}`: {reason}")]
    InvalidPayload { kind: String, reason: String },
}
