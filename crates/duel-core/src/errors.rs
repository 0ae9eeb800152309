/// Failures of a session operation, reported only to the requesting
/// connection.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("room not found")]
    RoomNotFound,
    #[error("room is full")]
    RoomFull,
    #[error("connection already holds a seat in this room")]
    AlreadySeated,
}

/// Failures of the session registry itself.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No free code was found in the allotted attempts. Retrying is safe.
    #[error("no free room code after {attempts} attempts")]
    CodeSpaceExhausted { attempts: usize },
}

impl SessionError {
    /// Wire classification string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RoomNotFound => "ROOM_NOT_FOUND",
            Self::RoomFull => "ROOM_FULL",
            Self::AlreadySeated => "ALREADY_SEATED",
        }
    }
}

impl RegistryError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::CodeSpaceExhausted { .. } => "ROOM_CODES_EXHAUSTED",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CodeSpaceExhausted { .. })
    }
}
