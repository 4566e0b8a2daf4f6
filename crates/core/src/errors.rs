use thiserror::Error;

use crate::domain::ChannelId;

/// Failures caused by user input or missing rights. Nothing is mutated when
/// one of these is returned.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("no shopping list exists in channel {0}")]
    ListNotFound(ChannelId),
    #[error("item number {number} is out of range (list has {len} items)")]
    ItemOutOfRange { number: usize, len: usize },
    #[error("item text must not be empty")]
    EmptyItem,
    #[error("missing required option `{0}`")]
    MissingOption(&'static str),
    #[error("invalid value `{value}` for option `{option}`")]
    InvalidOption { option: &'static str, value: String },
    #[error("shopping lists must be managed in channel {expected}")]
    WrongChannel { expected: ChannelId },
    #[error("permission denied: {0}")]
    PermissionDenied(String),
}

impl DomainError {
    /// Text safe to show to the invoking user.
    pub fn user_message(&self) -> String {
        match self {
            Self::ListNotFound(_) => {
                "\u{274c} No shopping list found in this channel. Create one first with `/shop create`."
                    .to_owned()
            }
            Self::ItemOutOfRange { len, .. } => {
                format!("\u{274c} Invalid choice. Pick a number between 1 and {len}.")
            }
            Self::EmptyItem => "\u{274c} Item text cannot be empty.".to_owned(),
            Self::MissingOption(option) => format!("\u{274c} Missing required option `{option}`."),
            Self::InvalidOption { option, value } => {
                format!("\u{274c} `{value}` is not a valid value for `{option}`.")
            }
            Self::WrongChannel { expected } => {
                format!("\u{274c} Please use the designated shopping channel: <#{expected}>")
            }
            Self::PermissionDenied(detail) => format!("\u{274c} {detail}"),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> String {
        match self {
            Self::BadRequest { message, .. } => message.clone(),
            Self::ServiceUnavailable { .. } => {
                "The chat service is temporarily unavailable. Please retry shortly.".to_owned()
            }
            Self::Internal { .. } => {
                "There was an error while executing this command!".to_owned()
            }
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(error) => Self::BadRequest {
                message: error.user_message(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Persistence(message) | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}
