//! Stable user-facing response codes.
//!
//! These codes are part of the external contract with API consumers and are
//! kept in sync with the interface documentation; do not renumber.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::{Error, ErrorKind};

/// Stable numeric codes returned to API consumers.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[derive(Serialize, Deserialize, Display, EnumIter, EnumString)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub enum ApiErrorCode {
    // General outcomes
    #[strum(serialize = "success")]
    Success,
    #[strum(serialize = "internal_error")]
    InternalError,
    #[strum(serialize = "param_error")]
    ParamError,
    #[strum(serialize = "duplicate_operation")]
    DuplicateOperation,
    #[strum(serialize = "callback_error")]
    CallbackError,

    // Metadata store failures
    #[strum(serialize = "metadata_connection_failed")]
    MetadataConnectionFailed,
    #[strum(serialize = "metadata_insert_failed")]
    MetadataInsertFailed,
    #[strum(serialize = "metadata_update_failed")]
    MetadataUpdateFailed,
    #[strum(serialize = "metadata_delete_failed")]
    MetadataDeleteFailed,
    #[strum(serialize = "metadata_query_failed")]
    MetadataQueryFailed,

    // Authorization
    #[strum(serialize = "unauthorized")]
    Unauthorized,
    #[strum(serialize = "permission_invalid")]
    PermissionInvalid,

    // Documents
    #[strum(serialize = "file_not_found")]
    FileNotFound,
    #[strum(serialize = "unsupported_format")]
    UnsupportedFormat,
    #[strum(serialize = "file_too_large")]
    FileTooLarge,
    #[strum(serialize = "file_exists_processed")]
    FileExistsProcessed,
    #[strum(serialize = "file_exists_pending")]
    FileExistsPending,
    #[strum(serialize = "parse_failed")]
    ParseFailed,
    #[strum(serialize = "document_process_failed")]
    DocumentProcessFailed,

    // Chat
    #[strum(serialize = "question_too_long")]
    QuestionTooLong,
    #[strum(serialize = "invalid_session")]
    InvalidSession,
    #[strum(serialize = "kb_match_failed")]
    KbMatchFailed,
    #[strum(serialize = "context_too_long")]
    ContextTooLong,
    #[strum(serialize = "model_timeout")]
    ModelTimeout,
    #[strum(serialize = "chat_exception")]
    ChatException,

    // External conversion
    #[strum(serialize = "convert_failed")]
    ConvertFailed,
}

impl ApiErrorCode {
    /// Returns the stable numeric code for the external contract.
    pub fn code(self) -> u16 {
        match self {
            ApiErrorCode::Success => 0,
            ApiErrorCode::InternalError => 1,
            ApiErrorCode::ParamError => 2,
            ApiErrorCode::DuplicateOperation => 3,
            ApiErrorCode::CallbackError => 4,

            ApiErrorCode::MetadataConnectionFailed => 1000,
            ApiErrorCode::MetadataInsertFailed => 1001,
            ApiErrorCode::MetadataUpdateFailed => 1002,
            ApiErrorCode::MetadataDeleteFailed => 1003,
            ApiErrorCode::MetadataQueryFailed => 1004,

            ApiErrorCode::Unauthorized => 2000,
            ApiErrorCode::PermissionInvalid => 2001,

            ApiErrorCode::FileNotFound => 4000,
            ApiErrorCode::UnsupportedFormat => 4001,
            ApiErrorCode::FileTooLarge => 4002,
            ApiErrorCode::FileExistsProcessed => 4007,
            ApiErrorCode::FileExistsPending => 4017,
            ApiErrorCode::ParseFailed => 4006,
            ApiErrorCode::DocumentProcessFailed => 4016,

            ApiErrorCode::QuestionTooLong => 5000,
            ApiErrorCode::InvalidSession => 5001,
            ApiErrorCode::KbMatchFailed => 5002,
            ApiErrorCode::ContextTooLong => 5003,
            ApiErrorCode::ModelTimeout => 5004,
            ApiErrorCode::ChatException => 5005,

            ApiErrorCode::ConvertFailed => 6000,
        }
    }

    /// Returns the human-readable message for this code.
    pub fn message(self) -> &'static str {
        match self {
            ApiErrorCode::Success => "success",
            ApiErrorCode::InternalError => "internal error",
            ApiErrorCode::ParamError => "malformed parameters, check required fields and formats",
            ApiErrorCode::DuplicateOperation => "duplicate operation, do not resubmit",
            ApiErrorCode::CallbackError => "status callback delivery failed",

            ApiErrorCode::MetadataConnectionFailed => "metadata store connection failed",
            ApiErrorCode::MetadataInsertFailed => "metadata insert failed",
            ApiErrorCode::MetadataUpdateFailed => "metadata update failed",
            ApiErrorCode::MetadataDeleteFailed => "metadata delete failed",
            ApiErrorCode::MetadataQueryFailed => "metadata query failed",

            ApiErrorCode::Unauthorized => "unauthorized operation",
            ApiErrorCode::PermissionInvalid => "permission is invalid",

            ApiErrorCode::FileNotFound => "file not found, check the source path",
            ApiErrorCode::UnsupportedFormat => {
                "unsupported file format, supported: pdf, doc, docx, xls, xlsx, ppt, pptx, txt"
            }
            ApiErrorCode::FileTooLarge => "file too large, at most 50MB is supported",
            ApiErrorCode::FileExistsProcessed => "document already exists and is fully processed",
            ApiErrorCode::FileExistsPending => "document already uploaded and awaiting processing",
            ApiErrorCode::ParseFailed => "PDF structure extraction failed",
            ApiErrorCode::DocumentProcessFailed => "document processing failed",

            ApiErrorCode::QuestionTooLong => "question too long, at most 2000 characters",
            ApiErrorCode::InvalidSession => "session id is invalid",
            ApiErrorCode::KbMatchFailed => {
                "no matching knowledge found, rephrase the question or check permissions"
            }
            ApiErrorCode::ContextTooLong => "context length exceeded, start a new session",
            ApiErrorCode::ModelTimeout => "model response timed out, retry later",
            ApiErrorCode::ChatException => "chat processing failed",

            ApiErrorCode::ConvertFailed => "PDF conversion failed",
        }
    }
}

impl From<&Error> for ApiErrorCode {
    fn from(error: &Error) -> Self {
        match error.kind {
            ErrorKind::InvalidInput => ApiErrorCode::ParamError,
            ErrorKind::OverlongInput => ApiErrorCode::QuestionTooLong,
            ErrorKind::Duplicate => ApiErrorCode::DuplicateOperation,
            ErrorKind::Conflict => ApiErrorCode::FileExistsPending,
            ErrorKind::IllegalTransition => ApiErrorCode::InternalError,
            ErrorKind::Authorization => ApiErrorCode::Unauthorized,
            ErrorKind::NotFound => ApiErrorCode::FileNotFound,
            ErrorKind::RateLimited | ErrorKind::ServiceUnavailable => ApiErrorCode::ChatException,
            ErrorKind::Timeout => ApiErrorCode::ModelTimeout,
            ErrorKind::NetworkError
            | ErrorKind::Serialization
            | ErrorKind::Configuration
            | ErrorKind::ExternalError
            | ErrorKind::InternalError => ApiErrorCode::InternalError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ApiErrorCode::Success.code(), 0);
        assert_eq!(ApiErrorCode::MetadataInsertFailed.code(), 1001);
        assert_eq!(ApiErrorCode::QuestionTooLong.code(), 5000);
        assert_eq!(ApiErrorCode::KbMatchFailed.code(), 5002);
        assert_eq!(ApiErrorCode::ConvertFailed.code(), 6000);
    }

    #[test]
    fn test_error_kind_mapping() {
        let error = Error::overlong_input();
        assert_eq!(ApiErrorCode::from(&error), ApiErrorCode::QuestionTooLong);

        let error = Error::timeout();
        assert_eq!(ApiErrorCode::from(&error), ApiErrorCode::ModelTimeout);

        let error = Error::conflict();
        assert_eq!(ApiErrorCode::from(&error), ApiErrorCode::FileExistsPending);
    }

    #[test]
    fn test_every_code_has_a_message() {
        use strum::IntoEnumIterator;
        for code in ApiErrorCode::iter() {
            assert!(!code.message().is_empty(), "missing message for {code}");
        }
    }
}
