use mongodb::error::{ErrorKind, WriteFailure};
use thiserror::Error;

/// Server codes that mean "this already exists": duplicate keys, index name or
/// key collisions, and an already existing namespace.
const DUPLICATED_CODES: &[i32] = &[
    11000, // DuplicateKey
    11001, // legacy duplicate key
    12582, // legacy duplicate key on update
    48,    // NamespaceExists
    68,    // IndexAlreadyExists
    85,    // IndexOptionsConflict
    86,    // IndexKeySpecsConflict
];

/// Store-wide error type
#[derive(Debug, Error)]
pub enum Error {
    #[error("connect to mongodb failed: {0}")]
    ConnectFailed(#[source] mongodb::error::Error),

    #[error("mongodb unreachable: {0}")]
    Unreachable(#[source] mongodb::error::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("mongodb version {found} is not supported, need >= {required}")]
    UnsupportedVersion { found: String, required: String },

    #[error("document not found")]
    NotFound,

    #[error("duplicated: {0}")]
    Duplicated(String),

    #[error("{table} query result type invalid: {reason}")]
    InvalidResultType { table: String, reason: String },

    #[error("update operator ${0} appears multiple times")]
    DuplicateOperator(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("BSON encode error: {0}")]
    BsonEncode(#[from] mongodb::bson::ser::Error),

    #[error("BSON decode error: {0}")]
    BsonDecode(#[from] mongodb::bson::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error means the target already exists (unique key violation,
    /// index collision or existing collection).
    pub fn is_duplicated(&self) -> bool {
        match self {
            Error::Duplicated(_) => true,
            Error::Mongo(err) => {
                server_codes(err).iter().any(|code| DUPLICATED_CODES.contains(code))
            }
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }

    /// Whether the server rejected the call with `code`.
    pub(crate) fn has_server_code(&self, code: i32) -> bool {
        match self {
            Error::Mongo(err) => server_codes(err).contains(&code),
            _ => false,
        }
    }
}

/// Collect every server error code carried by a driver error.
pub(crate) fn server_codes(err: &mongodb::error::Error) -> Vec<i32> {
    match err.kind.as_ref() {
        ErrorKind::Command(command) => vec![command.code],
        ErrorKind::Write(WriteFailure::WriteError(write)) => vec![write.code],
        ErrorKind::Write(WriteFailure::WriteConcernError(concern)) => vec![concern.code],
        ErrorKind::InsertMany(insert) => insert
            .write_errors
            .iter()
            .flatten()
            .map(|write| write.code)
            .chain(insert.write_concern_error.iter().map(|concern| concern.code))
            .collect(),
        _ => Vec::new(),
    }
}

/// Convenience Result type using our Error
pub type Result<T> = std::result::Result<T, Error>;
