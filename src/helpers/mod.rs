pub mod validate;

pub use validate::{
    REDACTED_PASSWORD, database_from_uri, redact_uri_password, validate_mongodb_uri,
    validate_table_name,
};
