//! Serialization versioning helpers.

use crate::error::QkdError;

pub const KEY_FILE_VERSION: u16 = 1;

pub fn expect_version(found: u16, expected: u16, context: &'static str) -> Result<(), QkdError> {
    if found != expected {
        return Err(QkdError::VersionMismatch {
            context,
            expected,
            found,
        });
    }
    Ok(())
}
