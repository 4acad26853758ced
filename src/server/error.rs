//! You can find the errors that can occur during server startup here

use std::fmt::{Display, Formatter};
use std::io;

use actix_web::cookie::KeyError;
use base64::DecodeError;

/// The errors that can occur during server startup
#[derive(Debug)]
pub enum StartServerError {
    /// IO error that can occur
    IO(io::Error),
    /// The secret key is not valid base64
    InvalidSecretKey(DecodeError),
    /// The decoded secret key is not usable as cookie key
    InvalidCookieKey(KeyError),
}

impl Display for StartServerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StartServerError::IO(err) => write!(f, "{err}"),
            StartServerError::InvalidSecretKey(err) => {
                write!(f, "Invalid SecretKey: {err}")
            }
            StartServerError::InvalidCookieKey(err) => {
                write!(f, "Invalid SecretKey, could not create cookie key: {err}")
            }
        }
    }
}

impl From<io::Error> for StartServerError {
    fn from(value: io::Error) -> Self {
        Self::IO(value)
    }
}

impl From<DecodeError> for StartServerError {
    fn from(value: DecodeError) -> Self {
        Self::InvalidSecretKey(value)
    }
}

impl From<KeyError> for StartServerError {
    fn from(value: KeyError) -> Self {
        Self::InvalidCookieKey(value)
    }
}
