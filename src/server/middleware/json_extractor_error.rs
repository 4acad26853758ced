use actix_web::error::JsonPayloadError;
use actix_web::HttpRequest;

use crate::server::handler::ApiError;

/// Turns errors of the json extractor into an [ApiError]
pub(crate) fn json_extractor_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::from(err).into()
}
