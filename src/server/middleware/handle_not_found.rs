use actix_web::body::MessageBody;
use actix_web::dev::ServiceResponse;
use actix_web::http::header::CONTENT_TYPE;
use actix_web::middleware::ErrorHandlerResponse;
use actix_web::ResponseError;

use crate::server::handler::ApiError;

/// Replaces the empty 404 of unknown routes with an [ApiError::NotFound].
///
/// Responses that already carry a body, like the errors of handlers, are passed through.
pub(crate) fn handle_not_found<B: MessageBody>(
    res: ServiceResponse<B>,
) -> actix_web::Result<ErrorHandlerResponse<B>> {
    if res.response().headers().contains_key(CONTENT_TYPE) {
        return Ok(ErrorHandlerResponse::Response(res.map_into_left_body()));
    }

    let response = ApiError::NotFound.error_response();

    Ok(ErrorHandlerResponse::Response(
        res.into_response(response).map_into_right_body(),
    ))
}
