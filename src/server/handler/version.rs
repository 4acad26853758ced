use actix_web::get;
use actix_web::web::Json;
use serde::Serialize;
use utoipa::ToSchema;

/// The API version served by this server
const API_VERSION: u8 = 1;

/// The version data for clients
#[derive(Serialize, ToSchema)]
pub struct VersionResponse {
    #[schema(example = 1)]
    version: u8,
    #[schema(example = "0.1.0")]
    server: &'static str,
}

/// This endpoint is for clients to detect which version this server currently supports
#[utoipa::path(
    tag = "Version",
    responses(
        (status = 200, description = "Version of the API", body = VersionResponse)
    ),
)]
#[get("/api/version")]
pub async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: API_VERSION,
        server: env!("CARGO_PKG_VERSION"),
    })
}
