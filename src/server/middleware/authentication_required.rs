use std::future::{ready, Ready};

use actix_toolbox::tb_middleware::actix_session::{SessionExt, SessionGetError};
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use futures::future::LocalBoxFuture;
use uuid::Uuid;

use crate::server::handler::ApiError;

/// Only lets requests pass whose session belongs to a logged-in account
pub(crate) struct AuthenticationRequired;

impl<S, B> Transform<S, ServiceRequest> for AuthenticationRequired
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Transform = AuthenticationRequiredMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthenticationRequiredMiddleware { service }))
    }
}

pub(crate) struct AuthenticationRequiredMiddleware<S> {
    service: S,
}

fn logged_in(req: &ServiceRequest) -> Result<bool, SessionGetError> {
    let session = req.get_session();

    let logged_in = session.get::<bool>("logged_in")?.unwrap_or(false);
    let uuid = session.get::<Uuid>("uuid")?;

    Ok(logged_in && uuid.is_some())
}

impl<S, B> Service<ServiceRequest> for AuthenticationRequiredMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        match logged_in(&req) {
            Ok(true) => Box::pin(self.service.call(req)),
            Ok(false) => Box::pin(ready(Err(ApiError::Unauthenticated.into()))),
            Err(err) => Box::pin(ready(Err(ApiError::SessionGet(err).into()))),
        }
    }
}
