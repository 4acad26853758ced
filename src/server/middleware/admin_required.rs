use std::future::{ready, Ready};
use std::rc::Rc;

use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::AUTHORIZATION;
use futures::future::LocalBoxFuture;
use log::debug;

use crate::server::handler::ApiError;

/// Only lets requests pass that carry the admin token as bearer token
pub(crate) struct AdminRequired {
    token: Rc<str>,
}

impl AdminRequired {
    pub(crate) fn new(token: &str) -> Self {
        Self {
            token: Rc::from(token),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdminRequired
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Transform = AdminRequiredMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdminRequiredMiddleware {
            service,
            token: self.token.clone(),
        }))
    }
}

pub(crate) struct AdminRequiredMiddleware<S> {
    service: S,
    token: Rc<str>,
}

fn bearer_token(req: &ServiceRequest) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

impl<S, B> Service<ServiceRequest> for AdminRequiredMiddleware<S>
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
        // An empty token in the config disables the admin endpoints
        let authorized = !self.token.is_empty()
            && bearer_token(&req).is_some_and(|token| token == &*self.token);

        if !authorized {
            debug!("Rejected request to admin endpoint");
            return Box::pin(ready(Err(ApiError::Unauthenticated.into())));
        }

        let next = self.service.call(req);
        Box::pin(next)
    }
}
