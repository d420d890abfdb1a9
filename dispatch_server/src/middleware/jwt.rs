//! Bearer token middleware.
//!
//! Every request must carry `Authorization: Bearer <token>`. The token is verified with the server's
//! [`TokenVerifier`] and the resulting [`JwtClaims`] are placed in the request extensions, where handlers (and the
//! ACL middleware) pick them up. Requests without a valid token never reach the wrapped service.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error,
    HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::*;

use crate::{
    auth::{bearer_token, TokenVerifier},
    errors::{AuthError, ServerError},
};

pub struct JwtMiddlewareFactory {
    verifier: TokenVerifier,
}

impl JwtMiddlewareFactory {
    pub fn new(verifier: TokenVerifier) -> Self {
        JwtMiddlewareFactory { verifier }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = JwtMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtMiddlewareService { verifier: self.verifier.clone(), service: Rc::new(service) }))
    }
}

pub struct JwtMiddlewareService<S> {
    verifier: TokenVerifier,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let verifier = self.verifier.clone();
        Box::pin(async move {
            trace!("🔐️ Checking bearer token for {}", req.path());
            let token = req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(bearer_token)
                .ok_or(ServerError::AuthenticationError(AuthError::MissingToken))?;
            let claims = verifier.verify(token).map_err(|e| {
                debug!("🔐️ Rejected bearer token for {}. {e}", req.path());
                ServerError::AuthenticationError(e)
            })?;
            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}
