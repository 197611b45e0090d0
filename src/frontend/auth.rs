//! Bearer token middleware for the HTTP front end.

use crate::config::HttpConfig;
use crate::error::Error;
use crate::frontend::actix_error::ApiError;

use actix_web::{
    Error as ActixError,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures::future::{LocalBoxFuture, Ready, ready};
use std::sync::Arc;

/// Authentication middleware factory
pub struct Authentication {
    config: Arc<HttpConfig>,
}

impl Authentication {
    /// Create a new Authentication middleware
    pub fn new(config: Arc<HttpConfig>) -> Self {
        Self { config }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = ActixError;
    type Transform = AuthenticationMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthenticationMiddleware {
            service,
            config: self.config.clone(),
        }))
    }
}

/// Authentication middleware implementation
pub struct AuthenticationMiddleware<S> {
    service: S,
    config: Arc<HttpConfig>,
}

fn bearer_token(req: &ServiceRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

impl<S, B> Service<ServiceRequest> for AuthenticationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // CORS preflight carries no credentials
        let authorized = req.method() == "OPTIONS"
            || match &self.config.token {
                Some(expected) => bearer_token(&req) == Some(expected.as_str()),
                None => true,
            };

        if !authorized {
            tracing::warn!(path = %req.path(), "Authentication failed: Invalid or missing bearer token");
            return Box::pin(async move {
                Err(ApiError::from(Error::Unauthorized(
                    "Invalid or missing bearer token".to_string(),
                ))
                .into())
            });
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res)
        })
    }
}
