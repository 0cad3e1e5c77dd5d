use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, ResponseError,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::sync::Arc;

use crate::admission::AdmissionController;
use crate::error::AppError;

/// First gate of the pipeline: rejects a request with 429 before any other work happens
/// when its client has run out of tokens.
pub struct RateLimitMiddleware {
    controller: Arc<AdmissionController>,
    trust_forwarded_for: bool,
}

impl RateLimitMiddleware {
    pub fn new(controller: Arc<AdmissionController>) -> Self {
        Self {
            controller,
            trust_forwarded_for: false,
        }
    }

    /// Key clients by the `Forwarded` / `X-Forwarded-For` address instead of the socket
    /// peer. Only safe behind a proxy that overwrites those headers.
    pub fn trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service,
            controller: Arc::clone(&self.controller),
            trust_forwarded_for: self.trust_forwarded_for,
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: S,
    controller: Arc<AdmissionController>,
    trust_forwarded_for: bool,
}

impl<S> RateLimitMiddlewareService<S> {
    fn client_id(&self, req: &ServiceRequest) -> String {
        if self.trust_forwarded_for {
            if let Some(addr) = req.connection_info().realip_remote_addr() {
                return strip_port(addr).to_owned();
            }
        }
        req.peer_addr()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_owned())
    }
}

/// `realip_remote_addr` may carry a port; buckets are per host.
fn strip_port(addr: &str) -> &str {
    match addr.parse::<std::net::SocketAddr>() {
        Ok(_) => addr
            .rsplit_once(':')
            .map(|(host, _)| host.trim_start_matches('[').trim_end_matches(']'))
            .unwrap_or(addr),
        Err(_) => addr,
    }
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let client_id = self.client_id(&req);

        if !self.controller.allow(&client_id) {
            let response = AppError::TooManyRequests.error_response();
            let res = req.into_response(response).map_into_right_body();
            return Box::pin(async move { Ok(res) });
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_left_body())
        })
    }
}
