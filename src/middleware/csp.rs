use crate::core::config::{CspConfig, CspOptions};
use crate::core::policy::RenderedPolicy;
use crate::error::CspError;
use crate::middleware::interceptor::{Intercepted, RequestOrigin, ResponseInterceptor};
use actix_service::{forward_ready, Service, Transform};
use actix_web::{
    dev::{ServiceRequest, ServiceResponse},
    Error,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::{rc::Rc, sync::Arc};

/// Attaches the rendered CSP headers to responses that pass the
/// interception rules. The policy is rendered once, in [`CspMiddleware::new`].
#[derive(Clone)]
pub struct CspMiddleware {
    interceptor: Arc<ResponseInterceptor>,
}

impl CspMiddleware {
    pub fn new(config: CspConfig) -> Result<Self, CspError> {
        let interceptor = ResponseInterceptor::new(config)?;
        log::debug!(
            "csp policy rendered: {:?}, report path: {:?}",
            interceptor.policy().as_str(),
            interceptor.report_path()
        );

        Ok(Self {
            interceptor: Arc::new(interceptor),
        })
    }

    #[inline]
    pub fn from_options(options: CspOptions) -> Result<Self, CspError> {
        Self::new(CspConfig::from_options(options)?)
    }

    #[inline]
    pub fn config(&self) -> Arc<CspConfig> {
        self.interceptor.config().clone()
    }

    #[inline]
    pub fn policy(&self) -> &RenderedPolicy {
        self.interceptor.policy()
    }

    #[inline]
    pub fn interceptor(&self) -> &Arc<ResponseInterceptor> {
        &self.interceptor
    }
}

impl<S, B> Transform<S, ServiceRequest> for CspMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = CspMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CspMiddlewareService {
            service: Rc::new(service),
            interceptor: self.interceptor.clone(),
        }))
    }
}

pub struct CspMiddlewareService<S> {
    service: Rc<S>,
    interceptor: Arc<ResponseInterceptor>,
}

impl<S, B> Service<ServiceRequest> for CspMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let interceptor = self.interceptor.clone();
        let origin = RequestOrigin::of(&req);

        Box::pin(async move {
            let mut outcome = Intercepted::from_result(origin, service.call(req).await);
            interceptor.decorate(&mut outcome);
            outcome.into_result()
        })
    }
}

#[inline]
pub fn csp_middleware(config: CspConfig) -> Result<CspMiddleware, CspError> {
    CspMiddleware::new(config)
}
