use crate::constants::{HEADER_FORWARDED, HEADER_X_FORWARDED_PROTO};
use crate::core::{CspConfig, RenderedPolicy, Variety};
use crate::error::CspError;
use crate::middleware::extensions::RouteCsp;
use actix_web::{
    dev::{Extensions, ServiceRequest, ServiceResponse},
    error::InternalError,
    http::{
        header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE},
        Uri,
    },
    Error, HttpRequest, HttpResponse,
};
use std::sync::Arc;

/// What the interceptor needs from a finished response, independent of how
/// the response was produced.
pub trait InterceptedResponse {
    fn path(&self) -> &str;
    fn variety(&self) -> Variety;
    fn is_error(&self) -> bool;
    fn is_secure(&self, trust_forwarded_proto: bool) -> bool;
    /// Route or response asked for the headers regardless of variety.
    fn forces_policy(&self) -> bool;
    fn set_header(&mut self, name: HeaderName, value: HeaderValue);
}

/// Request facts captured before the inner service consumes the request.
/// Only read when the inner service fails, so the forwarding headers are kept
/// raw and parsed on demand.
#[derive(Debug, Clone)]
pub struct RequestOrigin {
    uri: Uri,
    secure: bool,
    forwarded: HeaderMap,
}

impl RequestOrigin {
    pub fn of(req: &ServiceRequest) -> Self {
        let mut forwarded = HeaderMap::new();
        for name in [HEADER_X_FORWARDED_PROTO, HEADER_FORWARDED] {
            if let Some(value) = req.headers().get(name) {
                forwarded.insert(HeaderName::from_static(name), value.clone());
            }
        }

        Self {
            uri: req.uri().clone(),
            secure: req.app_config().secure() || req.uri().scheme_str() == Some("https"),
            forwarded,
        }
    }

    #[inline]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn is_secure(&self, trust_forwarded_proto: bool) -> bool {
        self.secure || (trust_forwarded_proto && forwarded_proto_is_https(&self.forwarded))
    }
}

/// A failure returned by the inner service.
///
/// The error is rendered up front so headers land on the response the
/// client will actually receive; [`ErrorResponse::into_error`] hands it back
/// as an error that carries that response.
pub struct ErrorResponse {
    origin: RequestOrigin,
    error: Error,
    response: HttpResponse,
}

impl ErrorResponse {
    pub fn new(origin: RequestOrigin, error: Error) -> Self {
        let response = error.error_response();
        Self {
            origin,
            error,
            response,
        }
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    #[inline]
    pub fn into_error(self) -> Error {
        InternalError::from_response(self.error, self.response).into()
    }
}

/// Outcome of the inner service.
pub enum Intercepted<B> {
    Normal(ServiceResponse<B>),
    Error(ErrorResponse),
}

impl<B> Intercepted<B> {
    pub fn from_result(origin: RequestOrigin, result: Result<ServiceResponse<B>, Error>) -> Self {
        match result {
            Ok(res) => Intercepted::Normal(res),
            Err(err) => Intercepted::Error(ErrorResponse::new(origin, err)),
        }
    }

    pub fn into_result(self) -> Result<ServiceResponse<B>, Error> {
        match self {
            Intercepted::Normal(res) => Ok(res),
            Intercepted::Error(err) => Err(err.into_error()),
        }
    }
}

impl<B> InterceptedResponse for ServiceResponse<B> {
    #[inline]
    fn path(&self) -> &str {
        self.request().path()
    }

    fn variety(&self) -> Variety {
        response_variety(&self.response().extensions(), self.headers())
    }

    #[inline]
    fn is_error(&self) -> bool {
        self.response().error().is_some()
    }

    #[inline]
    fn is_secure(&self, trust_forwarded_proto: bool) -> bool {
        request_is_secure(self.request(), trust_forwarded_proto)
    }

    fn forces_policy(&self) -> bool {
        route_forces_policy(self.request(), &self.response().extensions())
    }

    #[inline]
    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers_mut().insert(name, value);
    }
}

impl InterceptedResponse for ErrorResponse {
    #[inline]
    fn path(&self) -> &str {
        self.origin.path()
    }

    fn variety(&self) -> Variety {
        response_variety(&self.response.extensions(), self.response.headers())
    }

    #[inline]
    fn is_error(&self) -> bool {
        true
    }

    #[inline]
    fn is_secure(&self, trust_forwarded_proto: bool) -> bool {
        self.origin.is_secure(trust_forwarded_proto)
    }

    /// Routing never completed, so only the response itself can force.
    fn forces_policy(&self) -> bool {
        self.response
            .extensions()
            .get::<RouteCsp>()
            .map(RouteCsp::forces)
            .unwrap_or(false)
    }

    #[inline]
    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.response.headers_mut().insert(name, value);
    }
}

impl<B> InterceptedResponse for Intercepted<B> {
    fn path(&self) -> &str {
        match self {
            Intercepted::Normal(res) => res.path(),
            Intercepted::Error(err) => err.path(),
        }
    }

    fn variety(&self) -> Variety {
        match self {
            Intercepted::Normal(res) => res.variety(),
            Intercepted::Error(err) => err.variety(),
        }
    }

    fn is_error(&self) -> bool {
        match self {
            Intercepted::Normal(res) => res.is_error(),
            Intercepted::Error(err) => err.is_error(),
        }
    }

    fn is_secure(&self, trust_forwarded_proto: bool) -> bool {
        match self {
            Intercepted::Normal(res) => res.is_secure(trust_forwarded_proto),
            Intercepted::Error(err) => err.is_secure(trust_forwarded_proto),
        }
    }

    fn forces_policy(&self) -> bool {
        match self {
            Intercepted::Normal(res) => res.forces_policy(),
            Intercepted::Error(err) => err.forces_policy(),
        }
    }

    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        match self {
            Intercepted::Normal(res) => res.set_header(name, value),
            Intercepted::Error(err) => err.set_header(name, value),
        }
    }
}

fn response_variety(extensions: &Extensions, headers: &HeaderMap) -> Variety {
    if let Some(variety) = extensions.get::<Variety>() {
        return variety.clone();
    }

    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    Variety::from_content_type(content_type)
}

fn route_forces_policy(req: &HttpRequest, extensions: &Extensions) -> bool {
    extensions
        .get::<RouteCsp>()
        .or_else(|| req.app_data::<RouteCsp>())
        .map(RouteCsp::forces)
        .unwrap_or(false)
}

fn request_is_secure(req: &HttpRequest, trust_forwarded_proto: bool) -> bool {
    if req.app_config().secure() || req.uri().scheme_str() == Some("https") {
        return true;
    }

    trust_forwarded_proto && forwarded_proto_is_https(req.headers())
}

/// Checks `X-Forwarded-Proto`, then the `proto` parameter of `Forwarded`.
/// Only the first (client-nearest) entry of each header counts.
pub(crate) fn forwarded_proto_is_https(headers: &HeaderMap) -> bool {
    if let Some(value) = headers
        .get(HEADER_X_FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
    {
        return value
            .split(',')
            .next()
            .map(|proto| proto.trim().eq_ignore_ascii_case("https"))
            .unwrap_or(false);
    }

    headers
        .get(HEADER_FORWARDED)
        .and_then(|v| v.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|element| {
            element.split(';').find_map(|pair| {
                let (key, value) = pair.split_once('=')?;
                key.trim()
                    .eq_ignore_ascii_case("proto")
                    .then(|| value.trim().trim_matches('"'))
            })
        })
        .map(|proto| proto.eq_ignore_ascii_case("https"))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Neither header is enabled.
    NothingToAttach,
    ReportEndpoint,
    VarietyExcluded,
    InsecureTransport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Attach,
    Skip(SkipReason),
}

/// Per-response decision and decoration, built once per registration.
#[derive(Debug, Clone)]
pub struct ResponseInterceptor {
    config: Arc<CspConfig>,
    report_path: Option<String>,
    policy: RenderedPolicy,
}

impl ResponseInterceptor {
    pub fn new(config: CspConfig) -> Result<Self, CspError> {
        config.validate()?;
        let report_path = config.report_path()?;
        let policy = RenderedPolicy::compile(&config)?;

        Ok(Self {
            config: Arc::new(config),
            report_path,
            policy,
        })
    }

    #[inline]
    pub fn config(&self) -> &Arc<CspConfig> {
        &self.config
    }

    #[inline]
    pub fn policy(&self) -> &RenderedPolicy {
        &self.policy
    }

    #[inline]
    pub fn report_path(&self) -> Option<&str> {
        self.report_path.as_deref()
    }

    /// The route override only lifts the variety filter; `https_only`
    /// still applies to forced routes.
    pub fn decide<R>(&self, res: &R) -> Decision
    where
        R: InterceptedResponse + ?Sized,
    {
        if self.policy.is_empty() {
            return Decision::Skip(SkipReason::NothingToAttach);
        }

        if self.report_path.as_deref() == Some(res.path()) {
            return Decision::Skip(SkipReason::ReportEndpoint);
        }

        if !res.forces_policy() && !self.config.includes_variety(&res.variety()) {
            return Decision::Skip(SkipReason::VarietyExcluded);
        }

        if self.config.https_only() && !res.is_secure(self.config.trust_forwarded_proto()) {
            return Decision::Skip(SkipReason::InsecureTransport);
        }

        Decision::Attach
    }

    pub fn decorate<R>(&self, res: &mut R) -> Decision
    where
        R: InterceptedResponse + ?Sized,
    {
        let decision = self.decide(res);

        if decision == Decision::Attach {
            for (name, value) in self.policy.headers() {
                res.set_header(name.clone(), value.clone());
            }
        }

        log::trace!(
            "csp {:?} for {} (error: {})",
            decision,
            res.path(),
            res.is_error()
        );
        decision
    }
}
