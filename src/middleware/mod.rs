pub mod csp;
pub mod extensions;
pub mod interceptor;
#[cfg(feature = "reporting")]
pub mod reporting;

pub use csp::{csp_middleware, CspMiddleware, CspMiddlewareService};
pub use extensions::{CspExtensions, RouteCsp};
pub use interceptor::{
    Decision, ErrorResponse, Intercepted, InterceptedResponse, RequestOrigin, ResponseInterceptor,
    SkipReason,
};
#[cfg(feature = "reporting")]
pub use reporting::{configure_csp_reports, csp_with_reporting, CspReportEndpoint, ReportBody};
