pub mod constants;
pub mod core;
pub mod error;
pub mod middleware;
pub mod monitoring;
pub mod prelude;

// Re-export commonly used types for convenience
pub use crate::core::{
    CspConfig, CspConfigBuilder, CspOptions, DirectiveValue, FetchDirectives, RenderedPolicy,
    Variety,
};
pub use error::CspError;
pub use middleware::{
    csp_middleware, CspExtensions, CspMiddleware, Decision, InterceptedResponse, RouteCsp,
    SkipReason,
};
#[cfg(feature = "reporting")]
pub use middleware::{configure_csp_reports, csp_with_reporting, CspReportEndpoint};
pub use monitoring::{CspViolationReport, LogSink, ReportPayload, ReportSink};
