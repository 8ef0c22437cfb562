pub use crate::core::{CspConfig, CspConfigBuilder, CspOptions, FetchDirectives, Variety};
pub use crate::middleware::{csp_middleware, CspExtensions, CspMiddleware, RouteCsp};
#[cfg(feature = "reporting")]
pub use crate::middleware::{configure_csp_reports, csp_with_reporting};
pub use crate::monitoring::{CspViolationReport, ReportPayload, ReportSink};
