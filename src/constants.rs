pub(crate) const HEADER_CSP: &str = "Content-Security-Policy";
pub(crate) const HEADER_CSP_REPORT_ONLY: &str = "Content-Security-Policy-Report-Only";
pub(crate) const HEADER_X_FORWARDED_PROTO: &str = "x-forwarded-proto";
pub(crate) const HEADER_FORWARDED: &str = "forwarded";

pub(crate) const DEFAULT_SRC: &str = "default-src";
pub(crate) const REPORT_URI: &str = "report-uri";

pub(crate) const NONE_KEYWORD: &str = "none";
pub(crate) const SELF_KEYWORD: &str = "self";
pub(crate) const UNSAFE_INLINE_KEYWORD: &str = "unsafe-inline";
pub(crate) const UNSAFE_EVAL_KEYWORD: &str = "unsafe-eval";

/// Tokens rendered inside single quotes.
pub(crate) const QUOTED_KEYWORDS: [&str; 4] = [
    NONE_KEYWORD,
    SELF_KEYWORD,
    UNSAFE_INLINE_KEYWORD,
    UNSAFE_EVAL_KEYWORD,
];

pub(crate) const DIRECTIVE_SEPARATOR: char = ';';
pub(crate) const SOURCE_SEPARATOR: char = ' ';
pub(crate) const QUOTE: char = '\'';

pub(crate) const DEFAULT_LOG_TAG: &str = "content-security-policy-report";
pub(crate) const DEFAULT_REPORT_URI: &str = "http://localhost/csp_reports";
pub(crate) const DEFAULT_POLICY_HEADER: &str = "upgrade-insecure-requests;";
pub(crate) const DEFAULT_MAX_REPORT_SIZE: usize = 64 * 1024;

/// Base used to pull the path out of relative report URIs.
pub(crate) const REPORT_URI_BASE: &str = "http://localhost";

pub(crate) const REPORT_LOG_TARGET: &str = "csp_report";

#[cfg_attr(not(feature = "reporting"), allow(dead_code))]
pub(crate) const REPORT_CONTENT_TYPES: [&str; 5] = [
    "application/csp-report",
    "application/json",
    "application/reports+json",
    "text/html",
    "text/plain",
];

pub(crate) const DEFAULT_BUFFER_CAPACITY: usize = 128;
