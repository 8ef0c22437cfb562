use crate::constants::REPORT_LOG_TARGET;
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, convert::TryFrom, fmt};

/// Body of a `csp-report` object as browsers send it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CspViolationReport {
    #[serde(rename = "document-uri", default)]
    pub document_uri: String,

    #[serde(rename = "referrer", default)]
    pub referrer: String,

    #[serde(rename = "blocked-uri", default)]
    pub blocked_uri: String,

    #[serde(rename = "violated-directive", default)]
    pub violated_directive: String,

    #[serde(rename = "effective-directive", default)]
    pub effective_directive: String,

    #[serde(rename = "original-policy", default)]
    pub original_policy: String,

    #[serde(rename = "disposition", default)]
    pub disposition: String,

    #[serde(rename = "source-file", skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,

    #[serde(rename = "line-number", skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,

    #[serde(rename = "column-number", skip_serializing_if = "Option::is_none")]
    pub column_number: Option<u32>,

    #[serde(rename = "status-code", skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,

    #[serde(rename = "script-sample", skip_serializing_if = "Option::is_none")]
    pub script_sample: Option<String>,
}

impl CspViolationReport {
    #[inline]
    pub fn is_enforce(&self) -> bool {
        self.disposition == "enforce"
    }

    #[inline]
    pub fn is_report(&self) -> bool {
        self.disposition == "report"
    }
}

impl TryFrom<&serde_json::Value> for CspViolationReport {
    type Error = serde_json::Error;

    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        serde_json::from_value(value.clone())
    }
}

/// Whatever arrived at the report endpoint.
#[derive(Clone, Debug, PartialEq)]
pub enum ReportPayload {
    Json(serde_json::Value),
    Text(String),
}

impl ReportPayload {
    /// JSON when the body parses, lossy UTF-8 text otherwise. Never fails.
    pub fn parse(body: &[u8]) -> Self {
        match serde_json::from_slice(body) {
            Ok(json) => ReportPayload::Json(json),
            Err(_) => ReportPayload::Text(String::from_utf8_lossy(body).into_owned()),
        }
    }

    #[inline]
    pub fn is_json(&self) -> bool {
        matches!(self, ReportPayload::Json(_))
    }

    /// The typed `csp-report` member, when present and well formed.
    pub fn violation(&self) -> Option<CspViolationReport> {
        match self {
            ReportPayload::Json(json) => json
                .get("csp-report")
                .and_then(|report| CspViolationReport::try_from(report).ok()),
            ReportPayload::Text(_) => None,
        }
    }
}

impl fmt::Display for ReportPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportPayload::Json(json) => write!(f, "{json}"),
            ReportPayload::Text(text) => f.write_str(text),
        }
    }
}

/// Destination for received reports.
pub trait ReportSink: Send + Sync {
    fn submit(&self, tags: &[Cow<'static, str>], payload: &ReportPayload);
}

/// Writes reports through the `log` facade under the `csp_report` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn submit(&self, tags: &[Cow<'static, str>], payload: &ReportPayload) {
        log::info!(target: REPORT_LOG_TARGET, "[{}] {}", tags.join(","), payload);

        if let Some(violation) = payload.violation() {
            log::debug!(
                target: REPORT_LOG_TARGET,
                "violated-directive={} blocked-uri={} document-uri={}",
                violation.violated_directive,
                violation.blocked_uri,
                violation.document_uri
            );
        }
    }
}
