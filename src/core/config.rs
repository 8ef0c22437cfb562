use crate::constants::{
    DEFAULT_LOG_TAG, DEFAULT_MAX_REPORT_SIZE, DEFAULT_POLICY_HEADER, DEFAULT_REPORT_URI,
    DEFAULT_SRC, HEADER_CSP, HEADER_CSP_REPORT_ONLY, REPORT_URI, REPORT_URI_BASE,
};
use crate::core::directives::{DirectiveValue, FetchDirectives};
use crate::core::variety::Variety;
use crate::error::CspError;
use crate::monitoring::report::{LogSink, ReportSink};
use actix_web::{web::Bytes, HttpRequest, HttpResponse};
use futures::future::{FutureExt, LocalBoxFuture};
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, fmt, future::Future, sync::Arc};
use url::Url;

/// Replaces the built-in report route handler entirely. Receives the buffered
/// report body, already capped at `max_report_size`.
pub type ReportHandler =
    Arc<dyn Fn(HttpRequest, Bytes) -> LocalBoxFuture<'static, HttpResponse> + Send + Sync + 'static>;

/// Immutable plugin configuration.
///
/// [`CspConfig::default`] holds the stock settings; callers overlay their own
/// through [`CspConfigBuilder`] or [`CspOptions`].
#[derive(Clone)]
pub struct CspConfig {
    https_only: bool,
    trust_forwarded_proto: bool,
    log_tags: Vec<Cow<'static, str>>,
    varieties_to_include: Vec<Variety>,
    fetch_directives: FetchDirectives,
    report_errors: bool,
    upgrade_insecure_requests: bool,
    header_key: Cow<'static, str>,
    policy_header_key: Cow<'static, str>,
    policy_header: Cow<'static, str>,
    max_report_size: usize,
    route_handler: Option<ReportHandler>,
    report_sink: Arc<dyn ReportSink>,
}

impl Default for CspConfig {
    fn default() -> Self {
        Self {
            https_only: false,
            trust_forwarded_proto: true,
            log_tags: vec![Cow::Borrowed(DEFAULT_LOG_TAG)],
            varieties_to_include: vec![Variety::View],
            fetch_directives: FetchDirectives::new()
                .with(DEFAULT_SRC, ["https:"])
                .with(REPORT_URI, DEFAULT_REPORT_URI),
            report_errors: true,
            upgrade_insecure_requests: true,
            header_key: Cow::Borrowed(HEADER_CSP_REPORT_ONLY),
            policy_header_key: Cow::Borrowed(HEADER_CSP),
            policy_header: Cow::Borrowed(DEFAULT_POLICY_HEADER),
            max_report_size: DEFAULT_MAX_REPORT_SIZE,
            route_handler: None,
            report_sink: Arc::new(LogSink),
        }
    }
}

impl fmt::Debug for CspConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CspConfig")
            .field("https_only", &self.https_only)
            .field("trust_forwarded_proto", &self.trust_forwarded_proto)
            .field("log_tags", &self.log_tags)
            .field("varieties_to_include", &self.varieties_to_include)
            .field("fetch_directives", &self.fetch_directives)
            .field("report_errors", &self.report_errors)
            .field("upgrade_insecure_requests", &self.upgrade_insecure_requests)
            .field("header_key", &self.header_key)
            .field("policy_header_key", &self.policy_header_key)
            .field("policy_header", &self.policy_header)
            .field("max_report_size", &self.max_report_size)
            .field("route_handler", &self.route_handler.is_some())
            .finish_non_exhaustive()
    }
}

impl CspConfig {
    /// Defaults merged with `options`.
    pub fn from_options(options: CspOptions) -> Result<Self, CspError> {
        CspConfigBuilder::new().options(options).build()
    }

    #[inline]
    pub fn https_only(&self) -> bool {
        self.https_only
    }

    #[inline]
    pub fn trust_forwarded_proto(&self) -> bool {
        self.trust_forwarded_proto
    }

    #[inline]
    pub fn log_tags(&self) -> &[Cow<'static, str>] {
        &self.log_tags
    }

    #[inline]
    pub fn varieties_to_include(&self) -> &[Variety] {
        &self.varieties_to_include
    }

    #[inline]
    pub fn includes_variety(&self, variety: &Variety) -> bool {
        self.varieties_to_include.contains(variety)
    }

    #[inline]
    pub fn fetch_directives(&self) -> &FetchDirectives {
        &self.fetch_directives
    }

    #[inline]
    pub fn report_errors(&self) -> bool {
        self.report_errors
    }

    #[inline]
    pub fn upgrade_insecure_requests(&self) -> bool {
        self.upgrade_insecure_requests
    }

    #[inline]
    pub fn header_key(&self) -> &str {
        &self.header_key
    }

    #[inline]
    pub fn policy_header_key(&self) -> &str {
        &self.policy_header_key
    }

    #[inline]
    pub fn policy_header(&self) -> &str {
        &self.policy_header
    }

    #[inline]
    pub fn max_report_size(&self) -> usize {
        self.max_report_size
    }

    #[inline]
    pub fn route_handler(&self) -> Option<&ReportHandler> {
        self.route_handler.as_ref()
    }

    #[inline]
    pub fn report_sink(&self) -> &Arc<dyn ReportSink> {
        &self.report_sink
    }

    #[inline]
    pub fn report_uri(&self) -> Option<&str> {
        self.fetch_directives.report_uri()
    }

    /// URL path of the configured report-uri, if any.
    pub fn report_path(&self) -> Result<Option<String>, CspError> {
        self.report_uri().map(report_path_of).transpose()
    }

    pub fn validate(&self) -> Result<(), CspError> {
        self.report_path()?;

        if self.max_report_size == 0 {
            return Err(CspError::ConfigError(
                "max_report_size must be greater than zero".to_string(),
            ));
        }

        if self.header_key.is_empty() || self.policy_header_key.is_empty() {
            return Err(CspError::ConfigError(
                "header keys must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Resolves `uri` against `http://localhost` and returns its path.
pub fn report_path_of(uri: &str) -> Result<String, CspError> {
    let base = Url::parse(REPORT_URI_BASE)
        .map_err(|e| CspError::InvalidReportUri(format!("{REPORT_URI_BASE}: {e}")))?;
    let url = Url::options()
        .base_url(Some(&base))
        .parse(uri)
        .map_err(|e| CspError::InvalidReportUri(format!("{uri}: {e}")))?;
    Ok(url.path().to_owned())
}

/// Caller overrides, every field optional.
///
/// Deserializes from camelCase keys so existing JSON option blobs can be
/// loaded as they are:
///
/// ```json
/// { "varietiesToInclude": ["plain"], "fetchDirectives": { "img-src": "https:" } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CspOptions {
    pub https_only: Option<bool>,
    pub trust_forwarded_proto: Option<bool>,
    pub log_tags: Option<Vec<String>>,
    pub varieties_to_include: Option<Vec<Variety>>,
    pub fetch_directives: Option<FetchDirectives>,
    pub report_errors: Option<bool>,
    pub upgrade_insecure_requests: Option<bool>,
    pub header_key: Option<String>,
    pub policy_header_key: Option<String>,
    pub policy_header: Option<String>,
    pub max_report_size: Option<usize>,
}

impl CspOptions {
    pub fn from_json(json: &str) -> Result<Self, CspError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Default)]
pub struct CspConfigBuilder {
    config: CspConfig,
}

impl CspConfigBuilder {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn https_only(mut self, enabled: bool) -> Self {
        self.config.https_only = enabled;
        self
    }

    #[inline]
    pub fn trust_forwarded_proto(mut self, enabled: bool) -> Self {
        self.config.trust_forwarded_proto = enabled;
        self
    }

    pub fn log_tags(mut self, tags: impl IntoIterator<Item = impl Into<Cow<'static, str>>>) -> Self {
        self.config.log_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn varieties(mut self, varieties: impl IntoIterator<Item = impl Into<Variety>>) -> Self {
        self.config.varieties_to_include = varieties.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the whole directive map, defaults included.
    pub fn fetch_directives(mut self, directives: FetchDirectives) -> Self {
        self.config.fetch_directives = directives;
        self
    }

    /// Overlays `directives` on the current map, keeping unnamed entries.
    pub fn merge_fetch_directives(mut self, directives: FetchDirectives) -> Self {
        self.config.fetch_directives.merge(directives);
        self
    }

    pub fn directive(
        mut self,
        name: impl Into<Cow<'static, str>>,
        value: impl Into<DirectiveValue>,
    ) -> Self {
        self.config.fetch_directives.insert(name, value);
        self
    }

    #[inline]
    pub fn report_errors(mut self, enabled: bool) -> Self {
        self.config.report_errors = enabled;
        self
    }

    #[inline]
    pub fn upgrade_insecure_requests(mut self, enabled: bool) -> Self {
        self.config.upgrade_insecure_requests = enabled;
        self
    }

    #[inline]
    pub fn header_key(mut self, key: impl Into<Cow<'static, str>>) -> Self {
        self.config.header_key = key.into();
        self
    }

    #[inline]
    pub fn policy_header_key(mut self, key: impl Into<Cow<'static, str>>) -> Self {
        self.config.policy_header_key = key.into();
        self
    }

    #[inline]
    pub fn policy_header(mut self, value: impl Into<Cow<'static, str>>) -> Self {
        self.config.policy_header = value.into();
        self
    }

    #[inline]
    pub fn max_report_size(mut self, size: usize) -> Self {
        self.config.max_report_size = size;
        self
    }

    pub fn route_handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(HttpRequest, Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HttpResponse> + 'static,
    {
        let handler: ReportHandler = Arc::new(
            move |req: HttpRequest, body: Bytes| -> LocalBoxFuture<'static, HttpResponse> {
                handler(req, body).boxed_local()
            },
        );
        self.config.route_handler = Some(handler);
        self
    }

    pub fn report_sink(mut self, sink: impl ReportSink + 'static) -> Self {
        self.config.report_sink = Arc::new(sink);
        self
    }

    /// Applies every field set in `options`; each one replaces the current value.
    pub fn options(mut self, options: CspOptions) -> Self {
        let CspOptions {
            https_only,
            trust_forwarded_proto,
            log_tags,
            varieties_to_include,
            fetch_directives,
            report_errors,
            upgrade_insecure_requests,
            header_key,
            policy_header_key,
            policy_header,
            max_report_size,
        } = options;

        if let Some(enabled) = https_only {
            self = self.https_only(enabled);
        }
        if let Some(enabled) = trust_forwarded_proto {
            self = self.trust_forwarded_proto(enabled);
        }
        if let Some(tags) = log_tags {
            self = self.log_tags(tags);
        }
        if let Some(varieties) = varieties_to_include {
            self = self.varieties(varieties);
        }
        if let Some(directives) = fetch_directives {
            self = self.fetch_directives(directives);
        }
        if let Some(enabled) = report_errors {
            self = self.report_errors(enabled);
        }
        if let Some(enabled) = upgrade_insecure_requests {
            self = self.upgrade_insecure_requests(enabled);
        }
        if let Some(key) = header_key {
            self = self.header_key(key);
        }
        if let Some(key) = policy_header_key {
            self = self.policy_header_key(key);
        }
        if let Some(value) = policy_header {
            self = self.policy_header(value);
        }
        if let Some(size) = max_report_size {
            self = self.max_report_size(size);
        }
        self
    }

    pub fn build(self) -> Result<CspConfig, CspError> {
        self.config.validate()?;
        Ok(self.config)
    }

    #[inline]
    pub fn build_unchecked(self) -> CspConfig {
        self.config
    }
}
