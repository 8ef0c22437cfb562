use crate::core::config::CspConfig;
use crate::core::directives::FetchDirectives;
use crate::error::CspError;
use actix_web::http::header::{HeaderName, HeaderValue};
use bytes::Bytes;

/// Header pairs rendered once from a [`CspConfig`].
///
/// Nothing here is recomputed per request; the middleware clones the
/// prepared `HeaderValue`s into each decorated response.
#[derive(Debug, Clone)]
pub struct RenderedPolicy {
    directives: String,
    report_only: Option<(HeaderName, HeaderValue)>,
    enforcing: Option<(HeaderName, HeaderValue)>,
}

impl RenderedPolicy {
    /// Canonical policy string: `name token token` entries joined by `;`.
    /// Keywords are single-quoted and empty lists are skipped.
    #[inline]
    pub fn render(directives: &FetchDirectives) -> String {
        use std::fmt::Write;

        let mut rendered = String::with_capacity(
            directives
                .estimated_size()
                .max(crate::constants::DEFAULT_BUFFER_CAPACITY),
        );
        // Writing into a String cannot fail.
        let _ = write!(rendered, "{directives}");
        rendered
    }

    pub fn compile(config: &CspConfig) -> Result<Self, CspError> {
        let directives = Self::render(config.fetch_directives());

        let report_only = if config.report_errors() {
            let name = header_name(config.header_key())?;
            let value = HeaderValue::from_maybe_shared(Bytes::from(directives.clone()))
                .map_err(|_| CspError::InvalidDirectiveValue(directives.clone()))?;
            Some((name, value))
        } else {
            None
        };

        let enforcing = if config.upgrade_insecure_requests() {
            let name = header_name(config.policy_header_key())?;
            let value = HeaderValue::from_str(config.policy_header())
                .map_err(|_| CspError::InvalidDirectiveValue(config.policy_header().to_owned()))?;
            Some((name, value))
        } else {
            None
        };

        Ok(Self {
            directives,
            report_only,
            enforcing,
        })
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.directives
    }

    #[inline]
    pub fn report_only_header(&self) -> Option<(&HeaderName, &HeaderValue)> {
        self.report_only.as_ref().map(|(name, value)| (name, value))
    }

    #[inline]
    pub fn enforcing_header(&self) -> Option<(&HeaderName, &HeaderValue)> {
        self.enforcing.as_ref().map(|(name, value)| (name, value))
    }

    /// Headers to attach, report-only first.
    #[inline]
    pub fn headers(&self) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> {
        self.report_only_header()
            .into_iter()
            .chain(self.enforcing_header())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.report_only.is_none() && self.enforcing.is_none()
    }
}

fn header_name(key: &str) -> Result<HeaderName, CspError> {
    HeaderName::from_bytes(key.as_bytes())
        .map_err(|e| CspError::HeaderError(format!("{key}: {e}")))
}
