use crate::constants::{REPORT_CONTENT_TYPES, REPORT_LOG_TARGET};
use crate::core::config::{CspConfig, ReportHandler};
use crate::error::CspError;
use crate::middleware::csp::CspMiddleware;
use crate::monitoring::report::{ReportPayload, ReportSink};
use actix_web::{
    error::PayloadError,
    http::header::CONTENT_TYPE,
    web::{self, Bytes, BytesMut, ServiceConfig},
    HttpRequest, HttpResponse,
};
use futures::StreamExt;
use std::{borrow::Cow, sync::Arc};

/// Receives browser violation reports at the path of the configured
/// `report-uri`, on any method.
///
/// The body is read raw, up to `max_report_size` bytes. JSON bodies are
/// forwarded as JSON, anything else as text; oversized or broken bodies are
/// dropped with a warning. The client always gets an empty `200 OK`. A route
/// handler set on the config replaces everything after the body is read.
pub struct CspReportEndpoint {
    path: String,
    log_tags: Vec<Cow<'static, str>>,
    sink: Arc<dyn ReportSink>,
    handler: Option<ReportHandler>,
    max_report_size: usize,
}

/// Outcome of buffering a report body.
#[derive(Debug)]
pub enum ReportBody {
    Complete(Bytes),
    /// The body grew past the limit; reading stopped there.
    Oversized,
    Failed(PayloadError),
}

impl CspReportEndpoint {
    /// `None` when the config has no report-uri.
    pub fn new(config: &CspConfig) -> Result<Option<Self>, CspError> {
        config.validate()?;

        Ok(config.report_path()?.map(|path| Self {
            path,
            log_tags: config.log_tags().to_vec(),
            sink: config.report_sink().clone(),
            handler: config.route_handler().cloned(),
            max_report_size: config.max_report_size(),
        }))
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    pub fn max_report_size(&self) -> usize {
        self.max_report_size
    }

    /// Buffers at most `max_report_size` bytes of `payload`.
    pub async fn read_body(&self, mut payload: web::Payload) -> ReportBody {
        let mut body = BytesMut::new();

        while let Some(chunk) = payload.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => return ReportBody::Failed(e),
            };

            if body.len() + chunk.len() > self.max_report_size {
                return ReportBody::Oversized;
            }
            body.extend_from_slice(&chunk);
        }

        ReportBody::Complete(body.freeze())
    }

    pub async fn receive(&self, req: HttpRequest, payload: web::Payload) -> HttpResponse {
        match self.read_body(payload).await {
            ReportBody::Complete(body) => self.handle(req, body).await,
            ReportBody::Oversized => {
                log::warn!(
                    target: REPORT_LOG_TARGET,
                    "[{}] report dropped: oversized (limit {} bytes)",
                    self.log_tags.join(","),
                    self.max_report_size
                );
                HttpResponse::Ok().finish()
            }
            ReportBody::Failed(e) => {
                log::warn!(
                    target: REPORT_LOG_TARGET,
                    "[{}] report dropped: {}",
                    self.log_tags.join(","),
                    e
                );
                HttpResponse::Ok().finish()
            }
        }
    }

    pub async fn handle(&self, req: HttpRequest, body: Bytes) -> HttpResponse {
        if let Some(handler) = &self.handler {
            return handler(req, body).await;
        }

        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::trim);

        match content_type {
            Some(mime) if is_report_content_type(mime) => {}
            other => log::debug!("csp report with unexpected content type {:?}", other),
        }

        let payload = ReportPayload::parse(&body);
        if !payload.is_json() {
            log::debug!("csp report body is not JSON, forwarding as text");
        }
        self.sink.submit(&self.log_tags, &payload);

        HttpResponse::Ok().finish()
    }

    pub fn register(self, cfg: &mut ServiceConfig) {
        let path = self.path.clone();
        let endpoint = Arc::new(self);

        cfg.service(web::resource(path).route(web::route().to(
            move |req: HttpRequest, payload: web::Payload| {
                let endpoint = endpoint.clone();
                async move { endpoint.receive(req, payload).await }
            },
        )));
    }
}

#[inline]
fn is_report_content_type(mime: &str) -> bool {
    REPORT_CONTENT_TYPES
        .iter()
        .any(|accepted| accepted.eq_ignore_ascii_case(mime))
}

/// Registers the report route, or nothing when no report-uri is configured.
pub fn configure_csp_reports(
    config: &CspConfig,
) -> Result<impl FnOnce(&mut ServiceConfig), CspError> {
    let endpoint = CspReportEndpoint::new(config)?;

    Ok(move |cfg: &mut ServiceConfig| {
        if let Some(endpoint) = endpoint {
            log::debug!("csp report route registered at {}", endpoint.path());
            endpoint.register(cfg);
        }
    })
}

/// Middleware plus report route configurator from one config.
pub fn csp_with_reporting(
    config: CspConfig,
) -> Result<(CspMiddleware, impl FnOnce(&mut ServiceConfig)), CspError> {
    let configurator = configure_csp_reports(&config)?;
    let middleware = CspMiddleware::new(config)?;
    Ok((middleware, configurator))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CspConfigBuilder;
    use crate::core::directives::FetchDirectives;
    use actix_web::{test::TestRequest, FromRequest};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(Vec<String>, ReportPayload)>>);

    impl ReportSink for Arc<Recorder> {
        fn submit(&self, tags: &[Cow<'static, str>], payload: &ReportPayload) {
            let tags = tags.iter().map(|tag| tag.to_string()).collect();
            self.0.lock().unwrap().push((tags, payload.clone()));
        }
    }

    #[test]
    fn no_report_uri_means_no_endpoint() {
        let config = CspConfigBuilder::new()
            .fetch_directives(FetchDirectives::new().with("default-src", "self"))
            .build()
            .unwrap();

        assert!(CspReportEndpoint::new(&config).unwrap().is_none());
    }

    #[test]
    fn endpoint_uses_the_uri_path() {
        let config = CspConfigBuilder::new()
            .directive("report-uri", "http://localhost:8080/report")
            .build()
            .unwrap();

        let endpoint = CspReportEndpoint::new(&config).unwrap().unwrap();
        assert_eq!(endpoint.path(), "/report");
    }

    #[actix_web::test]
    async fn forwards_payload_with_tags() {
        let recorder = Arc::new(Recorder::default());
        let config = CspConfigBuilder::new()
            .log_tags(["csp", "security"])
            .report_sink(recorder.clone())
            .build()
            .unwrap();
        let endpoint = CspReportEndpoint::new(&config).unwrap().unwrap();
        let req = TestRequest::post()
            .uri("/csp_reports")
            .insert_header(("content-type", "application/csp-report"))
            .to_http_request();

        let res = endpoint
            .handle(req.clone(), Bytes::from_static(br#"{"csp-report":{}}"#))
            .await;
        assert_eq!(res.status(), 200);
        let res = endpoint.handle(req, Bytes::from_static(b"oops")).await;
        assert_eq!(res.status(), 200);

        let records = recorder.0.lock().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].0, ["csp", "security"]);
        assert!(records[0].1.is_json());
        assert_eq!(records[1].1, ReportPayload::Text("oops".to_string()));
    }

    #[actix_web::test]
    async fn custom_handler_replaces_default() {
        let recorder = Arc::new(Recorder::default());
        let config = CspConfigBuilder::new()
            .report_sink(recorder.clone())
            .route_handler(|_, _| async { HttpResponse::NoContent().finish() })
            .build()
            .unwrap();
        let endpoint = CspReportEndpoint::new(&config).unwrap().unwrap();
        let req = TestRequest::post().uri("/csp_reports").to_http_request();

        let res = endpoint.handle(req, Bytes::new()).await;
        assert_eq!(res.status(), 204);
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    async fn read(endpoint: &CspReportEndpoint, body: &'static [u8]) -> ReportBody {
        let (req, mut payload) = TestRequest::post()
            .uri("/csp_reports")
            .set_payload(body)
            .to_http_parts();
        let payload = web::Payload::from_request(&req, &mut payload).await.unwrap();
        endpoint.read_body(payload).await
    }

    #[actix_web::test]
    async fn body_limit_is_inclusive() {
        let config = CspConfigBuilder::new().max_report_size(16).build().unwrap();
        let endpoint = CspReportEndpoint::new(&config).unwrap().unwrap();

        match read(&endpoint, b"0123456789abcdef").await {
            ReportBody::Complete(body) => assert_eq!(body.len(), 16),
            other => panic!("expected a complete body, got {other:?}"),
        }
        assert!(matches!(
            read(&endpoint, b"0123456789abcdefg").await,
            ReportBody::Oversized
        ));
        assert!(matches!(read(&endpoint, b"").await, ReportBody::Complete(body) if body.is_empty()));
    }

    #[test]
    fn accepted_content_types() {
        assert!(is_report_content_type("application/csp-report"));
        assert!(is_report_content_type("Application/JSON"));
        assert!(is_report_content_type("text/html"));
        assert!(!is_report_content_type("image/png"));
    }
}
