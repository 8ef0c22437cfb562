#![cfg(feature = "reporting")]

use actix_web::{dev::ServiceResponse, test, web, App, HttpResponse};
use actix_web_csp_report::prelude::*;
use std::borrow::Cow;
use std::sync::{Arc, Mutex};

const REPORT_ONLY: &str = "content-security-policy-report-only";

#[derive(Default, Clone)]
struct Recorder(Arc<Mutex<Vec<(String, ReportPayload)>>>);

impl Recorder {
    fn payloads(&self) -> Vec<ReportPayload> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .map(|(_, payload)| payload.clone())
            .collect()
    }
}

impl ReportSink for Recorder {
    fn submit(&self, tags: &[Cow<'static, str>], payload: &ReportPayload) {
        self.0
            .lock()
            .unwrap()
            .push((tags.join(","), payload.clone()));
    }
}

async fn page() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html")
        .body("<img src='http://localhost:8080/a.jpg'>")
}

async fn call(config: CspConfig, req: test::TestRequest) -> ServiceResponse {
    let (csp, reports) = csp_with_reporting(config).unwrap();
    let app = test::init_service(
        App::new()
            .wrap(csp)
            .configure(reports)
            .route("/", web::get().to(page)),
    )
    .await;

    test::call_service(&app, req.to_request()).await
}

fn recording_config(recorder: &Recorder) -> CspConfig {
    CspConfigBuilder::new()
        .varieties(["plain", "view"])
        .log_tags(["csp", "report"])
        .report_sink(recorder.clone())
        .build()
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[actix_web::test]
    async fn logs_json_reports_and_answers_ok() {
        let recorder = Recorder::default();
        let res = call(
            recording_config(&recorder),
            test::TestRequest::post()
                .uri("/csp_reports")
                .insert_header(("content-type", "application/csp-report"))
                .set_payload(
                    r#"{"csp-report":{"document-uri":"http://localhost:8080/","violated-directive":"img-src https:","blocked-uri":"http://localhost:8080/a.jpg"}}"#,
                ),
        )
        .await;

        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get(REPORT_ONLY).is_none());
        let body = test::read_body(res).await;
        assert!(body.is_empty());

        let records = recorder.0.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, "csp,report");
        let violation = records[0].1.violation().unwrap();
        assert_eq!(violation.violated_directive, "img-src https:");
        assert_eq!(violation.blocked_uri, "http://localhost:8080/a.jpg");
    }

    #[actix_web::test]
    async fn invalid_json_is_logged_as_text() {
        let recorder = Recorder::default();
        let res = call(
            recording_config(&recorder),
            test::TestRequest::post()
                .uri("/csp_reports")
                .insert_header(("content-type", "application/json"))
                .set_payload("{not json"),
        )
        .await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            recorder.payloads(),
            [ReportPayload::Text("{not json".to_string())]
        );
    }

    #[actix_web::test]
    async fn empty_body_answers_ok() {
        let recorder = Recorder::default();
        let res = call(
            recording_config(&recorder),
            test::TestRequest::post().uri("/csp_reports"),
        )
        .await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(recorder.payloads(), [ReportPayload::Text(String::new())]);
    }

    #[actix_web::test]
    async fn accepts_any_method() {
        let recorder = Recorder::default();
        let config = recording_config(&recorder);

        for req in [
            test::TestRequest::get(),
            test::TestRequest::put(),
            test::TestRequest::delete(),
            test::TestRequest::patch(),
        ] {
            let res = call(config.clone(), req.uri("/csp_reports")).await;
            assert_eq!(res.status(), StatusCode::OK);
        }

        assert_eq!(recorder.payloads().len(), 4);
    }

    #[actix_web::test]
    async fn other_routes_are_still_tagged() {
        let recorder = Recorder::default();
        let res = call(
            recording_config(&recorder),
            test::TestRequest::get().uri("/"),
        )
        .await;

        assert!(res.headers().get(REPORT_ONLY).is_some());
        assert!(recorder.payloads().is_empty());
    }

    #[actix_web::test]
    async fn route_follows_report_uri_path() {
        let recorder = Recorder::default();
        let config = CspConfigBuilder::new()
            .varieties(["plain"])
            .report_sink(recorder.clone())
            .fetch_directives(
                FetchDirectives::new()
                    .with("img-src", "https:")
                    .with("report-uri", "http://localhost:8080/report"),
            )
            .build()
            .unwrap();

        let res = call(
            config,
            test::TestRequest::post()
                .uri("/report")
                .set_payload(r#"{"csp-report":{}}"#),
        )
        .await;

        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get(REPORT_ONLY).is_none());
        assert_eq!(recorder.payloads().len(), 1);
    }

    #[actix_web::test]
    async fn custom_route_handler_replaces_default() {
        let recorder = Recorder::default();
        let config = CspConfigBuilder::new()
            .report_sink(recorder.clone())
            .route_handler(|_req, body| async move { HttpResponse::Accepted().body(body) })
            .build()
            .unwrap();

        let res = call(
            config,
            test::TestRequest::post()
                .uri("/csp_reports")
                .set_payload("echo"),
        )
        .await;

        assert_eq!(res.status(), StatusCode::ACCEPTED);
        assert_eq!(test::read_body(res).await, "echo");
        assert!(recorder.payloads().is_empty());
    }

    #[actix_web::test]
    async fn oversized_report_is_dropped_with_ok() {
        let recorder = Recorder::default();
        let res = call(
            recording_config(&recorder),
            test::TestRequest::post()
                .uri("/csp_reports")
                .insert_header(("content-type", "application/csp-report"))
                .set_payload(vec![b'a'; 70 * 1024]),
        )
        .await;

        assert_eq!(res.status(), StatusCode::OK);
        assert!(test::read_body(res).await.is_empty());
        assert!(recorder.payloads().is_empty());
    }

    #[actix_web::test]
    async fn report_size_limit_is_configurable() {
        let recorder = Recorder::default();
        let config = CspConfigBuilder::new()
            .report_sink(recorder.clone())
            .max_report_size(8)
            .build()
            .unwrap();

        let res = call(
            config.clone(),
            test::TestRequest::post()
                .uri("/csp_reports")
                .set_payload("123456789"),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(recorder.payloads().is_empty());

        let res = call(
            config,
            test::TestRequest::post()
                .uri("/csp_reports")
                .set_payload("12345678"),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            recorder.payloads(),
            [ReportPayload::Json(serde_json::json!(12345678))]
        );
    }

    #[actix_web::test]
    async fn oversized_report_skips_custom_handler() {
        let config = CspConfigBuilder::new()
            .max_report_size(4)
            .route_handler(|_req, _body| async { HttpResponse::Accepted().finish() })
            .build()
            .unwrap();

        let res = call(
            config,
            test::TestRequest::post()
                .uri("/csp_reports")
                .set_payload("too long"),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn no_report_uri_registers_no_route() {
        let config = CspConfigBuilder::new()
            .fetch_directives(FetchDirectives::new().with("default-src", "self"))
            .build()
            .unwrap();

        let res = call(config, test::TestRequest::post().uri("/csp_reports")).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn default_sink_answers_ok() {
        let _ = env_logger::builder().is_test(true).try_init();

        let res = call(
            CspConfig::default(),
            test::TestRequest::post()
                .uri("/csp_reports")
                .set_payload(r#"{"csp-report":{"blocked-uri":"inline"}}"#),
        )
        .await;

        assert_eq!(res.status(), StatusCode::OK);
    }
}
