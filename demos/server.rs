use actix_web::{web, App, HttpResponse, HttpServer};
use actix_web_csp_report::{csp_with_reporting, CspConfig, CspConfigBuilder, CspError, FetchDirectives};

async fn index() -> HttpResponse {
    // One insecure and one secure image: the browser reports the first.
    HttpResponse::Ok().content_type("text/html").body(
        r#"<!DOCTYPE html>
<html>
<body>
    <img src="http://localhost:8080/a.jpg">
    <img src="https://localhost:8080/b.jpg">
</body>
</html>"#,
    )
}

fn config() -> Result<CspConfig, CspError> {
    CspConfigBuilder::new()
        .varieties(["view", "plain"])
        .fetch_directives(
            FetchDirectives::new()
                // Report any img tag whose src is not https.
                .with("img-src", "https:")
                .with("report-uri", "http://localhost:8080/report"),
        )
        .build()
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    config().map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    log::info!("Server started, browse to http://localhost:8080 to see a sample report");

    HttpServer::new(|| {
        let (csp, reports) = config()
            .and_then(csp_with_reporting)
            .expect("configuration validated at startup");

        App::new()
            .wrap(csp)
            .configure(reports)
            .route("/", web::get().to(index))
    })
    .bind(("127.0.0.1", 8080))?
    .run()
    .await
}
