use actix_web::{get, middleware, web::Data, App, HttpRequest, HttpResponse, Responder, HttpServer};
use controller::controllers::springboot_controller::{self, State};
use controller::util::{config::Config, telemetry};
use kube::Client;
use prometheus::{Encoder, TextEncoder};
use tracing::{error, info};

#[get("/metrics")]
async fn metrics(c: Data<State>, _req: HttpRequest) -> impl Responder {
    let metrics = c.metrics();
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    match encoder.encode(&metrics, &mut buffer) {
        Ok(()) => HttpResponse::Ok().content_type(encoder.format_type()).body(buffer),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[get("/health")]
async fn health(_: HttpRequest) -> impl Responder {
    HttpResponse::Ok().json("healthy")
}

#[get("/")]
async fn index(c: Data<State>, _req: HttpRequest) -> impl Responder {
    let d = c.diagnostics().await;
    HttpResponse::Ok().json(&d)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    telemetry::init(config.log_format);

    // Initiatilize Kubernetes controller state
    let state = State::new()?;
    let client = Client::try_default().await?;
    info!("Starting SpringBoot controller, serving on {}", config.bind_address);
    let springboot_controller = springboot_controller::run(state.clone(), client, config.clone());

    // Start web server
    let server = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(state.clone()))
            .wrap(middleware::Logger::default().exclude("/health"))
            .service(index)
            .service(health)
            .service(metrics)
    })
    .bind(config.bind_address.as_str())?
    .shutdown_timeout(5);

    // Both runtimes implements graceful shutdown, so poll until both are done
    tokio::join!(springboot_controller, server.run()).1?;
    Ok(())
}
