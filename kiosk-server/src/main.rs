// kiosk-server/src/main.rs
use actix_web::{get, App, HttpResponse, HttpServer, Responder};
use coin_bridge::DeviceBridge;
use common::{setup_tracing, Config};
use kiosk_server::{recorder_from_config, KioskServices};

#[get("/")]
async fn index() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "name": "Kiosk Server",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    setup_tracing(&level);

    let config = Config::from_env();
    let server_addr = config.server_addr.clone();

    match &config.device.port {
        Some(port) => tracing::info!("Coin acceptor pinned to {}", port),
        None => tracing::info!("Coin acceptor port will be auto-discovered"),
    }

    let recorder = recorder_from_config(&config.recorder);
    let services = KioskServices::start(&config, DeviceBridge::serial(&config.device), recorder);

    tracing::info!("Starting Kiosk Server on {}", server_addr);

    HttpServer::new(move || {
        let services = services.clone();
        App::new()
            .service(index)
            .configure(move |cfg| services.configure(cfg))
    })
    .bind(&server_addr)?
    .run()
    .await
}
