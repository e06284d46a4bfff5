// kiosk-server/src/api/mod.rs
pub mod coins;
pub mod device;
pub mod payment;
pub mod queue;

use actix::MailboxError;
use actix_web::HttpResponse;
use serde_json::json;

pub fn configure(cfg: &mut actix_web::web::ServiceConfig) {
    cfg.service(
        actix_web::web::scope("/api")
            .service(queue::join)
            .service(queue::status)
            .service(queue::heartbeat)
            .service(queue::leave)
            .service(queue::complete)
            .service(queue::info)
            .service(coins::last_coin)
            .service(coins::claim)
            .service(coins::lookup_claim)
            .service(payment::authorize)
            .service(device::status)
            .service(device::command)
            .service(device::reset)
    );
}

pub(crate) fn mailbox_error(e: MailboxError) -> HttpResponse {
    tracing::error!("Actor mailbox error: {}", e);
    HttpResponse::InternalServerError().json(json!({
        "error": "Internal server error"
    }))
}

pub(crate) fn missing_session_id() -> HttpResponse {
    HttpResponse::BadRequest().json(json!({
        "error": "sessionId is required"
    }))
}
