// kiosk-server/src/api/payment.rs
use actix_web::{post, web, HttpResponse, Responder};
use serde::Deserialize;

use super::{mailbox_error, missing_session_id};
use crate::payment_gate::PaymentGate;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeRequest {
    pub session_id: String,
}

#[post("/payment/authorize")]
pub async fn authorize(
    body: web::Json<AuthorizeRequest>,
    gate: web::Data<PaymentGate>,
) -> impl Responder {
    let session_id = body.into_inner().session_id;
    if session_id.trim().is_empty() {
        return missing_session_id();
    }

    match gate.authorize(&session_id).await {
        Ok(decision) => HttpResponse::Ok().json(decision),
        Err(e) => mailbox_error(e),
    }
}
