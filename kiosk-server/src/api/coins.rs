// kiosk-server/src/api/coins.rs
use actix::Addr;
use actix_web::{get, post, web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

use super::{mailbox_error, missing_session_id};
use crate::actors::coin_ledger::{ClaimCoin, CoinLedgerActor, GetLastCoin, LookupClaim};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    /// Milliseconds since the epoch, as reported with the coin
    pub timestamp: i64,
    pub value: u32,
    pub session_id: String,
}

#[get("/coins/last")]
pub async fn last_coin(ledger: web::Data<Addr<CoinLedgerActor>>) -> impl Responder {
    match ledger.send(GetLastCoin).await {
        Ok(coin) => HttpResponse::Ok().json(coin),
        Err(e) => mailbox_error(e),
    }
}

#[post("/coins/claim")]
pub async fn claim(
    body: web::Json<ClaimRequest>,
    ledger: web::Data<Addr<CoinLedgerActor>>,
) -> impl Responder {
    let ClaimRequest { timestamp, value, session_id } = body.into_inner();
    if session_id.trim().is_empty() {
        return missing_session_id();
    }

    match ledger.send(ClaimCoin { timestamp, value, session_id }).await {
        Ok(success) => HttpResponse::Ok().json(json!({ "success": success })),
        Err(e) => mailbox_error(e),
    }
}

#[get("/coins/claim/{timestamp}/{value}")]
pub async fn lookup_claim(
    path: web::Path<(i64, u32)>,
    ledger: web::Data<Addr<CoinLedgerActor>>,
) -> impl Responder {
    let (timestamp, value) = path.into_inner();
    match ledger.send(LookupClaim { timestamp, value }).await {
        Ok(Some(coin)) => HttpResponse::Ok().json(coin),
        Ok(None) => HttpResponse::NotFound().json(json!({
            "error": "Coin not claimed"
        })),
        Err(e) => mailbox_error(e),
    }
}
