// kiosk-server/src/api/device.rs
use actix::Addr;
use actix_web::{get, post, web, HttpResponse, Responder};
use coin_bridge::{BridgeError, Command, DeviceBridge, GetDeviceStatus, ResetConnection, SendCommand};
use serde::Deserialize;
use serde_json::json;

use super::mailbox_error;

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: String,
}

#[get("/device/status")]
pub async fn status(bridge: web::Data<Addr<DeviceBridge>>) -> impl Responder {
    match bridge.send(GetDeviceStatus).await {
        Ok(status) => HttpResponse::Ok().json(status),
        Err(e) => mailbox_error(e),
    }
}

#[post("/device/command")]
pub async fn command(
    body: web::Json<CommandRequest>,
    bridge: web::Data<Addr<DeviceBridge>>,
) -> impl Responder {
    let command: Command = match body.command.parse() {
        Ok(command) => command,
        Err(e) => {
            return HttpResponse::BadRequest().json(json!({
                "error": e.to_string()
            }));
        }
    };

    match bridge.send(SendCommand(command)).await {
        Ok(Ok(())) => HttpResponse::Ok().json(json!({
            "success": true,
            "command": command.to_string()
        })),
        Ok(Err(BridgeError::NotReady)) => HttpResponse::ServiceUnavailable().json(json!({
            "error": "Coin acceptor is not connected"
        })),
        Ok(Err(e)) => {
            tracing::warn!("Command {} failed: {}", command, e);
            HttpResponse::ServiceUnavailable().json(json!({
                "error": e.to_string()
            }))
        },
        Err(e) => mailbox_error(e),
    }
}

#[post("/device/reset")]
pub async fn reset(bridge: web::Data<Addr<DeviceBridge>>) -> impl Responder {
    match bridge.send(ResetConnection).await {
        Ok(()) => HttpResponse::Accepted().json(json!({ "success": true })),
        Err(e) => mailbox_error(e),
    }
}
