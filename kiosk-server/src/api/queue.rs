// kiosk-server/src/api/queue.rs
use actix::Addr;
use actix_web::{get, post, web, HttpResponse, Responder};
use common::models::session::{FileInfo, QueueStatus};
use serde::Deserialize;
use serde_json::json;

use super::{mailbox_error, missing_session_id};
use crate::actors::queue_manager::{
    CompleteSession,
    GetQueueInfo,
    GetQueueStatus,
    Heartbeat,
    JoinQueue,
    LeaveQueue,
    QueueManagerActor,
};
use crate::admission::QueueError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub session_id: String,
    #[serde(default)]
    pub file_info: FileInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub session_id: String,
}

// Unknown sessions are "already gone": 404 with the NOT_FOUND status body
fn status_response(queue_status: QueueStatus) -> HttpResponse {
    if queue_status.is_found() {
        HttpResponse::Ok().json(queue_status)
    } else {
        HttpResponse::NotFound().json(queue_status)
    }
}

#[post("/queue/join")]
pub async fn join(
    body: web::Json<JoinRequest>,
    queue: web::Data<Addr<QueueManagerActor>>,
) -> impl Responder {
    let JoinRequest { session_id, file_info } = body.into_inner();
    if session_id.trim().is_empty() {
        return missing_session_id();
    }

    match queue.send(JoinQueue { session_id, file_info }).await {
        Ok(Ok(queue_status)) => HttpResponse::Ok().json(queue_status),
        Ok(Err(QueueError::QueueFull { capacity })) => HttpResponse::TooManyRequests().json(json!({
            "error": "QUEUE_FULL",
            "capacity": capacity
        })),
        Err(e) => mailbox_error(e),
    }
}

#[get("/queue/status/{session_id}")]
pub async fn status(
    path: web::Path<(String,)>,
    queue: web::Data<Addr<QueueManagerActor>>,
) -> impl Responder {
    let session_id = path.into_inner().0;
    match queue.send(GetQueueStatus { session_id }).await {
        Ok(queue_status) => status_response(queue_status),
        Err(e) => mailbox_error(e),
    }
}

#[post("/queue/heartbeat")]
pub async fn heartbeat(
    body: web::Json<SessionRequest>,
    queue: web::Data<Addr<QueueManagerActor>>,
) -> impl Responder {
    let session_id = body.into_inner().session_id;
    if session_id.trim().is_empty() {
        return missing_session_id();
    }

    match queue.send(Heartbeat { session_id }).await {
        Ok(queue_status) => status_response(queue_status),
        Err(e) => mailbox_error(e),
    }
}

#[post("/queue/leave")]
pub async fn leave(
    body: web::Json<SessionRequest>,
    queue: web::Data<Addr<QueueManagerActor>>,
) -> impl Responder {
    let session_id = body.into_inner().session_id;
    match queue.send(LeaveQueue { session_id }).await {
        Ok(success) => HttpResponse::Ok().json(json!({ "success": success })),
        Err(e) => mailbox_error(e),
    }
}

#[post("/queue/complete")]
pub async fn complete(
    body: web::Json<SessionRequest>,
    queue: web::Data<Addr<QueueManagerActor>>,
) -> impl Responder {
    let session_id = body.into_inner().session_id;
    match queue.send(CompleteSession { session_id }).await {
        Ok(success) => HttpResponse::Ok().json(json!({ "success": success })),
        Err(e) => mailbox_error(e),
    }
}

#[get("/queue/info")]
pub async fn info(queue: web::Data<Addr<QueueManagerActor>>) -> impl Responder {
    match queue.send(GetQueueInfo).await {
        Ok(info) => HttpResponse::Ok().json(info),
        Err(e) => mailbox_error(e),
    }
}
