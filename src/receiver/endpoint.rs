use std::convert::Infallible;
use std::time::Duration;

use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode};

use log::{debug, info};
use rand::Rng;
use serde_json::{json, Value};

use crate::payload::Payload;

/// Routes of the local messaging endpoint. Each request is held back for a
/// random 0..=`max_latency` before it is answered.
pub async fn handle(
    req: Request<Body>,
    max_latency: Duration,
) -> Result<Response<Body>, Infallible> {
    if !max_latency.is_zero() {
        let ms = max_latency.as_millis() as u64;
        let d = Duration::from_millis(rand::thread_rng().gen_range(0..=ms));
        tokio::time::sleep(d).await;
    }

    let response = match (req.method(), req.uri().path()) {
        (&Method::POST, "/message/send") => send_message(req).await,
        (&Method::GET, "/ping") => {
            json_response(StatusCode::OK, json!({ "ok": true, "pong": true }))
        }
        _ => json_response(
            StatusCode::NOT_FOUND,
            json!({ "ok": false, "error": "not_found" }),
        ),
    };

    Ok(response)
}

async fn send_message(req: Request<Body>) -> Response<Body> {
    let payload = match hyper::body::to_bytes(req.into_body()).await {
        Ok(body) => Payload::decode(&body).ok(),
        Err(e) => {
            debug!("Can't read request body: {}", e);
            None
        }
    };

    match payload {
        Some(payload) if payload.is_complete() => {
            let message_id = format!("{:016X}", rand::random::<u64>());
            info!("Message {} to {}: {}", message_id, payload.to, payload.message);
            json_response(
                StatusCode::OK,
                json!({ "ok": true, "messageId": message_id }),
            )
        }
        _ => json_response(
            StatusCode::BAD_REQUEST,
            json!({ "ok": false, "error": "to and message are required" }),
        ),
    }
}

fn json_response(status: StatusCode, body: Value) -> Response<Body> {
    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
