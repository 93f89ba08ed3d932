use actix_web::{http::header, web, HttpRequest, HttpResponse};
use serde::Deserialize;
use tracing::info;

use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub prompt: Option<String>,
}

pub async fn chat(
    req: HttpRequest,
    body: Option<web::Json<ChatRequest>>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());
    let prompt = body.as_ref().and_then(|b| b.prompt.as_deref());

    info!("Received chat request");
    let reply = state.chat_gateway.handle(authorization, prompt).await?;
    Ok(HttpResponse::Ok().json(reply))
}
