use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::AppState;
use crate::error::AppError;
use tracing::{info, error};

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub id: Uuid,
    pub email: String,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub email: String,
    pub message: &'static str,
    pub token: String,
}

fn require_body(
    body: Option<web::Json<CredentialsRequest>>,
) -> Result<CredentialsRequest, AppError> {
    body.map(web::Json::into_inner)
        .ok_or_else(|| AppError::ValidationError("Bad request".into()))
}

pub async fn register(
    body: Option<web::Json<CredentialsRequest>>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let req = require_body(body)?;
    info!("Received registration request for email: {}", req.email);

    match state.auth_service.register(&req.email, &req.password).await {
        Ok(account) => {
            info!("Registration successful for email: {}", account.email);
            Ok(HttpResponse::Created().json(RegisterResponse {
                id: account.id,
                email: account.email,
                message: "Account created. Proceed to login to access the Chat",
            }))
        }
        Err(e) => {
            error!("Registration failed for email: {}: {}", req.email, e);
            Err(e)
        }
    }
}

pub async fn login(
    body: Option<web::Json<CredentialsRequest>>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let req = require_body(body)?;
    info!("Received login request for email: {}", req.email);

    match state.auth_service.login(&req.email, &req.password).await {
        Ok(session) => {
            info!("Login successful for email: {}", session.email);
            Ok(HttpResponse::Ok().json(LoginResponse {
                email: session.email,
                message: "Successfully authenticated. Proceed to access the Chat",
                token: session.token,
            }))
        }
        Err(e) => {
            error!("Login failed for email: {}: {}", req.email, e);
            Err(e)
        }
    }
}
