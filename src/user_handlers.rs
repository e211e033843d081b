use crate::auth::TokenService;
use crate::credentials::{CredentialError, CredentialStore};
use crate::error::AppError;
use crate::models::Credentials;
use actix_web::{get, post, web, HttpResponse, Responder};

/// Simple health check
#[get("/health")]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().body("OK")
}

#[post("/register")]
pub async fn register(
    store: web::Data<CredentialStore>,
    data: web::Json<Credentials>,
) -> Result<HttpResponse, AppError> {
    let username = data.username.trim();
    if username.is_empty() {
        return Err(AppError::BadRequest("username must not be empty".to_string()));
    }

    store.register(username, &data.password).await?;
    Ok(HttpResponse::Created().body("User registered successfully"))
}

/// Answers with the bare token string. Unknown users and wrong passwords get
/// the same 401.
#[post("/login")]
pub async fn login(
    store: web::Data<CredentialStore>,
    tokens: web::Data<TokenService>,
    data: web::Json<Credentials>,
) -> Result<HttpResponse, AppError> {
    let username = data.username.trim();

    match store.verify(username, &data.password).await {
        Ok(true) => {}
        Ok(false) | Err(CredentialError::NotFound) | Err(CredentialError::Hashing(_)) => {
            tracing::info!(%username, "login rejected");
            return Err(AppError::InvalidCredentials);
        }
        Err(err) => return Err(err.into()),
    }

    let token = tokens.issue(username)?;
    tracing::info!(%username, "login succeeded");
    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(token))
}
