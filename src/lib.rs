//! Token-authenticated order service.
//!
//! `/register` and `/login` are open; everything under `/orders` sits behind
//! [`auth::require_token`].

pub mod auth;
pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod models;
pub mod order_handlers;
pub mod orders;
pub mod user_handlers;

use actix_web::{middleware::from_fn, web};
use sqlx::SqlitePool;

use crate::auth::TokenService;
use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::error::AppError;
use crate::orders::OrderRepository;

/// Shared components, built once and cloned into every worker.
#[derive(Clone)]
pub struct AppState {
    pub credentials: web::Data<CredentialStore>,
    pub tokens: web::Data<TokenService>,
    pub orders: web::Data<OrderRepository>,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: &Config) -> Self {
        Self {
            credentials: web::Data::new(CredentialStore::new(pool.clone(), config.bcrypt_cost)),
            tokens: web::Data::new(TokenService::new(&config.jwt_secret)),
            orders: web::Data::new(OrderRepository::new(pool, config.request_timeout)),
        }
    }
}

/// Register state, extractor error handlers and all routes.
pub fn routes(cfg: &mut web::ServiceConfig, state: &AppState) {
    cfg.app_data(state.credentials.clone())
        .app_data(state.tokens.clone())
        .app_data(state.orders.clone())
        .app_data(
            web::JsonConfig::default()
                .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
        )
        .app_data(
            web::PathConfig::default()
                .error_handler(|_err, _req| AppError::BadRequest("Invalid order ID".to_string()).into()),
        )
        .service(user_handlers::health)
        .service(user_handlers::register)
        .service(user_handlers::login)
        .service(
            web::scope("/orders")
                .wrap(from_fn(auth::require_token))
                .service(order_handlers::create_order)
                .service(order_handlers::list_orders)
                .service(order_handlers::update_order)
                .service(order_handlers::delete_order),
        );
}
