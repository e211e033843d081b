use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Clone, FromRow)]
pub struct User {
    pub username: String,
    pub password_hash: String,
}

/// Body of `/register` and `/login`.
///
/// `Debug` on `SecretString` is redacted, so the struct is safe to log.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// Session token payload. `exp` is always `iat` + 24 hours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub line_item_id: i64,
    pub order_id: i64,
    pub item_code: String,
    pub description: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: i64,
    pub customer_name: String,
    pub ordered_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub items: Vec<Item>,
}

/// Line item as submitted by a client. Store-assigned ids are ignored if sent.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub item_code: String,
    #[serde(default)]
    pub description: String,
    pub quantity: i64,
}

/// Payload of `POST /orders` and `PUT /orders/{orderId}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub customer_name: String,
    pub ordered_at: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<NewItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreated {
    pub order_id: i64,
}
