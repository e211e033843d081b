use crate::error::AppError;
use crate::models::{NewOrder, OrderCreated};
use crate::orders::OrderRepository;
use actix_web::{delete, get, post, put, web, HttpResponse};

#[post("")]
pub async fn create_order(
    orders: web::Data<OrderRepository>,
    order: web::Json<NewOrder>,
) -> Result<HttpResponse, AppError> {
    let order_id = orders.create(&order).await?;
    tracing::info!(order_id, items = order.items.len(), "order created");
    Ok(HttpResponse::Created().json(OrderCreated { order_id }))
}

#[get("")]
pub async fn list_orders(orders: web::Data<OrderRepository>) -> Result<HttpResponse, AppError> {
    let all = orders.list().await?;
    Ok(HttpResponse::Ok().json(all))
}

#[put("/{order_id}")]
pub async fn update_order(
    orders: web::Data<OrderRepository>,
    path: web::Path<i64>,
    order: web::Json<NewOrder>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    orders.update(order_id, &order).await?;
    tracing::info!(order_id, items = order.items.len(), "order updated");
    Ok(HttpResponse::Ok().body("Order updated successfully"))
}

#[delete("/{order_id}")]
pub async fn delete_order(
    orders: web::Data<OrderRepository>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    orders.delete(order_id).await?;
    tracing::info!(order_id, "order deleted");
    Ok(HttpResponse::Ok().body("Order deleted successfully"))
}
