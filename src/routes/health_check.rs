use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use sqlx::PgPool;

use crate::routes::MessageResponse;
use crate::utils::error_detail;

#[tracing::instrument(name = "Health check", skip(pool))]
pub async fn health_check(pool: web::Data<PgPool>) -> HttpResponse {
    match sqlx::query("SELECT 1").fetch_one(pool.get_ref()).await {
        Ok(_) => HttpResponse::Ok()
            .json(MessageResponse::new("Welcome to the Contact Book API!")),
        Err(e) => {
            tracing::error!(
                error.cause_chain = ?e,
                error.message = %e,
                "Failed to reach the database"
            );
            error_detail(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error connecting to the database",
            )
        }
    }
}
