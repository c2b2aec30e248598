use actix_web::HttpResponse;

use crate::routes::MessageResponse;

pub async fn home() -> HttpResponse {
    HttpResponse::Ok().json(MessageResponse::new("Contact Book"))
}
