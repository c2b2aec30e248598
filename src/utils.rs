use actix_web::error::InternalError;
use actix_web::http::StatusCode;
use actix_web::HttpResponse;

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct ErrorDetail {
    pub detail: String,
}

/// `{"detail": ...}` response, the error body shape of the whole API.
pub fn error_detail(status: StatusCode, detail: &str) -> HttpResponse {
    HttpResponse::build(status).json(ErrorDetail {
        detail: detail.to_string(),
    })
}

// Return a 422 with the error message as detail.
pub fn e422<T>(e: T) -> actix_web::Error
where
    T: std::fmt::Debug + std::fmt::Display + 'static,
{
    let response = error_detail(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string());
    InternalError::from_response(e, response).into()
}
