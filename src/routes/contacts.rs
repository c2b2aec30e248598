use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use crate::authentication::CurrentUser;
use crate::domain::{ContactName, ContactNotes, EmailAddress, NewContact, PhoneNumber};
use crate::rate_limit::{RateLimitExceeded, RateLimits};
use crate::repository::contacts::{self as repository_contacts, Contact};
use crate::repository::users::User;
use crate::routes::error_chain_fmt;
use crate::routes::users::UserResponse;
use crate::utils::error_detail;

const CONTACT_NOT_FOUND: &str = "NOT FOUND";
// The favourite toggle has its own message
const NOTE_NOT_FOUND: &str = "Note not found";

#[derive(thiserror::Error)]
pub enum ContactApiError {
    #[error(transparent)]
    RateLimited(#[from] RateLimitExceeded),
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    NotFound(&'static str),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for ContactApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for ContactApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ContactApiError::RateLimited(e) => e.status_code(),
            ContactApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ContactApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ContactApiError::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ContactApiError::UnexpectedError(_) => {
                error_detail(self.status_code(), "Internal Server Error")
            }
            _ => error_detail(self.status_code(), &self.to_string()),
        }
    }
}

#[derive(serde::Deserialize, serde::Serialize, Debug, Clone)]
pub struct ContactBody {
    pub name: String,
    pub lastname: String,
    pub email: String,
    pub phone: String,
    pub birthday: NaiveDate,
    pub notes: String,
    pub favourite: Option<bool>,
}

/// Full replacement of a contact: unlike creation, `favourite` is required.
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone)]
pub struct ContactUpdateBody {
    pub name: String,
    pub lastname: String,
    pub email: String,
    pub phone: String,
    pub birthday: NaiveDate,
    pub notes: String,
    pub favourite: bool,
}

#[derive(serde::Deserialize, serde::Serialize, Debug)]
pub struct ContactStatusBody {
    pub favourite: bool,
}

impl TryFrom<ContactBody> for NewContact {
    type Error = String;

    fn try_from(value: ContactBody) -> Result<Self, Self::Error> {
        Ok(Self {
            name: ContactName::parse(value.name)?,
            lastname: ContactName::parse(value.lastname)?,
            email: EmailAddress::parse(value.email)?,
            phone: PhoneNumber::parse(value.phone)?,
            birthday: value.birthday,
            notes: ContactNotes::parse(value.notes)?,
            favourite: value.favourite.unwrap_or(false),
        })
    }
}

impl TryFrom<ContactUpdateBody> for NewContact {
    type Error = String;

    fn try_from(value: ContactUpdateBody) -> Result<Self, Self::Error> {
        ContactBody {
            name: value.name,
            lastname: value.lastname,
            email: value.email,
            phone: value.phone,
            birthday: value.birthday,
            notes: value.notes,
            favourite: Some(value.favourite),
        }
        .try_into()
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct ContactResponse {
    pub id: i32,
    pub name: String,
    pub lastname: String,
    pub email: String,
    pub phone: String,
    pub birthday: NaiveDate,
    pub notes: String,
    pub favourite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user: UserResponse,
}

impl ContactResponse {
    fn new(contact: Contact, owner: &User) -> Self {
        Self {
            id: contact.id,
            name: contact.name,
            lastname: contact.lastname,
            email: contact.email,
            phone: contact.phone,
            birthday: contact.birthday,
            notes: contact.notes,
            favourite: contact.favourite,
            created_at: contact.created_at,
            updated_at: contact.updated_at,
            user: UserResponse::from(owner),
        }
    }
}

fn list_response(contacts: Vec<Contact>, owner: &User) -> HttpResponse {
    let contacts: Vec<_> = contacts
        .into_iter()
        .map(|contact| ContactResponse::new(contact, owner))
        .collect();
    HttpResponse::Ok().json(contacts)
}

fn contact_id(path: web::Path<i32>) -> Result<i32, ContactApiError> {
    let id = path.into_inner();
    if id < 1 {
        return Err(ContactApiError::ValidationError(
            "contact_id must be greater than or equal to 1".into(),
        ));
    }
    Ok(id)
}

#[derive(serde::Deserialize, Debug)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    10
}

#[tracing::instrument(name = "List contacts", skip(request, user, pool, limits), fields(user_id = %user.id))]
pub async fn get_contacts(
    request: HttpRequest,
    query: web::Query<Pagination>,
    user: web::ReqData<CurrentUser>,
    pool: web::Data<PgPool>,
    limits: web::Data<RateLimits>,
) -> Result<HttpResponse, ContactApiError> {
    limits.get_contacts.check(&request)?;
    let Pagination { limit, offset } = query.into_inner();
    if !(10..=500).contains(&limit) {
        return Err(ContactApiError::ValidationError(
            "limit must be between 10 and 500".into(),
        ));
    }
    if offset < 0 {
        return Err(ContactApiError::ValidationError(
            "offset must be greater than or equal to 0".into(),
        ));
    }

    let contacts = repository_contacts::get_contacts(limit, offset, user.id, &pool)
        .await
        .context("Failed to retrieve contacts")?;
    Ok(list_response(contacts, &user))
}

#[tracing::instrument(name = "Get a contact", skip(request, user, pool, limits), fields(user_id = %user.id))]
pub async fn get_contact(
    request: HttpRequest,
    path: web::Path<i32>,
    user: web::ReqData<CurrentUser>,
    pool: web::Data<PgPool>,
    limits: web::Data<RateLimits>,
) -> Result<HttpResponse, ContactApiError> {
    limits.get_contact.check(&request)?;
    let contact_id = contact_id(path)?;

    let contact = repository_contacts::get_contact(contact_id, user.id, &pool)
        .await
        .context("Failed to retrieve the contact")?
        .ok_or(ContactApiError::NotFound(CONTACT_NOT_FOUND))?;
    Ok(HttpResponse::Ok().json(ContactResponse::new(contact, &user)))
}

#[tracing::instrument(
    name = "Create a contact",
    skip(request, body, user, pool, limits),
    fields(user_id = %user.id)
)]
pub async fn create_contact(
    request: HttpRequest,
    body: web::Json<ContactBody>,
    user: web::ReqData<CurrentUser>,
    pool: web::Data<PgPool>,
    limits: web::Data<RateLimits>,
) -> Result<HttpResponse, ContactApiError> {
    limits.create_contact.check(&request)?;
    let new_contact: NewContact = body
        .into_inner()
        .try_into()
        .map_err(ContactApiError::ValidationError)?;

    let contact = repository_contacts::create_contact(&new_contact, user.id, &pool)
        .await
        .context("Failed to store the new contact")?;
    Ok(HttpResponse::Created().json(ContactResponse::new(contact, &user)))
}

#[tracing::instrument(
    name = "Update a contact",
    skip(request, body, user, pool, limits),
    fields(user_id = %user.id)
)]
pub async fn update_contact(
    request: HttpRequest,
    path: web::Path<i32>,
    body: web::Json<ContactUpdateBody>,
    user: web::ReqData<CurrentUser>,
    pool: web::Data<PgPool>,
    limits: web::Data<RateLimits>,
) -> Result<HttpResponse, ContactApiError> {
    limits.update_contact.check(&request)?;
    let contact_id = contact_id(path)?;
    let contact: NewContact = body
        .into_inner()
        .try_into()
        .map_err(ContactApiError::ValidationError)?;

    let contact = repository_contacts::update_contact(contact_id, &contact, user.id, &pool)
        .await
        .context("Failed to update the contact")?
        .ok_or(ContactApiError::NotFound(CONTACT_NOT_FOUND))?;
    Ok(HttpResponse::Ok().json(ContactResponse::new(contact, &user)))
}

#[tracing::instrument(name = "Delete a contact", skip(request, user, pool, limits), fields(user_id = %user.id))]
pub async fn delete_contact(
    request: HttpRequest,
    path: web::Path<i32>,
    user: web::ReqData<CurrentUser>,
    pool: web::Data<PgPool>,
    limits: web::Data<RateLimits>,
) -> Result<HttpResponse, ContactApiError> {
    limits.delete_contact.check(&request)?;
    let contact_id = contact_id(path)?;

    // Deleting a contact that is already gone is not an error
    let deleted = repository_contacts::delete_contact(contact_id, user.id, &pool)
        .await
        .context("Failed to delete the contact")?;
    if deleted.is_none() {
        tracing::info!("No contact to delete");
    }
    Ok(HttpResponse::NoContent().finish())
}

#[tracing::instrument(
    name = "Update the favourite status of a contact",
    skip(request, body, user, pool, limits),
    fields(user_id = %user.id)
)]
pub async fn update_status_contact(
    request: HttpRequest,
    path: web::Path<i32>,
    body: web::Json<ContactStatusBody>,
    user: web::ReqData<CurrentUser>,
    pool: web::Data<PgPool>,
    limits: web::Data<RateLimits>,
) -> Result<HttpResponse, ContactApiError> {
    limits.update_status_contact.check(&request)?;
    let contact_id = contact_id(path)?;

    let contact = repository_contacts::update_status_contact(
        contact_id,
        body.favourite,
        user.id,
        &pool,
    )
    .await
    .context("Failed to update the contact status")?
    .ok_or(ContactApiError::NotFound(NOTE_NOT_FOUND))?;
    Ok(HttpResponse::Ok().json(ContactResponse::new(contact, &user)))
}

#[derive(serde::Deserialize, Debug)]
pub struct SearchQuery {
    search: String,
}

#[tracing::instrument(name = "Search contacts", skip(request, user, pool, limits), fields(user_id = %user.id))]
pub async fn search_contacts(
    request: HttpRequest,
    query: web::Query<SearchQuery>,
    user: web::ReqData<CurrentUser>,
    pool: web::Data<PgPool>,
    limits: web::Data<RateLimits>,
) -> Result<HttpResponse, ContactApiError> {
    limits.search_contacts.check(&request)?;
    if query.search.is_empty() {
        return Err(ContactApiError::ValidationError(
            "search must not be empty".into(),
        ));
    }

    let contacts = repository_contacts::search_contacts(&query.search, user.id, &pool)
        .await
        .context("Failed to search contacts")?;
    Ok(list_response(contacts, &user))
}

#[derive(serde::Deserialize, Debug)]
pub struct BirthdayQuery {
    #[serde(default = "default_days")]
    days: u32,
}

fn default_days() -> u32 {
    7
}

#[tracing::instrument(
    name = "List contacts with upcoming birthdays",
    skip(request, user, pool, limits),
    fields(user_id = %user.id)
)]
pub async fn birthday_contacts(
    request: HttpRequest,
    query: web::Query<BirthdayQuery>,
    user: web::ReqData<CurrentUser>,
    pool: web::Data<PgPool>,
    limits: web::Data<RateLimits>,
) -> Result<HttpResponse, ContactApiError> {
    limits.birthday_contacts.check(&request)?;
    if query.days < 1 {
        return Err(ContactApiError::ValidationError(
            "days must be greater than or equal to 1".into(),
        ));
    }

    let today = chrono::Local::now().date_naive();
    let contacts =
        repository_contacts::get_birthday_contacts(query.days, today, user.id, &pool)
            .await
            .context("Failed to retrieve contacts with upcoming birthdays")?;
    Ok(list_response(contacts, &user))
}
