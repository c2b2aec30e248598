use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{has_upcoming_birthday, NewContact};

const CONTACT_COLUMNS: &str = "id, name, lastname, email, phone, birthday, \
    notes, favourite, created_at, updated_at, user_id";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Contact {
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
    pub user_id: Uuid,
}

#[tracing::instrument(name = "Get contacts", skip(pool))]
pub async fn get_contacts(
    limit: i64,
    offset: i64,
    user_id: Uuid,
    pool: &PgPool,
) -> Result<Vec<Contact>, sqlx::Error> {
    sqlx::query_as::<_, Contact>(&format!(
        "SELECT {} FROM contacts WHERE user_id = $1 ORDER BY id LIMIT $2 OFFSET $3",
        CONTACT_COLUMNS
    ))
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

#[tracing::instrument(name = "Get contact", skip(pool))]
pub async fn get_contact(
    contact_id: i32,
    user_id: Uuid,
    pool: &PgPool,
) -> Result<Option<Contact>, sqlx::Error> {
    sqlx::query_as::<_, Contact>(&format!(
        "SELECT {} FROM contacts WHERE id = $1 AND user_id = $2",
        CONTACT_COLUMNS
    ))
    .bind(contact_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

#[tracing::instrument(name = "Saving new contact in the database", skip(contact, pool))]
pub async fn create_contact(
    contact: &NewContact,
    user_id: Uuid,
    pool: &PgPool,
) -> Result<Contact, sqlx::Error> {
    sqlx::query_as::<_, Contact>(&format!(
        r#"
        INSERT INTO contacts (name, lastname, email, phone, birthday, notes, favourite, user_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {}
        "#,
        CONTACT_COLUMNS
    ))
    .bind(contact.name.as_ref())
    .bind(contact.lastname.as_ref())
    .bind(contact.email.as_ref())
    .bind(contact.phone.as_ref())
    .bind(contact.birthday)
    .bind(contact.notes.as_ref())
    .bind(contact.favourite)
    .bind(user_id)
    .fetch_one(pool)
    .await
}

/// Replace every field of a contact. `None` if the user owns no such contact.
#[tracing::instrument(name = "Update contact", skip(contact, pool))]
pub async fn update_contact(
    contact_id: i32,
    contact: &NewContact,
    user_id: Uuid,
    pool: &PgPool,
) -> Result<Option<Contact>, sqlx::Error> {
    sqlx::query_as::<_, Contact>(&format!(
        r#"
        UPDATE contacts
        SET name = $1, lastname = $2, email = $3, phone = $4, birthday = $5,
            notes = $6, favourite = $7, updated_at = now()
        WHERE id = $8 AND user_id = $9
        RETURNING {}
        "#,
        CONTACT_COLUMNS
    ))
    .bind(contact.name.as_ref())
    .bind(contact.lastname.as_ref())
    .bind(contact.email.as_ref())
    .bind(contact.phone.as_ref())
    .bind(contact.birthday)
    .bind(contact.notes.as_ref())
    .bind(contact.favourite)
    .bind(contact_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

#[tracing::instrument(name = "Delete contact", skip(pool))]
pub async fn delete_contact(
    contact_id: i32,
    user_id: Uuid,
    pool: &PgPool,
) -> Result<Option<Contact>, sqlx::Error> {
    sqlx::query_as::<_, Contact>(&format!(
        "DELETE FROM contacts WHERE id = $1 AND user_id = $2 RETURNING {}",
        CONTACT_COLUMNS
    ))
    .bind(contact_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

#[tracing::instrument(name = "Update contact favourite status", skip(pool))]
pub async fn update_status_contact(
    contact_id: i32,
    favourite: bool,
    user_id: Uuid,
    pool: &PgPool,
) -> Result<Option<Contact>, sqlx::Error> {
    sqlx::query_as::<_, Contact>(&format!(
        r#"
        UPDATE contacts SET favourite = $1, updated_at = now()
        WHERE id = $2 AND user_id = $3
        RETURNING {}
        "#,
        CONTACT_COLUMNS
    ))
    .bind(favourite)
    .bind(contact_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Case-insensitive substring search over name, last name and email.
#[tracing::instrument(name = "Search contacts", skip(pool))]
pub async fn search_contacts(
    search: &str,
    user_id: Uuid,
    pool: &PgPool,
) -> Result<Vec<Contact>, sqlx::Error> {
    sqlx::query_as::<_, Contact>(&format!(
        r#"
        SELECT {} FROM contacts
        WHERE user_id = $1
          AND (name ILIKE $2 OR lastname ILIKE $2 OR email ILIKE $2)
        ORDER BY id
        "#,
        CONTACT_COLUMNS
    ))
    .bind(user_id)
    .bind(format!("%{}%", search))
    .fetch_all(pool)
    .await
}

/// Contacts with a birthday within `days` days from `today`.
#[tracing::instrument(name = "Get contacts with upcoming birthdays", skip(pool))]
pub async fn get_birthday_contacts(
    days: u32,
    today: NaiveDate,
    user_id: Uuid,
    pool: &PgPool,
) -> Result<Vec<Contact>, sqlx::Error> {
    let contacts = sqlx::query_as::<_, Contact>(&format!(
        "SELECT {} FROM contacts WHERE user_id = $1 ORDER BY id",
        CONTACT_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(contacts
        .into_iter()
        .filter(|contact| has_upcoming_birthday(contact.birthday, today, days))
        .collect())
}
