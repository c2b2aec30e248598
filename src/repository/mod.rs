//! Data access over the Postgres pool. Every contact query is scoped to
//! the owning user.
pub mod contacts;
pub mod users;
