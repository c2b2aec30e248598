//! Validated building blocks of users and contacts.
mod birthday;
mod contact_name;
mod email_address;
mod new_contact;
mod new_user;
mod phone_number;
mod user_name;

pub use birthday::*;
pub use contact_name::ContactName;
pub use email_address::EmailAddress;
pub use new_contact::{ContactNotes, NewContact};
pub use new_user::{NewUser, Password};
pub use phone_number::PhoneNumber;
pub use user_name::UserName;
