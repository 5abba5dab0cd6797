//! Domain library for the user directory.
//!
//! Holds the user record, the repository ports (traits), the workflow service
//! and the error/outcome types. Keep adapters and IO concerns out of this
//! crate; the in-memory store under `adapters` exists for tests and demos.

use std::fmt::{Display, Formatter};

use serde::Deserialize;
use uuid::Uuid;

/// Opaque identifier of a user record. Assigned once at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(Uuid);

impl UserId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| CoreError::InvalidId(s.to_string()))
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Stored user record. String fields are always kept trimmed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

impl User {
    /// Build a new record with a fresh id from already trimmed input.
    pub fn new(input: UserInput) -> Self {
        Self {
            id: UserId::new(),
            full_name: input.full_name,
            email: input.email,
            phone: input.phone,
            address: input.address,
        }
    }

    /// Replace all mutable fields, keeping the id.
    pub fn apply(&mut self, input: UserInput) {
        self.full_name = input.full_name;
        self.email = input.email;
        self.phone = input.phone;
        self.address = input.address;
    }

    /// Substring match used by list filters. Case-sensitive.
    pub fn matches(&self, term: &str) -> bool {
        self.full_name.contains(term) || self.email.contains(term)
    }
}

/// The four caller-supplied fields of a create or update request.
///
/// Missing fields deserialize as empty strings so they surface as validation
/// errors rather than body parse failures.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserInput {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

impl UserInput {
    pub fn new(
        full_name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            email: email.into(),
            phone: phone.into(),
            address: address.into(),
        }
    }

    /// Copy with leading/trailing whitespace removed from every field.
    pub fn trimmed(&self) -> Self {
        Self {
            full_name: self.full_name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            address: self.address.trim().to_string(),
        }
    }
}

impl From<&User> for UserInput {
    fn from(user: &User) -> Self {
        Self {
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            address: user.address.clone(),
        }
    }
}

/// Column guarded by a unique constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    Phone,
}

impl UniqueField {
    pub fn as_str(&self) -> &'static str {
        match self {
            UniqueField::Email => "email",
            UniqueField::Phone => "phone",
        }
    }
}

/// Expected, caller-recoverable reason a write was not applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decline {
    EmailInUse,
    PhoneInUse,
    NotFound,
}

impl Decline {
    pub fn code(&self) -> &'static str {
        match self {
            Decline::EmailInUse => "EMAIL_IN_USE",
            Decline::PhoneInUse => "PHONE_IN_USE",
            Decline::NotFound => "NOT_FOUND",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Decline::EmailInUse => "Email is already in use",
            Decline::PhoneInUse => "Phone is already in use",
            Decline::NotFound => "User not found",
        }
    }
}

impl From<UniqueField> for Decline {
    fn from(field: UniqueField) -> Self {
        match field {
            UniqueField::Email => Decline::EmailInUse,
            UniqueField::Phone => Decline::PhoneInUse,
        }
    }
}

impl Display for Decline {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Result of a workflow operation that did not fault.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome<T> {
    Done(T),
    Declined(Decline),
}

impl<T> Outcome<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }

    pub fn declined(&self) -> Option<Decline> {
        match self {
            Outcome::Done(_) => None,
            Outcome::Declined(d) => Some(*d),
        }
    }
}

/// A mutation staged on a unit of work, applied on commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingChange {
    Add(User),
    Update(User),
    Delete(UserId),
}

/// Normalize an optional list filter: trimmed, and `None` when blank.
pub fn normalize_filter(filter: Option<&str>) -> Option<&str> {
    filter.map(str::trim).filter(|s| !s.is_empty())
}

/// Unit of work over the record store.
///
/// Reads go to committed state. `add`, `update` and `delete` only stage; the
/// staged batch is applied atomically by `commit`, which also clears it.
pub trait UserRepository: Send {
    fn get_by_id(&self, id: &UserId) -> Result<Option<User>, CoreError>;
    fn get_by_email(&self, email: &str) -> Result<Option<User>, CoreError>;
    fn get_by_phone(&self, phone: &str) -> Result<Option<User>, CoreError>;
    /// Users sorted by full name (ties by id), optionally filtered by a
    /// substring of full name or email.
    fn list(&self, filter: Option<&str>) -> Result<Vec<User>, CoreError>;
    fn add(&mut self, user: User) -> Result<(), CoreError>;
    fn update(&mut self, user: User) -> Result<(), CoreError>;
    fn delete(&mut self, user: &User) -> Result<(), CoreError>;
    /// Persist staged mutations. Fails with `Conflict` on a unique constraint
    /// violation and `NotFound` when a staged row vanished in the meantime.
    fn commit(&mut self) -> Result<(), CoreError>;
}

/// Shared handle to a record store; opens one unit of work per operation.
pub trait UserStore: Send + Sync {
    type Repo: UserRepository;

    fn open(&self) -> Self::Repo;
    fn count(&self) -> Result<usize, CoreError>;
}

/// Core domain errors. Declines are not errors; see [`Outcome`].
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid user id: {0}")]
    InvalidId(String),
    #[error("unique constraint violated on {}", .0.as_str())]
    Conflict(UniqueField),
    #[error("not found")]
    NotFound,
    #[error("repository error: {0}")]
    Repository(String),
}

/// Return a short about/version line for the binary to print.
pub fn about() -> String {
    let pkg = env!("CARGO_PKG_NAME");
    let ver = env!("CARGO_PKG_VERSION");
    format!("{} v{} - user directory domain", pkg, ver)
}

pub mod adapters;
pub mod service;
pub mod validate;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_parse_roundtrips_display() {
        let id = UserId::new();
        let parsed = UserId::parse(&id.to_string()).expect("valid id");
        assert_eq!(parsed, id);
    }

    #[test]
    fn user_id_rejects_garbage() {
        let err = UserId::parse("not-a-uuid").unwrap_err();
        assert!(matches!(err, CoreError::InvalidId(_)));
    }

    #[test]
    fn trimmed_strips_every_field() {
        let input = UserInput::new("  Alice ", "\ta@x.com", "111 ", " Addr1\n");
        assert_eq!(input.trimmed(), UserInput::new("Alice", "a@x.com", "111", "Addr1"));
    }

    #[test]
    fn input_deserializes_camel_case_with_missing_fields() {
        let input: UserInput =
            serde_json::from_str(r#"{"fullName":"Alice","email":"a@x.com"}"#).expect("json");
        assert_eq!(input.full_name, "Alice");
        assert_eq!(input.email, "a@x.com");
        assert!(input.phone.is_empty());
        assert!(input.address.is_empty());
    }

    #[test]
    fn matches_is_case_sensitive_on_name_and_email() {
        let user = User::new(UserInput::new("Alice", "a@x.com", "111", "Addr1"));
        assert!(user.matches("Ali"));
        assert!(user.matches("x.com"));
        assert!(!user.matches("alice"));
        assert!(!user.matches("Addr"));
    }

    #[test]
    fn normalize_filter_drops_blank() {
        assert_eq!(normalize_filter(None), None);
        assert_eq!(normalize_filter(Some("   ")), None);
        assert_eq!(normalize_filter(Some(" Al ")), Some("Al"));
    }

    #[test]
    fn unique_field_maps_to_decline() {
        assert_eq!(Decline::from(UniqueField::Email), Decline::EmailInUse);
        assert_eq!(Decline::from(UniqueField::Phone), Decline::PhoneInUse);
        assert_eq!(Decline::EmailInUse.message(), "Email is already in use");
    }
}
