//! Field validation for create/update input. Transports run this before
//! handing input to the service; the service itself assumes well-formed data.

use std::fmt::{Display, Formatter};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::UserInput;

pub const MAX_FULL_NAME_LEN: usize = 200;
pub const MAX_EMAIL_LEN: usize = 200;
pub const MAX_PHONE_LEN: usize = 50;
pub const MAX_ADDRESS_LEN: usize = 300;

// Exactly one '@' with something on both sides, no whitespace anywhere.
static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+$").expect("email pattern compiles"));

// Optional '+', digits and common separators, optional "x12" / "ext. 12" suffix
// in any letter case.
static PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\+?[\d\s().\-]*\d[\d\s().\-]*(\s?(x|ext\.?)\s?\d+)?$")
        .expect("phone pattern compiles")
});

/// Input field, with its wire name and display label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    FullName,
    Email,
    Phone,
    Address,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::FullName, Field::Email, Field::Phone, Field::Address];

    /// camelCase name used in JSON bodies and form posts.
    pub fn key(&self) -> &'static str {
        match self {
            Field::FullName => "fullName",
            Field::Email => "email",
            Field::Phone => "phone",
            Field::Address => "address",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Field::FullName => "Full name",
            Field::Email => "Email",
            Field::Phone => "Phone",
            Field::Address => "Address",
        }
    }

    pub fn max_len(&self) -> usize {
        match self {
            Field::FullName => MAX_FULL_NAME_LEN,
            Field::Email => MAX_EMAIL_LEN,
            Field::Phone => MAX_PHONE_LEN,
            Field::Address => MAX_ADDRESS_LEN,
        }
    }

    fn value<'a>(&self, input: &'a UserInput) -> &'a str {
        match self {
            Field::FullName => &input.full_name,
            Field::Email => &input.email,
            Field::Phone => &input.phone,
            Field::Address => &input.address,
        }
    }
}

/// Per-field validation messages, in field order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldErrors {
    errors: Vec<(Field, String)>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: Field, message: impl Into<String>) {
        self.errors.push((field, message.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.errors.iter().map(|(f, m)| (*f, m.as_str()))
    }

    pub fn for_field(&self, field: Field) -> impl Iterator<Item = &str> {
        self.errors
            .iter()
            .filter(move |(f, _)| *f == field)
            .map(|(_, m)| m.as_str())
    }

    pub fn has(&self, field: Field) -> bool {
        self.errors.iter().any(|(f, _)| *f == field)
    }
}

impl Display for FieldErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|(field, msg)| format!("{}: {}", field.key(), msg))
            .collect();
        write!(f, "validation failed ({})", parts.join("; "))
    }
}

impl std::error::Error for FieldErrors {}

/// Validate all four fields of a create/update request.
///
/// Checks run on the trimmed values; every failing rule is reported.
pub fn validate_user_input(input: &UserInput) -> Result<(), FieldErrors> {
    let trimmed = input.trimmed();
    let mut errors = FieldErrors::new();

    for field in Field::ALL {
        let value = field.value(&trimmed);
        if value.is_empty() {
            errors.push(field, format!("{} is required", field.label()));
            continue;
        }
        if value.chars().count() > field.max_len() {
            errors.push(
                field,
                format!("{} must be at most {} characters", field.label(), field.max_len()),
            );
        }
        match field {
            Field::Email if !is_valid_email(value) => {
                errors.push(field, "Email is not a valid email address")
            }
            Field::Phone if !is_valid_phone(value) => {
                errors.push(field, "Phone is not a valid phone number")
            }
            _ => {}
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn is_valid_email(s: &str) -> bool {
    EMAIL_PATTERN.is_match(s)
}

pub fn is_valid_phone(s: &str) -> bool {
    PHONE_PATTERN.is_match(s)
}
