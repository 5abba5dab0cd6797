use tracing::{debug, info};

use crate::{CoreError, Decline, Outcome, User, UserId, UserInput, UserRepository};

/// Application service enforcing the uniqueness rules around user writes.
///
/// Wraps one unit of work. Uniqueness is pre-checked with plain reads, so two
/// concurrent writers can both pass the check; the store's unique constraints
/// then reject the loser at commit, and that rejection is reported as the
/// matching decline rather than a fault.
pub struct UserService<R: UserRepository> {
    repo: R,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Users sorted by full name, optionally filtered by a substring of name or email.
    pub fn list(&self, filter: Option<&str>) -> Result<Vec<User>, CoreError> {
        self.repo.list(filter)
    }

    pub fn get(&self, id: &UserId) -> Result<Option<User>, CoreError> {
        self.repo.get_by_id(id)
    }

    /// Create a user from trimmed input unless the email or phone is taken.
    pub fn create(&mut self, input: UserInput) -> Result<Outcome<User>, CoreError> {
        let input = input.trimmed();

        if self.repo.get_by_email(&input.email)?.is_some() {
            debug!(email = %input.email, "create declined: email in use");
            return Ok(Outcome::Declined(Decline::EmailInUse));
        }
        if self.repo.get_by_phone(&input.phone)?.is_some() {
            debug!(phone = %input.phone, "create declined: phone in use");
            return Ok(Outcome::Declined(Decline::PhoneInUse));
        }

        let user = User::new(input);
        self.repo.add(user.clone())?;
        if let Some(decline) = self.commit()? {
            return Ok(Outcome::Declined(decline));
        }

        info!(id = %user.id, "user created");
        Ok(Outcome::Done(user))
    }

    /// Replace all mutable fields of an existing user.
    pub fn update(&mut self, id: &UserId, input: UserInput) -> Result<Outcome<User>, CoreError> {
        let Some(mut user) = self.repo.get_by_id(id)? else {
            return Ok(Outcome::Declined(Decline::NotFound));
        };
        let input = input.trimmed();

        if let Some(other) = self.repo.get_by_email(&input.email)? {
            if other.id != *id {
                debug!(%id, email = %input.email, "update declined: email in use");
                return Ok(Outcome::Declined(Decline::EmailInUse));
            }
        }
        if let Some(other) = self.repo.get_by_phone(&input.phone)? {
            if other.id != *id {
                debug!(%id, phone = %input.phone, "update declined: phone in use");
                return Ok(Outcome::Declined(Decline::PhoneInUse));
            }
        }

        user.apply(input);
        self.repo.update(user.clone())?;
        if let Some(decline) = self.commit()? {
            return Ok(Outcome::Declined(decline));
        }

        info!(%id, "user updated");
        Ok(Outcome::Done(user))
    }

    pub fn delete(&mut self, id: &UserId) -> Result<Outcome<()>, CoreError> {
        let Some(user) = self.repo.get_by_id(id)? else {
            return Ok(Outcome::Declined(Decline::NotFound));
        };

        self.repo.delete(&user)?;
        if let Some(decline) = self.commit()? {
            return Ok(Outcome::Declined(decline));
        }

        info!(%id, "user deleted");
        Ok(Outcome::Done(()))
    }

    // Storage-level rejections that correspond to a decline are translated;
    // anything else stays a fault.
    fn commit(&mut self) -> Result<Option<Decline>, CoreError> {
        match self.repo.commit() {
            Ok(()) => Ok(None),
            Err(CoreError::Conflict(field)) => {
                debug!(field = field.as_str(), "commit rejected by unique constraint");
                Ok(Some(Decline::from(field)))
            }
            Err(CoreError::NotFound) => Ok(Some(Decline::NotFound)),
            Err(e) => Err(e),
        }
    }
}
