use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    normalize_filter, CoreError, PendingChange, UniqueField, User, UserId, UserRepository,
    UserStore,
};

type Table = BTreeMap<UserId, User>;

/// Simple in-memory record store for tests and local runs. Cloning shares the
/// same table; the internal mutex is the only concurrency control.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    rows: Arc<Mutex<Table>>,
}

/// Unit of work over an [`InMemoryStore`].
pub struct InMemoryRepo {
    rows: Arc<Mutex<Table>>,
    pending: Vec<PendingChange>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserStore for InMemoryStore {
    type Repo = InMemoryRepo;

    fn open(&self) -> InMemoryRepo {
        InMemoryRepo {
            rows: Arc::clone(&self.rows),
            pending: Vec::new(),
        }
    }

    fn count(&self) -> Result<usize, CoreError> {
        Ok(lock(&self.rows)?.len())
    }
}

impl InMemoryRepo {
    /// Drop staged mutations without applying them.
    pub fn discard(&mut self) {
        self.pending.clear();
    }

    pub fn pending(&self) -> &[PendingChange] {
        &self.pending
    }

    fn find(&self, pred: impl Fn(&User) -> bool) -> Result<Option<User>, CoreError> {
        let rows = lock(&self.rows)?;
        Ok(rows.values().find(|u| pred(u)).cloned())
    }
}

fn lock(rows: &Mutex<Table>) -> Result<MutexGuard<'_, Table>, CoreError> {
    rows.lock()
        .map_err(|_| CoreError::Repository("mutex poisoned".into()))
}

// Mirror the unique indexes of the SQL schema.
fn check_unique(table: &Table, user: &User) -> Result<(), CoreError> {
    let mut others = table.values().filter(|o| o.id != user.id);
    if others.clone().any(|o| o.email == user.email) {
        return Err(CoreError::Conflict(UniqueField::Email));
    }
    if others.any(|o| o.phone == user.phone) {
        return Err(CoreError::Conflict(UniqueField::Phone));
    }
    Ok(())
}

fn apply(table: &mut Table, change: PendingChange) -> Result<(), CoreError> {
    match change {
        PendingChange::Add(user) => {
            if table.contains_key(&user.id) {
                return Err(CoreError::Repository(format!("duplicate id {}", user.id)));
            }
            check_unique(table, &user)?;
            table.insert(user.id, user);
        }
        PendingChange::Update(user) => {
            if !table.contains_key(&user.id) {
                return Err(CoreError::NotFound);
            }
            check_unique(table, &user)?;
            table.insert(user.id, user);
        }
        PendingChange::Delete(id) => {
            if table.remove(&id).is_none() {
                return Err(CoreError::NotFound);
            }
        }
    }
    Ok(())
}

impl UserRepository for InMemoryRepo {
    fn get_by_id(&self, id: &UserId) -> Result<Option<User>, CoreError> {
        Ok(lock(&self.rows)?.get(id).cloned())
    }

    fn get_by_email(&self, email: &str) -> Result<Option<User>, CoreError> {
        self.find(|u| u.email == email)
    }

    fn get_by_phone(&self, phone: &str) -> Result<Option<User>, CoreError> {
        self.find(|u| u.phone == phone)
    }

    fn list(&self, filter: Option<&str>) -> Result<Vec<User>, CoreError> {
        let rows = lock(&self.rows)?;
        let term = normalize_filter(filter);
        let mut users: Vec<User> = rows
            .values()
            .filter(|u| term.map_or(true, |t| u.matches(t)))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.full_name.cmp(&b.full_name).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    fn add(&mut self, user: User) -> Result<(), CoreError> {
        self.pending.push(PendingChange::Add(user));
        Ok(())
    }

    fn update(&mut self, user: User) -> Result<(), CoreError> {
        self.pending.push(PendingChange::Update(user));
        Ok(())
    }

    fn delete(&mut self, user: &User) -> Result<(), CoreError> {
        self.pending.push(PendingChange::Delete(user.id));
        Ok(())
    }

    fn commit(&mut self) -> Result<(), CoreError> {
        let changes = std::mem::take(&mut self.pending);
        if changes.is_empty() {
            return Ok(());
        }
        let mut rows = lock(&self.rows)?;
        // Apply to a copy so a failing change leaves the table untouched.
        let mut next = rows.clone();
        for change in changes {
            apply(&mut next, change)?;
        }
        *rows = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UserInput;

    fn mk_user(name: &str, email: &str, phone: &str) -> User {
        User::new(UserInput::new(name, email, phone, "Somewhere"))
    }

    #[test]
    fn staged_changes_are_invisible_until_commit() {
        let store = InMemoryStore::new();
        let mut repo = store.open();
        let user = mk_user("Alice", "a@x.com", "111");
        repo.add(user.clone()).unwrap();
        assert!(repo.get_by_id(&user.id).unwrap().is_none());
        assert_eq!(repo.pending().len(), 1);

        repo.commit().unwrap();
        assert!(repo.pending().is_empty());
        assert_eq!(repo.get_by_id(&user.id).unwrap(), Some(user.clone()));
        assert_eq!(store.open().get_by_email("a@x.com").unwrap(), Some(user));
    }

    #[test]
    fn commit_rejects_duplicate_email_and_phone() {
        let store = InMemoryStore::new();
        let mut repo = store.open();
        repo.add(mk_user("Alice", "a@x.com", "111")).unwrap();
        repo.commit().unwrap();

        repo.add(mk_user("Bob", "a@x.com", "222")).unwrap();
        assert!(matches!(
            repo.commit().unwrap_err(),
            CoreError::Conflict(UniqueField::Email)
        ));

        repo.add(mk_user("Bob", "b@x.com", "111")).unwrap();
        assert!(matches!(
            repo.commit().unwrap_err(),
            CoreError::Conflict(UniqueField::Phone)
        ));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn collision_on_both_columns_reports_email() {
        let store = InMemoryStore::new();
        let mut repo = store.open();
        repo.add(mk_user("Alice", "a@x.com", "111")).unwrap();
        repo.commit().unwrap();

        repo.add(mk_user("Twin", "a@x.com", "111")).unwrap();
        assert!(matches!(
            repo.commit().unwrap_err(),
            CoreError::Conflict(UniqueField::Email)
        ));
    }

    #[test]
    fn failed_batch_is_all_or_nothing() {
        let store = InMemoryStore::new();
        let mut repo = store.open();
        repo.add(mk_user("Alice", "a@x.com", "111")).unwrap();
        repo.add(mk_user("Alias", "a@x.com", "112")).unwrap();
        assert!(repo.commit().is_err());
        assert_eq!(store.count().unwrap(), 0);
        assert!(repo.pending().is_empty());
    }

    #[test]
    fn update_and_delete_of_vanished_row_is_not_found() {
        let store = InMemoryStore::new();
        let mut repo = store.open();
        let ghost = mk_user("Ghost", "g@x.com", "000");

        repo.update(ghost.clone()).unwrap();
        assert!(matches!(repo.commit().unwrap_err(), CoreError::NotFound));

        repo.delete(&ghost).unwrap();
        assert!(matches!(repo.commit().unwrap_err(), CoreError::NotFound));
    }

    #[test]
    fn update_may_keep_own_unique_values() {
        let store = InMemoryStore::new();
        let mut repo = store.open();
        let mut user = mk_user("Alice", "a@x.com", "111");
        repo.add(user.clone()).unwrap();
        repo.commit().unwrap();

        user.address = "Elsewhere".into();
        repo.update(user.clone()).unwrap();
        repo.commit().unwrap();
        assert_eq!(repo.get_by_id(&user.id).unwrap().unwrap().address, "Elsewhere");
    }

    #[test]
    fn list_sorts_by_name_then_filters_case_sensitively() {
        let store = InMemoryStore::new();
        let mut repo = store.open();
        repo.add(mk_user("bob", "bob@x.com", "2")).unwrap();
        repo.add(mk_user("Bob", "B@x.com", "1")).unwrap();
        repo.add(mk_user("Alice", "alice@y.com", "3")).unwrap();
        repo.commit().unwrap();

        let all: Vec<_> = repo.list(None).unwrap().into_iter().map(|u| u.full_name).collect();
        assert_eq!(all, ["Alice", "Bob", "bob"]);

        let bobs: Vec<_> = repo
            .list(Some("ob"))
            .unwrap()
            .into_iter()
            .map(|u| u.email)
            .collect();
        assert_eq!(bobs, ["B@x.com", "bob@x.com"]);
        assert_eq!(repo.list(Some("@y")).unwrap().len(), 1);
        assert!(repo.list(Some("ALICE")).unwrap().is_empty());
    }
}
