//! sqlite-adapter — SQLite implementation of the user store ports.
//!
//! Purpose
//! - Provide a lightweight, file-based record store so the directory survives
//!   restarts without an external database server.
//! - Implements `UserStore` / `UserRepository` from the `domain` crate.
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - Email and phone carry UNIQUE indexes; violations surface from `commit` as
//!   `CoreError::Conflict` with the offending column.
//! - Text compares with the default BINARY collation, so uniqueness and the
//!   list filter (`instr`) are case-sensitive.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use domain::{
    normalize_filter, CoreError, PendingChange, UniqueField, User, UserId, UserRepository,
    UserStore,
};
use rusqlite::{params, Connection};
use tracing::info;

const USER_COLUMNS: &str = "id, full_name, email, phone, address";

/// SQLite-backed record store. Cloning shares the connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

/// Unit of work over a [`SqliteStore`]; staged changes run in one transaction.
pub struct SqliteRepo {
    conn: Arc<Mutex<Connection>>,
    pending: Vec<PendingChange>,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at the given path and ensure schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let conn = Connection::open(path).map_err(map_sqerr)?;
        Self::with_connection(conn)
    }

    /// Open at `path`, creating the parent directory first.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .map_err(|e| CoreError::Repository(format!("create {}: {e}", dir.display())))?;
        }
        let store = Self::new(path)?;
        info!(path = %path.display(), "sqlite store opened");
        Ok(store)
    }

    fn with_connection(conn: Connection) -> Result<Self, CoreError> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl UserStore for SqliteStore {
    type Repo = SqliteRepo;

    fn open(&self) -> SqliteRepo {
        SqliteRepo {
            conn: Arc::clone(&self.conn),
            pending: Vec::new(),
        }
    }

    fn count(&self) -> Result<usize, CoreError> {
        let conn = lock(&self.conn)?;
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .map_err(map_sqerr)?;
        Ok(n as usize)
    }
}

fn init_schema(conn: &Connection) -> Result<(), CoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            email TEXT NOT NULL,
            phone TEXT NOT NULL,
            address TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS ux_users_email ON users(email);
        CREATE UNIQUE INDEX IF NOT EXISTS ux_users_phone ON users(phone);
        CREATE INDEX IF NOT EXISTS idx_users_full_name ON users(full_name);
        "#,
    )
    .map_err(map_sqerr)
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, CoreError> {
    conn.lock()
        .map_err(|_| CoreError::Repository("mutex poisoned".into()))
}

fn map_sqerr<E: std::fmt::Display>(e: E) -> CoreError {
    CoreError::Repository(format!("sqlite error: {e}"))
}

// SQLite reports unique index failures as "UNIQUE constraint failed: users.email".
fn map_write_err(e: rusqlite::Error) -> CoreError {
    if let rusqlite::Error::SqliteFailure(err, Some(msg)) = &e {
        if err.code == rusqlite::ErrorCode::ConstraintViolation {
            if msg.contains("users.email") {
                return CoreError::Conflict(UniqueField::Email);
            }
            if msg.contains("users.phone") {
                return CoreError::Conflict(UniqueField::Phone);
            }
        }
    }
    map_sqerr(e)
}

// SQLite stops at the first unique index that fails, which may be phone even
// when the email collides too. Email wins, as in the in-memory store.
fn write_conflict(conn: &Connection, user: &User, e: rusqlite::Error) -> CoreError {
    match map_write_err(e) {
        CoreError::Conflict(UniqueField::Phone) => match email_taken(conn, user) {
            Ok(true) => CoreError::Conflict(UniqueField::Email),
            Ok(false) => CoreError::Conflict(UniqueField::Phone),
            Err(e) => e,
        },
        other => other,
    }
}

fn email_taken(conn: &Connection, user: &User) -> Result<bool, CoreError> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1 AND id <> ?2)",
        params![user.email, user.id.to_string()],
        |row| row.get(0),
    )
    .map_err(map_sqerr)
}

fn row_to_user(row: &rusqlite::Row) -> Result<User, CoreError> {
    let id: String = row.get(0).map_err(map_sqerr)?;
    let id = UserId::parse(&id).map_err(|e| CoreError::Repository(format!("bad id in db: {e}")))?;
    Ok(User {
        id,
        full_name: row.get(1).map_err(map_sqerr)?,
        email: row.get(2).map_err(map_sqerr)?,
        phone: row.get(3).map_err(map_sqerr)?,
        address: row.get(4).map_err(map_sqerr)?,
    })
}

impl SqliteRepo {
    pub fn pending(&self) -> &[PendingChange] {
        &self.pending
    }

    fn find_one(&self, column: &str, value: &str) -> Result<Option<User>, CoreError> {
        let conn = lock(&self.conn)?;
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
        let mut stmt = conn.prepare(&sql).map_err(map_sqerr)?;
        let mut rows = stmt.query(params![value]).map_err(map_sqerr)?;
        match rows.next().map_err(map_sqerr)? {
            Some(row) => Ok(Some(row_to_user(row)?)),
            None => Ok(None),
        }
    }
}

fn apply(conn: &Connection, change: &PendingChange) -> Result<(), CoreError> {
    match change {
        PendingChange::Add(u) => {
            conn.execute(
                "INSERT INTO users(id, full_name, email, phone, address) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![u.id.to_string(), u.full_name, u.email, u.phone, u.address],
            )
            .map_err(|e| write_conflict(conn, u, e))?;
        }
        PendingChange::Update(u) => {
            let changed = conn
                .execute(
                    "UPDATE users SET full_name = ?1, email = ?2, phone = ?3, address = ?4 WHERE id = ?5",
                    params![u.full_name, u.email, u.phone, u.address, u.id.to_string()],
                )
                .map_err(|e| write_conflict(conn, u, e))?;
            if changed == 0 {
                return Err(CoreError::NotFound);
            }
        }
        PendingChange::Delete(id) => {
            let changed = conn
                .execute("DELETE FROM users WHERE id = ?1", params![id.to_string()])
                .map_err(map_sqerr)?;
            if changed == 0 {
                return Err(CoreError::NotFound);
            }
        }
    }
    Ok(())
}

impl UserRepository for SqliteRepo {
    fn get_by_id(&self, id: &UserId) -> Result<Option<User>, CoreError> {
        self.find_one("id", &id.to_string())
    }

    fn get_by_email(&self, email: &str) -> Result<Option<User>, CoreError> {
        self.find_one("email", email)
    }

    fn get_by_phone(&self, phone: &str) -> Result<Option<User>, CoreError> {
        self.find_one("phone", phone)
    }

    fn list(&self, filter: Option<&str>) -> Result<Vec<User>, CoreError> {
        let conn = lock(&self.conn)?;
        let term = normalize_filter(filter);
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE ?1 IS NULL OR instr(full_name, ?1) > 0 OR instr(email, ?1) > 0 \
             ORDER BY full_name, id"
        );
        let mut stmt = conn.prepare(&sql).map_err(map_sqerr)?;
        let mut rows = stmt.query(params![term]).map_err(map_sqerr)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(map_sqerr)? {
            out.push(row_to_user(row)?);
        }
        Ok(out)
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
        let conn = lock(&self.conn)?;
        // Dropping the transaction on an early return rolls it back.
        let tx = conn.unchecked_transaction().map_err(map_sqerr)?;
        for change in &changes {
            apply(&tx, change)?;
        }
        tx.commit().map_err(map_sqerr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::service::UserService;
    use domain::{Decline, Outcome, UserInput};

    fn tmp_db() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db");
        let store = SqliteStore::new(path).unwrap();
        (store, dir)
    }

    fn mk_user(name: &str, email: &str, phone: &str) -> User {
        User::new(UserInput::new(name, email, phone, "Somewhere"))
    }

    #[test]
    fn add_commit_get_roundtrip() {
        let (store, _dir) = tmp_db();
        let mut repo = store.open();
        let user = mk_user("Alice", "a@x.com", "111");
        repo.add(user.clone()).unwrap();
        assert!(repo.get_by_id(&user.id).unwrap().is_none());

        repo.commit().unwrap();
        assert_eq!(repo.get_by_id(&user.id).unwrap(), Some(user.clone()));
        assert_eq!(repo.get_by_email("a@x.com").unwrap(), Some(user.clone()));
        assert_eq!(repo.get_by_phone("111").unwrap(), Some(user.clone()));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("users.db");
        let user = mk_user("Alice", "a@x.com", "111");
        {
            let store = SqliteStore::open_path(&path).unwrap();
            let mut repo = store.open();
            repo.add(user.clone()).unwrap();
            repo.commit().unwrap();
        }
        let store = SqliteStore::open_path(&path).unwrap();
        assert_eq!(store.open().get_by_id(&user.id).unwrap(), Some(user));
    }

    #[test]
    fn unique_indexes_map_to_conflicts() {
        let (store, _dir) = tmp_db();
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
        assert!(repo.pending().is_empty());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn collision_on_both_columns_reports_email() {
        let (store, _dir) = tmp_db();
        let mut repo = store.open();
        let mut alice = mk_user("Alice", "a@x.com", "111");
        let bob = mk_user("Bob", "b@x.com", "222");
        repo.add(alice.clone()).unwrap();
        repo.add(bob.clone()).unwrap();
        repo.commit().unwrap();

        repo.add(mk_user("Twin", "a@x.com", "111")).unwrap();
        assert!(matches!(
            repo.commit().unwrap_err(),
            CoreError::Conflict(UniqueField::Email)
        ));

        alice.email = "b@x.com".into();
        alice.phone = "222".into();
        repo.update(alice).unwrap();
        assert!(matches!(
            repo.commit().unwrap_err(),
            CoreError::Conflict(UniqueField::Email)
        ));
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn uniqueness_is_case_sensitive() {
        let (store, _dir) = tmp_db();
        let mut repo = store.open();
        repo.add(mk_user("Alice", "a@x.com", "111")).unwrap();
        repo.add(mk_user("Alice", "A@X.COM", "112")).unwrap();
        repo.commit().unwrap();
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn failed_batch_rolls_back() {
        let (store, _dir) = tmp_db();
        let mut repo = store.open();
        repo.add(mk_user("Alice", "a@x.com", "111")).unwrap();
        repo.add(mk_user("Alias", "a@x.com", "112")).unwrap();
        assert!(repo.commit().is_err());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn update_and_delete() {
        let (store, _dir) = tmp_db();
        let mut repo = store.open();
        let mut user = mk_user("Alice", "a@x.com", "111");
        repo.add(user.clone()).unwrap();
        repo.commit().unwrap();

        user.full_name = "Alice Smith".into();
        user.phone = "999".into();
        repo.update(user.clone()).unwrap();
        repo.commit().unwrap();
        assert_eq!(repo.get_by_id(&user.id).unwrap(), Some(user.clone()));
        assert!(repo.get_by_phone("111").unwrap().is_none());

        repo.delete(&user).unwrap();
        repo.commit().unwrap();
        assert!(repo.get_by_id(&user.id).unwrap().is_none());

        repo.delete(&user).unwrap();
        assert!(matches!(repo.commit().unwrap_err(), CoreError::NotFound));
        repo.update(user).unwrap();
        assert!(matches!(repo.commit().unwrap_err(), CoreError::NotFound));
    }

    #[test]
    fn list_orders_by_name_and_filters_case_sensitively() {
        let (store, _dir) = tmp_db();
        let mut repo = store.open();
        repo.add(mk_user("Carol", "carol@y.org", "3")).unwrap();
        repo.add(mk_user("bob", "bob@x.com", "2")).unwrap();
        repo.add(mk_user("Alice", "alice@x.com", "1")).unwrap();
        repo.commit().unwrap();

        let names = |users: Vec<User>| users.into_iter().map(|u| u.full_name).collect::<Vec<_>>();
        assert_eq!(names(repo.list(None).unwrap()), ["Alice", "Carol", "bob"]);
        assert_eq!(names(repo.list(Some(" ")).unwrap()), ["Alice", "Carol", "bob"]);
        assert_eq!(names(repo.list(Some("x.com")).unwrap()), ["Alice", "bob"]);
        assert_eq!(names(repo.list(Some("Car")).unwrap()), ["Carol"]);
        assert!(repo.list(Some("CAROL")).unwrap().is_empty());
        // LIKE wildcards carry no meaning for instr().
        assert!(repo.list(Some("%")).unwrap().is_empty());
    }

    type Rival = Box<dyn FnOnce() -> Result<(), CoreError> + Send>;

    /// Unit of work that lets another writer commit between the service's
    /// uniqueness checks and its own commit.
    struct Raced {
        inner: SqliteRepo,
        rival: Option<Rival>,
    }

    impl Raced {
        fn new(
            store: &SqliteStore,
            rival: impl FnOnce() -> Result<(), CoreError> + Send + 'static,
        ) -> Self {
            Self {
                inner: store.open(),
                rival: Some(Box::new(rival)),
            }
        }
    }

    impl UserRepository for Raced {
        fn get_by_id(&self, id: &UserId) -> Result<Option<User>, CoreError> {
            self.inner.get_by_id(id)
        }
        fn get_by_email(&self, email: &str) -> Result<Option<User>, CoreError> {
            self.inner.get_by_email(email)
        }
        fn get_by_phone(&self, phone: &str) -> Result<Option<User>, CoreError> {
            self.inner.get_by_phone(phone)
        }
        fn list(&self, filter: Option<&str>) -> Result<Vec<User>, CoreError> {
            self.inner.list(filter)
        }
        fn add(&mut self, user: User) -> Result<(), CoreError> {
            self.inner.add(user)
        }
        fn update(&mut self, user: User) -> Result<(), CoreError> {
            self.inner.update(user)
        }
        fn delete(&mut self, user: &User) -> Result<(), CoreError> {
            self.inner.delete(user)
        }
        fn commit(&mut self) -> Result<(), CoreError> {
            if let Some(rival) = self.rival.take() {
                rival()?;
            }
            self.inner.commit()
        }
    }

    fn insert(store: &SqliteStore, user: User) -> Result<(), CoreError> {
        let mut repo = store.open();
        repo.add(user)?;
        repo.commit()
    }

    #[test]
    fn concurrent_create_loses_with_decline() {
        let (store, _dir) = tmp_db();
        let rival_store = store.clone();
        let mut svc = UserService::new(Raced::new(&store, move || {
            insert(&rival_store, mk_user("Carol", "c@x.com", "333"))
        }));

        let out = svc
            .create(UserInput::new("Dan", "c@x.com", "444", "Addr"))
            .unwrap();
        assert_eq!(out.declined(), Some(Decline::EmailInUse));
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.open().get_by_phone("444").unwrap().is_none());
    }

    #[test]
    fn concurrent_update_loses_with_decline() {
        let (store, _dir) = tmp_db();
        let alice = mk_user("Alice", "a@x.com", "111");
        insert(&store, alice.clone()).unwrap();

        let rival_store = store.clone();
        let mut svc = UserService::new(Raced::new(&store, move || {
            insert(&rival_store, mk_user("Bob", "b@x.com", "999"))
        }));
        let out = svc
            .update(&alice.id, UserInput::new("Alice", "a@x.com", "999", "Addr1"))
            .unwrap();
        assert_eq!(out.declined(), Some(Decline::PhoneInUse));
        assert_eq!(store.open().get_by_id(&alice.id).unwrap(), Some(alice));
    }

    #[test]
    fn row_deleted_before_commit_is_not_found() {
        let (store, _dir) = tmp_db();
        let alice = mk_user("Alice", "a@x.com", "111");
        insert(&store, alice.clone()).unwrap();

        let remove = |store: &SqliteStore, user: &User| {
            let (store, user) = (store.clone(), user.clone());
            move || {
                let mut repo = store.open();
                repo.delete(&user)?;
                repo.commit()
            }
        };

        let mut svc = UserService::new(Raced::new(&store, remove(&store, &alice)));
        let out = svc
            .update(&alice.id, UserInput::new("Alice", "a@x.com", "999", "Addr1"))
            .unwrap();
        assert_eq!(out.declined(), Some(Decline::NotFound));
        assert_eq!(store.count().unwrap(), 0);

        insert(&store, alice.clone()).unwrap();
        let mut svc = UserService::new(Raced::new(&store, remove(&store, &alice)));
        let out = svc.delete(&alice.id).unwrap();
        assert_eq!(out.declined(), Some(Decline::NotFound));
    }

    #[test]
    fn service_over_sqlite_declines_duplicates() {
        let (store, _dir) = tmp_db();
        let mut svc = UserService::new(store.open());
        let alice = match svc.create(UserInput::new("Alice", "a@x.com", "111", "Addr1")).unwrap() {
            Outcome::Done(u) => u,
            Outcome::Declined(d) => panic!("unexpected decline: {d}"),
        };
        let dup = svc
            .create(UserInput::new("Bob", "a@x.com", "222", "Addr2"))
            .unwrap();
        assert_eq!(dup.declined(), Some(Decline::EmailInUse));

        let out = svc
            .update(&alice.id, UserInput::new("Alice", "a@x.com", "999", "Addr1"))
            .unwrap();
        assert!(out.is_done());
        assert_eq!(store.count().unwrap(), 1);
    }
}
