//! Storage selection for the server: memory or SQLite (feature-gated), behind
//! the domain's `UserStore` / `UserRepository` ports.

use domain::adapters::memory_repo::{InMemoryRepo, InMemoryStore};
use domain::{CoreError, User, UserId, UserRepository, UserStore};

#[derive(Clone)]
pub enum AnyStore {
    Memory(InMemoryStore),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite_adapter::SqliteStore),
}

pub enum AnyRepo {
    Memory(InMemoryRepo),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite_adapter::SqliteRepo),
}

impl AnyStore {
    pub fn memory() -> Self {
        Self::Memory(InMemoryStore::new())
    }

    #[cfg(feature = "sqlite")]
    pub fn sqlite(path: &std::path::Path) -> Result<Self, CoreError> {
        Ok(Self::Sqlite(sqlite_adapter::SqliteStore::open_path(path)?))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AnyStore::Memory(_) => "memory",
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(_) => "sqlite",
        }
    }
}

impl UserStore for AnyStore {
    type Repo = AnyRepo;

    fn open(&self) -> AnyRepo {
        match self {
            AnyStore::Memory(s) => AnyRepo::Memory(s.open()),
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(s) => AnyRepo::Sqlite(s.open()),
        }
    }

    fn count(&self) -> Result<usize, CoreError> {
        match self {
            AnyStore::Memory(s) => s.count(),
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(s) => s.count(),
        }
    }
}

impl UserRepository for AnyRepo {
    fn get_by_id(&self, id: &UserId) -> Result<Option<User>, CoreError> {
        match self {
            AnyRepo::Memory(r) => r.get_by_id(id),
            #[cfg(feature = "sqlite")]
            AnyRepo::Sqlite(r) => r.get_by_id(id),
        }
    }

    fn get_by_email(&self, email: &str) -> Result<Option<User>, CoreError> {
        match self {
            AnyRepo::Memory(r) => r.get_by_email(email),
            #[cfg(feature = "sqlite")]
            AnyRepo::Sqlite(r) => r.get_by_email(email),
        }
    }

    fn get_by_phone(&self, phone: &str) -> Result<Option<User>, CoreError> {
        match self {
            AnyRepo::Memory(r) => r.get_by_phone(phone),
            #[cfg(feature = "sqlite")]
            AnyRepo::Sqlite(r) => r.get_by_phone(phone),
        }
    }

    fn list(&self, filter: Option<&str>) -> Result<Vec<User>, CoreError> {
        match self {
            AnyRepo::Memory(r) => r.list(filter),
            #[cfg(feature = "sqlite")]
            AnyRepo::Sqlite(r) => r.list(filter),
        }
    }

    fn add(&mut self, user: User) -> Result<(), CoreError> {
        match self {
            AnyRepo::Memory(r) => r.add(user),
            #[cfg(feature = "sqlite")]
            AnyRepo::Sqlite(r) => r.add(user),
        }
    }

    fn update(&mut self, user: User) -> Result<(), CoreError> {
        match self {
            AnyRepo::Memory(r) => r.update(user),
            #[cfg(feature = "sqlite")]
            AnyRepo::Sqlite(r) => r.update(user),
        }
    }

    fn delete(&mut self, user: &User) -> Result<(), CoreError> {
        match self {
            AnyRepo::Memory(r) => r.delete(user),
            #[cfg(feature = "sqlite")]
            AnyRepo::Sqlite(r) => r.delete(user),
        }
    }

    fn commit(&mut self) -> Result<(), CoreError> {
        match self {
            AnyRepo::Memory(r) => r.commit(),
            #[cfg(feature = "sqlite")]
            AnyRepo::Sqlite(r) => r.commit(),
        }
    }
}
