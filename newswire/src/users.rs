//! Users repository.
//!
//! An explicitly owned, injected store instead of a module-global list. The
//! registry is in-memory: editor accounts are few, seeded at startup, and
//! not part of the news document's durability story.

use std::sync::Mutex;

use chrono::Utc;

use crate::auth::hash_password;
use crate::error::{PortalError, PortalResult};
use crate::types::{Role, User};

/// Fields accepted at registration.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

struct Registry {
    users: Vec<User>,
    next_id: u64,
}

pub struct UserStore {
    inner: Mutex<Registry>,
}

impl UserStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Registry {
                users: Vec::new(),
                next_id: 1,
            }),
        }
    }

    /// A store pre-populated with the stock newsroom: one chief editor and
    /// two sectorial editors, all with the password `admin123`.
    pub fn seeded() -> Self {
        let store = Self::new();
        let seeds = [
            ("Chief Editor", "chief@newswire.local", Role::ChiefEditor),
            (
                "Technology Editor",
                "tech@newswire.local",
                Role::SectorialEditor {
                    sector: "Technology".to_string(),
                },
            ),
            (
                "Marketing Editor",
                "marketing@newswire.local",
                Role::SectorialEditor {
                    sector: "Marketing".to_string(),
                },
            ),
        ];
        for (name, email, role) in seeds {
            store
                .create(NewUser {
                    name: name.to_string(),
                    email: email.to_string(),
                    password_hash: hash_password("admin123", "newswire-seed"),
                    role,
                })
                .expect("seeding a fresh store cannot collide");
        }
        store
    }

    fn locked<T>(&self, f: impl FnOnce(&mut Registry) -> T) -> PortalResult<T> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| PortalError::Persistence("user registry lock poisoned".to_string()))?;
        Ok(f(&mut guard))
    }

    pub fn list(&self) -> PortalResult<Vec<User>> {
        self.locked(|reg| reg.users.clone())
    }

    pub fn find_by_id(&self, id: u64) -> PortalResult<Option<User>> {
        self.locked(|reg| reg.users.iter().find(|u| u.id == id).cloned())
    }

    pub fn find_by_email(&self, email: &str) -> PortalResult<Option<User>> {
        self.locked(|reg| reg.users.iter().find(|u| u.email == email).cloned())
    }

    /// Register a new account. Emails are unique; duplicates are a
    /// validation failure, matching the registration surface's 400.
    pub fn create(&self, input: NewUser) -> PortalResult<User> {
        self.locked(|reg| {
            if reg.users.iter().any(|u| u.email == input.email) {
                return Err(PortalError::Validation(
                    "email already registered".to_string(),
                ));
            }
            let user = User {
                id: reg.next_id,
                name: input.name,
                email: input.email,
                password_hash: input.password_hash,
                role: input.role,
                created_at: Utc::now(),
            };
            reg.next_id += 1;
            reg.users.push(user.clone());
            Ok(user)
        })?
    }

    /// Remove an account. `Ok(false)` when the id does not resolve.
    pub fn delete(&self, id: u64) -> PortalResult<bool> {
        self.locked(|reg| {
            let before = reg.users.len();
            reg.users.retain(|u| u.id != id);
            reg.users.len() != before
        })
    }
}

impl Default for UserStore {
    fn default() -> Self {
        Self::new()
    }
}
