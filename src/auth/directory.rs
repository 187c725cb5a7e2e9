//! Account records persisted in a shared collection.
//!
//! Records:
//! - `username`: unique, case-sensitive, non-empty
//! - `password`: bcrypt hash, never plaintext
//! - `role`: `user` (default) or `admin`

use serde::{Deserialize, Serialize};

use super::PasswordCodec;
use crate::error::{FieldError, ServiceError};
use crate::store::CollectionStore;

/// Identifier of the bootstrap administrator.
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";

/// Well-known password given to the bootstrap administrator.
/// Anyone can log in with it until it is changed.
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    #[serde(rename = "password")]
    pub password_hash: String,
    #[serde(default)]
    pub role: Role,
}

/// Fields to overwrite on an existing account; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AccountPatch {
    #[serde(default)]
    pub username: Option<String>,
    /// Plaintext; hashed before it is stored.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

/// Domain operations over the accounts collection.
#[derive(Clone)]
pub struct AccountDirectory {
    accounts: CollectionStore<Account>,
    codec: PasswordCodec,
}

impl AccountDirectory {
    pub fn new(accounts: CollectionStore<Account>, codec: PasswordCodec) -> Self {
        Self { accounts, codec }
    }

    /// Register a new account. Fails with `Conflict` if the username is taken.
    pub fn create_account(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<Account, ServiceError> {
        require_username(username)?;

        // Cheap early exit before paying for the hash; re-checked under the lock.
        if self.accounts.exists(|a| a.username == username) {
            return Err(already_exists(username));
        }

        let account = Account {
            username: username.to_owned(),
            password_hash: self.codec.hash(password)?,
            role,
        };

        let created = self.accounts.mutate(|accounts| {
            if accounts.iter().any(|a| a.username == username) {
                return Err(already_exists(username));
            }
            accounts.push(account.clone());
            Ok(account)
        })?;

        tracing::info!(username = %created.username, role = ?created.role, "Account created");
        Ok(created)
    }

    pub fn list_accounts(&self) -> Vec<Account> {
        self.accounts.load_all()
    }

    /// Merge `patch` over the named account.
    ///
    /// A new password is hashed before it is stored. Renaming onto an
    /// existing username fails with `Conflict`.
    pub fn update_account(
        &self,
        username: &str,
        patch: AccountPatch,
    ) -> Result<Account, ServiceError> {
        if let Some(new_name) = patch.username.as_deref() {
            require_username(new_name)?;
        }
        let new_hash = patch
            .password
            .as_deref()
            .map(|plaintext| self.codec.hash(plaintext))
            .transpose()?;

        let updated = self.accounts.mutate(|accounts| {
            let index = accounts
                .iter()
                .position(|a| a.username == username)
                .ok_or_else(|| not_found(username))?;

            if let Some(new_name) = patch.username.as_deref() {
                let taken = accounts
                    .iter()
                    .enumerate()
                    .any(|(i, a)| i != index && a.username == new_name);
                if taken {
                    return Err(already_exists(new_name));
                }
            }

            let account = &mut accounts[index];
            if let Some(new_name) = patch.username {
                account.username = new_name;
            }
            if let Some(hash) = new_hash {
                account.password_hash = hash;
            }
            if let Some(role) = patch.role {
                account.role = role;
            }
            Ok(account.clone())
        })?;

        tracing::info!(username, now = %updated.username, "Account updated");
        Ok(updated)
    }

    /// Remove the named account, returning the removed record.
    pub fn delete_account(&self, username: &str) -> Result<Account, ServiceError> {
        let removed = self.accounts.mutate(|accounts| {
            let index = accounts
                .iter()
                .position(|a| a.username == username)
                .ok_or_else(|| not_found(username))?;
            Ok::<_, ServiceError>(accounts.remove(index))
        })?;

        tracing::info!(username, "Account deleted");
        Ok(removed)
    }

    pub fn find_account(&self, username: &str) -> Option<Account> {
        self.accounts.find(|a| a.username == username)
    }

    /// Create the bootstrap administrator with the well-known password.
    pub fn install_default_admin(&self) -> Result<Account, ServiceError> {
        let admin = self
            .create_account(DEFAULT_ADMIN_USERNAME, DEFAULT_ADMIN_PASSWORD, Role::Admin)
            .map_err(|e| match e {
                ServiceError::Conflict(_) => {
                    ServiceError::Conflict("administrator already exists".into())
                }
                other => other,
            })?;

        tracing::warn!(
            username = DEFAULT_ADMIN_USERNAME,
            "Default administrator installed with the well-known password; change it"
        );
        Ok(admin)
    }

    /// Check a username/password pair and return the authenticated subject.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<String, ServiceError> {
        let account = self
            .find_account(username)
            .ok_or_else(|| not_found(username))?;

        if !self.codec.verify(password, &account.password_hash) {
            tracing::warn!(username, "Login rejected: wrong password");
            return Err(ServiceError::InvalidCredential);
        }
        Ok(account.username)
    }

    pub fn is_admin(&self, username: &str) -> bool {
        self.find_account(username)
            .is_some_and(|a| a.role == Role::Admin)
    }
}

fn require_username(username: &str) -> Result<(), ServiceError> {
    if username.is_empty() {
        return Err(ServiceError::Validation(vec![FieldError::new(
            "username",
            "username is required",
        )]));
    }
    Ok(())
}

fn already_exists(username: &str) -> ServiceError {
    ServiceError::Conflict(format!("account '{username}' already exists"))
}

fn not_found(username: &str) -> ServiceError {
    ServiceError::NotFound(format!("account '{username}' not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CollectionBackend, LockRegistry, MemoryBackend, StoreError};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn codec() -> PasswordCodec {
        PasswordCodec::with_cost(4)
    }

    fn locks() -> Arc<LockRegistry> {
        Arc::new(LockRegistry::new(Duration::from_secs(10)))
    }

    fn directory() -> AccountDirectory {
        AccountDirectory::new(CollectionStore::in_memory("mem:users", locks()), codec())
    }

    #[test]
    fn create_then_authenticate() {
        let dir = directory();
        let alice = dir.create_account("alice", "secret123", Role::User).unwrap();
        assert_eq!(alice.role, Role::User);
        assert_ne!(alice.password_hash, "secret123");

        assert_eq!(dir.authenticate("alice", "secret123").unwrap(), "alice");
        assert!(matches!(
            dir.authenticate("alice", "wrong"),
            Err(ServiceError::InvalidCredential)
        ));
    }

    #[test]
    fn authenticate_unknown_account_is_not_found() {
        let dir = directory();
        assert!(matches!(
            dir.authenticate("ghost", "whatever"),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn duplicate_username_conflicts() {
        let dir = directory();
        dir.create_account("bob", "x123456", Role::User).unwrap();
        let second = dir.create_account("bob", "y123456", Role::User);
        assert!(matches!(second, Err(ServiceError::Conflict(_))));
        assert_eq!(dir.list_accounts().len(), 1);
        assert_eq!(dir.authenticate("bob", "x123456").unwrap(), "bob");
    }

    #[test]
    fn usernames_are_case_sensitive() {
        let dir = directory();
        dir.create_account("Carol", "pass123", Role::User).unwrap();
        dir.create_account("carol", "pass456", Role::User).unwrap();
        assert_eq!(dir.list_accounts().len(), 2);
    }

    #[test]
    fn empty_username_is_rejected() {
        let dir = directory();
        assert!(matches!(
            dir.create_account("", "pass123", Role::User),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn list_keeps_insertion_order_and_hashes() {
        let dir = directory();
        for name in ["zed", "amy", "kim"] {
            dir.create_account(name, "pass123", Role::User).unwrap();
        }
        let names: Vec<_> = dir.list_accounts().into_iter().map(|a| a.username).collect();
        assert_eq!(names, ["zed", "amy", "kim"]);
        assert!(dir
            .list_accounts()
            .iter()
            .all(|a| a.password_hash.starts_with("$2")));
    }

    #[test]
    fn find_is_idempotent() {
        let dir = directory();
        dir.create_account("dave", "pass123", Role::Admin).unwrap();
        let first = dir.find_account("dave");
        let second = dir.find_account("dave");
        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(dir.find_account("nobody"), None);
    }

    #[test]
    fn update_merges_only_given_fields() {
        let dir = directory();
        let before = dir.create_account("erin", "pass123", Role::User).unwrap();

        let after = dir
            .update_account(
                "erin",
                AccountPatch {
                    role: Some(Role::Admin),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(after.role, Role::Admin);
        assert_eq!(after.password_hash, before.password_hash);
        assert_eq!(after.username, "erin");
    }

    #[test]
    fn update_rehashes_new_password() {
        let dir = directory();
        dir.create_account("frank", "old-pass", Role::User).unwrap();

        let updated = dir
            .update_account(
                "frank",
                AccountPatch {
                    password: Some("new-pass".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_ne!(updated.password_hash, "new-pass");
        assert!(dir.authenticate("frank", "new-pass").is_ok());
        assert!(matches!(
            dir.authenticate("frank", "old-pass"),
            Err(ServiceError::InvalidCredential)
        ));
    }

    #[test]
    fn update_missing_account_is_not_found() {
        let dir = directory();
        let result = dir.update_account("nobody", AccountPatch::default());
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn rename_onto_existing_username_conflicts() {
        let dir = directory();
        dir.create_account("gina", "pass123", Role::User).unwrap();
        dir.create_account("hank", "pass123", Role::User).unwrap();

        let result = dir.update_account(
            "gina",
            AccountPatch {
                username: Some("hank".into()),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(ServiceError::Conflict(_))));

        let renamed = dir
            .update_account(
                "gina",
                AccountPatch {
                    username: Some("gina2".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(renamed.username, "gina2");
        assert!(dir.find_account("gina").is_none());
        assert!(dir.authenticate("gina2", "pass123").is_ok());
    }

    #[test]
    fn delete_removes_account() {
        let dir = directory();
        dir.create_account("ivan", "pass123", Role::User).unwrap();

        let removed = dir.delete_account("ivan").unwrap();
        assert_eq!(removed.username, "ivan");
        assert!(dir.find_account("ivan").is_none());
        assert!(matches!(
            dir.delete_account("ivan"),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn install_default_admin_once() {
        let dir = directory();
        let admin = dir.install_default_admin().unwrap();
        assert_eq!(admin.username, DEFAULT_ADMIN_USERNAME);
        assert_eq!(admin.role, Role::Admin);
        assert!(dir.is_admin(DEFAULT_ADMIN_USERNAME));
        assert!(dir
            .authenticate(DEFAULT_ADMIN_USERNAME, DEFAULT_ADMIN_PASSWORD)
            .is_ok());

        assert!(matches!(
            dir.install_default_admin(),
            Err(ServiceError::Conflict(_))
        ));
    }

    #[test]
    fn install_default_admin_conflicts_with_registered_admin_name() {
        let dir = directory();
        dir.create_account("admin", "someone-else", Role::User).unwrap();
        assert!(matches!(
            dir.install_default_admin(),
            Err(ServiceError::Conflict(_))
        ));
        assert!(!dir.is_admin("admin"));
    }

    #[test]
    fn file_format_matches_stored_users() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("users.json");
        let dir = AccountDirectory::new(CollectionStore::json_file(&path, locks()), codec());
        dir.create_account("judy", "pass123", Role::Admin).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[0]["username"], "judy");
        assert_eq!(raw[0]["role"], "admin");
        assert!(raw[0]["password"].as_str().unwrap().starts_with("$2"));
    }

    #[test]
    fn missing_role_defaults_to_user() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("users.json");
        std::fs::write(
            &path,
            r#"[{"username": "legacy", "password": "$2b$04$invalidinvalidinvalidinv"}]"#,
        )
        .unwrap();

        let dir = AccountDirectory::new(CollectionStore::json_file(&path, locks()), codec());
        assert_eq!(dir.find_account("legacy").unwrap().role, Role::User);
    }

    /// Accounts backend that stalls every load so writers overlap.
    struct StallingBackend {
        inner: MemoryBackend<Account>,
    }

    impl CollectionBackend<Account> for StallingBackend {
        fn location(&self) -> &str {
            self.inner.location()
        }

        fn load_all(&self) -> Vec<Account> {
            let records = self.inner.load_all();
            thread::sleep(Duration::from_millis(100));
            records
        }

        fn save_all(&self, records: &[Account]) -> Result<(), StoreError> {
            self.inner.save_all(records)
        }
    }

    #[test]
    fn concurrent_updates_to_different_fields_both_land() {
        let backend = Arc::new(StallingBackend {
            inner: MemoryBackend::new("mem:stalling-users"),
        });
        let dir = AccountDirectory::new(CollectionStore::new(backend, locks()), codec());
        dir.create_account("kate", "original", Role::User).unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let patches = [
            AccountPatch {
                role: Some(Role::Admin),
                ..Default::default()
            },
            AccountPatch {
                password: Some("rotated".into()),
                ..Default::default()
            },
        ];

        let handles: Vec<_> = patches
            .into_iter()
            .map(|patch| {
                let dir = dir.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    dir.update_account("kate", patch).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let kate = dir.find_account("kate").unwrap();
        assert_eq!(kate.role, Role::Admin);
        assert!(dir.authenticate("kate", "rotated").is_ok());
        assert_eq!(dir.list_accounts().len(), 1);
    }
}
