//! authority::mock
//!
//! In-memory authority for deterministic testing.
//!
//! # Design
//!
//! The mock stores repositories, keys, users and permissions in memory,
//! records every call it receives, and can be configured to fail a given
//! operation.
//!
//! # Example
//!
//! ```
//! use gitward::authority::mock::{MockAuthority, MockOperation};
//! use gitward::authority::{AuthorityClient, Repository};
//!
//! # tokio_test::block_on(async {
//! let authority = MockAuthority::new().with_repository(Repository {
//!     id: 1,
//!     owner_name: "owner".to_string(),
//!     name: "repo".to_string(),
//!     is_private: false,
//!     is_mirror: false,
//! });
//!
//! let repo = authority.get_repository("owner", "repo").await.unwrap();
//! assert_eq!(repo.id, 1);
//! assert_eq!(authority.operations().len(), 1);
//! # });
//! ```

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use super::traits::{AuthorityClient, AuthorityError, Key, Repository, User};
use crate::core::types::{AccessMode, UnitKind};

/// Mock authority for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockAuthority {
    inner: Arc<Mutex<MockAuthorityInner>>,
}

#[derive(Debug, Default)]
struct MockAuthorityInner {
    repositories: HashMap<(String, String), Repository>,
    keys: HashMap<i64, Key>,
    users_by_key: HashMap<i64, User>,
    permissions: HashMap<(i64, i64, UnitKind), AccessMode>,
    deploy_bindings: HashSet<(i64, i64)>,
    wikis: HashSet<i64>,
    fail_on: Option<FailOn>,
    operations: Vec<MockOperation>,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    GetRepository(AuthorityError),
    GetKeyById(AuthorityError),
    GetUserByKeyId(AuthorityError),
    CheckUnitPermission(AuthorityError),
    HasDeployKeyBinding(AuthorityError),
    TouchDeployKey(AuthorityError),
    TouchUserKey(AuthorityError),
    InitWikiStorage(AuthorityError),
}

/// Recorded call for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    GetRepository {
        owner: String,
        name: String,
    },
    GetKeyById {
        key_id: i64,
    },
    GetUserByKeyId {
        key_id: i64,
    },
    CheckUnitPermission {
        user_id: i64,
        repo_id: i64,
        is_admin: bool,
        unit: UnitKind,
    },
    HasDeployKeyBinding {
        key_id: i64,
        repo_id: i64,
    },
    TouchDeployKey {
        key_id: i64,
        repo_id: i64,
    },
    TouchUserKey {
        key_id: i64,
    },
    InitWikiStorage {
        repo_id: i64,
    },
}

impl MockOperation {
    /// Whether this call concerns credential resolution or key bookkeeping.
    pub fn is_key_lookup(&self) -> bool {
        matches!(
            self,
            MockOperation::GetKeyById { .. }
                | MockOperation::GetUserByKeyId { .. }
                | MockOperation::HasDeployKeyBinding { .. }
                | MockOperation::TouchDeployKey { .. }
                | MockOperation::TouchUserKey { .. }
        )
    }
}

impl MockAuthority {
    /// Create an empty mock authority.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a repository.
    pub fn with_repository(self, repo: Repository) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner
                .repositories
                .insert((repo.owner_name.clone(), repo.name.clone()), repo);
        }
        self
    }

    /// Add a key.
    pub fn with_key(self, key: Key) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.keys.insert(key.id, key);
        }
        self
    }

    /// Attach a user to a key id.
    pub fn with_key_owner(self, key_id: i64, user: User) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.users_by_key.insert(key_id, user);
        }
        self
    }

    /// Grant a user a mode on one unit of a repository.
    pub fn with_permission(self, user_id: i64, repo_id: i64, unit: UnitKind, mode: AccessMode) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.permissions.insert((user_id, repo_id, unit), mode);
        }
        self
    }

    /// Bind a deploy key to a repository.
    pub fn with_deploy_binding(self, key_id: i64, repo_id: i64) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.deploy_bindings.insert((key_id, repo_id));
        }
        self
    }

    /// Configure the mock to fail on a specific operation.
    ///
    /// ```
    /// use gitward::authority::mock::{FailOn, MockAuthority};
    /// use gitward::authority::AuthorityError;
    ///
    /// let authority = MockAuthority::new()
    ///     .fail_on(FailOn::GetKeyById(AuthorityError::Transport("refused".into())));
    /// ```
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.fail_on = Some(fail_on);
        }
        self
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        let inner = self.inner.lock().unwrap();
        inner.operations.clone()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.clear();
    }

    /// Whether the wiki of a repository has been initialized.
    pub fn wiki_initialized(&self, repo_id: i64) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.wikis.contains(&repo_id)
    }

    fn record(&self, op: MockOperation) {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(op);
    }

    fn check_fail(&self, expected: &MockOperation) -> Result<(), AuthorityError> {
        let inner = self.inner.lock().unwrap();
        let err = match (&inner.fail_on, expected) {
            (Some(FailOn::GetRepository(e)), MockOperation::GetRepository { .. })
            | (Some(FailOn::GetKeyById(e)), MockOperation::GetKeyById { .. })
            | (Some(FailOn::GetUserByKeyId(e)), MockOperation::GetUserByKeyId { .. })
            | (Some(FailOn::CheckUnitPermission(e)), MockOperation::CheckUnitPermission { .. })
            | (Some(FailOn::HasDeployKeyBinding(e)), MockOperation::HasDeployKeyBinding { .. })
            | (Some(FailOn::TouchDeployKey(e)), MockOperation::TouchDeployKey { .. })
            | (Some(FailOn::TouchUserKey(e)), MockOperation::TouchUserKey { .. })
            | (Some(FailOn::InitWikiStorage(e)), MockOperation::InitWikiStorage { .. }) => {
                e.clone()
            }
            _ => return Ok(()),
        };
        Err(err)
    }

    fn call(&self, op: MockOperation) -> Result<(), AuthorityError> {
        self.record(op.clone());
        self.check_fail(&op)
    }
}

#[async_trait]
impl AuthorityClient for MockAuthority {
    async fn get_repository(&self, owner: &str, name: &str) -> Result<Repository, AuthorityError> {
        self.call(MockOperation::GetRepository {
            owner: owner.to_string(),
            name: name.to_string(),
        })?;

        let inner = self.inner.lock().unwrap();
        inner
            .repositories
            .get(&(owner.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| AuthorityError::NotFound(format!("repository {}/{}", owner, name)))
    }

    async fn get_key_by_id(&self, key_id: i64) -> Result<Key, AuthorityError> {
        self.call(MockOperation::GetKeyById { key_id })?;

        let inner = self.inner.lock().unwrap();
        inner
            .keys
            .get(&key_id)
            .cloned()
            .ok_or_else(|| AuthorityError::NotFound(format!("key {}", key_id)))
    }

    async fn get_user_by_key_id(&self, key_id: i64) -> Result<User, AuthorityError> {
        self.call(MockOperation::GetUserByKeyId { key_id })?;

        let inner = self.inner.lock().unwrap();
        inner
            .users_by_key
            .get(&key_id)
            .cloned()
            .ok_or_else(|| AuthorityError::NotFound(format!("user for key {}", key_id)))
    }

    async fn check_unit_permission(
        &self,
        user_id: i64,
        repo_id: i64,
        is_admin: bool,
        unit: UnitKind,
    ) -> Result<AccessMode, AuthorityError> {
        self.call(MockOperation::CheckUnitPermission {
            user_id,
            repo_id,
            is_admin,
            unit,
        })?;

        if is_admin {
            return Ok(AccessMode::Admin);
        }
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .permissions
            .get(&(user_id, repo_id, unit))
            .copied()
            .unwrap_or_default())
    }

    async fn has_deploy_key_binding(
        &self,
        key_id: i64,
        repo_id: i64,
    ) -> Result<bool, AuthorityError> {
        self.call(MockOperation::HasDeployKeyBinding { key_id, repo_id })?;

        let inner = self.inner.lock().unwrap();
        Ok(inner.deploy_bindings.contains(&(key_id, repo_id)))
    }

    async fn touch_deploy_key(&self, key_id: i64, repo_id: i64) -> Result<(), AuthorityError> {
        self.call(MockOperation::TouchDeployKey { key_id, repo_id })
    }

    async fn touch_user_key(&self, key_id: i64) -> Result<(), AuthorityError> {
        self.call(MockOperation::TouchUserKey { key_id })
    }

    async fn init_wiki_storage(&self, repo_id: i64) -> Result<(), AuthorityError> {
        self.call(MockOperation::InitWikiStorage { repo_id })?;

        let mut inner = self.inner.lock().unwrap();
        inner.wikis.insert(repo_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::KeyType;

    fn repo() -> Repository {
        Repository {
            id: 1,
            owner_name: "owner".to_string(),
            name: "repo".to_string(),
            is_private: true,
            is_mirror: false,
        }
    }

    #[tokio::test]
    async fn missing_repository_is_not_found() {
        let authority = MockAuthority::new();
        let err = authority.get_repository("owner", "repo").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn records_operations_in_order() {
        let authority = MockAuthority::new().with_repository(repo()).with_key(Key {
            id: 5,
            key_type: KeyType::User,
            mode: AccessMode::None,
        });

        authority.get_repository("owner", "repo").await.unwrap();
        authority.get_key_by_id(5).await.unwrap();

        assert_eq!(
            authority.operations(),
            vec![
                MockOperation::GetRepository {
                    owner: "owner".to_string(),
                    name: "repo".to_string()
                },
                MockOperation::GetKeyById { key_id: 5 },
            ]
        );

        authority.clear_operations();
        assert!(authority.operations().is_empty());
    }

    #[tokio::test]
    async fn permissions_are_unit_scoped() {
        let authority =
            MockAuthority::new().with_permission(9, 1, UnitKind::Code, AccessMode::Write);

        let code = authority
            .check_unit_permission(9, 1, false, UnitKind::Code)
            .await
            .unwrap();
        let wiki = authority
            .check_unit_permission(9, 1, false, UnitKind::Wiki)
            .await
            .unwrap();

        assert_eq!(code, AccessMode::Write);
        assert_eq!(wiki, AccessMode::None);
    }

    #[tokio::test]
    async fn fail_on_only_affects_named_operation() {
        let authority = MockAuthority::new()
            .with_repository(repo())
            .fail_on(FailOn::TouchUserKey(AuthorityError::Transport(
                "refused".into(),
            )));

        assert!(authority.get_repository("owner", "repo").await.is_ok());
        assert_eq!(
            authority.touch_user_key(3).await,
            Err(AuthorityError::Transport("refused".into()))
        );
        // Failed calls are still recorded.
        assert_eq!(authority.operations().len(), 2);
    }

    #[tokio::test]
    async fn init_wiki_marks_repository() {
        let authority = MockAuthority::new();
        assert!(!authority.wiki_initialized(1));
        authority.init_wiki_storage(1).await.unwrap();
        assert!(authority.wiki_initialized(1));
    }
}
