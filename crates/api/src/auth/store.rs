//! [`AuthTokenStore`]: bearer-token lifecycle over persistent storage plus a
//! fast token→user cache.
//!
//! Token states: active (row exists, `expires_at` in the future), expired
//! (row exists, past) and absent. The fast cache entry for a token lives at
//! `user.{token}` with a TTL equal to the token's remaining lifetime, so it
//! disappears on its own when the token expires. It is evicted explicitly
//! whenever the row is rotated or deleted, or the owning user is saved.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common::ServiceError;
use mockable::Clock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::{password, token};
use crate::cache::{KvStore, StoreError};
use crate::storage::{AccessToken, RepositoryError, TokenRepository, User, UserRepository};
use crate::telemetry::token_fingerprint;

/// Why a bearer token was not accepted.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("malformed token")]
    Malformed,

    #[error("token not found")]
    NotFound,

    #[error("token expired")]
    Expired,

    #[error("token storage failed: {0}")]
    Repository(#[from] RepositoryError),

    #[error("token cache failed: {0}")]
    Cache(#[from] StoreError),
}

impl AuthError {
    /// Diagnostic attached as a debug message; never shown outside debug mode.
    pub fn debug_message(&self) -> &'static str {
        match self {
            AuthError::Malformed => "Malformed token.",
            AuthError::NotFound => "Token not found.",
            AuthError::Expired => "Token expired.",
            AuthError::Repository(_) => "Token storage failed.",
            AuthError::Cache(_) => "Token cache failed.",
        }
    }
}

/// The principal behind a verified token, as kept in the fast cache.
///
/// Carries no password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub id: u64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub permissions: Vec<String>,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthenticatedUser {
    fn from_row(user: &User, row: &AccessToken) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            permissions: user.permissions.clone(),
            token: row.token.clone(),
            expires_at: row.expires_at,
        }
    }
}

/// Fast-cache key for a token.
pub fn cache_key(token: &str) -> String {
    format!("user.{token}")
}

/// Result of a credential check.
#[derive(Debug)]
pub enum LoginOutcome {
    Authenticated { user: User, token: AccessToken },
    BadCredentials,
    /// Credentials matched but the expired token could not be rotated.
    RefreshFailed,
}

#[derive(Clone)]
pub struct AuthTokenStore {
    users: Arc<dyn UserRepository>,
    tokens: Arc<dyn TokenRepository>,
    cache: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    short_ttl: Duration,
    long_ttl: Duration,
}

impl AuthTokenStore {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: Arc<dyn TokenRepository>,
        cache: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        short_ttl: Duration,
        long_ttl: Duration,
    ) -> Self {
        Self {
            users,
            tokens,
            cache,
            clock,
            short_ttl,
            long_ttl,
        }
    }

    pub fn short_ttl(&self) -> Duration {
        self.short_ttl
    }

    /// Token lifetime chosen by the "remember me" flag.
    pub fn ttl_for(&self, remember_me: bool) -> Duration {
        if remember_me {
            self.long_ttl
        } else {
            self.short_ttl
        }
    }

    /// Resolve a bearer token to its user.
    ///
    /// Malformed tokens are rejected before touching the cache or storage. A
    /// cached entry is trusted as is; on a miss the token row is read joined
    /// with its owner and, when active, cached for its remaining lifetime.
    ///
    /// # Errors
    ///
    /// [`AuthError::Malformed`], [`AuthError::NotFound`] or
    /// [`AuthError::Expired`] for rejected tokens, [`AuthError::Repository`]
    /// when storage fails.
    pub async fn verify(&self, bearer: &str) -> Result<AuthenticatedUser, AuthError> {
        if !token::is_well_formed(bearer) {
            return Err(AuthError::Malformed);
        }

        let key = cache_key(bearer);
        match self.cache.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_value::<AuthenticatedUser>(raw) {
                Ok(user) => return Ok(user),
                Err(e) => warn!(error = %e, "discarding undecodable token cache entry"),
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "token cache lookup failed, reading storage"),
        }

        let Some((row, owner)) = self.tokens.find_token_owner(bearer).await? else {
            return Err(AuthError::NotFound);
        };
        let remaining = row.expires_at - self.clock.utc();
        if remaining <= Duration::zero() {
            return Err(AuthError::Expired);
        }

        let user = AuthenticatedUser::from_row(&owner, &row);
        if let Err(e) = self.remember(&key, &user, remaining).await {
            warn!(
                error = %e,
                token = %token_fingerprint(bearer),
                "unable to cache verified token"
            );
        }
        Ok(user)
    }

    async fn remember(
        &self,
        key: &str,
        user: &AuthenticatedUser,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let ttl = ttl
            .to_std()
            .map_err(|e| StoreError::Encoding(format!("ttl out of range: {e}")))?;
        let raw = serde_json::to_value(user).map_err(|e| StoreError::Encoding(e.to_string()))?;
        self.cache.put(key, raw, ttl).await
    }

    /// Drop the fast-cache entry of `token`.
    async fn evict(&self, token: &str) -> Result<(), StoreError> {
        self.cache
            .forget(&cache_key(token))
            .await
            .map(|_| ())
            .inspect_err(|e| {
                warn!(error = %e, token = %token_fingerprint(token), "token cache eviction failed");
            })
    }

    /// Create a new token for `user_id` valid for `ttl`.
    ///
    /// # Errors
    ///
    /// A failed write is escalated as [`ServiceError::Persistence`].
    pub async fn issue(&self, user_id: u64, ttl: Duration) -> Result<AccessToken, ServiceError> {
        let expires_at = self.clock.utc() + ttl;
        let value = token::generate_token();
        let row = self
            .tokens
            .create_token(user_id, &value, expires_at)
            .await
            .map_err(|e| ServiceError::persistence(format!("access token not created: {e}")))?;
        debug!(user_id, token = %token_fingerprint(&row.token), "access token issued");
        Ok(row)
    }

    /// Replace the value and expiry of `old` in place.
    ///
    /// # Errors
    ///
    /// [`AuthError::NotFound`] when no row holds `old` (nothing is created),
    /// [`AuthError::Repository`] when the write fails, [`AuthError::Cache`]
    /// when the cached entry of `old` could not be evicted.
    pub async fn refresh(&self, old: &str, ttl: Duration) -> Result<AccessToken, AuthError> {
        let expires_at = self.clock.utc() + ttl;
        let new = token::generate_token();
        let row = self
            .tokens
            .rotate_token(old, &new, expires_at)
            .await?
            .ok_or(AuthError::NotFound)?;
        self.evict(old).await?;
        debug!(
            user_id = row.user_id,
            old = %token_fingerprint(old),
            new = %token_fingerprint(&row.token),
            "access token rotated"
        );
        Ok(row)
    }

    /// End the session of `user_id`.
    ///
    /// Succeeds when the user has no token. Returns `false` only when the row
    /// was deleted but the cache entry could not be evicted.
    ///
    /// # Errors
    ///
    /// A failed lookup or delete is escalated as [`ServiceError::Persistence`].
    pub async fn revoke(&self, user_id: u64) -> Result<bool, ServiceError> {
        let row = self
            .tokens
            .find_token_by_user(user_id)
            .await
            .map_err(|e| ServiceError::persistence(format!("access token lookup failed: {e}")))?;
        let Some(row) = row else {
            return Ok(true);
        };
        self.tokens
            .delete_token(&row.token)
            .await
            .map_err(|e| ServiceError::persistence(format!("access token not deleted: {e}")))?;
        debug!(user_id, token = %token_fingerprint(&row.token), "access token revoked");
        Ok(self.evict(&row.token).await.is_ok())
    }

    /// The user's token row, or a new one valid for `ttl` when none exists.
    /// An existing row is returned unchanged, even when expired.
    ///
    /// # Errors
    ///
    /// Escalates storage failures as [`ServiceError::Persistence`].
    pub async fn get_token(&self, user: &User, ttl: Duration) -> Result<AccessToken, ServiceError> {
        let existing = self
            .tokens
            .find_token_by_user(user.id)
            .await
            .map_err(|e| ServiceError::persistence(format!("access token lookup failed: {e}")))?;
        match existing {
            Some(row) => Ok(row),
            None => self.issue(user.id, ttl).await,
        }
    }

    /// Persist `user`, evicting the cached copy behind its live token first.
    /// Nothing is written when the eviction fails.
    ///
    /// # Errors
    ///
    /// Escalates storage failures as [`ServiceError::Persistence`] and a
    /// failed eviction as [`ServiceError::Cache`].
    pub async fn save_user(&self, user: User) -> Result<bool, ServiceError> {
        let live = self
            .tokens
            .find_token_by_user(user.id)
            .await
            .map_err(|e| ServiceError::persistence(format!("access token lookup failed: {e}")))?;
        if let Some(row) = live {
            self.evict(&row.token)
                .await
                .map_err(|e| ServiceError::cache(format!("cached user not evicted: {e}")))?;
        }
        self.users
            .update_user(user)
            .await
            .map_err(|e| ServiceError::persistence(format!("user not saved: {e}")))
    }

    /// Record the marketplace account `ml_id` on user `user_id`. Returns
    /// `false` when the user no longer exists.
    ///
    /// # Errors
    ///
    /// As [`AuthTokenStore::save_user`].
    pub async fn link_marketplace_account(
        &self,
        user_id: u64,
        ml_id: String,
    ) -> Result<bool, ServiceError> {
        let user = self
            .users
            .find_user(user_id)
            .await
            .map_err(|e| ServiceError::persistence(format!("user lookup failed: {e}")))?;
        let Some(mut user) = user else {
            return Ok(false);
        };
        user.ml_id = Some(ml_id);
        self.save_user(user).await
    }

    /// Check credentials and hand out the user's token, rotating it first
    /// when it has expired.
    ///
    /// # Errors
    ///
    /// Escalates storage failures as [`ServiceError::Persistence`].
    pub async fn login(
        &self,
        email: &str,
        candidate: &str,
        remember_me: bool,
    ) -> Result<LoginOutcome, ServiceError> {
        let user = self
            .users
            .find_user_by_email(email)
            .await
            .map_err(|e| ServiceError::persistence(format!("user lookup failed: {e}")))?;

        let stored = user.as_ref().map(|u| u.password_hash.clone());
        let candidate = candidate.to_owned();
        let matches = tokio::task::spawn_blocking(move || match stored {
            Some(hash) => password::verify_password(&candidate, &hash),
            None => {
                // Same work as a real check so unknown emails are not faster.
                let _ = password::hash_password(&candidate);
                false
            }
        })
        .await
        .map_err(|e| ServiceError::internal(format!("password check aborted: {e}")))?;

        let Some(user) = user.filter(|_| matches) else {
            return Ok(LoginOutcome::BadCredentials);
        };

        let ttl = self.ttl_for(remember_me);
        let mut token = self.get_token(&user, ttl).await?;
        if token.expires_at <= self.clock.utc() {
            match self.refresh(&token.token, ttl).await {
                Ok(fresh) => token = fresh,
                Err(e) => {
                    warn!(error = %e, user_id = user.id, "expired access token not refreshed");
                    return Ok(LoginOutcome::RefreshFailed);
                }
            }
        }
        Ok(LoginOutcome::Authenticated { user, token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::{test_clock::ManualClock, MemoryStore, MockKvStore};
    use crate::storage::{MemoryDatabase, MockTokenRepository, NewUser};

    struct Fixture {
        db: MemoryDatabase,
        cache: MemoryStore,
        clock: Arc<ManualClock>,
        store: AuthTokenStore,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::at_fixture());
        let db = MemoryDatabase::new(clock.clone());
        let cache = MemoryStore::new(clock.clone());
        let store = AuthTokenStore::new(
            Arc::new(db.clone()),
            Arc::new(db.clone()),
            Arc::new(cache.clone()),
            clock.clone(),
            Duration::days(7),
            Duration::days(30),
        );
        Fixture {
            db,
            cache,
            clock,
            store,
        }
    }

    async fn alice(db: &MemoryDatabase) -> User {
        db.create_user(NewUser {
            name: "Alice".into(),
            email: Some("alice@example.com".into()),
            phone: None,
            password_hash: password::hash_password("s3cret").unwrap(),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn malformed_tokens_never_reach_storage_or_cache() {
        let clock = Arc::new(ManualClock::at_fixture());
        let db = MemoryDatabase::new(clock.clone());
        // No expectations: any cache call would panic.
        let store = AuthTokenStore::new(
            Arc::new(db.clone()),
            Arc::new(db.clone()),
            Arc::new(MockKvStore::new()),
            clock,
            Duration::days(7),
            Duration::days(30),
        );
        let too_long = "a".repeat(41);
        let bad_charset = format!("{}!", "a".repeat(39));
        for bad in ["", "short", too_long.as_str(), bad_charset.as_str()] {
            assert!(matches!(store.verify(bad).await, Err(AuthError::Malformed)));
        }
        assert_eq!(db.calls(), 0);
    }

    #[tokio::test]
    async fn active_token_is_verified_then_served_from_cache() {
        let f = fixture();
        let user = alice(&f.db).await;
        let row = f.store.issue(user.id, Duration::hours(2)).await.unwrap();

        let verified = f.store.verify(&row.token).await.unwrap();
        assert_eq!(verified.id, user.id);
        assert_eq!(verified.token, row.token);

        let calls = f.db.calls();
        let again = f.store.verify(&row.token).await.unwrap();
        assert_eq!(again, verified);
        assert_eq!(f.db.calls(), calls);
    }

    #[tokio::test]
    async fn cache_ttl_equals_remaining_lifetime() {
        let f = fixture();
        let user = alice(&f.db).await;
        let row = f.store.issue(user.id, Duration::hours(2)).await.unwrap();
        f.clock.advance(Duration::minutes(30));

        f.store.verify(&row.token).await.unwrap();
        assert_eq!(
            f.cache.expires_at(&cache_key(&row.token)).await,
            Some(row.expires_at)
        );
    }

    #[tokio::test]
    async fn token_fails_once_expired_even_after_being_cached() {
        let f = fixture();
        let user = alice(&f.db).await;
        let row = f.store.issue(user.id, Duration::hours(1)).await.unwrap();
        f.store.verify(&row.token).await.unwrap();

        f.clock.advance(Duration::hours(1));
        assert!(matches!(f.store.verify(&row.token).await, Err(AuthError::Expired)));
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let f = fixture();
        let err = f.store.verify(&"x".repeat(40)).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
        assert_eq!(err.debug_message(), "Token not found.");
    }

    #[tokio::test]
    async fn issue_failure_is_escalated() {
        let clock = Arc::new(ManualClock::at_fixture());
        let db = MemoryDatabase::new(clock.clone());
        let mut tokens = MockTokenRepository::new();
        tokens
            .expect_create_token()
            .returning(|_, _, _| Err(RepositoryError::Unavailable("down".into())));
        let store = AuthTokenStore::new(
            Arc::new(db),
            Arc::new(tokens),
            Arc::new(MemoryStore::new(clock.clone())),
            clock,
            Duration::days(7),
            Duration::days(30),
        );
        let err = store.issue(1, Duration::hours(1)).await.unwrap_err();
        assert_eq!(err.http_status(), 500);
        assert!(err.location().is_some());
    }

    #[tokio::test]
    async fn refreshing_unknown_token_fails_without_creating_rows() {
        let f = fixture();
        let result = f.store.refresh(&"z".repeat(40), Duration::hours(1)).await;
        assert!(matches!(result, Err(AuthError::NotFound)));
        assert_eq!(f.db.token_count().await, 0);
    }

    #[tokio::test]
    async fn refresh_rotates_in_place_and_evicts_old_entry() {
        let f = fixture();
        let user = alice(&f.db).await;
        let old = f.store.issue(user.id, Duration::hours(1)).await.unwrap();
        f.store.verify(&old.token).await.unwrap();

        let fresh = f.store.refresh(&old.token, Duration::days(30)).await.unwrap();
        assert_ne!(fresh.token, old.token);
        assert_eq!(fresh.expires_at, f.clock.utc() + Duration::days(30));
        assert_eq!(f.db.token_count().await, 1);
        assert!(f.cache.get(&cache_key(&old.token)).await.unwrap().is_none());
        assert!(matches!(f.store.verify(&old.token).await, Err(AuthError::NotFound)));
        assert!(f.store.verify(&fresh.token).await.is_ok());
    }

    #[tokio::test]
    async fn revoke_is_idempotent_and_evicts_cache() {
        let f = fixture();
        let user = alice(&f.db).await;
        let row = f.store.issue(user.id, Duration::hours(1)).await.unwrap();
        f.store.verify(&row.token).await.unwrap();

        assert!(f.store.revoke(user.id).await.unwrap());
        assert!(f.cache.get(&cache_key(&row.token)).await.unwrap().is_none());
        assert!(f.store.revoke(user.id).await.unwrap());
        assert!(matches!(f.store.verify(&row.token).await, Err(AuthError::NotFound)));
    }

    #[tokio::test]
    async fn revoke_delete_failure_is_fatal() {
        let clock = Arc::new(ManualClock::at_fixture());
        let db = MemoryDatabase::new(clock.clone());
        let mut tokens = MockTokenRepository::new();
        let expires = clock.utc();
        tokens.expect_find_token_by_user().returning(move |user_id| {
            Ok(Some(AccessToken {
                token: "t".repeat(40),
                user_id,
                expires_at: expires,
                created_at: expires,
                updated_at: expires,
            }))
        });
        tokens
            .expect_delete_token()
            .returning(|_| Err(RepositoryError::Unavailable("down".into())));
        let store = AuthTokenStore::new(
            Arc::new(db),
            Arc::new(tokens),
            Arc::new(MemoryStore::new(clock.clone())),
            clock,
            Duration::days(7),
            Duration::days(30),
        );
        let err = store.revoke(1).await.unwrap_err();
        assert!(matches!(err, ServiceError::Persistence { .. }));
    }

    #[tokio::test]
    async fn login_expiry_follows_remember_me() {
        let f = fixture();
        alice(&f.db).await;
        let LoginOutcome::Authenticated { token, .. } =
            f.store.login("alice@example.com", "s3cret", false).await.unwrap()
        else {
            panic!("expected a session");
        };
        assert_eq!(token.expires_at, f.clock.utc() + Duration::days(7));

        let f = fixture();
        alice(&f.db).await;
        let LoginOutcome::Authenticated { token, .. } =
            f.store.login("alice@example.com", "s3cret", true).await.unwrap()
        else {
            panic!("expected a session");
        };
        assert_eq!(token.expires_at, f.clock.utc() + Duration::days(30));
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials() {
        let f = fixture();
        alice(&f.db).await;
        assert!(matches!(
            f.store.login("alice@example.com", "wrong", false).await.unwrap(),
            LoginOutcome::BadCredentials
        ));
        assert!(matches!(
            f.store.login("bob@example.com", "s3cret", false).await.unwrap(),
            LoginOutcome::BadCredentials
        ));
        assert_eq!(f.db.token_count().await, 0);
    }

    #[tokio::test]
    async fn login_reuses_active_token_and_rotates_expired_one() {
        let f = fixture();
        let user = alice(&f.db).await;
        let first = f.store.issue(user.id, Duration::hours(1)).await.unwrap();

        let LoginOutcome::Authenticated { token, .. } =
            f.store.login("alice@example.com", "s3cret", true).await.unwrap()
        else {
            panic!("expected a session");
        };
        assert_eq!(token, first);

        f.clock.advance(Duration::hours(2));
        let LoginOutcome::Authenticated { token, .. } =
            f.store.login("alice@example.com", "s3cret", true).await.unwrap()
        else {
            panic!("expected a session");
        };
        assert_ne!(token.token, first.token);
        assert_eq!(token.expires_at, f.clock.utc() + Duration::days(30));
        assert_eq!(f.db.token_count().await, 1);
    }

    #[tokio::test]
    async fn saving_user_evicts_cached_profile() {
        let f = fixture();
        let mut user = alice(&f.db).await;
        let row = f.store.issue(user.id, Duration::hours(1)).await.unwrap();
        assert_eq!(f.store.verify(&row.token).await.unwrap().name, "Alice");

        user.name = "Alicia".into();
        assert!(f.store.save_user(user).await.unwrap());
        assert!(f.cache.get(&cache_key(&row.token)).await.unwrap().is_none());
        assert_eq!(f.store.verify(&row.token).await.unwrap().name, "Alicia");
    }

    #[tokio::test]
    async fn get_token_returns_existing_row_unchanged() {
        let f = fixture();
        let user = alice(&f.db).await;
        let first = f.store.get_token(&user, Duration::hours(1)).await.unwrap();
        let second = f.store.get_token(&user, Duration::days(30)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.expires_at, f.clock.utc() + Duration::hours(1));
    }

    #[tokio::test]
    async fn linking_marketplace_account_saves_user_and_evicts_cache() {
        let f = fixture();
        let user = alice(&f.db).await;
        let row = f.store.issue(user.id, Duration::hours(1)).await.unwrap();
        f.store.verify(&row.token).await.unwrap();

        assert!(f.store.link_marketplace_account(user.id, "123456".into()).await.unwrap());
        assert!(f.cache.get(&cache_key(&row.token)).await.unwrap().is_none());
        let stored = f.db.find_user(user.id).await.unwrap().unwrap();
        assert_eq!(stored.ml_id.as_deref(), Some("123456"));

        assert!(!f.store.link_marketplace_account(99, "1".into()).await.unwrap());
    }

    /// Memory store whose evictions always fail.
    struct ForgetFails(MemoryStore);

    #[async_trait::async_trait]
    impl KvStore for ForgetFails {
        async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
            self.0.get(key).await
        }

        async fn put(
            &self,
            key: &str,
            value: serde_json::Value,
            ttl: std::time::Duration,
        ) -> Result<bool, StoreError> {
            self.0.put(key, value, ttl).await
        }

        async fn forget(&self, _key: &str) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("connection reset".into()))
        }
    }

    fn failing_eviction_fixture() -> (MemoryDatabase, AuthTokenStore) {
        let clock = Arc::new(ManualClock::at_fixture());
        let db = MemoryDatabase::new(clock.clone());
        let store = AuthTokenStore::new(
            Arc::new(db.clone()),
            Arc::new(db.clone()),
            Arc::new(ForgetFails(MemoryStore::new(clock.clone()))),
            clock,
            Duration::days(7),
            Duration::days(30),
        );
        (db, store)
    }

    #[tokio::test]
    async fn refresh_fails_when_old_entry_cannot_be_evicted() {
        let (db, store) = failing_eviction_fixture();
        let user = alice(&db).await;
        let old = store.issue(user.id, Duration::hours(1)).await.unwrap();
        store.verify(&old.token).await.unwrap();

        let result = store.refresh(&old.token, Duration::days(30)).await;
        assert!(matches!(result, Err(AuthError::Cache(StoreError::Unavailable(_)))));
    }

    #[tokio::test]
    async fn save_user_writes_nothing_when_eviction_fails() {
        let (db, store) = failing_eviction_fixture();
        let mut user = alice(&db).await;
        let row = store.issue(user.id, Duration::hours(1)).await.unwrap();
        store.verify(&row.token).await.unwrap();

        user.name = "Alicia".into();
        let err = store.save_user(user.clone()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Cache { .. }));
        assert_eq!(db.find_user(user.id).await.unwrap().unwrap().name, "Alice");
        assert_eq!(store.verify(&row.token).await.unwrap().name, "Alice");
    }
}
