//! Persistence ports for users, access tokens and items.
//!
//! Handlers and the token store only talk to these traits. [`MemoryDatabase`]
//! implements all three over one in-process table set.

pub mod memory;

pub use memory::MemoryDatabase;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

/// Errors from a repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A unique column already holds the value.
    #[error("duplicate value for {0}")]
    Duplicate(&'static str),

    /// The backing storage could not complete the operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Stored user row. `password_hash` never leaves the service.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: String,
    pub permissions: Vec<String>,
    pub avatar: Option<String>,
    pub ml_id: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub user_id: u64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Writable item fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDraft {
    pub name: String,
    pub description: String,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    Name,
    Price,
    #[default]
    CreatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Name,
    Description,
    Price,
}

/// Column filter. Literal filters compare for equality, others match a
/// case-insensitive substring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFilter {
    pub field: FilterField,
    pub value: String,
    pub literal: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemQuery {
    pub offset: usize,
    pub limit: usize,
    pub order: SortOrder,
    pub sort: SortField,
    pub filter: Option<ItemFilter>,
}

/// One page of items and the number of items matching the filter.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ItemPage {
    pub items: Vec<Item>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, new: NewUser) -> Result<User, RepositoryError>;

    async fn find_user(&self, id: u64) -> Result<Option<User>, RepositoryError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;

    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, RepositoryError>;

    /// Persist every field of `user`. Returns `false` when the row is gone.
    async fn update_user(&self, user: User) -> Result<bool, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn create_token(
        &self,
        user_id: u64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<AccessToken, RepositoryError>;

    /// The token row owned by `user_id`, expired or not.
    async fn find_token_by_user(&self, user_id: u64)
        -> Result<Option<AccessToken>, RepositoryError>;

    /// Token row joined with its owner.
    async fn find_token_owner(
        &self,
        token: &str,
    ) -> Result<Option<(AccessToken, User)>, RepositoryError>;

    /// Replace the value and expiry of the row holding `old` in place.
    /// Returns `None` when no such row exists; nothing is created then.
    async fn rotate_token(
        &self,
        old: &str,
        new: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<AccessToken>, RepositoryError>;

    /// Returns `true` when a row was deleted.
    async fn delete_token(&self, token: &str) -> Result<bool, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ItemRepository: Send + Sync {
    async fn list_items(&self, query: ItemQuery) -> Result<ItemPage, RepositoryError>;

    async fn find_item(&self, id: &str) -> Result<Option<Item>, RepositoryError>;

    async fn create_item(&self, draft: ItemDraft) -> Result<Item, RepositoryError>;

    /// Returns `None` when the item does not exist.
    async fn update_item(&self, id: &str, draft: ItemDraft)
        -> Result<Option<Item>, RepositoryError>;

    /// Returns `true` when a row was deleted.
    async fn delete_item(&self, id: &str) -> Result<bool, RepositoryError>;
}
