//! In-process implementation of every repository port.

use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering as AtomicOrdering},
        Arc,
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AccessToken, FilterField, Item, ItemDraft, ItemFilter, ItemPage, ItemQuery, ItemRepository,
    NewUser, RepositoryError, SortField, SortOrder, TokenRepository, User, UserRepository,
};

#[derive(Debug, Default)]
struct Tables {
    next_user_id: u64,
    users: HashMap<u64, User>,
    tokens: HashMap<String, AccessToken>,
    items: HashMap<String, Item>,
}

/// Users, tokens and items held in memory behind one lock.
///
/// Every port call increments a counter readable through
/// [`MemoryDatabase::calls`].
#[derive(Clone)]
pub struct MemoryDatabase {
    inner: Arc<RwLock<Tables>>,
    calls: Arc<AtomicUsize>,
    clock: Arc<dyn Clock>,
}

impl MemoryDatabase {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Tables::default())),
            calls: Arc::new(AtomicUsize::new(0)),
            clock,
        }
    }

    /// Number of storage calls served so far.
    #[cfg(test)]
    pub fn calls(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    /// Number of stored token rows.
    #[cfg(test)]
    pub async fn token_count(&self) -> usize {
        self.inner.read().await.tokens.len()
    }

    fn hit(&self) {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
    }
}

#[async_trait]
impl UserRepository for MemoryDatabase {
    async fn create_user(&self, new: NewUser) -> Result<User, RepositoryError> {
        self.hit();
        let now = self.clock.utc();
        let mut tables = self.inner.write().await;
        if let Some(email) = &new.email {
            if tables.users.values().any(|u| u.email.as_ref() == Some(email)) {
                return Err(RepositoryError::Duplicate("email"));
            }
        }
        if let Some(phone) = &new.phone {
            if tables.users.values().any(|u| u.phone.as_ref() == Some(phone)) {
                return Err(RepositoryError::Duplicate("phone"));
            }
        }
        let id = tables
            .next_user_id
            .checked_add(1)
            .ok_or_else(|| RepositoryError::Unavailable("user id sequence exhausted".into()))?;
        tables.next_user_id = id;
        let user = User {
            id,
            name: new.name,
            email: new.email,
            phone: new.phone,
            password_hash: new.password_hash,
            permissions: Vec::new(),
            avatar: None,
            ml_id: None,
            verified_at: None,
            data: Value::Object(Default::default()),
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: u64) -> Result<Option<User>, RepositoryError> {
        self.hit();
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        self.hit();
        let tables = self.inner.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, RepositoryError> {
        self.hit();
        let tables = self.inner.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.phone.as_deref() == Some(phone))
            .cloned())
    }

    async fn update_user(&self, mut user: User) -> Result<bool, RepositoryError> {
        self.hit();
        let mut tables = self.inner.write().await;
        match tables.users.get_mut(&user.id) {
            Some(row) => {
                user.updated_at = self.clock.utc();
                *row = user;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl TokenRepository for MemoryDatabase {
    async fn create_token(
        &self,
        user_id: u64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<AccessToken, RepositoryError> {
        self.hit();
        let now = self.clock.utc();
        let mut tables = self.inner.write().await;
        if tables.tokens.contains_key(token) {
            return Err(RepositoryError::Duplicate("token"));
        }
        let row = AccessToken {
            token: token.to_owned(),
            user_id,
            expires_at,
            created_at: now,
            updated_at: now,
        };
        tables.tokens.insert(row.token.clone(), row.clone());
        Ok(row)
    }

    async fn find_token_by_user(
        &self,
        user_id: u64,
    ) -> Result<Option<AccessToken>, RepositoryError> {
        self.hit();
        let tables = self.inner.read().await;
        Ok(tables
            .tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .max_by_key(|t| t.updated_at)
            .cloned())
    }

    async fn find_token_owner(
        &self,
        token: &str,
    ) -> Result<Option<(AccessToken, User)>, RepositoryError> {
        self.hit();
        let tables = self.inner.read().await;
        Ok(tables.tokens.get(token).and_then(|row| {
            tables
                .users
                .get(&row.user_id)
                .map(|user| (row.clone(), user.clone()))
        }))
    }

    async fn rotate_token(
        &self,
        old: &str,
        new: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<AccessToken>, RepositoryError> {
        self.hit();
        let mut tables = self.inner.write().await;
        if old != new && tables.tokens.contains_key(new) {
            return Err(RepositoryError::Duplicate("token"));
        }
        let Some(mut row) = tables.tokens.remove(old) else {
            return Ok(None);
        };
        row.token = new.to_owned();
        row.expires_at = expires_at;
        row.updated_at = self.clock.utc();
        tables.tokens.insert(row.token.clone(), row.clone());
        Ok(Some(row))
    }

    async fn delete_token(&self, token: &str) -> Result<bool, RepositoryError> {
        self.hit();
        Ok(self.inner.write().await.tokens.remove(token).is_some())
    }
}

#[async_trait]
impl ItemRepository for MemoryDatabase {
    async fn list_items(&self, query: ItemQuery) -> Result<ItemPage, RepositoryError> {
        self.hit();
        let tables = self.inner.read().await;
        let mut matching: Vec<&Item> = tables
            .items
            .values()
            .filter(|item| query.filter.as_ref().map_or(true, |f| matches_filter(item, f)))
            .collect();

        matching.sort_by(|a, b| {
            let ord = compare(a, b, query.sort).then_with(|| a.id.cmp(&b.id));
            match query.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });

        let total = matching.len();
        let items = matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect();
        Ok(ItemPage { items, total })
    }

    async fn find_item(&self, id: &str) -> Result<Option<Item>, RepositoryError> {
        self.hit();
        Ok(self.inner.read().await.items.get(id).cloned())
    }

    async fn create_item(&self, draft: ItemDraft) -> Result<Item, RepositoryError> {
        self.hit();
        let now = self.clock.utc();
        let item = Item {
            id: Uuid::new_v4().to_string(),
            name: draft.name,
            description: draft.description,
            price: draft.price,
            images: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.inner
            .write()
            .await
            .items
            .insert(item.id.clone(), item.clone());
        Ok(item)
    }

    async fn update_item(
        &self,
        id: &str,
        draft: ItemDraft,
    ) -> Result<Option<Item>, RepositoryError> {
        self.hit();
        let mut tables = self.inner.write().await;
        let Some(item) = tables.items.get_mut(id) else {
            return Ok(None);
        };
        item.name = draft.name;
        item.description = draft.description;
        item.price = draft.price;
        item.updated_at = self.clock.utc();
        Ok(Some(item.clone()))
    }

    async fn delete_item(&self, id: &str) -> Result<bool, RepositoryError> {
        self.hit();
        Ok(self.inner.write().await.items.remove(id).is_some())
    }
}

fn compare(a: &Item, b: &Item, sort: SortField) -> Ordering {
    match sort {
        SortField::Name => a.name.cmp(&b.name),
        SortField::Price => a.price.total_cmp(&b.price),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
    }
}

fn matches_filter(item: &Item, filter: &ItemFilter) -> bool {
    if filter.field == FilterField::Price && filter.literal {
        return filter
            .value
            .trim()
            .parse::<f64>()
            .is_ok_and(|v| v == item.price);
    }
    let column = match filter.field {
        FilterField::Name => item.name.clone(),
        FilterField::Description => item.description.clone(),
        FilterField::Price => item.price.to_string(),
    };
    if filter.literal {
        column == filter.value
    } else {
        column.to_lowercase().contains(&filter.value.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::test_clock::ManualClock;

    fn db() -> (MemoryDatabase, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_fixture());
        (MemoryDatabase::new(clock.clone()), clock)
    }

    fn new_user(email: Option<&str>, phone: Option<&str>) -> NewUser {
        NewUser {
            name: "Alice".into(),
            email: email.map(str::to_owned),
            phone: phone.map(str::to_owned),
            password_hash: "hash".into(),
        }
    }

    fn draft(name: &str, description: &str, price: f64) -> ItemDraft {
        ItemDraft {
            name: name.into(),
            description: description.into(),
            price,
        }
    }

    #[tokio::test]
    async fn users_are_unique_by_email_and_phone() {
        let (db, _) = db();
        let alice = db
            .create_user(new_user(Some("a@example.com"), Some("+5511999990000")))
            .await
            .unwrap();
        assert_eq!(alice.id, 1);
        assert!(matches!(
            db.create_user(new_user(Some("a@example.com"), None)).await,
            Err(RepositoryError::Duplicate("email"))
        ));
        assert!(matches!(
            db.create_user(new_user(None, Some("+5511999990000"))).await,
            Err(RepositoryError::Duplicate("phone"))
        ));
        assert_eq!(
            db.find_user_by_email("a@example.com").await.unwrap(),
            Some(alice.clone())
        );
        assert_eq!(
            db.find_user_by_phone("+5511999990000").await.unwrap(),
            Some(alice)
        );
    }

    #[tokio::test]
    async fn exhausted_user_ids_are_a_storage_failure() {
        let (db, _) = db();
        db.inner.write().await.next_user_id = u64::MAX;
        assert!(matches!(
            db.create_user(new_user(Some("a@example.com"), None)).await,
            Err(RepositoryError::Unavailable(_))
        ));
        assert!(db.find_user_by_email("a@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn every_call_is_counted() {
        let (db, _) = db();
        assert_eq!(db.calls(), 0);
        db.find_user(1).await.unwrap();
        db.find_token_owner("x").await.unwrap();
        assert_eq!(db.calls(), 2);
    }

    #[tokio::test]
    async fn token_owner_is_joined() {
        let (db, clock) = db();
        let user = db.create_user(new_user(Some("a@example.com"), None)).await.unwrap();
        let expires = clock.utc() + chrono::Duration::hours(1);
        db.create_token(user.id, "tok", expires).await.unwrap();

        let (row, owner) = db.find_token_owner("tok").await.unwrap().unwrap();
        assert_eq!(row.expires_at, expires);
        assert_eq!(owner.id, user.id);
        assert!(db.find_token_owner("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rotate_replaces_in_place_and_never_creates() {
        let (db, clock) = db();
        let later = clock.utc() + chrono::Duration::hours(2);
        assert!(db.rotate_token("missing", "new", later).await.unwrap().is_none());
        assert_eq!(db.token_count().await, 0);

        db.create_token(7, "old", clock.utc()).await.unwrap();
        let row = db.rotate_token("old", "new", later).await.unwrap().unwrap();
        assert_eq!(row.token, "new");
        assert_eq!(row.expires_at, later);
        assert_eq!(db.token_count().await, 1);
        assert!(db.find_token_owner("old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_token_reports_removal() {
        let (db, clock) = db();
        db.create_token(1, "tok", clock.utc()).await.unwrap();
        assert!(db.delete_token("tok").await.unwrap());
        assert!(!db.delete_token("tok").await.unwrap());
    }

    #[tokio::test]
    async fn list_filters_sorts_and_pages() {
        let (db, clock) = db();
        db.create_item(draft("Chair", "Wooden chair", 50.0)).await.unwrap();
        clock.advance(chrono::Duration::seconds(1));
        db.create_item(draft("Table", "Oak table", 120.0)).await.unwrap();
        clock.advance(chrono::Duration::seconds(1));
        db.create_item(draft("Armchair", "Leather chair", 300.0)).await.unwrap();

        let page = db
            .list_items(ItemQuery {
                limit: 10,
                ..ItemQuery::default()
            })
            .await
            .unwrap();
        let names: Vec<_> = page.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["Chair", "Table", "Armchair"]);
        assert_eq!(page.total, 3);

        let page = db
            .list_items(ItemQuery {
                limit: 1,
                offset: 0,
                order: SortOrder::Desc,
                sort: SortField::Price,
                filter: Some(ItemFilter {
                    field: FilterField::Description,
                    value: "CHAIR".into(),
                    literal: false,
                }),
            })
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "Armchair");
    }

    #[tokio::test]
    async fn literal_filters_compare_for_equality() {
        let (db, _) = db();
        db.create_item(draft("Chair", "Wooden chair", 50.0)).await.unwrap();
        db.create_item(draft("Armchair", "Leather chair", 300.0)).await.unwrap();

        let by_name = |value: &str| ItemQuery {
            limit: 10,
            filter: Some(ItemFilter {
                field: FilterField::Name,
                value: value.into(),
                literal: true,
            }),
            ..ItemQuery::default()
        };
        assert_eq!(db.list_items(by_name("Chair")).await.unwrap().total, 1);
        assert_eq!(db.list_items(by_name("chair")).await.unwrap().total, 0);

        let by_price = ItemQuery {
            limit: 10,
            filter: Some(ItemFilter {
                field: FilterField::Price,
                value: "300".into(),
                literal: true,
            }),
            ..ItemQuery::default()
        };
        let page = db.list_items(by_price).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "Armchair");
    }

    #[tokio::test]
    async fn update_and_delete_missing_items() {
        let (db, _) = db();
        assert!(db.update_item("nope", draft("a", "b", 1.0)).await.unwrap().is_none());
        assert!(!db.delete_item("nope").await.unwrap());

        let item = db.create_item(draft("Chair", "Wooden chair", 50.0)).await.unwrap();
        assert_eq!(item.id.len(), 36);
        let updated = db
            .update_item(&item.id, draft("Stool", "Short stool", 20.0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Stool");
        assert!(db.delete_item(&item.id).await.unwrap());
    }
}
