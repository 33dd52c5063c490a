//! Declared contracts of every endpoint, parsed once at startup.

use serde_json::{json, Value};

use crate::cache::CachePolicy;
use crate::config::Config;
use crate::validation::{RuleError, RuleSet};

use super::dispatch::Endpoint;

/// Default page size of `GET /items` when `limit` is not given.
pub const DEFAULT_LIMIT: u32 = 30;

#[derive(Debug, Clone)]
pub struct EndpointRules {
    pub root: Endpoint,
    pub register: Endpoint,
    pub login: Endpoint,
    pub logout: Endpoint,
    pub list_items: Endpoint,
    pub create_item: Endpoint,
    pub update_item: Endpoint,
    pub delete_item: Endpoint,
    pub oauth_redirect: Endpoint,
    pub oauth_callback: Endpoint,
    pub notifications: Endpoint,
}

impl EndpointRules {
    /// # Errors
    ///
    /// Returns the first rule token that fails to parse.
    pub fn new(cfg: &Config) -> Result<Self, RuleError> {
        let max_limit = format!("max:{}", u64::from(cfg.items_per_page) * 2);

        let register = Endpoint::new(
            RuleSet::new()
                .field(
                    "name",
                    &["required", "string", "min:4", "max:128", r"regex:^[a-zA-Z0-9\s]+$"],
                )?
                .field("email", &["nullable", "email", "min:6", "max:128"])?
                .field(
                    "phone",
                    &["nullable", "string", "min:10", "max:15", r"regex:^\+[0-9]{10,15}$"],
                )?
                .field("password", &["required", "string", "min:4", "max:255"])?,
        )
        .with_defaults(vec![("email", Value::Null), ("phone", Value::Null)]);

        let login = Endpoint::new(
            RuleSet::new()
                .field(
                    "email",
                    &[
                        "required",
                        "email",
                        "min:6",
                        "max:128",
                        r"regex:^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$",
                    ],
                )?
                .field("password", &["required", "string", "min:4", "max:255"])?
                .field("remember_me", &["nullable", "boolean_like"])?,
        )
        .with_defaults(vec![("remember_me", json!(false))]);

        let list_items = Endpoint::new(
            RuleSet::new()
                .field("offset", &["nullable", "integer", "min:0"])?
                .field("limit", &["nullable", "integer", "min:1", max_limit.as_str()])?
                .field("order", &["nullable", "in:asc,desc"])?
                .field("sort", &["nullable", "in:name,price,created_at"])?
                .field("filter", &["nullable", "in:name,description,price"])?
                .field("filter_value", &["nullable", "string", "min:1", "max:255"])?
                .field("filter_literally", &["nullable", "boolean_like"])?,
        )
        .with_defaults(vec![
            ("offset", json!(0)),
            ("limit", json!(DEFAULT_LIMIT)),
            ("order", json!("asc")),
            ("sort", json!("created_at")),
            ("filter", Value::Null),
            ("filter_value", Value::Null),
            ("filter_literally", json!(false)),
        ])
        .cached(CachePolicy {
            ttl: cfg.response_cache_ttl(),
            show_hit: true,
        });

        Ok(Self {
            root: Endpoint::default(),
            register,
            login,
            logout: Endpoint::default(),
            list_items,
            create_item: Endpoint::new(item_fields(RuleSet::new())?),
            update_item: Endpoint::new(item_fields(item_id()?)?),
            delete_item: Endpoint::new(item_id()?),
            oauth_redirect: Endpoint::default(),
            oauth_callback: Endpoint::new(RuleSet::new().field(
                "code",
                &["required", "string", "min:1", "max:255", "regex:^[a-zA-Z0-9_-]+$"],
            )?),
            notifications: Endpoint::default(),
        })
    }
}

fn item_id() -> Result<RuleSet, RuleError> {
    RuleSet::new().field("id", &["required", "string", "min:36", "max:36"])
}

fn item_fields(rules: RuleSet) -> Result<RuleSet, RuleError> {
    rules
        .field("name", &["required", "string", "min:3", "max:255"])?
        .field("description", &["required", "string", "min:3", "max:255"])?
        .field("price", &["required", "numeric", "min:0"])
}
