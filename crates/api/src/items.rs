//! Item catalogue: paged listing plus create, update and delete.

use axum::{
    extract::{MatchedPath, Path, State},
    http::Method,
};
use common::{
    protocol::{ItemId, ItemView},
    Envelope, ServiceError,
};
use serde_json::{Map, Value};

use crate::server::input::RequestInput;
use crate::server::reply::{ApiResponse, Outcome, Reply};
use crate::server::rules::DEFAULT_LIMIT;
use crate::server::state::AppState;
use crate::storage::{
    FilterField, Item, ItemDraft, ItemFilter, ItemQuery, SortField, SortOrder,
};
use crate::validation::Params;

impl From<Item> for ItemView {
    fn from(item: Item) -> Self {
        Self {
            id: item.id,
            name: item.name,
            description: item.description,
            price: item.price,
            images: item.images,
            created_at: item.created_at,
        }
    }
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, ServiceError> {
    serde_json::to_value(value)
        .map_err(|e| ServiceError::internal(format!("response not serialisable: {e}")))
}

/// Listing query built from validated parameters.
pub fn item_query(params: &Params) -> ItemQuery {
    let order = match params.str("order") {
        Some("desc") => SortOrder::Desc,
        _ => SortOrder::Asc,
    };
    let sort = match params.str("sort") {
        Some("name") => SortField::Name,
        Some("price") => SortField::Price,
        _ => SortField::CreatedAt,
    };
    let field = match params.str("filter") {
        Some("name") => Some(FilterField::Name),
        Some("description") => Some(FilterField::Description),
        Some("price") => Some(FilterField::Price),
        _ => None,
    };
    let filter = field.zip(params.string("filter_value")).map(|(field, value)| ItemFilter {
        field,
        value,
        literal: params.flag("filter_literally"),
    });

    ItemQuery {
        offset: params
            .i64("offset")
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0),
        limit: params
            .i64("limit")
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(DEFAULT_LIMIT as usize),
        order,
        sort,
        filter,
    }
}

fn draft(params: &Params) -> ItemDraft {
    ItemDraft {
        name: params.string("name").unwrap_or_default(),
        description: params.string("description").unwrap_or_default(),
        price: params.f64("price").unwrap_or_default(),
    }
}

/// A path id fills `id` unless the input already carries one.
fn with_path_id(mut input: Map<String, Value>, id: Option<Path<String>>) -> Map<String, Value> {
    if let Some(Path(id)) = id {
        input.entry("id").or_insert(Value::String(id));
    }
    input
}

/// `GET /items`
pub async fn list(
    State(state): State<AppState>,
    method: Method,
    route: MatchedPath,
    RequestInput(input): RequestInput,
) -> ApiResponse {
    state
        .dispatcher
        .dispatch(
            &state.endpoints.list_items,
            method.as_str(),
            route.as_str(),
            &input,
            |params, envelope| list_items(&state, params, envelope),
        )
        .await
}

async fn list_items(
    state: &AppState,
    params: Params,
    mut envelope: Envelope,
) -> Result<Outcome, ServiceError> {
    let page = state
        .items
        .list_items(item_query(&params))
        .await
        .map_err(|e| ServiceError::persistence(format!("item listing failed: {e}")))?;

    let count = page.items.len();
    let views: Vec<ItemView> = page.items.into_iter().map(ItemView::from).collect();
    let mut info = Map::new();
    info.insert("count".into(), count.into());
    info.insert("total".into(), page.total.into());
    envelope.set_data_info(info);
    Ok(Reply::success(to_value(views)?).into_outcome(envelope))
}

/// `POST /items`
pub async fn create(
    State(state): State<AppState>,
    method: Method,
    route: MatchedPath,
    RequestInput(input): RequestInput,
) -> ApiResponse {
    state
        .dispatcher
        .dispatch(
            &state.endpoints.create_item,
            method.as_str(),
            route.as_str(),
            &input,
            |params, envelope| create_item(&state, params, envelope),
        )
        .await
}

async fn create_item(
    state: &AppState,
    params: Params,
    envelope: Envelope,
) -> Result<Outcome, ServiceError> {
    let item = state
        .items
        .create_item(draft(&params))
        .await
        .map_err(|e| ServiceError::persistence(format!("item not created: {e}")))?;
    let body = to_value(ItemId { id: item.id })?;
    Ok(Reply::success(body).into_outcome(envelope))
}

/// `PATCH /items[/{id}]`
pub async fn update(
    State(state): State<AppState>,
    method: Method,
    route: MatchedPath,
    id: Option<Path<String>>,
    RequestInput(input): RequestInput,
) -> ApiResponse {
    let input = with_path_id(input, id);
    state
        .dispatcher
        .dispatch(
            &state.endpoints.update_item,
            method.as_str(),
            route.as_str(),
            &input,
            |params, envelope| update_item(&state, params, envelope),
        )
        .await
}

async fn update_item(
    state: &AppState,
    params: Params,
    envelope: Envelope,
) -> Result<Outcome, ServiceError> {
    let id = params.str("id").unwrap_or_default();
    let updated = state
        .items
        .update_item(id, draft(&params))
        .await
        .map_err(|e| ServiceError::persistence(format!("item not updated: {e}")))?;
    let reply = match updated {
        Some(item) => Reply::success(to_value(ItemId { id: item.id })?),
        None => Reply::fail("Item not found."),
    };
    Ok(reply.into_outcome(envelope))
}

/// `DELETE /items[/{id}]`
pub async fn delete(
    State(state): State<AppState>,
    method: Method,
    route: MatchedPath,
    id: Option<Path<String>>,
    RequestInput(input): RequestInput,
) -> ApiResponse {
    let input = with_path_id(input, id);
    state
        .dispatcher
        .dispatch(
            &state.endpoints.delete_item,
            method.as_str(),
            route.as_str(),
            &input,
            |params, envelope| delete_item(&state, params, envelope),
        )
        .await
}

async fn delete_item(
    state: &AppState,
    params: Params,
    envelope: Envelope,
) -> Result<Outcome, ServiceError> {
    let id = params.str("id").unwrap_or_default();
    let found = state
        .items
        .find_item(id)
        .await
        .map_err(|e| ServiceError::persistence(format!("item lookup failed: {e}")))?;
    if found.is_none() {
        return Ok(Reply::fail("Item not found.").into_outcome(envelope));
    }
    let deleted = state
        .items
        .delete_item(id)
        .await
        .map_err(|e| ServiceError::persistence(format!("item not deleted: {e}")))?;
    let reply = if deleted {
        Reply::Success(None)
    } else {
        Reply::fail("Item not deleted.")
    };
    Ok(reply.into_outcome(envelope))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::AUTHORIZATION;
    use axum_test::TestServer;
    use serde_json::json;

    use crate::server::{router, state::testing::TestApp};

    async fn signed_in(app: &TestApp) -> (TestServer, axum::http::HeaderValue) {
        let token = app.user_token().await;
        let server = TestServer::new(router::build(app.state.clone())).unwrap();
        (server, TestApp::bearer(&token))
    }

    async fn add_item(s: &TestServer, auth: &axum::http::HeaderValue, name: &str, price: f64) -> String {
        let resp = s
            .post("/items")
            .add_header(AUTHORIZATION, auth.clone())
            .json(&json!({"name": name, "description": format!("{name} description"), "price": price}))
            .await;
        assert_eq!(resp.status_code(), 200);
        resp.json::<Value>()["data"]["id"].as_str().unwrap().to_owned()
    }

    #[test]
    fn query_maps_validated_params() {
        let rules = crate::server::rules::EndpointRules::new(&crate::config::Config::default()).unwrap();
        let input = match json!({
            "order": "desc",
            "sort": "price",
            "filter": "name",
            "filter_value": "lamp",
            "filter_literally": "1",
            "offset": "5"
        }) {
            Value::Object(m) => m,
            _ => unreachable!(),
        };
        let params = crate::validation::validate(rules.list_items.rules(), &input, &[]).unwrap();
        let q = item_query(&params);
        assert_eq!(q.order, SortOrder::Desc);
        assert_eq!(q.sort, SortField::Price);
        assert_eq!(q.offset, 5);
        assert_eq!(q.limit, DEFAULT_LIMIT as usize);
        assert_eq!(
            q.filter,
            Some(ItemFilter {
                field: FilterField::Name,
                value: "lamp".into(),
                literal: true
            })
        );
    }

    #[tokio::test]
    async fn items_require_a_token() {
        let app = TestApp::default();
        let s = TestServer::new(router::build(app.state.clone())).unwrap();
        let resp = s.get("/items").await;
        assert_eq!(resp.status_code(), 401);
        assert_eq!(
            resp.json::<Value>()["messages"],
            json!([{"type": "error", "message": "Invalid token."}])
        );
        assert_eq!(app.db.calls(), 0);
    }

    #[tokio::test]
    async fn listing_is_paged_and_cached() {
        let app = TestApp::default();
        let (s, auth) = signed_in(&app).await;
        for (name, price) in [("Lamp", 10.0), ("Chair", 35.5), ("Table", 120.0)] {
            add_item(&s, &auth, name, price).await;
        }

        let first = s
            .get("/items")
            .add_query_param("sort", "price")
            .add_query_param("limit", 2)
            .add_header(AUTHORIZATION, auth.clone())
            .await
            .json::<Value>();
        assert_eq!(first["success"], true);
        assert_eq!(first["data_info"], json!({"count": 2, "total": 3, "cache": "MISS"}));
        assert_eq!(first["data"][0]["name"], "Lamp");
        assert_eq!(first["data"][1]["name"], "Chair");

        let calls = app.db.calls();
        let second = s
            .get("/items")
            .add_query_param("sort", "price")
            .add_query_param("limit", 2)
            .add_header(AUTHORIZATION, auth.clone())
            .await
            .json::<Value>();
        assert_eq!(second["data_info"]["cache"], "HIT");
        assert_eq!(second["data"], first["data"]);
        assert_eq!(app.db.calls(), calls);
    }

    #[tokio::test]
    async fn listing_rejects_bad_parameters() {
        let app = TestApp::default();
        let (s, auth) = signed_in(&app).await;
        let resp = s
            .get("/items")
            .add_query_param("order", "sideways")
            .add_query_param("offset", -1)
            .add_header(AUTHORIZATION, auth)
            .await;
        assert_eq!(resp.status_code(), 400);
        assert_eq!(
            resp.json::<Value>()["messages"],
            json!([
                {"type": "warn", "message": "The offset field must be at least 0."},
                {"type": "warn", "message": "The selected order is invalid."}
            ])
        );
    }

    #[tokio::test]
    async fn update_by_path_or_body() {
        let app = TestApp::default();
        let (s, auth) = signed_in(&app).await;
        let id = add_item(&s, &auth, "Lamp", 10.0).await;

        let resp = s
            .patch(&format!("/items/{id}"))
            .add_header(AUTHORIZATION, auth.clone())
            .json(&json!({"name": "Desk lamp", "description": "Warm light", "price": "12.5"}))
            .await;
        assert_eq!(resp.status_code(), 200);
        assert_eq!(resp.json::<Value>()["data"], json!({"id": id}));

        let stored = app.state.items.find_item(&id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Desk lamp");
        assert_eq!(stored.price, 12.5);

        let resp = s
            .patch("/items")
            .add_header(AUTHORIZATION, auth)
            .json(&json!({
                "id": "00000000-0000-4000-8000-000000000000",
                "name": "Ghost",
                "description": "Nowhere",
                "price": 1
            }))
            .await;
        assert_eq!(resp.status_code(), 400);
        assert_eq!(
            resp.json::<Value>()["messages"],
            json!([{"type": "error", "message": "Item not found."}])
        );
    }

    #[tokio::test]
    async fn delete_then_not_found() {
        let app = TestApp::default();
        let (s, auth) = signed_in(&app).await;
        let id = add_item(&s, &auth, "Lamp", 10.0).await;

        let resp = s
            .delete(&format!("/items/{id}"))
            .add_header(AUTHORIZATION, auth.clone())
            .await;
        assert_eq!(resp.status_code(), 200);
        let body = resp.json::<Value>();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], Value::Null);

        let resp = s
            .delete(&format!("/items/{id}"))
            .add_header(AUTHORIZATION, auth)
            .await;
        assert_eq!(resp.status_code(), 400);
        assert_eq!(resp.json::<Value>()["messages"][0]["message"], "Item not found.");
    }
}
