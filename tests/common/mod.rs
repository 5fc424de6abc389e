#![allow(dead_code)]

use reqwest::{header, Client, Response, StatusCode};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::sync::Arc;

use food_delivery::api::create_api_router;
use food_delivery::config::Config;
use food_delivery::entities::{connect, setup_schema};

pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub db: Arc<DatabaseConnection>,
}

pub async fn spawn_app() -> TestApp {
    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        secret: "integration-test-secret".to_string(),
        token_ttl_hours: 1,
    };

    let db = connect(&config.database_url)
        .await
        .expect("Failed to connect to in-memory database");
    setup_schema(&db).await.expect("Failed to create schema");
    let db = Arc::new(db);

    let app = create_api_router(db.clone(), Arc::new(config));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let address = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        client: Client::new(),
        db,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.address, path)
    }

    fn auth(token: &str) -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", token))
                .expect("Failed to insert header"),
        );
        headers
    }

    pub async fn register(&self, username: &str) -> Response {
        self.client
            .post(self.url("/auth/register"))
            .json(&json!({
                "username": username,
                "password": "Secret15password",
                "name": username,
                "address": "Cairo"
            }))
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn login(&self, username: &str, password: &str) -> Response {
        self.client
            .post(self.url("/auth/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("Failed to send request")
    }

    /// Registers a user and returns its id and a bearer token.
    pub async fn user(&self, username: &str) -> (i64, String) {
        let response = self.register(username).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = body(response).await["id"].as_i64().unwrap();

        let response = self.login(username, "Secret15password").await;
        assert_eq!(response.status(), StatusCode::OK);
        let token = body(response).await["token"].as_str().unwrap().to_string();
        (id, token)
    }

    pub async fn get(&self, token: &str, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .headers(Self::auth(token))
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn post(&self, token: &str, path: &str, payload: Value) -> Response {
        self.client
            .post(self.url(path))
            .headers(Self::auth(token))
            .json(&payload)
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn post_empty(&self, token: &str, path: &str) -> Response {
        self.client
            .post(self.url(path))
            .headers(Self::auth(token))
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn put(&self, token: &str, path: &str, payload: Value) -> Response {
        self.client
            .put(self.url(path))
            .headers(Self::auth(token))
            .json(&payload)
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn patch(&self, token: &str, path: &str, payload: Value) -> Response {
        self.client
            .patch(self.url(path))
            .headers(Self::auth(token))
            .json(&payload)
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn delete(&self, token: &str, path: &str) -> Response {
        self.client
            .delete(self.url(path))
            .headers(Self::auth(token))
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn restaurant(&self, token: &str) -> i64 {
        let response = self
            .post(
                token,
                "/restaurants",
                json!({
                    "name": "Test Restaurant",
                    "phone": "00201012345678",
                    "address": "Cairo"
                }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body(response).await["id"].as_i64().unwrap()
    }

    pub async fn category(&self, token: &str, restaurant: i64, name: &str) -> i64 {
        let response = self
            .post(
                token,
                &format!("/restaurants/{restaurant}/categories"),
                json!({ "name": name }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body(response).await["id"].as_i64().unwrap()
    }

    pub async fn size(&self, token: &str, restaurant: i64, name: &str) -> i64 {
        let response = self
            .post(
                token,
                &format!("/restaurants/{restaurant}/item_sizes"),
                json!({ "name": name }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body(response).await["id"].as_i64().unwrap()
    }

    /// Creates an item priced per `(size id, price)` and returns its body.
    pub async fn item(&self, token: &str, restaurant: i64, category: i64, sizes: &[(i64, i64)]) -> Value {
        let item_sizes: Vec<Value> = sizes
            .iter()
            .map(|(size, price)| json!({ "size": size, "price": price }))
            .collect();
        let response = self
            .post(
                token,
                &format!("/restaurants/{restaurant}/items"),
                json!({
                    "category": category,
                    "name": "Pizza",
                    "short_description": "Cheese and tomato",
                    "item_sizes": item_sizes
                }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body(response).await
    }
}

pub async fn body(response: Response) -> Value {
    response
        .json::<Value>()
        .await
        .expect("Failed to parse response JSON")
}

/// Id of the size detail priced for `size` in an item body.
pub fn detail_for(item: &Value, size: i64) -> i64 {
    item["size_details"]
        .as_array()
        .unwrap()
        .iter()
        .find(|d| d["size"].as_i64() == Some(size))
        .and_then(|d| d["id"].as_i64())
        .expect("size detail missing")
}
