mod common;

use common::{body, spawn_app};
use reqwest::StatusCode;

#[tokio::test]
async fn test_register_and_login() {
    let app = spawn_app().await;

    let response = app.register("johndoe").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body(response).await;
    assert_eq!(created["username"], "johndoe");

    let response = app.login("johndoe", "Secret15password").await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = body(response).await["token"].as_str().unwrap().to_string();

    let response = app.get(&token, "/restaurants").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_duplicate_username_is_rejected() {
    let app = spawn_app().await;

    assert_eq!(app.register("johndoe").await.status(), StatusCode::CREATED);
    let response = app.register("johndoe").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body(response).await.get("username").is_some());
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let app = spawn_app().await;
    app.register("johndoe").await;

    let response = app.login("johndoe", "not-the-password").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.login("nobody", "Secret15password").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_routes_need_token() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/restaurants"))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.get("not-a-jwt", "/restaurants").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
