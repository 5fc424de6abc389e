mod common;

use common::{body, spawn_app};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn test_create_restaurant_adds_owner_once() {
    let app = spawn_app().await;
    let (owner_id, token) = app.user("owner").await;

    let response = app
        .post(
            &token,
            "/restaurants",
            json!({
                "name": "Test Restaurant",
                "phone": "00201012345678",
                "address": "Cairo",
                "users": []
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let restaurant = body(response).await;

    assert_eq!(restaurant["owner"].as_i64(), Some(owner_id));
    let users = restaurant["users"].as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["id"].as_i64(), Some(owner_id));
}

#[tokio::test]
async fn test_create_restaurant_with_staff() {
    let app = spawn_app().await;
    let (owner_id, token) = app.user("owner").await;
    let (cook_id, _) = app.user("cook").await;

    let response = app
        .post(
            &token,
            "/restaurants",
            json!({
                "name": "Test Restaurant",
                "phone": "+201012345678",
                "address": "Cairo",
                "users": [cook_id, owner_id, cook_id]
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let restaurant = body(response).await;

    let mut ids: Vec<i64> = restaurant["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["id"].as_i64().unwrap())
        .collect();
    ids.sort();
    let mut expected = vec![owner_id, cook_id];
    expected.sort();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_invalid_phone_is_rejected() {
    let app = spawn_app().await;
    let (_, token) = app.user("owner").await;

    let response = app
        .post(
            &token,
            "/restaurants",
            json!({ "name": "Test Restaurant", "phone": "call me", "address": "Cairo" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body(response).await.get("phone").is_some());
}

#[tokio::test]
async fn test_list_restaurants() {
    let app = spawn_app().await;
    let (_, token) = app.user("owner").await;
    for _ in 0..3 {
        app.restaurant(&token).await;
    }

    let response = app.get(&token, "/restaurants?page_size=2").await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body(response).await;
    assert_eq!(page["count"], 3);
    assert_eq!(page["results"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_update_restaurant() {
    let app = spawn_app().await;
    let (owner_id, token) = app.user("owner").await;
    let restaurant = app.restaurant(&token).await;

    let response = app
        .put(
            &token,
            &format!("/restaurants/{restaurant}"),
            json!({
                "name": "Updated Restaurant",
                "phone": "00201012345678",
                "address": "Giza"
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body(response).await;
    assert_eq!(updated["name"], "Updated Restaurant");
    assert_eq!(updated["address"], "Giza");
    // Replacing the staff list never drops the owner.
    let users = updated["users"].as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["id"].as_i64(), Some(owner_id));

    let response = app
        .patch(&token, &format!("/restaurants/{restaurant}"), json!({ "name": "Patched" }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let patched = body(response).await;
    assert_eq!(patched["name"], "Patched");
    assert_eq!(patched["address"], "Giza");
}

#[tokio::test]
async fn test_outsider_cannot_change_restaurant() {
    let app = spawn_app().await;
    let (_, token) = app.user("owner").await;
    let (_, outsider) = app.user("outsider").await;
    let restaurant = app.restaurant(&token).await;

    let response = app
        .patch(&outsider, &format!("/restaurants/{restaurant}"), json!({ "name": "Mine" }))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.get(&outsider, &format!("/restaurants/{restaurant}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await["name"], "Test Restaurant");
}

#[tokio::test]
async fn test_delete_restaurant() {
    let app = spawn_app().await;
    let (_, token) = app.user("owner").await;
    let restaurant = app.restaurant(&token).await;
    let category = app.category(&token, restaurant, "Main Course").await;
    let size = app.size(&token, restaurant, "Large").await;
    let item = app.item(&token, restaurant, category, &[(size, 100)]).await;
    let detail = common::detail_for(&item, size);
    let response = app
        .post(
            &token,
            &format!("/restaurants/{restaurant}/orders"),
            json!({ "items_sizes": [{ "item_size": detail, "count": 1 }], "address": "Cairo" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app.delete(&token, &format!("/restaurants/{restaurant}")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.get(&token, &format!("/restaurants/{restaurant}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = app.get(&token, "/restaurants").await;
    assert_eq!(body(response).await["count"], 0);
}

#[tokio::test]
async fn test_missing_field_is_a_field_error() {
    let app = spawn_app().await;
    let (_, token) = app.user("owner").await;

    let response = app
        .post(&token, "/restaurants", json!({ "name": "x", "address": "y" }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let errors = body(response).await;
    assert!(errors["phone"][0]["message"]
        .as_str()
        .unwrap()
        .contains("missing field"));
}

#[tokio::test]
async fn test_patch_can_clear_logo() {
    let app = spawn_app().await;
    let (_, token) = app.user("owner").await;
    let restaurant = app.restaurant(&token).await;
    let path = format!("/restaurants/{restaurant}");

    let response = app
        .patch(&token, &path, json!({ "logo": "logos/owner.png" }))
        .await;
    assert_eq!(body(response).await["logo"], "logos/owner.png");

    // Leaving the key out keeps the logo.
    let response = app.patch(&token, &path, json!({ "name": "Renamed" })).await;
    assert_eq!(body(response).await["logo"], "logos/owner.png");

    let response = app.patch(&token, &path, json!({ "logo": null })).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body(response).await["logo"].is_null());
}
