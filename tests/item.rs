mod common;

use common::{body, detail_for, spawn_app};
use reqwest::StatusCode;
use serde_json::{json, Value};

fn size_prices(item: &Value) -> Vec<(i64, i64)> {
    let mut pairs: Vec<(i64, i64)> = item["size_details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| (d["size"].as_i64().unwrap(), d["price"].as_i64().unwrap()))
        .collect();
    pairs.sort();
    pairs
}

#[tokio::test]
async fn test_create_item_with_sizes() {
    let app = spawn_app().await;
    let (_, token) = app.user("owner").await;
    let restaurant = app.restaurant(&token).await;
    let category = app.category(&token, restaurant, "Pizza").await;
    let small = app.size(&token, restaurant, "Small").await;
    let large = app.size(&token, restaurant, "Large").await;

    let item = app
        .item(&token, restaurant, category, &[(small, 100), (large, 200)])
        .await;
    assert_eq!(item["category"].as_i64(), Some(category));
    assert_eq!(size_prices(&item), vec![(small, 100), (large, 200)]);

    let response = app
        .get(&token, &format!("/restaurants/{restaurant}/items"))
        .await;
    let page = body(response).await;
    assert_eq!(page["count"], 1);
    assert_eq!(size_prices(&page["results"][0]), vec![(small, 100), (large, 200)]);
}

#[tokio::test]
async fn test_update_reconciles_size_details() {
    let app = spawn_app().await;
    let (_, token) = app.user("owner").await;
    let restaurant = app.restaurant(&token).await;
    let category = app.category(&token, restaurant, "Pizza").await;
    let small = app.size(&token, restaurant, "Small").await;
    let medium = app.size(&token, restaurant, "Medium").await;
    let large = app.size(&token, restaurant, "Large").await;

    let item = app
        .item(&token, restaurant, category, &[(small, 100), (medium, 150)])
        .await;
    let medium_detail = detail_for(&item, medium);
    let path = format!("/restaurants/{restaurant}/items/{}", item["id"]);

    let response = app
        .put(
            &token,
            &path,
            json!({
                "category": category,
                "name": "Pizza Margherita",
                "short_description": "Classic",
                "item_sizes": [
                    { "size": medium, "price": 175 },
                    { "size": large, "price": 250 }
                ]
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body(response).await;
    assert_eq!(updated["name"], "Pizza Margherita");
    assert_eq!(size_prices(&updated), vec![(medium, 175), (large, 250)]);
    // Existing (item, size) rows are updated in place.
    assert_eq!(detail_for(&updated, medium), medium_detail);

    let response = app.get(&token, &path).await;
    assert_eq!(size_prices(&body(response).await), vec![(medium, 175), (large, 250)]);
}

#[tokio::test]
async fn test_patch_without_sizes_keeps_them() {
    let app = spawn_app().await;
    let (_, token) = app.user("owner").await;
    let restaurant = app.restaurant(&token).await;
    let category = app.category(&token, restaurant, "Pizza").await;
    let small = app.size(&token, restaurant, "Small").await;
    let item = app.item(&token, restaurant, category, &[(small, 100)]).await;

    let response = app
        .patch(
            &token,
            &format!("/restaurants/{restaurant}/items/{}", item["id"]),
            json!({ "name": "Calzone" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let patched = body(response).await;
    assert_eq!(patched["name"], "Calzone");
    assert_eq!(size_prices(&patched), vec![(small, 100)]);
}

#[tokio::test]
async fn test_removing_ordered_size_is_refused() {
    let app = spawn_app().await;
    let (_, token) = app.user("owner").await;
    let restaurant = app.restaurant(&token).await;
    let category = app.category(&token, restaurant, "Pizza").await;
    let small = app.size(&token, restaurant, "Small").await;
    let large = app.size(&token, restaurant, "Large").await;
    let item = app
        .item(&token, restaurant, category, &[(small, 100), (large, 200)])
        .await;
    let path = format!("/restaurants/{restaurant}/items/{}", item["id"]);

    let response = app
        .post(
            &token,
            &format!("/restaurants/{restaurant}/orders"),
            json!({
                "items_sizes": [{ "item_size": detail_for(&item, large), "count": 1 }],
                "address": "Cairo"
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .patch(
            &token,
            &path,
            json!({ "item_sizes": [{ "size": small, "price": 120 }] }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body(response).await.get("errors").is_some());

    // Nothing from the rejected update is kept.
    let response = app.get(&token, &path).await;
    assert_eq!(size_prices(&body(response).await), vec![(small, 100), (large, 200)]);

    let response = app.delete(&token, &path).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_references_are_rejected() {
    let app = spawn_app().await;
    let (_, token) = app.user("owner").await;
    let restaurant = app.restaurant(&token).await;
    let other = app.restaurant(&token).await;
    let category = app.category(&token, restaurant, "Pizza").await;
    let foreign_category = app.category(&token, other, "Pizza").await;
    let small = app.size(&token, restaurant, "Small").await;
    let foreign_size = app.size(&token, other, "Small").await;
    let items = format!("/restaurants/{restaurant}/items");

    let response = app
        .post(
            &token,
            &items,
            json!({
                "category": foreign_category,
                "name": "Pizza",
                "short_description": "",
                "item_sizes": [{ "size": small, "price": 100 }]
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body(response).await.get("category").is_some());

    let response = app
        .post(
            &token,
            &items,
            json!({
                "category": category,
                "name": "Pizza",
                "short_description": "",
                "item_sizes": [{ "size": foreign_size, "price": 100 }]
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post(
            &token,
            &items,
            json!({
                "category": category,
                "name": "Pizza",
                "short_description": "",
                "item_sizes": [{ "size": small, "price": 100 }, { "size": small, "price": 200 }]
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.get(&token, &items).await;
    assert_eq!(body(response).await["count"], 0);
}

#[tokio::test]
async fn test_delete_item() {
    let app = spawn_app().await;
    let (_, token) = app.user("owner").await;
    let restaurant = app.restaurant(&token).await;
    let category = app.category(&token, restaurant, "Pizza").await;
    let small = app.size(&token, restaurant, "Small").await;
    let item = app.item(&token, restaurant, category, &[(small, 100)]).await;
    let path = format!("/restaurants/{restaurant}/items/{}", item["id"]);

    let response = app.delete(&token, &path).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = app.get(&token, &path).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
