//! API integration tests
//!
//! Run against a live server with: cargo test -- --ignored
//! The workflow test also needs an administrator account, given by
//! `REX_TEST_ADMIN_USERNAME` and `REX_TEST_ADMIN_PASSWORD`.

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

const BASE_URL: &str = "http://localhost:8080/api/v1";

fn unique_username(prefix: &str) -> String {
    format!("{}_{}", prefix, &Uuid::new_v4().simple().to_string()[..12])
}

/// Sign up a fresh mechanic and return (user id, token)
async fn signup(client: &Client, prefix: &str) -> (String, String) {
    let response = client
        .post(format!("{}/auth/signup", BASE_URL))
        .json(&json!({
            "username": unique_username(prefix),
            "password": "segredo123"
        }))
        .send()
        .await
        .expect("Failed to send signup request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = response.json().await.expect("Failed to parse signup response");
    (
        body["session"]["user_id"].as_str().expect("No user id").to_string(),
        body["token"].as_str().expect("No token in response").to_string(),
    )
}

async fn admin_token(client: &Client) -> Option<String> {
    let username = std::env::var("REX_TEST_ADMIN_USERNAME").ok()?;
    let password = std::env::var("REX_TEST_ADMIN_PASSWORD").ok()?;

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Failed to send login request");
    let body: Value = response.json().await.expect("Failed to parse login response");
    body["token"].as_str().map(String::from)
}

#[tokio::test]
#[ignore]
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_signup_login_me_logout() {
    let client = Client::new();
    let username = unique_username("mec");

    let response = client
        .post(format!("{}/auth/signup", BASE_URL))
        .json(&json!({ "username": username, "password": "segredo123" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["session"]["role"], "mechanic");

    // Same username again
    let response = client
        .post(format!("{}/auth/signup", BASE_URL))
        .json(&json!({ "username": username, "password": "segredo123" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "username": username, "password": "segredo123" }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["token_type"], "Bearer");
    let token = body["token"].as_str().expect("No token").to_string();

    let response = client
        .get(format!("{}/auth/me", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    let me: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(me["username"], username.as_str());
    assert_eq!(me["role"], "mechanic");

    let response = client
        .post(format!("{}/auth/logout", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Revoked tokens are refused
    let response = client
        .get(format!("{}/auth/me", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_wrong_password_rejected() {
    let client = Client::new();
    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "username": unique_username("nobody"), "password": "errada123" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_unauthenticated_access() {
    let client = Client::new();

    let response = client
        .get(format!("{}/requisitions", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .get(format!("{}/requisitions", BASE_URL))
        .bearer_auth("not-a-token")
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "NotAuthenticated");
}

#[tokio::test]
#[ignore]
async fn test_mechanic_scopes() {
    let client = Client::new();
    let (_, token) = signup(&client, "mec").await;

    let response = client
        .get(format!("{}/requisitions", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["pending_count"], 0);
    assert!(body["requisitions"].as_array().expect("list").is_empty());

    let response = client
        .get(format!("{}/requisitions?scope=all", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = client
        .get(format!("{}/requisitions/history", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["active"].is_array());
    assert!(body["completed"].is_array());
    assert!(body["cancelled"].is_array());
}

#[tokio::test]
#[ignore]
async fn test_mechanic_cannot_administer() {
    let client = Client::new();
    let (_, token) = signup(&client, "mec").await;

    let response = client
        .post(format!("{}/catalog/items", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({
            "item_code": "X-1",
            "item_description": "Item",
            "area": "Produção",
            "category": "Rolamentos",
            "equipment": "Torno"
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = client
        .get(format!("{}/users", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore]
async fn test_catalog_lookup() {
    let client = Client::new();
    let (_, token) = signup(&client, "mec").await;

    let response = client
        .get(format!("{}/catalog/lookup", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["areas"].is_array());
    assert!(body["equipments"].as_array().expect("equipments").is_empty());
}

#[tokio::test]
#[ignore]
async fn test_requisition_workflow() {
    let client = Client::new();
    let Some(admin) = admin_token(&client).await else {
        eprintln!("REX_TEST_ADMIN_USERNAME / REX_TEST_ADMIN_PASSWORD not set, skipping");
        return;
    };

    // Catalog item to request
    let area = format!("Área {}", Uuid::new_v4().simple());
    let response = client
        .post(format!("{}/catalog/items", BASE_URL))
        .bearer_auth(&admin)
        .json(&json!({
            "item_code": "ROL-6205",
            "item_description": "Rolamento 6205",
            "system_description": "ROLAMENTO RIGIDO 6205 2RS",
            "area": area,
            "category": "Rolamentos",
            "equipment": "Torno CNC 01"
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let item: Value = response.json().await.expect("Failed to parse response");

    // Two planners and one mechanic
    let (_, mechanic) = signup(&client, "mec").await;
    let mut planners = Vec::new();
    for _ in 0..2 {
        let (id, token) = signup(&client, "pcm").await;
        let response = client
            .put(format!("{}/users/{}/role", BASE_URL, id))
            .bearer_auth(&admin)
            .json(&json!({ "role": "pcm" }))
            .send()
            .await
            .expect("Failed to send request");
        assert!(response.status().is_success());
        planners.push((id, token));
    }
    let (first_id, first) = planners[0].clone();
    let (second_id, second) = planners[1].clone();

    let response = client
        .post(format!("{}/requisitions", BASE_URL))
        .bearer_auth(&mechanic)
        .json(&json!({
            "priority": "Urgente",
            "problem_description": "Ruído excessivo no eixo principal",
            "items": [{
                "area": area,
                "equipment": "Torno CNC 01",
                "category": "Rolamentos",
                "catalog_item_id": item["id"],
                "quantity": 2
            }]
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await.expect("Failed to parse response");
    let requisition = &created[0];
    assert_eq!(requisition["status"], "pendente");
    assert_eq!(requisition["item_description"], "ROLAMENTO RIGIDO 6205 2RS");
    let id = requisition["id"].as_str().expect("id").to_string();

    let post = |token: &str, action: &str, body: Value| {
        client
            .post(format!("{}/requisitions/{}/{}", BASE_URL, id, action))
            .bearer_auth(token.to_string())
            .json(&body)
            .send()
    };

    // Mechanics cannot take
    let response = post(&mechanic, "take", json!({})).await.expect("request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = post(&first, "take", json!({})).await.expect("request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "em_andamento");
    assert_eq!(body["assigned_to"], first_id.as_str());

    // Already taken
    let response = post(&second, "take", json!({})).await.expect("request");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Only the assignee may advance
    let response = post(&second, "status", json!({ "status": "pre_liberacao" }))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = post(&first, "transfer", json!({ "to": second_id }))
        .await
        .expect("request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["assigned_to"], second_id.as_str());
    assert_eq!(body["transferred_from"], first_id.as_str());

    let response = post(&second, "status", json!({ "status": "material_disponivel" }))
        .await
        .expect("request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["assigned_to"].is_null());

    // Any planner may complete a released requisition
    let response = post(&first, "complete", json!({})).await.expect("request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "concluido");

    // Terminal
    let response = post(&first, "reject", json!({ "reason": "tarde demais" }))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
