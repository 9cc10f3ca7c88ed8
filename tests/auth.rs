pub mod common;

use reqwest::StatusCode;
use serde_json::json;

use common::PASSWORD;

#[tokio::test]
async fn logs_in_by_username_or_email() {
    let server = common::spawn().await;
    let client = server.client();
    let id = client
        .register(json!({
            "username": "alice",
            "email": "a@x.com",
            "name": "Alice",
            "password": PASSWORD,
        }))
        .await
        .unwrap();

    let by_username = client
        .try_login(json!({ "username": "alice", "password": PASSWORD }))
        .await
        .unwrap();
    assert!(by_username.success);
    assert_eq!(by_username.user.id, id);
    assert_eq!(by_username.user.email, "a@x.com");
    assert!(!by_username.token.is_empty());

    let by_email = client
        .try_login(json!({ "email": "a@x.com", "password": PASSWORD }))
        .await
        .unwrap();
    assert_eq!(by_email.user.username, "alice");
}

#[tokio::test]
async fn rejects_wrong_password() {
    let server = common::spawn().await;
    server.user("alice").await;

    let rejection = server
        .client()
        .try_login(json!({ "username": "alice", "password": "Wrong-pass1" }))
        .await
        .unwrap_err();
    assert_eq!(rejection.status, StatusCode::BAD_REQUEST);
    assert_eq!(rejection.message, "invalid username or password");

    let rejection = server
        .client()
        .try_login(json!({ "username": "alice" }))
        .await
        .unwrap_err();
    assert_eq!(rejection.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rejects_duplicate_registration() {
    let server = common::spawn().await;
    server.user("alice").await;

    for (username, email) in
        [("alice", "other@example.com"), ("other", "alice@example.com")]
    {
        let rejection = server
            .client()
            .register(json!({
                "username": username,
                "email": email,
                "password": PASSWORD,
            }))
            .await
            .unwrap_err();
        assert_eq!(rejection.status, StatusCode::CONFLICT);
    }
}

#[tokio::test]
async fn rejects_weak_password() {
    let server = common::spawn().await;

    for password in ["short1!", "letters-only", "12345678!", "Password1"] {
        let rejection = server
            .client()
            .register(json!({
                "username": "bob",
                "email": "b@x.com",
                "password": password,
            }))
            .await
            .unwrap_err();
        assert_eq!(rejection.status, StatusCode::BAD_REQUEST, "{password}");
    }
}

#[tokio::test]
async fn shows_and_edits_profile() {
    let server = common::spawn().await;
    let alice = server.user("alice").await;
    let id = alice
        .try_login(json!({ "username": "alice", "password": PASSWORD }))
        .await
        .unwrap()
        .user
        .id;

    let user = server.client().profile(&id.to_string()).await.unwrap();
    assert_eq!(user.username, "alice");
    assert_eq!(user.department, None);

    let user = alice
        .update_profile(json!({
            "department": "IT",
            "position": "Engineer",
            "currentPassword": PASSWORD,
            "newPassword": "n3w-secret",
        }))
        .await
        .unwrap();
    assert_eq!(user.department.as_deref(), Some("IT"));
    assert_eq!(user.position.as_deref(), Some("Engineer"));

    server.client().login("alice", "n3w-secret").await;

    let rejection = server
        .client()
        .update_profile(json!({ "department": "HR" }))
        .await
        .unwrap_err();
    assert_eq!(rejection.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_requires_valid_id() {
    let server = common::spawn().await;
    let client = server.client();

    let rejection = client.profile("abc").await.unwrap_err();
    assert_eq!(rejection.status, StatusCode::BAD_REQUEST);

    let rejection = client.profile("42").await.unwrap_err();
    assert_eq!(rejection.status, StatusCode::NOT_FOUND);
}
