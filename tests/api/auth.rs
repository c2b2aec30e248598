use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::{spawn_app, TestApp};

fn signup_body() -> Value {
    json!({
        "username": "ursula",
        "email": "ursula_le_guin@gmail.com",
        "password": "earthsea-1968",
    })
}

async fn mock_email_server(app: &TestApp) {
    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&app.email_server)
        .await;
}

#[tokio::test]
async fn signup_returns_201_with_the_public_user() {
    // Arrange
    let app = spawn_app().await;
    mock_email_server(&app).await;

    // Act
    let response = app.post_signup(&signup_body()).await;

    // Assert
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["username"], "ursula");
    assert_eq!(body["email"], "ursula_le_guin@gmail.com");
    assert!(body["avatar"]
        .as_str()
        .unwrap()
        .starts_with("https://www.gravatar.com/avatar/"));
    assert!(body.get("password").is_none());
    assert!(body.get("password_hash").is_none());
    assert!(body.get("refresh_token").is_none());
}

#[tokio::test]
async fn signup_persists_an_unconfirmed_user() {
    let app = spawn_app().await;
    mock_email_server(&app).await;

    app.post_signup(&signup_body()).await;

    let (username, confirmed): (String, bool) =
        sqlx::query_as("SELECT username, confirmed FROM users WHERE email = $1")
            .bind("ursula_le_guin@gmail.com")
            .fetch_one(&app.db_pool)
            .await
            .expect("Failed to fetch the new user.");
    assert_eq!(username, "ursula");
    assert!(!confirmed);
}

#[tokio::test]
async fn signup_sends_a_confirmation_email_with_a_link() {
    // Arrange
    let app = spawn_app().await;
    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.email_server)
        .await;

    // Act
    app.post_signup(&signup_body()).await;

    // Assert
    let email_requests = app.wait_for_emails(1).await;
    let link = app.get_confirmation_link(&email_requests[0]);
    assert!(link.path().starts_with("/api/auth/confirmed_email/"));
}

#[tokio::test]
async fn signup_succeeds_even_if_the_email_cannot_be_delivered() {
    let app = spawn_app().await;
    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&app.email_server)
        .await;

    let response = app.post_signup(&signup_body()).await;

    assert_eq!(response.status().as_u16(), 201);
}

#[tokio::test]
async fn signup_with_a_registered_email_returns_409() {
    let app = spawn_app().await;
    mock_email_server(&app).await;

    let response = app
        .post_signup(&json!({
            "username": "someone-else",
            "email": &app.test_user.email,
            "password": "another-password",
        }))
        .await;

    assert_eq!(response.status().as_u16(), 409);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Account already exists");
}

#[tokio::test]
async fn signup_returns_422_when_data_is_invalid() {
    // Arrange
    let app = spawn_app().await;
    let test_cases = vec![
        (json!({"email": "ursula@gmail.com", "password": "secret-pw"}), "missing username"),
        (json!({"username": "ursula", "password": "secret-pw"}), "missing email"),
        (json!({"username": "ursula", "email": "ursula@gmail.com"}), "missing password"),
        (
            json!({"username": "urs", "email": "ursula@gmail.com", "password": "secret-pw"}),
            "username too short",
        ),
        (
            json!({"username": "ursula", "email": "not-an-email", "password": "secret-pw"}),
            "invalid email",
        ),
        (
            json!({"username": "ursula", "email": "ursula@gmail.com", "password": "12345"}),
            "password too short",
        ),
    ];

    for (body, description) in test_cases {
        // Act
        let response = app.post_signup(&body).await;

        // Assert
        assert_eq!(
            422,
            response.status().as_u16(),
            "The API did not fail with 422 Unprocessable Entity when the payload was {}.",
            description
        );
        let body: Value = response.json().await.unwrap();
        assert!(body["detail"].is_string());
    }
}

#[tokio::test]
async fn login_returns_a_token_pair_for_a_confirmed_user() {
    let app = spawn_app().await;

    let tokens = app.login(&app.test_user).await;

    assert_eq!(tokens["token_type"], "bearer");
    let access_token = tokens["access_token"].as_str().unwrap();
    let refresh_token = tokens["refresh_token"].as_str().unwrap();
    assert_eq!(
        app.tokens.decode_access_token(access_token).unwrap(),
        app.test_user.email
    );
    let stored: Option<String> =
        sqlx::query_scalar("SELECT refresh_token FROM users WHERE id = $1")
            .bind(app.test_user.id)
            .fetch_one(&app.db_pool)
            .await
            .unwrap();
    assert_eq!(stored.as_deref(), Some(refresh_token));
}

#[tokio::test]
async fn login_with_an_unknown_email_returns_401() {
    let app = spawn_app().await;

    let response = app
        .post_login(&json!({
            "username": "nobody@example.com",
            "password": "whatever-password",
        }))
        .await;

    assert_eq!(response.status().as_u16(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Invalid email");
}

#[tokio::test]
async fn login_with_a_wrong_password_returns_401() {
    let app = spawn_app().await;

    let response = app
        .post_login(&json!({
            "username": &app.test_user.email,
            "password": "not-the-password",
        }))
        .await;

    assert_eq!(response.status().as_u16(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Invalid password");
}

#[tokio::test]
async fn login_before_confirming_the_email_returns_401() {
    let app = spawn_app().await;
    mock_email_server(&app).await;
    app.post_signup(&signup_body()).await;

    let response = app
        .post_login(&json!({
            "username": "ursula_le_guin@gmail.com",
            "password": "earthsea-1968",
        }))
        .await;

    assert_eq!(response.status().as_u16(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Email not confirmed");
}

#[tokio::test]
async fn login_ignores_whitespace_around_the_email() {
    let app = spawn_app().await;

    let response = app
        .post_login(&json!({
            "username": format!("  {} ", &app.test_user.email),
            "password": &app.test_user.password,
        }))
        .await;

    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn login_without_a_password_returns_422() {
    let app = spawn_app().await;

    let response = app
        .post_login(&json!({ "username": &app.test_user.email }))
        .await;

    assert_eq!(response.status().as_u16(), 422);
}

#[tokio::test]
async fn clicking_the_confirmation_link_confirms_the_user() {
    // Arrange
    let app = spawn_app().await;
    mock_email_server(&app).await;
    app.post_signup(&signup_body()).await;
    let email_requests = app.wait_for_emails(1).await;
    let confirmation_link = app.get_confirmation_link(&email_requests[0]);

    // Act
    let response = reqwest::get(confirmation_link.clone()).await.unwrap();

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Email confirmed");

    let login = app
        .post_login(&json!({
            "username": "ursula_le_guin@gmail.com",
            "password": "earthsea-1968",
        }))
        .await;
    assert_eq!(login.status().as_u16(), 200);

    // A second click is harmless
    let response = reqwest::get(confirmation_link).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Your email is already confirmed");
}

#[tokio::test]
async fn confirmation_with_a_malformed_token_returns_422() {
    let app = spawn_app().await;

    let response = app.get_confirmed_email("not-a-jwt").await;

    assert_eq!(response.status().as_u16(), 422);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Invalid token for email verification");
}

#[tokio::test]
async fn confirmation_with_an_access_token_returns_422() {
    let app = spawn_app().await;
    let access_token = app.access_token().await;

    let response = app.get_confirmed_email(&access_token).await;

    assert_eq!(response.status().as_u16(), 422);
}

#[tokio::test]
async fn confirmation_for_an_unregistered_email_returns_400() {
    let app = spawn_app().await;
    let token = app.tokens.create_email_token("ghost@example.com").unwrap();

    let response = app.get_confirmed_email(&token).await;

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Verification error");
}

#[tokio::test]
async fn refresh_token_rotates_the_token_pair() {
    // Arrange
    let app = spawn_app().await;
    let first = app.login(&app.test_user).await;

    // Act
    let response = app
        .get_refresh_token(first["refresh_token"].as_str().unwrap())
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let second: Value = response.json().await.unwrap();
    assert_eq!(second["token_type"], "bearer");
    assert_ne!(second["refresh_token"], first["refresh_token"]);

    let myself = app
        .get_myself(second["access_token"].as_str().unwrap())
        .await;
    assert_eq!(myself.status().as_u16(), 200);
}

#[tokio::test]
async fn reusing_an_old_refresh_token_revokes_the_session() {
    // Arrange
    let app = spawn_app().await;
    let first = app.login(&app.test_user).await;
    let old_refresh = first["refresh_token"].as_str().unwrap();
    let second: Value = app
        .get_refresh_token(old_refresh)
        .await
        .json()
        .await
        .unwrap();

    // Act - Part 1 - Replay the rotated token
    let response = app.get_refresh_token(old_refresh).await;
    assert_eq!(response.status().as_u16(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Invalid refresh token");

    // Act - Part 2 - The latest token was revoked along the way
    let response = app
        .get_refresh_token(second["refresh_token"].as_str().unwrap())
        .await;
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn refresh_for_a_deleted_user_returns_401() {
    let app = spawn_app().await;
    let tokens = app.login(&app.test_user).await;
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(app.test_user.id)
        .execute(&app.db_pool)
        .await
        .unwrap();

    let response = app
        .get_refresh_token(tokens["refresh_token"].as_str().unwrap())
        .await;

    assert_eq!(response.status().as_u16(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Could not validate credentials");
}

#[tokio::test]
async fn refresh_with_an_access_token_returns_401() {
    let app = spawn_app().await;
    let access_token = app.access_token().await;

    let response = app.get_refresh_token(&access_token).await;

    assert_eq!(response.status().as_u16(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Invalid scope for token");
}

#[tokio::test]
async fn refresh_without_a_token_returns_401() {
    let app = spawn_app().await;

    let response = app
        .api_client
        .get(&format!("{}/api/auth/refresh_token", &app.address))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn request_email_sends_a_new_link_to_unconfirmed_users() {
    // Arrange
    let app = spawn_app().await;
    mock_email_server(&app).await;
    app.post_signup(&signup_body()).await;
    app.wait_for_emails(1).await;

    // Act
    let response = app
        .post_request_email(&json!({"email": "ursula_le_guin@gmail.com"}))
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Check your email for confirmation.");
    let email_requests = app.wait_for_emails(2).await;
    let link = app.get_confirmation_link(&email_requests[1]);
    let response = reqwest::get(link).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn request_email_for_a_confirmed_user_sends_nothing() {
    let app = spawn_app().await;
    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.email_server)
        .await;

    let response = app
        .post_request_email(&json!({"email": &app.test_user.email}))
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Your email is already confirmed");
}

#[tokio::test]
async fn request_email_for_an_unregistered_email_returns_404() {
    let app = spawn_app().await;

    let response = app
        .post_request_email(&json!({"email": "ghost@example.com"}))
        .await;

    assert_eq!(response.status().as_u16(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["detail"],
        "User with email ghost@example.com is not registered"
    );
}
