use crate::helpers::{spawn_app, spawn_app_without_database};

#[tokio::test]
async fn health_check_works() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app
        .api_client
        .get(format!("{}/api/healthchecker", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    // Assert
    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Welcome to the Contact Book API!");
}

#[tokio::test]
async fn root_names_the_application() {
    let app = spawn_app().await;

    let response = reqwest::get(&app.address).await.unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Contact Book");
}

#[tokio::test]
async fn health_check_fails_when_the_database_is_unreachable() {
    let address = spawn_app_without_database().await;

    let response = reqwest::get(format!("{}/api/healthchecker", address))
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 500);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Error connecting to the database");
}
