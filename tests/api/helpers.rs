use dotenv::dotenv;
use once_cell::sync::Lazy;
use secrecy::Secret;
use serde_json::Value;
use sqlx::{Connection, Executor, PgConnection, PgPool};

use uuid::Uuid;
use wiremock::MockServer;
use phone_book::authentication::{compute_password_hash, TokenService};
use phone_book::configuration::{get_configuration, DatabaseSettings};

use phone_book::startup::{get_connection_pool, Application};
use phone_book::telemetry::{
    get_line_subscriber, get_subscriber, init_subscriber,
};

// Ensure that the `tracing` stack is only initialised once using `once_cell`
static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();
    // We cannot assign the output of `get_subscriber` to a variable based on the value of `TEST_LOG`
    // because the sink is part of the type returned by `get_subscriber`, therefore they are not the
    // same type. We could work around it, but this is the most straight-forward way of moving forward.

    match std::env::var("TEST_LOG") {
        Ok(v) => {
            if v == "json" {
                println!("Using JSON output");
                init_subscriber(get_subscriber(
                    subscriber_name,
                    default_filter_level,
                    std::io::stdout,
                ));
            } else {
                println!("Using text output");
                init_subscriber(get_line_subscriber(
                    default_filter_level,
                    std::io::stdout,
                ));
            }
        }
        _ => {
            let subscriber = get_subscriber(
                subscriber_name,
                default_filter_level,
                std::io::sink,
            );
            init_subscriber(subscriber);
        }
    };
});

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub db_pool: PgPool,
    pub email_server: MockServer,
    pub cloudinary_server: MockServer,
    pub test_user: TestUser,
    pub tokens: TokenService,
    pub api_client: reqwest::Client,
}

/// A user whose email is already confirmed.
pub struct TestUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password: String,
}

impl TestUser {
    pub fn generate() -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            username: format!("user-{}", &id.to_string()[..8]),
            email: format!("{}@example.com", id),
            password: Uuid::new_v4().to_string(),
        }
    }

    pub async fn store(&self, pool: &PgPool) {
        let password_hash =
            compute_password_hash(Secret::new(self.password.clone())).unwrap();
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, confirmed)
            VALUES ($1, $2, $3, $4, TRUE)
            "#,
        )
        .bind(self.id)
        .bind(&self.username)
        .bind(&self.email)
        .bind(secrecy::ExposeSecret::expose_secret(&password_hash))
        .execute(pool)
        .await
        .expect("Failed to store test user.");
    }
}

impl TestApp {
    pub async fn post_signup(&self, body: &Value) -> reqwest::Response {
        self.api_client
            .post(&format!("{}/api/auth/signup", &self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_login<Body>(&self, body: &Body) -> reqwest::Response
    where
        Body: serde::Serialize,
    {
        self.api_client
            .post(&format!("{}/api/auth/login", &self.address))
            // This `reqwest` method makes sure that the body is URL-encoded
            // and the `Content-Type` header is set accordingly.
            .form(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Log in as `user` and return the token pair.
    pub async fn login(&self, user: &TestUser) -> Value {
        let response = self
            .post_login(&serde_json::json!({
                "username": &user.email,
                "password": &user.password,
            }))
            .await;
        assert_eq!(response.status().as_u16(), 200);
        response.json().await.unwrap()
    }

    /// Access token of the default test user.
    pub async fn access_token(&self) -> String {
        let tokens = self.login(&self.test_user).await;
        tokens["access_token"].as_str().unwrap().to_string()
    }

    pub async fn get_refresh_token(&self, refresh_token: &str) -> reqwest::Response {
        self.api_client
            .get(&format!("{}/api/auth/refresh_token", &self.address))
            .bearer_auth(refresh_token)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_confirmed_email(&self, token: &str) -> reqwest::Response {
        self.api_client
            .get(&format!("{}/api/auth/confirmed_email/{}", &self.address, token))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_request_email(&self, body: &Value) -> reqwest::Response {
        self.api_client
            .post(&format!("{}/api/auth/request_email", &self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_myself(&self, access_token: &str) -> reqwest::Response {
        self.api_client
            .get(&format!("{}/api/users/myself", &self.address))
            .bearer_auth(access_token)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn patch_avatar(
        &self,
        access_token: &str,
        form: reqwest::multipart::Form,
    ) -> reqwest::Response {
        self.api_client
            .patch(&format!("{}/api/users/avatar", &self.address))
            .bearer_auth(access_token)
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_contacts(&self, access_token: &str, query: &str) -> reqwest::Response {
        self.api_client
            .get(&format!("{}/api/contacts/{}", &self.address, query))
            .bearer_auth(access_token)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_contact(&self, access_token: &str, id: i64) -> reqwest::Response {
        self.api_client
            .get(&format!("{}/api/contacts/{}", &self.address, id))
            .bearer_auth(access_token)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_contact(&self, access_token: &str, body: &Value) -> reqwest::Response {
        self.api_client
            .post(&format!("{}/api/contacts/", &self.address))
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Create a contact and return its JSON representation.
    pub async fn create_contact(&self, access_token: &str, body: &Value) -> Value {
        let response = self.post_contact(access_token, body).await;
        assert_eq!(response.status().as_u16(), 201);
        response.json().await.unwrap()
    }

    pub async fn put_contact(
        &self,
        access_token: &str,
        id: i64,
        body: &Value,
    ) -> reqwest::Response {
        self.api_client
            .put(&format!("{}/api/contacts/{}", &self.address, id))
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn patch_contact(
        &self,
        access_token: &str,
        id: i64,
        body: &Value,
    ) -> reqwest::Response {
        self.api_client
            .patch(&format!("{}/api/contacts/{}", &self.address, id))
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn delete_contact(&self, access_token: &str, id: i64) -> reqwest::Response {
        self.api_client
            .delete(&format!("{}/api/contacts/{}", &self.address, id))
            .bearer_auth(access_token)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Wait for the background tasks to deliver `count` emails.
    pub async fn wait_for_emails(&self, count: usize) -> Vec<wiremock::Request> {
        for _ in 0..50 {
            let requests = self.email_server.received_requests().await.unwrap();
            if requests.len() >= count {
                return requests;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        panic!("Expected {} email(s) to be sent", count);
    }

    // accept mock server request (json that will be send to postmark) and search and return the link in it
    pub fn get_confirmation_link(&self, email_request: &wiremock::Request) -> reqwest::Url {
        // Parse the body as JSON, starting from raw bytes
        let body: Value = serde_json::from_slice(&email_request.body).unwrap();

        // Extract the link from one of the request fields
        let get_link = |s: &str| {
            let links: Vec<_> = linkify::LinkFinder::new()
                .links(s)
                .filter(|l| *l.kind() == linkify::LinkKind::Url)
                .collect();
            assert_eq!(links.len(), 1);
            let raw_link = links[0].as_str().to_owned();
            let mut confirmation_link = reqwest::Url::parse(&raw_link).unwrap();
            // make sure host is local
            assert_eq!(confirmation_link.host_str().unwrap(), "127.0.0.1");
            // make sure port is the same as the one used by the spawned app
            confirmation_link.set_port(Some(self.port)).unwrap();
            confirmation_link
        };

        let html = get_link(body["HtmlBody"].as_str().unwrap());
        let plain_text = get_link(body["TextBody"].as_str().unwrap());
        assert_eq!(html, plain_text);
        plain_text
    }
}

pub fn contact_body(name: &str) -> Value {
    serde_json::json!({
        "name": name,
        "lastname": "Le Guin",
        "email": format!("{}@earthsea.org", name.to_lowercase()),
        "phone": "+1 (503) 555-0100",
        "birthday": "1929-10-21",
        "notes": "Met at the library",
    })
}

pub async fn spawn_app() -> TestApp {
    dotenv().ok();
    // The first time `initialize` is invoked the code in `TRACING` is executed.
    // All other invocations will instead skip execution.
    Lazy::force(&TRACING);

    // Lauch mock servers to stand in for Postmark's and Cloudinary's APIs
    let email_server = MockServer::start().await;
    let cloudinary_server = MockServer::start().await;

    // Randomize configuration to ensure test isolation
    let configuration = {
        let mut c = get_configuration().expect("failed to read configuration.");
        // Use different database for each time
        c.database.database_name = Uuid::new_v4().to_string();
        // Use random port
        c.application.port = 0;
        // Use mock servers as external APIs
        c.email_client.base_url = email_server.uri();
        c.cloudinary.api_base_url = cloudinary_server.uri();
        c
    };

    // Create database and migrate the database
    configure_database(&configuration.database).await;

    // Launch the application as the background task
    let application = Application::build(configuration.clone())
        .await
        .expect("failed to build application");
    let application_port = application.port();
    let _ = tokio::spawn(application.run_until_stopped());

    let test_app = TestApp {
        address: format!("http://127.0.0.1:{}", application_port),
        port: application_port,
        db_pool: get_connection_pool(&configuration.database),
        email_server,
        cloudinary_server,
        test_user: TestUser::generate(),
        tokens: TokenService::new(&configuration.auth),
        api_client: reqwest::Client::new(),
    };
    test_app.test_user.store(&test_app.db_pool).await;
    test_app
}

/// Launch the application against a database nobody listens on and
/// return its address.
pub async fn spawn_app_without_database() -> String {
    dotenv().ok();
    Lazy::force(&TRACING);

    let configuration = {
        let mut c = get_configuration().expect("failed to read configuration.");
        c.application.port = 0;
        c.database.port = 1;
        c.database.migrate = false;
        c
    };
    let application = Application::build(configuration)
        .await
        .expect("failed to build application");
    let address = format!("http://127.0.0.1:{}", application.port());
    let _ = tokio::spawn(application.run_until_stopped());
    address
}

async fn configure_database(config: &DatabaseSettings) -> PgPool {
    // create database
    let mut connection = PgConnection::connect_with(&config.without_db())
        .await
        .expect("Failed to connect to Postgres");

    connection
        .execute(
            format!(r#"CREATE DATABASE "{}";"#, config.database_name).as_str(),
        )
        .await
        .expect("Failed to create database");

    let connection_pool = PgPool::connect_with(config.with_db())
        .await
        .expect("Failed connect to postres");

    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate database");

    connection_pool
}
