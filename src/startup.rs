use actix_cors::Cors;
use actix_web::dev::Server;
use actix_web::web::{self, Data};
use actix_web::{middleware, App, HttpServer};
use actix_web_lab::middleware::from_fn;
use sqlx::migrate::MigrateError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::net::TcpListener;
use tracing_actix_web::TracingLogger;

use crate::authentication::{reject_anonymous_users, TokenService};
use crate::cloudinary::CloudinaryClient;
use crate::configuration::{DatabaseSettings, Settings};
use crate::email_client::EmailClient;
use crate::rate_limit::{prune_periodically, RateLimits, PRUNE_INTERVAL};
use crate::routes::{auth, contacts, health_check, home, users};
use crate::utils::e422;

pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    // We have converted the 'build' function into a constructor for
    // the 'Application' struct.
    pub async fn build(configuration: Settings) -> Result<Self, anyhow::Error> {
        let connection_pool = get_connection_pool(&configuration.database);

        migrate(&configuration.database, &connection_pool).await?;

        let sender_email = configuration
            .email_client
            .sender()
            .map_err(|e| anyhow::anyhow!("invalid sender email address: {}", e))?;

        let timeout = configuration.email_client.timeout();

        let email_client = EmailClient::new(
            configuration.email_client.base_url,
            sender_email,
            configuration.email_client.authorization_token,
            timeout,
        );
        let cloudinary = CloudinaryClient::new(configuration.cloudinary, timeout);
        let tokens = TokenService::new(&configuration.auth);

        let address = format!(
            "{}:{}",
            configuration.application.host, configuration.application.port
        );
        let listener = TcpListener::bind(&address)?;
        let port = listener.local_addr()?.port();
        tracing::info!("app started at: {}", &address);
        let server = run(
            listener,
            connection_pool,
            email_client,
            cloudinary,
            tokens,
            configuration.application.base_url,
        )?;
        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    // A more expressive name that makes it clear that
    // this function only returns when the application is stopped
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

pub fn get_connection_pool(configuration: &DatabaseSettings) -> PgPool {
    PgPoolOptions::new()
        .connect_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(configuration.with_db())
}

async fn migrate(
    configuration: &DatabaseSettings,
    connection_pool: &PgPool,
) -> Result<(), MigrateError> {
    if configuration.migrate {
        tracing::info!("migrating postgres");
        sqlx::migrate!("./migrations").run(connection_pool).await
    } else {
        Ok(())
    }
}

// We need to define a wrapper type in order to retrieve the URL
// in the handlers that send confirmation emails.
// Retrieval from the context, in actix-web, is type based:
// using a raw String would expose us to conflicts
pub struct ApplicationBaseUrl(pub String);

pub fn run(
    listener: TcpListener,
    connection_pool: PgPool,
    email_client: EmailClient,
    cloudinary: CloudinaryClient,
    tokens: TokenService,
    base_url: String,
) -> Result<Server, std::io::Error> {
    let connection_pool = Data::new(connection_pool);
    let email_client = Data::new(email_client);
    let cloudinary = Data::new(cloudinary);
    let tokens = Data::new(tokens);
    let base_url = Data::new(ApplicationBaseUrl(base_url));
    // Quotas are shared by every worker
    let rate_limits = Data::new(RateLimits::default());
    tokio::spawn(prune_periodically(
        rate_limits.clone().into_inner(),
        PRUNE_INTERVAL,
    ));
    let server = HttpServer::new(move || {
        App::new()
            // Middlewares are added using the `wrap` method on `App`
            .wrap(middleware::NormalizePath::trim())
            .wrap(TracingLogger::default())
            .wrap(Cors::permissive())
            .app_data(web::JsonConfig::default().error_handler(|err, _| e422(err)))
            .app_data(web::FormConfig::default().error_handler(|err, _| e422(err)))
            .app_data(web::QueryConfig::default().error_handler(|err, _| e422(err)))
            .app_data(web::PathConfig::default().error_handler(|err, _| e422(err)))
            .route("/", web::get().to(home))
            .service(
                web::scope("/api")
                    .route("/healthchecker", web::get().to(health_check))
                    .service(
                        web::scope("/auth")
                            .route("/signup", web::post().to(auth::signup))
                            .route("/login", web::post().to(auth::login))
                            .route("/refresh_token", web::get().to(auth::refresh_token))
                            .route(
                                "/confirmed_email/{token}",
                                web::get().to(auth::confirmed_email),
                            )
                            .route("/request_email", web::post().to(auth::request_email)),
                    )
                    .service(
                        web::scope("/users")
                            .wrap(from_fn(reject_anonymous_users))
                            .route("/myself", web::get().to(users::myself))
                            .route("/avatar", web::patch().to(users::change_avatar)),
                    )
                    .service(
                        web::scope("/contacts")
                            .wrap(from_fn(reject_anonymous_users))
                            .route("", web::get().to(contacts::get_contacts))
                            .route("", web::post().to(contacts::create_contact))
                            // Literal segments go before `{contact_id}`
                            .route("/search", web::get().to(contacts::search_contacts))
                            .route("/birthdays", web::get().to(contacts::birthday_contacts))
                            .route("/{contact_id}", web::get().to(contacts::get_contact))
                            .route("/{contact_id}", web::put().to(contacts::update_contact))
                            .route("/{contact_id}", web::delete().to(contacts::delete_contact))
                            .route(
                                "/{contact_id}",
                                web::patch().to(contacts::update_status_contact),
                            ),
                    ),
            )
            .app_data(connection_pool.clone())
            .app_data(email_client.clone())
            .app_data(cloudinary.clone())
            .app_data(tokens.clone())
            .app_data(base_url.clone())
            .app_data(rate_limits.clone())
    })
    .listen(listener)?
    .run();
    // No .await here
    Ok(server)
}
