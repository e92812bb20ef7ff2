use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::net::TcpListener;
use tracing_actix_web::TracingLogger;

use crate::config::{DatabaseSettings, Settings};
use crate::routes::{
    handle_create_email, handle_delete_email, handle_get_email, handle_get_email_batch,
    handle_update_email, health_check, json_error_handler, method_not_allowed,
};
use crate::store::{EmailStore, StoreError};

pub struct Application {
    pub port: u16,
    pub server: Server,
}

#[derive(thiserror::Error)]
pub enum StartupError {
    #[error("Failed to load the configuration.")]
    ConfigurationError(#[from] config::ConfigError),
    #[error("Failed to connect to the database.")]
    DatabaseError(#[from] sqlx::Error),
    #[error("Failed to create the emails table.")]
    SchemaError(#[from] StoreError),
    #[error("Failed to start the HTTP server.")]
    ServerError(#[from] std::io::Error),
}

impl std::fmt::Debug for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self)?;
        if let Some(cause) = std::error::Error::source(self) {
            write!(f, "Caused by:\n\t({})", cause)?;
        }
        Ok(())
    }
}

impl Application {
    pub async fn build(config: Settings) -> Result<Self, StartupError> {
        let db_pool = get_connection_db_pool(&config.database).await?;
        let store = EmailStore::new(db_pool);

        // Any failure other than an existing table stops the startup
        store.ensure_schema().await?;

        let listener = TcpListener::bind(config.get_address())?;
        let port = listener.local_addr()?.port();
        let server = run(listener, store)?;

        tracing::info!("Server listening on {}:{}", config.application.get_host(), port);

        Ok(Self { port, server })
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stop(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

pub fn run(listener: TcpListener, store: EmailStore) -> Result<Server, std::io::Error> {
    let store = web::Data::new(store);
    // GET endpoints also carry a JSON body, so the content type is not enforced
    let json_config = web::JsonConfig::default()
        .content_type_required(false)
        .error_handler(json_error_handler);

    let server = HttpServer::new(move || {
        App::new()
            // 'wrap' method adds a middleware to the App. This specific middleware provide incoming
            // request logger
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/email")
                    .service(
                        web::resource("/create")
                            .route(web::post().to(handle_create_email))
                            .default_service(web::to(method_not_allowed)),
                    )
                    .service(
                        web::resource("/get")
                            .route(web::get().to(handle_get_email))
                            .default_service(web::to(method_not_allowed)),
                    )
                    .service(
                        web::resource("/update")
                            .route(web::put().to(handle_update_email))
                            .default_service(web::to(method_not_allowed)),
                    )
                    .service(
                        web::resource("/delete")
                            .route(web::post().to(handle_delete_email))
                            .default_service(web::to(method_not_allowed)),
                    )
                    .service(
                        web::resource("/get_batch")
                            .route(web::get().to(handle_get_email_batch))
                            .default_service(web::to(method_not_allowed)),
                    ),
            )
            .app_data(json_config.clone())
            .app_data(store.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}

pub async fn get_connection_db_pool(config: &DatabaseSettings) -> Result<SqlitePool, sqlx::Error> {
    SqlitePoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(2))
        .max_connections(config.get_max_connections())
        .connect_with(config.get_db_options())
        .await
}
