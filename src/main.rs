use std::sync::Arc;
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use beacon::{
    api,
    config::Settings,
    email,
    payments::{PaymentGateway, RazorpayGateway},
    service::ServiceContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beacon=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!("Starting Beacon server on {}:{}", settings.server.host, settings.server.port);

    // Initialize database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    tokio::fs::create_dir_all(&settings.server.uploads_dir).await?;

    let email_sender = email::from_config(&settings.email)?;
    tracing::info!("OTP delivery via {}", email_sender.name());

    let gateway: Option<Arc<dyn PaymentGateway>> = match RazorpayGateway::from_config(&settings.payments)? {
        Some(gateway) => {
            tracing::info!("Razorpay payment processing enabled");
            Some(Arc::new(gateway))
        }
        None => {
            tracing::error!("Razorpay key id or secret missing; checkout is unavailable until configured");
            None
        }
    };

    let settings = Arc::new(settings);
    let service_context = Arc::new(ServiceContext::new(
        db_pool,
        &settings,
        email_sender,
        gateway,
    ));

    let removed = service_context.auth_service.cleanup_expired_sessions().await?;
    if removed > 0 {
        tracing::info!("Removed {} expired sessions", removed);
    }

    let app = api::create_app(service_context, settings.clone());

    let listener = tokio::net::TcpListener::bind(
        format!("{}:{}", settings.server.host, settings.server.port)
    ).await?;

    tracing::info!("Server listening on http://{}:{}", settings.server.host, settings.server.port);

    axum::serve(listener, app).await?;

    Ok(())
}
