use std::net::SocketAddr;
use std::time::Duration;

use chrono::Utc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use whatsapp_crm_backend::models::message::MESSAGE_RETENTION_DAYS;
use whatsapp_crm_backend::{
    app,
    config::{get_config, init_config},
    database::pool::create_pool,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(pool);

    {
        let message_service = app_state.message_service.clone();
        tokio::spawn(async move {
            loop {
                let cutoff = Utc::now() - chrono::Duration::days(MESSAGE_RETENTION_DAYS);
                if let Err(e) = message_service.sweep_expired(cutoff).await {
                    tracing::error!(error = ?e, "Retention sweeper error");
                }
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        });
    }

    let app = app(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
