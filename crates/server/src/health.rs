use std::path::PathBuf;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use threadcast_core::files::try_get_images;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    images_dir: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub images: HealthCheck,
    pub checked_at: String,
}

pub fn router(images_dir: PathBuf) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { images_dir })
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    images_dir: PathBuf,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<JoinHandle<()>> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    Ok(tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        };
        if let Err(error) = axum::serve(listener, router(images_dir))
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    }))
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let images = images_check(state.images_dir).await;
    let ready = images.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "threadcast-server runtime initialized".to_string(),
        },
        images,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn images_check(images_dir: PathBuf) -> HealthCheck {
    let listing = tokio::task::spawn_blocking(move || {
        try_get_images(&images_dir).map_err(|error| error.to_string())
    })
    .await;

    match listing {
        Ok(Ok(images)) => HealthCheck {
            status: "ready",
            detail: format!("{} image(s) available for upload", images.len()),
        },
        Ok(Err(error)) => {
            HealthCheck { status: "degraded", detail: format!("images directory unusable: {error}") }
        }
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("images check panicked: {error}") }
        }
    }
}
