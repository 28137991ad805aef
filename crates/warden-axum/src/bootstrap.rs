//! Axum server bootstrap - the composition root.
//!
//! This module is the only place where the supervisor, its adapters and the
//! telemetry poller are wired together for the web adapter.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use warden_core::{ConfigStore, ProcessState, TelemetrySnapshot, default_launch_config_path};
use warden_runtime::{
    ChildProcessLauncher, EventBus, JsonConfigStore, LifecycleSupervisor, SupervisorOptions,
    SupervisorTimings, SysinfoMetricsSource, TelemetryPoller,
};

/// CORS configuration for the web server.
#[derive(Debug, Clone, Default)]
pub enum CorsConfig {
    /// Allow all origins (development mode).
    #[default]
    AllowAll,
    /// Allow specific origins (production mode).
    AllowOrigins(Vec<String>),
}

/// Server configuration for the Axum adapter.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port for the HTTP server.
    pub port: u16,
    /// Where the persisted launch configuration lives.
    pub launch_config_path: PathBuf,
    /// Directory of the managed server; overrides the saved working directory.
    pub server_dir: Option<PathBuf>,
    /// Optional path to static assets for SPA serving.
    pub static_dir: Option<PathBuf>,
    /// CORS configuration.
    pub cors: CorsConfig,
    /// Telemetry sampling interval.
    pub telemetry_interval: Duration,
    /// Lifecycle delays and budgets.
    pub timings: SupervisorTimings,
}

impl ServerConfig {
    /// Create config with default paths.
    pub fn with_defaults() -> Self {
        Self {
            port: 8420,
            launch_config_path: default_launch_config_path(),
            server_dir: None,
            static_dir: None,
            cors: CorsConfig::default(),
            telemetry_interval: Duration::from_secs(2),
            timings: SupervisorTimings::default(),
        }
    }

    /// Set the static directory for SPA serving.
    #[must_use]
    pub fn with_static_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(path.into());
        self
    }

    /// Set CORS to allow specific origins.
    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.cors = CorsConfig::AllowOrigins(origins);
        self
    }
}

/// Application context for the Axum adapter.
pub struct AxumContext {
    /// Owner of the managed process.
    pub supervisor: LifecycleSupervisor,
    /// Persisted launch configuration.
    pub config_store: Arc<dyn ConfigStore>,
    /// Most recent telemetry sample.
    pub telemetry: watch::Receiver<Option<TelemetrySnapshot>>,
    /// Cancels background tasks owned by this context.
    pub shutdown: CancellationToken,
}

impl AxumContext {
    /// Stop the managed process (graceful, then forced) and background tasks.
    pub async fn shutdown(&self) {
        if self.supervisor.state().is_active() {
            info!("Stopping managed server before exit");
            if let Err(e) = self.supervisor.stop().await {
                warn!(error = %e, "Graceful stop failed, killing managed server");
                self.supervisor.kill().await;
            }
        } else if self.supervisor.state() == ProcessState::Error {
            self.supervisor.kill().await;
        }
        self.shutdown.cancel();
    }
}

/// Bootstrap the supervisor, config store and telemetry poller.
pub async fn bootstrap(config: ServerConfig) -> Result<AxumContext> {
    info!(
        target: "warden.paths",
        launch_config = %config.launch_config_path.display(),
        server_dir = ?config.server_dir,
        "Axum bootstrap resolved paths"
    );

    // 1. Persisted launch configuration
    let store = Arc::new(JsonConfigStore::new(&config.launch_config_path));
    if let Some(dir) = &config.server_dir {
        let mut launch = store.load().await?;
        if launch.working_directory != *dir {
            launch.working_directory.clone_from(dir);
            store.save(&launch).await?;
            info!(server_dir = %dir.display(), "Launch working directory updated");
        }
    }
    let config_store: Arc<dyn ConfigStore> = store;

    // 2. Supervisor with the real process launcher
    let bus = Arc::new(EventBus::new());
    let supervisor = LifecycleSupervisor::new(
        Arc::new(ChildProcessLauncher::new()),
        Arc::clone(&config_store),
        bus,
        SupervisorOptions::default().with_timings(config.timings),
    );

    // 3. Telemetry poller
    let shutdown = CancellationToken::new();
    let poller = TelemetryPoller::new(
        supervisor.clone(),
        Box::new(SysinfoMetricsSource::new()),
        config.telemetry_interval,
    );
    let telemetry = poller.latest();
    poller.spawn(shutdown.child_token());

    Ok(AxumContext {
        supervisor,
        config_store,
        telemetry,
        shutdown,
    })
}

/// Start the web server on the configured port.
///
/// When `signal` resolves the server stops accepting connections, then the
/// managed process is stopped before this returns.
pub async fn start_server(
    config: ServerConfig,
    signal: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    use tokio::net::TcpListener;

    let ctx = Arc::new(bootstrap(config.clone()).await?);

    // Choose router based on whether static serving is configured
    let app = if let Some(ref static_dir) = config.static_dir {
        info!("Serving static assets from: {}", static_dir.display());
        crate::routes::create_spa_router(Arc::clone(&ctx), static_dir, &config.cors)
    } else {
        crate::routes::create_router(Arc::clone(&ctx), &config.cors)
    };

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("warden panel listening on http://{}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(signal)
        .await;

    ctx.shutdown().await;
    served?;
    Ok(())
}
