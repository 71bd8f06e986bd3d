//! Shared state, routers and the serve loop.

use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};

use crate::pipeline::{ImagePipeline, TextPipeline};
use crate::v1;

/// Fires once, when `/api/quit` is hit or a signal arrives.
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Shutdown {
    fn default() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }
}

impl Shutdown {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so this only errors if it was dropped.
        let _ = rx.wait_for(|quit| *quit).await;
    }
}

/// Knobs applied to every image request on top of what the client sends.
#[derive(Debug, Clone)]
pub struct ImageDefaults {
    pub negative_prompt: String,
    pub guidance_scale: f32,
    pub width: u32,
    pub height: u32,
    pub save_dir: Option<PathBuf>,
}

#[derive(Clone)]
pub struct ImageState {
    pub pipeline: Arc<Mutex<Box<dyn ImagePipeline>>>,
    pub defaults: Arc<ImageDefaults>,
    pub shutdown: Shutdown,
}

impl ImageState {
    pub fn new(pipeline: Box<dyn ImagePipeline>, defaults: ImageDefaults) -> Self {
        Self {
            pipeline: Arc::new(Mutex::new(pipeline)),
            defaults: Arc::new(defaults),
            shutdown: Shutdown::default(),
        }
    }
}

impl FromRef<ImageState> for Shutdown {
    fn from_ref(state: &ImageState) -> Self {
        state.shutdown.clone()
    }
}

#[derive(Clone)]
pub struct ChatState {
    pub pipeline: Arc<Mutex<Box<dyn TextPipeline>>>,
    pub shutdown: Shutdown,
}

impl ChatState {
    pub fn new(pipeline: Box<dyn TextPipeline>) -> Self {
        Self {
            pipeline: Arc::new(Mutex::new(pipeline)),
            shutdown: Shutdown::default(),
        }
    }
}

impl FromRef<ChatState> for Shutdown {
    fn from_ref(state: &ChatState) -> Self {
        state.shutdown.clone()
    }
}

/// Wrong methods on known paths answer like unknown paths, not with a bare 405.
pub fn image_router(state: ImageState) -> Router {
    Router::new()
        .route("/health", get(v1::health_check).fallback(v1::unknown_path))
        .route("/", post(v1::generate_image).fallback(v1::unknown_path))
        .route("/api/generate", post(v1::generate_image).fallback(v1::unknown_path))
        .route("/api/quit", post(v1::quit).fallback(v1::unknown_path))
        .fallback(v1::unknown_path)
        .with_state(state)
}

pub fn chat_router(state: ChatState) -> Router {
    Router::new()
        .route("/health", get(v1::health_check).fallback(v1::unknown_path))
        .route("/v1/chat/completions", post(v1::chat_completions).fallback(v1::unknown_path))
        .route("/api/quit", post(v1::quit).fallback(v1::unknown_path))
        .fallback(v1::unknown_path)
        .with_state(state)
}

/// Serves `app` until `shutdown` fires or SIGINT/SIGTERM arrives.
pub async fn serve(listener: TcpListener, app: Router, shutdown: Shutdown) -> std::io::Result<()> {
    let addr: SocketAddr = listener.local_addr()?;
    tracing::info!(%addr, "started server");

    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("got signal");
        on_signal.trigger();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await?;
    tracing::info!("quitting");
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
