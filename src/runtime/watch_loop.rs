//! # Watch Loop
//!
//! Wires informers, router, queue and workers together and runs them until shutdown.
//!
//! Startup order matters: the informers start first, and the workers only start once
//! both caches hold a complete listing, so no sync ever reads a half-filled cache.

use std::sync::Arc;

use anyhow::Result;
use kube::Client;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::cluster::{KubeIngressClient, ReflectorCache};
use crate::config::ControllerConfig;
use crate::controller::backoff::ControllerRateLimiter;
use crate::controller::events::EventRouter;
use crate::controller::key::ObjectKey;
use crate::controller::queue::WorkQueue;
use crate::controller::reconciler::Reconciler;
use crate::controller::retry::RetryPolicy;
use crate::controller::server::ServerState;
use crate::controller::worker::WorkerPool;
use crate::runtime::informer::Informers;

/// Run the controller until `token` is cancelled
///
/// # Errors
///
/// Fails when the caches do not sync within the configured timeout.
pub async fn run_watch_loop(
    client: Client,
    config: &ControllerConfig,
    server_state: Arc<ServerState>,
    token: CancellationToken,
) -> Result<()> {
    let queue: WorkQueue<ObjectKey> = WorkQueue::new(ControllerRateLimiter::from_config(config));
    let router = EventRouter::new(queue.clone());

    let informers = Informers::start(
        &client,
        config.watch_namespace.as_deref(),
        &router,
        &token,
    );

    if let Err(e) = informers
        .wait_for_cache_sync(config.cache_sync_timeout_duration())
        .await
    {
        error!(error = %e, "Failed to sync caches, shutting down");
        token.cancel();
        queue.shut_down();
        informers.join().await;
        return Err(e);
    }

    let reconciler = Arc::new(Reconciler::new(
        Arc::new(ReflectorCache::new(informers.services.clone())),
        Arc::new(ReflectorCache::new(informers.ingresses.clone())),
        Arc::new(KubeIngressClient::new(client)),
        config,
    ));
    let retry = RetryPolicy::new(queue.clone(), config.max_retries);
    let pool = WorkerPool::new(queue, reconciler, retry, config.workers);

    server_state.set_ready(true);
    info!("Controller ready");

    pool.run(token.clone()).await;

    server_state.set_ready(false);
    informers.join().await;
    info!("Watch loop stopped");
    Ok(())
}

/// Cancel `token` on SIGINT or SIGTERM
///
/// Readiness is dropped right away so no new traffic is routed to a stopping pod.
pub fn spawn_shutdown_handler(token: CancellationToken, server_state: Arc<ServerState>) {
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
        server_state.set_ready(false);
        token.cancel();
    });
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            error!(error = %e, "Failed to install SIGTERM handler, only SIGINT will stop the controller");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
