//! # Ingress Operator
//!
//! A Kubernetes controller that gives every Service annotated with `ingress/http`
//! an Ingress routing `ingressx.com/` to the Service on port 80.
//!
//! ## Overview
//!
//! 1. **Watching** - Service and Ingress informers keep local caches and feed a
//!    deduplicating work queue with `namespace/name` keys
//! 2. **Reconciling** - A pool of workers creates the Ingress of annotated Services and
//!    deletes it once the annotation is removed
//! 3. **Self-healing** - Deleting a managed Ingress by hand re-queues its Service, so the
//!    Ingress comes back while the annotation is present
//! 4. **Retrying** - Failed syncs are retried with exponential backoff up to a bound
//!
//! Ingresses carry a controller owner reference to their Service, so deleting the
//! Service lets Kubernetes garbage collection remove the Ingress.
//!
//! ## Configuration
//!
//! Settings come from environment variables (see `ControllerConfig` and `ServerConfig`)
//! and can be overridden on the command line.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use ingress_operator::config::{ControllerConfig, ServerConfig};
use ingress_operator::runtime::initialization::initialize;
use ingress_operator::runtime::watch_loop::{run_watch_loop, spawn_shutdown_handler};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Creates an Ingress for every Service carrying the trigger annotation
#[derive(Parser, Debug)]
#[command(name = "ingress-operator", version, about, long_about = None)]
struct Cli {
    /// Number of concurrent reconciliation workers [env: WORKERS]
    #[arg(long)]
    workers: Option<usize>,

    /// Backoff re-admissions before a failing key is dropped [env: MAX_RETRIES]
    #[arg(long)]
    max_retries: Option<u32>,

    /// Only watch this namespace [env: WATCH_NAMESPACE]
    #[arg(short, long)]
    namespace: Option<String>,

    /// Annotation that requests an Ingress [env: TRIGGER_ANNOTATION]
    #[arg(long)]
    annotation: Option<String>,

    /// Port for /metrics, /healthz and /readyz [env: METRICS_PORT]
    #[arg(long)]
    metrics_port: Option<u16>,
}

impl Cli {
    fn apply(self, controller: &mut ControllerConfig, server: &mut ServerConfig) {
        if let Some(workers) = self.workers {
            controller.workers = workers.max(1);
        }
        if let Some(max_retries) = self.max_retries {
            controller.max_retries = max_retries;
        }
        if let Some(namespace) = self.namespace.filter(|ns| !ns.is_empty()) {
            controller.watch_namespace = Some(namespace);
        }
        if let Some(annotation) = self.annotation {
            controller.trigger_annotation = annotation;
        }
        if let Some(port) = self.metrics_port {
            server.metrics_port = port;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut controller_config = ControllerConfig::from_env();
    let mut server_config = ServerConfig::from_env();
    cli.apply(&mut controller_config, &mut server_config);

    let token = CancellationToken::new();
    let init = initialize(&controller_config, &server_config, &token).await?;
    spawn_shutdown_handler(token.clone(), Arc::clone(&init.server_state));

    let result = run_watch_loop(
        init.client,
        &controller_config,
        init.server_state,
        token.clone(),
    )
    .await;

    token.cancel();
    let _ = init.server_handle.await;
    info!("Controller stopped");
    result
}
