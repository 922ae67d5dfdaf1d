//! # Ingress Generator
//!
//! Prints the Ingress the controller would create for a Service manifest.
//!
//! ## Usage
//!
//! ```bash
//! # Render from a file
//! cargo run --bin ingressgen -- --file service.yaml
//!
//! # Render a live Service
//! kubectl get svc web -o yaml | cargo run --bin ingressgen
//!
//! # Render as JSON and apply
//! cargo run --bin ingressgen -- --file service.yaml --output json | kubectl apply -f -
//! ```
//!
//! A Service read from a file usually has no `metadata.uid`; pass `--uid` to fill the
//! owner reference in that case.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use ingress_operator::config::ControllerConfig;
use ingress_operator::controller::reconciler::IngressTemplate;
use k8s_openapi::api::core::v1::Service;

#[derive(Parser, Debug)]
#[command(name = "ingressgen", version, about = "Render the Ingress generated for a Service")]
struct Cli {
    /// Service manifest (YAML or JSON); reads stdin when omitted
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// uid for the owner reference when the manifest has none
    #[arg(long)]
    uid: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
    output: OutputFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let manifest = match &cli.file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read Service manifest from stdin")?;
            buffer
        }
    };

    let mut service: Service =
        serde_yaml::from_str(&manifest).context("Failed to parse Service manifest")?;
    if let Some(uid) = cli.uid {
        service.metadata.uid = Some(uid);
    }

    let config = ControllerConfig::from_env();
    let annotated = service
        .metadata
        .annotations
        .as_ref()
        .is_some_and(|annotations| annotations.contains_key(&config.trigger_annotation));
    if !annotated {
        eprintln!(
            "warning: Service has no '{}' annotation, the controller would not create this Ingress",
            config.trigger_annotation
        );
    }

    let ingress = IngressTemplate::from_config(&config)
        .build(&service)
        .context("Service has no metadata.uid, pass --uid")?;
    let rendered = match cli.output {
        OutputFormat::Yaml => serde_yaml::to_string(&ingress).context("Failed to serialize Ingress")?,
        OutputFormat::Json => {
            let mut json =
                serde_json::to_string_pretty(&ingress).context("Failed to serialize Ingress")?;
            json.push('\n');
            json
        }
    };
    print!("{rendered}");
    Ok(())
}
