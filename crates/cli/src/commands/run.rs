//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

use crate::cli::RunArgs;
use crate::error::ensure_config_exists;
use crate::pipeline::{Node, NodeConfig};

/// Execute the `run` command
pub async fn run_node(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    ensure_config_exists(&args.config)?;

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if let Some(ref device_id) = args.device_id {
        info!(device_id = %device_id, "Overriding device_id from CLI");
        blueprint.node.device_id = device_id.clone();
    }

    info!(
        device_id = %blueprint.node.device_id,
        producers = blueprint.producers.len(),
        transport = ?blueprint.transport.kind,
        framing = ?blueprint.transport.framing,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let node = Node::new(NodeConfig {
        blueprint,
        max_rounds: (args.max_rounds > 0).then_some(args.max_rounds),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    });

    info!("Starting node...");
    let stats = node
        .run(shutdown_signal())
        .await
        .context("Node execution failed")?;

    info!(
        rounds = stats.rounds.total_rounds,
        sent = stats.rounds.sent,
        stop = %stats.stop_reason,
        duration_secs = stats.duration.as_secs_f64(),
        "Node stopped"
    );
    stats.print_summary();

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &contracts::NodeBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Node: {}", blueprint.node.device_id);

    println!("\nProducers ({}):", blueprint.producers.len());
    for producer in &blueprint.producers {
        let handoff = if producer.handoff { " -> handoff" } else { "" };
        println!(
            "  - {} every {} ms{}",
            producer.kind,
            producer.period().as_millis(),
            handoff
        );
    }

    let dispatch = &blueprint.dispatch;
    println!("\nDispatch:");
    match dispatch.round_timeout() {
        Some(t) => println!("  Round timeout: {} ms ({:?})", t.as_millis(), dispatch.on_timeout),
        None => println!("  Round timeout: none"),
    }
    println!("  Min interval: {} ms", dispatch.min_interval_ms);

    println!(
        "\nTransport: {:?} ({:?})",
        blueprint.transport.kind, blueprint.transport.framing
    );
    println!(
        "Command channel: {}",
        if blueprint.command_channel.enabled {
            blueprint.command_channel.source.as_str()
        } else {
            "disabled"
        }
    );

    println!();
}
