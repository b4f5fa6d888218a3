//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::NodeBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::ensure_config_exists;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    device_id: String,
    producers: Vec<ProducerInfo>,
    dispatch: DispatchInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    handoff: Option<HandoffInfo>,
    transport: TransportInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    command_channel: Option<CommandInfo>,
}

#[derive(Serialize)]
struct ProducerInfo {
    kind: String,
    period_ms: u64,
    handoff: bool,
    failure_rate: f64,
}

#[derive(Serialize)]
struct DispatchInfo {
    /// None = wait forever
    round_timeout_ms: Option<u64>,
    min_interval_ms: u64,
    on_timeout: String,
}

#[derive(Serialize)]
struct HandoffInfo {
    capacity: usize,
    policy: String,
    push_timeout_ms: u64,
    pm_low: u16,
    pm_high: u16,
    duty_min: u16,
    duty_max: u16,
}

#[derive(Serialize)]
struct TransportInfo {
    kind: String,
    framing: String,
    #[serde(skip_serializing_if = "std::collections::BTreeMap::is_empty")]
    params: std::collections::BTreeMap<String, String>,
}

#[derive(Serialize)]
struct CommandInfo {
    source: String,
    poll_interval_ms: u64,
    max_duty: u16,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    ensure_config_exists(&args.config)?;

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&blueprint);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(blueprint: &NodeBlueprint) -> ConfigInfo {
    let producers = blueprint
        .producers
        .iter()
        .map(|p| ProducerInfo {
            kind: p.kind.to_string(),
            period_ms: p.period().as_millis() as u64,
            handoff: p.handoff,
            failure_rate: p.simulation.failure_rate,
        })
        .collect();

    let handoff = blueprint.handoff_producer().map(|_| HandoffInfo {
        capacity: blueprint.handoff.capacity,
        policy: format!("{:?}", blueprint.handoff.policy),
        push_timeout_ms: blueprint.handoff.push_timeout_ms,
        pm_low: blueprint.actuator.pm_low,
        pm_high: blueprint.actuator.pm_high,
        duty_min: blueprint.actuator.duty_min,
        duty_max: blueprint.actuator.duty_max,
    });

    let command_channel = blueprint.command_channel.enabled.then(|| CommandInfo {
        source: blueprint.command_channel.source.clone(),
        poll_interval_ms: blueprint.command_channel.poll_interval_ms,
        max_duty: blueprint.actuator.max_duty,
    });

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        device_id: blueprint.node.device_id.clone(),
        producers,
        dispatch: DispatchInfo {
            round_timeout_ms: blueprint
                .dispatch
                .round_timeout()
                .map(|t| t.as_millis() as u64),
            min_interval_ms: blueprint.dispatch.min_interval_ms,
            on_timeout: format!("{:?}", blueprint.dispatch.on_timeout),
        },
        handoff,
        transport: TransportInfo {
            kind: format!("{:?}", blueprint.transport.kind),
            framing: format!("{:?}", blueprint.transport.framing),
            params: blueprint
                .transport
                .params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        },
        command_channel,
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("=== airnode configuration ===\n");

    println!("Node");
    println!("   ├─ Version: {}", info.version);
    println!("   └─ Device: {}", info.device_id);

    println!("\nProducers ({})", info.producers.len());
    for (i, p) in info.producers.iter().enumerate() {
        let prefix = if i + 1 == info.producers.len() { "└─" } else { "├─" };
        let handoff = if p.handoff { ", handoff" } else { "" };
        println!("   {} {} every {} ms{}", prefix, p.kind, p.period_ms, handoff);
    }

    println!("\nDispatch");
    match info.dispatch.round_timeout_ms {
        Some(ms) => println!("   ├─ Round timeout: {} ms", ms),
        None => println!("   ├─ Round timeout: none"),
    }
    println!("   ├─ On timeout: {}", info.dispatch.on_timeout);
    println!("   └─ Min interval: {} ms", info.dispatch.min_interval_ms);

    if let Some(h) = &info.handoff {
        println!("\nHandoff");
        println!("   ├─ Capacity: {} ({})", h.capacity, h.policy);
        println!("   ├─ Push timeout: {} ms", h.push_timeout_ms);
        println!(
            "   └─ PM2.5 {}..{} -> duty {}..{}",
            h.pm_low, h.pm_high, h.duty_min, h.duty_max
        );
    }

    println!("\nTransport");
    println!("   ├─ Kind: {}", info.transport.kind);
    println!("   └─ Framing: {}", info.transport.framing);
    for (k, v) in &info.transport.params {
        println!("      {} = {}", k, v);
    }

    if let Some(c) = &info.command_channel {
        println!("\nCommand channel");
        println!("   ├─ Source: {}", c.source);
        println!("   ├─ Poll interval: {} ms", c.poll_interval_ms);
        println!("   └─ Max duty: {}", c.max_duty);
    }

    println!();
}
