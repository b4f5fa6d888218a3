//! Configuration validation
//!
//! Rules:
//! - at least one producer, producer kinds unique, period > 0
//! - at most one handoff producer, handoff capacity > 0
//! - duty_min <= duty_max <= max_duty, initial_duty <= max_duty, pm_low < pm_high
//! - command poll interval > 0, frame length limit > 0
//! - transport params present for the chosen kind
//! - simulated failure rate within [0, 1]

use std::collections::HashSet;

use contracts::{ContractError, NodeBlueprint, TransportKind};

/// Validate a NodeBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &NodeBlueprint) -> Result<(), ContractError> {
    validate_node(blueprint)?;
    validate_producers(blueprint)?;
    validate_handoff(blueprint)?;
    validate_actuator(blueprint)?;
    validate_command_channel(blueprint)?;
    validate_transport(blueprint)?;
    Ok(())
}

fn validate_node(blueprint: &NodeBlueprint) -> Result<(), ContractError> {
    if blueprint.node.device_id.trim().is_empty() {
        return Err(ContractError::config_validation(
            "node.device_id",
            "device_id cannot be empty",
        ));
    }
    Ok(())
}

/// Producer kinds unique, periods positive
fn validate_producers(blueprint: &NodeBlueprint) -> Result<(), ContractError> {
    if blueprint.producers.is_empty() {
        return Err(ContractError::config_validation(
            "producers",
            "at least one producer is required",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, producer) in blueprint.producers.iter().enumerate() {
        if !seen.insert(producer.kind) {
            return Err(ContractError::config_validation(
                format!("producers[{idx}].kind"),
                format!("duplicate producer kind '{}'", producer.kind),
            ));
        }
        if producer.period_ms == Some(0) {
            return Err(ContractError::config_validation(
                format!("producers[{idx}].period_ms"),
                "period_ms must be > 0",
            ));
        }
        let rate = producer.simulation.failure_rate;
        if !(0.0..=1.0).contains(&rate) {
            return Err(ContractError::config_validation(
                format!("producers[{idx}].simulation.failure_rate"),
                format!("failure_rate must be within [0, 1], got {rate}"),
            ));
        }
    }
    Ok(())
}

fn validate_handoff(blueprint: &NodeBlueprint) -> Result<(), ContractError> {
    let handoff_count = blueprint.producers.iter().filter(|p| p.handoff).count();
    if handoff_count > 1 {
        return Err(ContractError::config_validation(
            "producers[].handoff",
            format!("at most one producer may feed the handoff queue, found {handoff_count}"),
        ));
    }
    if let Some(producer) = blueprint.handoff_producer() {
        if producer.kind != contracts::SensorKind::Particulate {
            return Err(ContractError::config_validation(
                "producers[].handoff",
                format!(
                    "only the particulate producer carries a handoff value, not '{}'",
                    producer.kind
                ),
            ));
        }
    }
    if blueprint.handoff.capacity == 0 {
        return Err(ContractError::config_validation(
            "handoff.capacity",
            "capacity must be > 0",
        ));
    }
    Ok(())
}

fn validate_actuator(blueprint: &NodeBlueprint) -> Result<(), ContractError> {
    let a = &blueprint.actuator;
    if a.duty_min > a.duty_max || a.duty_max > a.max_duty {
        return Err(ContractError::config_validation(
            "actuator.duty_min / actuator.duty_max",
            format!(
                "require duty_min ({}) <= duty_max ({}) <= max_duty ({})",
                a.duty_min, a.duty_max, a.max_duty
            ),
        ));
    }
    if a.initial_duty > a.max_duty {
        return Err(ContractError::config_validation(
            "actuator.initial_duty",
            format!(
                "initial_duty ({}) exceeds max_duty ({})",
                a.initial_duty, a.max_duty
            ),
        ));
    }
    if a.pm_low >= a.pm_high {
        return Err(ContractError::config_validation(
            "actuator.pm_low / actuator.pm_high",
            format!(
                "pm_low ({}) must be < pm_high ({})",
                a.pm_low, a.pm_high
            ),
        ));
    }
    Ok(())
}

fn validate_command_channel(blueprint: &NodeBlueprint) -> Result<(), ContractError> {
    let cc = &blueprint.command_channel;
    if cc.enabled && cc.poll_interval_ms == 0 {
        return Err(ContractError::config_validation(
            "command_channel.poll_interval_ms",
            "poll_interval_ms must be > 0",
        ));
    }
    if cc.enabled && cc.max_frame_len == 0 {
        return Err(ContractError::config_validation(
            "command_channel.max_frame_len",
            "max_frame_len must be > 0",
        ));
    }
    if cc.enabled && cc.source.trim().is_empty() {
        return Err(ContractError::config_validation(
            "command_channel.source",
            "source cannot be empty",
        ));
    }
    Ok(())
}

fn validate_transport(blueprint: &NodeBlueprint) -> Result<(), ContractError> {
    let transport = &blueprint.transport;
    let required = match transport.kind {
        TransportKind::Log => None,
        TransportKind::File => Some("path"),
        TransportKind::Udp => Some("addr"),
    };
    if let Some(key) = required {
        if !transport.params.contains_key(key) {
            return Err(ContractError::config_validation(
                format!("transport.params.{key}"),
                format!("transport kind {:?} requires '{key}'", transport.kind),
            ));
        }
    }
    Ok(())
}
