//! Wires the codec, device model, simulation bus, and connection engine
//! together into the set of long-lived tasks one simulated device runs.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use iec104_bus::{BusRuntime, PeerHandler};
use iec104_config::{DeviceConfig, DeviceVariant, VariantParams};
use iec104_device::{Device, DeviceError, PhysicalState};

fn build_physical_state(config: &DeviceConfig) -> Result<PhysicalState, DeviceError> {
    match (&config.variant, &config.params) {
        (DeviceVariant::Source, VariantParams::Source { voltage }) => Ok(PhysicalState::new_source(*voltage)),
        (
            DeviceVariant::Transmission,
            VariantParams::Transmission {
                branch_resistance,
                initial_breakers,
            },
        ) => Ok(PhysicalState::new_transmission(*initial_breakers, branch_resistance.clone())),
        (DeviceVariant::Load, VariantParams::Load { load }) => Ok(PhysicalState::new_load(*load)),
        (variant, _) => Err(DeviceError::VariantMismatch(variant.label())),
    }
}

/// Checks that a variant has the neighbors its simulation tick needs
/// before spawning anything (§4.2.2: Transmission reads one inbound and
/// one outbound neighbor every tick, Load reads one inbound neighbor).
fn validate_neighbors(config: &DeviceConfig) -> Result<(), DeviceError> {
    match config.variant {
        DeviceVariant::Source => Ok(()),
        DeviceVariant::Transmission => {
            if config.inbound_neighbors.is_empty() {
                return Err(DeviceError::NoNeighbor("inbound"));
            }
            if config.outbound_neighbors.is_empty() {
                return Err(DeviceError::NoNeighbor("outbound"));
            }
            Ok(())
        },
        DeviceVariant::Load => {
            if config.inbound_neighbors.is_empty() {
                return Err(DeviceError::NoNeighbor("inbound"));
            }
            Ok(())
        },
    }
}

/// Builds the device model and spawns every task it needs (§5), running
/// until `cancel` fires and every spawned task has joined.
pub async fn run(config: DeviceConfig, cancel: CancellationToken) -> anyhow::Result<()> {
    let state = build_physical_state(&config)?;
    validate_neighbors(&config)?;
    let device = Arc::new(Device::new(
        config.guid,
        config.inbound_neighbors.clone(),
        config.outbound_neighbors.clone(),
        state,
    ));

    let bus = Arc::new(
        BusRuntime::bind(device.guid32(), config.bus_bind_addr, config.bus_broadcast_addr).await?,
    );

    let mut expected_neighbors: Vec<u32> = config
        .inbound_neighbors
        .iter()
        .chain(config.outbound_neighbors.iter())
        .map(|&g| u32::from(g))
        .collect();
    expected_neighbors.sort_unstable();
    expected_neighbors.dedup();

    let mut tasks = Vec::new();

    tasks.push(tokio::spawn({
        let bus = bus.clone();
        let cancel = cancel.child_token();
        async move { bus.run_discovery_broadcaster(expected_neighbors, cancel).await }
    }));

    tasks.push(tokio::spawn({
        let bus = bus.clone();
        let handler: Arc<dyn PeerHandler> = device.clone();
        let cancel = cancel.child_token();
        async move { bus.run_receive_loop(handler, cancel).await }
    }));

    tasks.push(tokio::spawn({
        let device = device.clone();
        let bus = bus.clone();
        let cancel = cancel.child_token();
        async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = device.simulation_tick(&bus) => {},
                }
            }
        }
    }));

    let listener_device = device.clone();
    let listener_cancel = cancel.child_token();
    let listener_task = tokio::spawn(async move {
        iec104_engine::run_listener(
            config.tcp_bind_addr,
            config.allow_concurrent,
            listener_device,
            listener_cancel,
        )
        .await
    });

    info!(guid = device.guid, "device bootstrapped, all tasks running");

    cancel.cancelled().await;
    info!(guid = device.guid, "shutdown requested, waiting for tasks to finish");

    for task in tasks {
        let _ = task.await;
    }
    match listener_task.await {
        Ok(Ok(())) => {},
        Ok(Err(e)) => tracing::error!("listener exited with error: {e}"),
        Err(e) => tracing::error!("listener task panicked: {e}"),
    }

    Ok(())
}
