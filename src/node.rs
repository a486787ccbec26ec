//! The node loop: one task draining one queue, so the commissioning
//! controller and the attribute bridge never run concurrently.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::bridge::{AttributeBridge, WriteOutcome};
use crate::commissioning::Commissioning;
use crate::config::Config;
use crate::driver::{Actuator, DeferredInit, InputSource};
use crate::endpoints;
use crate::stack::{SignalKind, StackHandle, ZigbeeStack};
use crate::timer::Timer;
use crate::NodeEvent;

/// Register everything with the stack and start it without autostart. The
/// stack answers with `SkipStartup` on `events`, which the node loop picks up.
pub fn bootstrap<S: ZigbeeStack>(
    stack: &StackHandle<S>,
    config: &Config,
    events: mpsc::Sender<NodeEvent>,
) -> Result<()> {
    let endpoints = endpoints::build(config);
    info!(
        "End device role: aging timeout {} min, keep-alive {} ms",
        config.commissioning.ed_aging_timeout_min, config.commissioning.keep_alive_ms
    );
    info!("Registering {} endpoints", endpoints.len());

    stack
        .with_lock(|stack| {
            stack.register_event_sink(events);
            if let Err(e) = stack.register_endpoints(endpoints) {
                warn!("Failed to register endpoints: {}", e);
            }
            stack.set_primary_channel_mask(config.commissioning.primary_channel_mask)?;
            stack.start(false)
        })
        .context("starting Zigbee stack")
}

pub struct Node<S, T, D, A> {
    commissioning: Commissioning<S, T, D>,
    bridge: AttributeBridge<S, A>,
}

impl<S, T, D, A> Node<S, T, D, A>
where
    S: ZigbeeStack,
    T: Timer,
    D: DeferredInit,
    A: Actuator,
{
    pub fn new(commissioning: Commissioning<S, T, D>, bridge: AttributeBridge<S, A>) -> Self {
        Self {
            commissioning,
            bridge,
        }
    }

    pub fn commissioning(&self) -> &Commissioning<S, T, D> {
        &self.commissioning
    }

    pub fn bridge(&self) -> &AttributeBridge<S, A> {
        &self.bridge
    }

    pub fn handle(&mut self, event: NodeEvent) {
        match event {
            NodeEvent::Signal(signal) => {
                // Raised on every stack (re)boot, including after a factory reset
                if signal.kind == SignalKind::SkipStartup {
                    self.bridge.on_stack_restart();
                }
                self.commissioning.handle_signal(&signal)
            }
            NodeEvent::Action(action) => match self.bridge.handle_action(&action) {
                Ok(WriteOutcome::Applied(on)) => debug!("Light now {}", if on { "on" } else { "off" }),
                Ok(WriteOutcome::Ignored) => {}
                Err(e) => warn!(
                    "Rejected action 0x{:x}: {} ({})",
                    action.callback_id(),
                    e,
                    e.status()
                ),
            },
            NodeEvent::Edge(edge) => match edge.source {
                InputSource::BinaryInput => {
                    self.bridge.on_binary_input_edge();
                }
                InputSource::ToggleButton => self.bridge.on_toggle_button_edge(),
                InputSource::FactoryReset => self.commissioning.factory_reset(),
            },
            NodeEvent::Deferred(task) => self.commissioning.handle_deferred(task),
        }
    }

    /// Runs until every sender of the queue is gone
    pub async fn run(mut self, mut events: mpsc::Receiver<NodeEvent>) {
        info!("Node loop running");
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        info!("Event queue closed, node loop exiting");
    }
}
