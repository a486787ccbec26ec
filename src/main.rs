use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Error;
use bathroom_controller::logging;
use bathroom_controller::prelude::*;
use log::info;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Error> {
    logging::init(logging::DEFAULT_FILTER)?;

    info!("Starting config...");
    let config = Config::load()?;

    // Node event queue
    let (event_tx, event_rx) = mpsc::channel(config.queue_capacity);

    info!("Starting Zigbee stack...");
    let stack = StackHandle::new(SimulatedStack::new(&config.simulation));
    bootstrap(&stack, &config, event_tx.clone())?;

    // Brought up once the stack has started, see `Commissioning`
    let light = Arc::new(Mutex::new(LightDriver::new(&config.pins)));

    #[cfg(feature = "pi")]
    let inputs: Box<dyn EdgeSource> =
        Box::new(bathroom_controller::driver::gpio::GpioInputs::new(&config.pins));
    #[cfg(not(feature = "pi"))]
    let inputs: Box<dyn EdgeSource> = Box::new(bathroom_controller::driver::console::ConsoleInputs::new());

    let drivers = Drivers::new(light.clone(), inputs, event_tx.clone());

    let commissioning = Commissioning::new(
        stack.clone(),
        TokioTimer::new(event_tx.clone()),
        drivers,
        Duration::from_millis(config.commissioning.steering_retry_ms),
    );
    let bridge = AttributeBridge::new(stack.clone(), light, config.endpoints);
    let node = Node::new(commissioning, bridge);

    drop(event_tx);

    info!("Starting node loop...");
    tokio::select! {
        _ = node.run(event_rx) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Interrupted, shutting down");
        }
    }

    Ok(())
}
