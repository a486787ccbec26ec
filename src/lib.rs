use driver::EdgeEvent;
use stack::{ActionCallback, AppSignal};
use timer::DeferredTask;

pub mod bridge;
pub mod commissioning;
pub mod config;
pub mod driver;
pub mod endpoints;
pub mod logging;
pub mod node;
pub mod stack;
pub mod timer;

#[cfg(test)]
mod testing;

pub mod prelude {
    pub use crate::{
        bridge::*, commissioning::*, config::*, driver::*, node::*, stack::sim::SimulatedStack,
        stack::*, timer::*,
    };
}

/// Events that should be processed by the node loop
#[derive(Clone, Debug)]
pub enum NodeEvent {
    /// Application signal raised by the stack
    Signal(AppSignal),
    /// Core action callback, e.g. a remote attribute write
    Action(ActionCallback),
    /// Edge on one of the physical inputs
    Edge(EdgeEvent),
    /// A one-shot timer fired
    Deferred(DeferredTask),
}
