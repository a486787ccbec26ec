use std::io::{self, BufRead};
use std::thread;

use anyhow::{bail, Result};
use log::{info, warn};
use tokio::sync::mpsc;

use crate::NodeEvent;

use super::{EdgeEvent, EdgeSource, InputSource};

/// Edge source for running on a host: each line typed on stdin is one edge.
///
/// - `s` toggle-sense input
/// - `b` toggle button
/// - `r` factory reset
#[derive(Default)]
pub struct ConsoleInputs {
    active: bool,
}

impl ConsoleInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(line: &str) -> Option<InputSource> {
        match line.trim() {
            "s" | "sense" => Some(InputSource::BinaryInput),
            "b" | "button" => Some(InputSource::ToggleButton),
            "r" | "reset" => Some(InputSource::FactoryReset),
            _ => None,
        }
    }
}

impl EdgeSource for ConsoleInputs {
    fn activate(&mut self, events: mpsc::Sender<NodeEvent>) -> Result<()> {
        if self.active {
            bail!("console inputs already active");
        }
        self.active = true;

        info!("Console inputs: 's' sense edge, 'b' button edge, 'r' factory reset");

        // blocking_send must stay off the runtime's threads
        thread::Builder::new()
            .name("console-inputs".into())
            .spawn(move || {
                for line in io::stdin().lock().lines() {
                    let Ok(line) = line else { break };
                    let Some(source) = ConsoleInputs::parse(&line) else {
                        warn!("Unknown input '{}'", line.trim());
                        continue;
                    };

                    let edge = EdgeEvent {
                        source,
                        level: true,
                    };
                    if events.blocking_send(NodeEvent::Edge(edge)).is_err() {
                        break;
                    }
                }
                info!("Console inputs closed");
            })?;

        Ok(())
    }
}
