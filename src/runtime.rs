// src/runtime.rs - Poll-driven control loop
//
// One task owns the node. It wakes on every scan tick and on every transport
// event, so inbound messages are always applied between two ticks and never
// concurrently with one.

use crate::{
    error::{Result, SireneError},
    node::Node,
    protocol::{Inbound, Outbound},
};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Outbound side of a transport.
pub trait Publisher: Send {
    fn publish(&mut self, message: &Outbound) -> Result<()>;
}

/// Collects published messages in memory.
impl Publisher for Vec<Outbound> {
    fn publish(&mut self, message: &Outbound) -> Result<()> {
        self.push(message.clone());
        Ok(())
    }
}

/// Inbound side of a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Session (re)established, subscriptions in place
    Connected,
    Message(Inbound),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    pub running: bool,
    pub scan_count: u64,
    pub error_count: u64,
    pub messages_in: u64,
    pub messages_out: u64,
    pub uptime_secs: u64,
}

/// Drives one node until the transport closes.
pub struct Runtime {
    node: Box<dyn Node>,
    scan_time: Duration,
    running: bool,
    scan_count: u64,
    error_count: u64,
    messages_in: u64,
    messages_out: u64,
    start_time: Instant,
}

impl Runtime {
    pub fn new(node: Box<dyn Node>, scan_time_ms: u64) -> Self {
        Self {
            node,
            scan_time: Duration::from_millis(scan_time_ms.max(1)),
            running: false,
            scan_count: 0,
            error_count: 0,
            messages_in: 0,
            messages_out: 0,
            start_time: Instant::now(),
        }
    }

    /// Run the control loop.
    ///
    /// Node and publish errors are counted and logged; the loop only ends
    /// when `events` is closed.
    pub async fn run<P: Publisher>(
        &mut self,
        mut events: mpsc::Receiver<TransportEvent>,
        publisher: &mut P,
    ) -> Result<()> {
        if self.running {
            return Err(SireneError::Config("Runtime is already running".into()));
        }
        self.running = true;
        info!(
            "Starting node '{}' with scan time: {}ms",
            self.node.name(),
            self.scan_time.as_millis()
        );

        let mut ticker = interval(self.scan_time);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let result = self.node.tick();
                    match result {
                        Ok(outbound) => {
                            self.scan_count += 1;
                            self.publish_all(outbound, publisher);
                        }
                        Err(e) => self.record_error("Scan cycle", &e),
                    }
                }
                event = events.recv() => match event {
                    Some(TransportEvent::Connected) => {
                        info!("Connected, announcing node '{}'", self.node.name());
                        let result = self.node.on_connect();
                        self.dispatch(result, "Connect", publisher);
                    }
                    Some(TransportEvent::Message(message)) => {
                        self.messages_in += 1;
                        debug!("Received {} bytes on {}", message.payload.len(), message.topic);
                        let result = self.node.handle(&message);
                        self.dispatch(result, &message.topic, publisher);
                    }
                    None => {
                        info!("Transport closed");
                        break;
                    }
                },
            }
        }

        self.running = false;
        info!("Node '{}' stopped", self.node.name());
        Ok(())
    }

    fn dispatch<P: Publisher>(&mut self, result: Result<Vec<Outbound>>, context: &str, publisher: &mut P) {
        match result {
            Ok(outbound) => self.publish_all(outbound, publisher),
            Err(e) => {
                self.error_count += 1;
                warn!("Dropped message on {}: {}", context, e);
            }
        }
    }

    fn publish_all<P: Publisher>(&mut self, outbound: Vec<Outbound>, publisher: &mut P) {
        for message in outbound {
            match publisher.publish(&message) {
                Ok(()) => self.messages_out += 1,
                Err(e) => self.record_error(&format!("Publish to {}", message.topic), &e),
            }
        }
    }

    fn record_error(&mut self, context: &str, e: &SireneError) {
        self.error_count += 1;
        error!("{} error #{}: {}", context, self.error_count, e);
    }

    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            running: self.running,
            scan_count: self.scan_count,
            error_count: self.error_count,
            messages_in: self.messages_in,
            messages_out: self.messages_out,
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }
}
