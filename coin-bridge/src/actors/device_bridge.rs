// coin-bridge/src/actors/device_bridge.rs
use actix::{Actor, AsyncContext, Context, Handler, Message, MessageResult, Recipient, SpawnHandle};
use chrono::Utc;
use common::{CoinInserted, DeviceConfig};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::connection::{BridgeSettings, DeviceStatus, LinkState, ReconnectDecision, ReconnectTracker};
use crate::discovery::{candidate_addresses, PortDiscovery, SerialPortDiscovery};
use crate::error::BridgeError;
use crate::link::{Connector, DeviceLink, SerialConnector};
use crate::protocol::{Command, DeviceMessage};

pub type SubscriptionId = Uuid;

/// Longest line accepted from the controller; longer runs are discarded up to the next newline
pub const MAX_LINE_LEN: u64 = 256;

/// Write a command line to the controller
#[derive(Message)]
#[rtype(result = "Result<(), BridgeError>")]
pub struct SendCommand(pub Command);

/// Register an observer for coin events
#[derive(Message)]
#[rtype(result = "SubscriptionId")]
pub struct Subscribe(pub Recipient<CoinInserted>);

#[derive(Message)]
#[rtype(result = "bool")]
pub struct Unsubscribe(pub SubscriptionId);

#[derive(Message)]
#[rtype(result = "DeviceStatus")]
pub struct GetDeviceStatus;

/// Drop the current link, re-arm the attempt counter and rediscover immediately
#[derive(Message)]
#[rtype(result = "()")]
pub struct ResetConnection;

/// Traffic from the reader/writer tasks of one link generation
#[derive(Message)]
#[rtype(result = "()")]
pub enum LinkEvent {
    Line { generation: u64, line: String },
    Closed { generation: u64, reason: String },
}

/// Actor owning the serial link to the coin acceptor
pub struct DeviceBridge {
    settings: BridgeSettings,
    connector: Box<dyn Connector>,
    discovery: Box<dyn PortDiscovery>,
    state: LinkState,
    address: Option<String>,
    tracker: ReconnectTracker,
    handshake_acknowledged: bool,
    observers: Vec<(SubscriptionId, Recipient<CoinInserted>)>,
    link_tx: Option<mpsc::UnboundedSender<String>>,
    // Opened but still inside the reset pulse
    pending_link: Option<Box<dyn DeviceLink>>,
    link_tasks: Vec<JoinHandle<()>>,
    reconnect_handle: Option<SpawnHandle>,
    // Bumped on every teardown; timers and link events of older generations are ignored
    generation: u64,
}

impl DeviceBridge {
    pub fn new(
        settings: BridgeSettings,
        connector: Box<dyn Connector>,
        discovery: Box<dyn PortDiscovery>,
    ) -> Self {
        let tracker = ReconnectTracker::new(settings.max_reconnect_attempts, settings.reconnect_delay);
        Self {
            settings,
            connector,
            discovery,
            state: LinkState::Disconnected,
            address: None,
            tracker,
            handshake_acknowledged: false,
            observers: Vec::new(),
            link_tx: None,
            pending_link: None,
            link_tasks: Vec::new(),
            reconnect_handle: None,
            generation: 0,
        }
    }

    /// Bridge over a real serial port, auto-discovering unless the config pins one
    pub fn serial(config: &DeviceConfig) -> Self {
        Self::new(
            BridgeSettings::from(config),
            Box::new(SerialConnector::new(config.baud_rate)),
            Box::new(SerialPortDiscovery),
        )
    }

    pub fn status(&self) -> DeviceStatus {
        DeviceStatus {
            connected: self.state == LinkState::Ready,
            address: self.address.clone(),
            reconnect_attempts: self.tracker.attempts(),
            state: self.state,
            failed: self.state == LinkState::Failed,
            handshake_acknowledged: self.handshake_acknowledged,
        }
    }

    /// Queue a command on the link; fails instead of buffering when not ready
    pub fn send(&self, command: Command) -> Result<(), BridgeError> {
        if self.state != LinkState::Ready {
            return Err(BridgeError::NotReady);
        }
        let tx = self.link_tx.as_ref().ok_or(BridgeError::NotReady)?;
        tracing::debug!("Sending device command: {}", command);
        tx.send(command.to_string()).map_err(|_| BridgeError::LinkClosed)
    }

    // One discovery cycle: try every candidate in order until one opens
    fn connect(&mut self, ctx: &mut Context<Self>) {
        self.reconnect_handle = None;

        if self.state != LinkState::Disconnected {
            tracing::debug!("Skipping connect while link is {:?}", self.state);
            return;
        }

        self.state = LinkState::Connecting;
        let candidates = candidate_addresses(self.settings.port.as_deref(), self.discovery.as_ref());
        if candidates.is_empty() {
            self.handle_link_lost(BridgeError::NoCandidates.to_string(), ctx);
            return;
        }

        tracing::info!("Trying coin acceptor ports: {:?}", candidates);
        for address in candidates {
            match self.connector.open(&address) {
                Ok(link) => {
                    self.begin_reset_pulse(address, link, ctx);
                    return;
                },
                Err(BridgeError::Busy { address }) => {
                    tracing::warn!("Port {} is busy, trying next candidate", address);
                },
                Err(e) => {
                    tracing::warn!("Could not open {}: {}", address, e);
                },
            }
        }

        self.handle_link_lost("no candidate port could be opened".to_string(), ctx);
    }

    // Emulate a power cycle of the board: both lines low, then DTR high, then wait for boot
    fn begin_reset_pulse(&mut self, address: String, mut link: Box<dyn DeviceLink>, ctx: &mut Context<Self>) {
        tracing::info!("Opened {}, resetting controller", address);
        self.state = LinkState::OpenPendingReset;
        self.address = Some(address);

        if let Err(e) = link.set_dtr(false).and_then(|_| link.set_rts(false)) {
            self.handle_link_lost(e.to_string(), ctx);
            return;
        }
        self.pending_link = Some(link);

        let generation = self.generation;
        ctx.run_later(self.settings.reset_low, move |act, ctx| {
            if act.generation != generation {
                return;
            }
            let raised = match act.pending_link.as_mut() {
                Some(link) => link.set_dtr(true),
                None => return,
            };
            if let Err(e) = raised {
                act.handle_link_lost(e.to_string(), ctx);
                return;
            }

            ctx.run_later(act.settings.boot_wait, move |act, ctx| {
                if act.generation != generation {
                    return;
                }
                if let Some(link) = act.pending_link.take() {
                    act.attach_link(link, ctx);
                }
            });
        });
    }

    // Split the link into a reader task and a writer task feeding back into the actor
    fn attach_link(&mut self, link: Box<dyn DeviceLink>, ctx: &mut Context<Self>) {
        let (read_half, write_half) = tokio::io::split(link);
        let (tx, rx) = mpsc::unbounded_channel::<String>();
        let generation = self.generation;

        let reader_addr = ctx.address();
        let reader = actix::spawn(async move {
            let mut reader = BufReader::new(read_half);
            let mut buf = Vec::new();
            let mut discarding = false;
            loop {
                buf.clear();
                match (&mut reader).take(MAX_LINE_LEN).read_until(b'\n', &mut buf).await {
                    Ok(0) => {
                        reader_addr.do_send(LinkEvent::Closed {
                            generation,
                            reason: "device closed the link".to_string(),
                        });
                        break;
                    },
                    Ok(_) => {
                        let complete = buf.last() == Some(&b'\n');
                        if discarding {
                            discarding = !complete;
                            continue;
                        }
                        if !complete && buf.len() as u64 >= MAX_LINE_LEN {
                            tracing::warn!("Discarding device line longer than {} bytes", MAX_LINE_LEN);
                            discarding = true;
                            continue;
                        }
                        let line = String::from_utf8_lossy(&buf).into_owned();
                        reader_addr.do_send(LinkEvent::Line { generation, line });
                    },
                    Err(e) => {
                        reader_addr.do_send(LinkEvent::Closed {
                            generation,
                            reason: format!("read failed: {}", e),
                        });
                        break;
                    },
                }
            }
        });

        let writer_addr = ctx.address();
        let writer = actix::spawn(async move {
            if let Err(e) = forward_lines(rx, write_half).await {
                writer_addr.do_send(LinkEvent::Closed {
                    generation,
                    reason: format!("write failed: {}", e),
                });
            }
        });

        self.link_tx = Some(tx);
        self.link_tasks = vec![reader, writer];
        self.state = LinkState::Ready;
        self.handshake_acknowledged = false;
        self.tracker.record_ready();

        tracing::info!(
            "Coin acceptor ready on {}",
            self.address.as_deref().unwrap_or("unknown port")
        );

        if let Err(e) = self.send(Command::Ready) {
            tracing::warn!("Failed to send handshake: {}", e);
        }
    }

    fn teardown(&mut self) {
        self.generation += 1;
        self.link_tx = None;
        self.pending_link = None;
        for task in self.link_tasks.drain(..) {
            task.abort();
        }
        self.address = None;
        self.handshake_acknowledged = false;
    }

    fn handle_link_lost(&mut self, reason: String, ctx: &mut Context<Self>) {
        if self.state == LinkState::Failed {
            return;
        }
        tracing::warn!("Coin acceptor link lost: {}", reason);

        self.teardown();
        self.state = LinkState::Disconnected;
        if let Some(handle) = self.reconnect_handle.take() {
            ctx.cancel_future(handle);
        }

        match self.tracker.record_failure() {
            ReconnectDecision::Retry(delay) => {
                tracing::info!(
                    "Reconnecting in {:?} (attempt {}/{})",
                    delay,
                    self.tracker.attempts(),
                    self.settings.max_reconnect_attempts
                );
                self.reconnect_handle = Some(ctx.run_later(delay, |act, ctx| act.connect(ctx)));
            },
            ReconnectDecision::GiveUp => {
                self.state = LinkState::Failed;
                tracing::error!(
                    "Coin acceptor unreachable after {} attempts, waiting for a manual reset",
                    self.tracker.attempts()
                );
            },
        }
    }

    fn handle_line(&mut self, line: &str) {
        match DeviceMessage::parse(line) {
            DeviceMessage::Coin { coin_type, value } => {
                tracing::info!("Coin detected: {} (value {})", coin_type, value);
                self.publish(CoinInserted {
                    value,
                    coin_type,
                    timestamp: Utc::now(),
                });
            },
            DeviceMessage::UnknownCoin(coin_type) => {
                tracing::warn!("Ignoring unknown coin type: {}", coin_type);
            },
            DeviceMessage::Status(text) => tracing::info!("Device status: {}", text),
            DeviceMessage::Error(text) => tracing::warn!("Device reported error: {}", text),
            DeviceMessage::Ready => {
                self.handshake_acknowledged = true;
                tracing::info!("Coin acceptor acknowledged handshake");
            },
            DeviceMessage::Unrecognized(text) => {
                if !text.is_empty() {
                    tracing::debug!("Unrecognized device line: {}", text);
                }
            },
        }
    }

    // Deliver to every observer in registration order, dropping observers whose actor has stopped
    fn publish(&mut self, event: CoinInserted) {
        self.observers.retain(|(id, observer)| {
            if observer.connected() {
                true
            } else {
                tracing::warn!("Coin observer {} is gone, unsubscribing", id);
                false
            }
        });

        for (_, observer) in &self.observers {
            observer.do_send(event.clone());
        }
    }
}

// Newline-terminate and write each queued command until the sender is dropped
async fn forward_lines<W: AsyncWrite + Unpin>(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut writer: W,
) -> std::io::Result<()> {
    while let Some(line) = rx.recv().await {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}

impl Actor for DeviceBridge {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            "DeviceBridge started, first discovery in {:?}",
            self.settings.startup_delay
        );

        // Give USB enumeration a head start at boot
        self.reconnect_handle = Some(ctx.run_later(self.settings.startup_delay, |act, ctx| act.connect(ctx)));
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.teardown();
        tracing::info!("DeviceBridge stopped");
    }
}

impl Handler<SendCommand> for DeviceBridge {
    type Result = Result<(), BridgeError>;

    fn handle(&mut self, msg: SendCommand, _ctx: &mut Self::Context) -> Self::Result {
        let result = self.send(msg.0);
        if let Err(e) = &result {
            tracing::warn!("Command {} not sent: {}", msg.0, e);
        }
        result
    }
}

impl Handler<Subscribe> for DeviceBridge {
    type Result = MessageResult<Subscribe>;

    fn handle(&mut self, msg: Subscribe, _ctx: &mut Self::Context) -> Self::Result {
        let id = Uuid::new_v4();
        self.observers.push((id, msg.0));
        tracing::debug!("Coin observer subscribed: {}", id);
        MessageResult(id)
    }
}

impl Handler<Unsubscribe> for DeviceBridge {
    type Result = bool;

    fn handle(&mut self, msg: Unsubscribe, _ctx: &mut Self::Context) -> Self::Result {
        let before = self.observers.len();
        self.observers.retain(|(id, _)| *id != msg.0);
        before != self.observers.len()
    }
}

impl Handler<GetDeviceStatus> for DeviceBridge {
    type Result = MessageResult<GetDeviceStatus>;

    fn handle(&mut self, _msg: GetDeviceStatus, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.status())
    }
}

impl Handler<ResetConnection> for DeviceBridge {
    type Result = ();

    fn handle(&mut self, _msg: ResetConnection, ctx: &mut Self::Context) -> Self::Result {
        tracing::info!("Coin acceptor reset requested");

        if let Some(handle) = self.reconnect_handle.take() {
            ctx.cancel_future(handle);
        }
        self.teardown();
        self.tracker.reset();
        self.state = LinkState::Disconnected;
        self.connect(ctx);
    }
}

impl Handler<LinkEvent> for DeviceBridge {
    type Result = ();

    fn handle(&mut self, msg: LinkEvent, ctx: &mut Self::Context) -> Self::Result {
        match msg {
            LinkEvent::Line { generation, line } if generation == self.generation => {
                self.handle_line(&line);
            },
            LinkEvent::Closed { generation, reason } if generation == self.generation => {
                self.handle_link_lost(reason, ctx);
            },
            _ => tracing::trace!("Dropping event from a stale link"),
        }
    }
}
