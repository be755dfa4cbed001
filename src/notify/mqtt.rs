use super::notifier::MessagePublisher;
use crate::config::BrokerConfig;
use crate::credentials::BrokerCredentials;
use crate::error::NotifyError;
use async_trait::async_trait;
use parking_lot::Mutex;
use rumqttc::{
    AsyncClient, Event, EventLoop, MqttOptions, NetworkOptions, Outgoing, Packet, QoS, Transport,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// A ring message waiting to be handed to the MQTT client
type QueuedMessage = (String, Vec<u8>);

/// MQTT client over mutual TLS with a persistent connection.
///
/// Publishes land in an unbounded outbox that a forwarding task feeds into
/// the client, so a publish never waits on the broker. While the broker is
/// unreachable messages stay queued and drain at the configured rate once
/// the event loop reconnects.
pub struct MqttPublisher {
    client: AsyncClient,
    outbox: Mutex<Option<mpsc::UnboundedSender<QueuedMessage>>>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
    forwarder: Mutex<Option<JoinHandle<()>>>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
    disconnect_timeout: Duration,
}

impl MqttPublisher {
    /// Read the TLS material and start the event loop
    pub async fn connect(
        config: &BrokerConfig,
        credentials: &BrokerCredentials,
    ) -> Result<Self, NotifyError> {
        let ca = read_certificate(&credentials.root_ca).await?;
        let certificate = read_certificate(&credentials.certificate).await?;
        let private_key = read_certificate(&credentials.private_key).await?;

        let mut options = MqttOptions::new(
            config.client_id.clone(),
            credentials.endpoint.clone(),
            credentials.port,
        );
        options.set_transport(Transport::tls(ca, Some((certificate, private_key)), None));

        info!(
            "Connecting to broker {}:{} as '{}'",
            credentials.endpoint, credentials.port, config.client_id
        );

        Ok(Self::start(options, config))
    }

    /// Spawn the event loop and the outbox forwarder for the given options
    fn start(mut options: MqttOptions, config: &BrokerConfig) -> Self {
        options
            .set_keep_alive(KEEP_ALIVE)
            .set_pending_throttle(config.drain_interval());

        let (client, mut event_loop) = AsyncClient::new(options, config.request_channel_capacity);

        let mut network = NetworkOptions::new();
        network.set_connection_timeout(config.connect_timeout_seconds);
        event_loop.set_network_options(network);

        let connected = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();
        let event_loop = tokio::spawn(drive_event_loop(
            event_loop,
            Arc::clone(&connected),
            cancel.clone(),
        ));

        let (outbox, queued) = mpsc::unbounded_channel();
        let forwarder = tokio::spawn(forward_outbox(queued, client.clone(), cancel.clone()));

        Self {
            client,
            outbox: Mutex::new(Some(outbox)),
            connected,
            cancel,
            forwarder: Mutex::new(Some(forwarder)),
            event_loop: Mutex::new(Some(event_loop)),
            disconnect_timeout: config.connect_timeout(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

#[async_trait]
impl MessagePublisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), NotifyError> {
        if !self.is_connected() {
            warn!("Broker offline, queueing message for '{}'", topic);
        }

        match self.outbox.lock().as_ref() {
            Some(outbox) => outbox
                .send((topic.to_string(), payload))
                .map_err(|_| NotifyError::Publish("broker outbox closed".to_string())),
            None => Err(NotifyError::Publish(
                "broker client disconnected".to_string(),
            )),
        }
    }

    async fn disconnect(&self) -> Result<(), NotifyError> {
        // Closing the outbox lets the forwarder finish what is queued
        drop(self.outbox.lock().take());
        let forwarder = self.forwarder.lock().take();
        let handle = self.event_loop.lock().take();
        let Some(mut handle) = handle else {
            debug!("Broker client already disconnected");
            return Ok(());
        };

        let seconds = self.disconnect_timeout.as_secs();
        let graceful = timeout(self.disconnect_timeout, async {
            if let Some(forwarder) = forwarder {
                let _ = forwarder.await;
            }
            self.client
                .disconnect()
                .await
                .map_err(|e| NotifyError::Publish(e.to_string()))?;
            let _ = (&mut handle).await;
            Ok::<(), NotifyError>(())
        })
        .await;

        self.cancel.cancel();
        self.connected.store(false, Ordering::Release);

        match graceful {
            Ok(result) => result,
            Err(_) => {
                handle.abort();
                Err(NotifyError::Timeout { seconds })
            }
        }
    }
}

impl Drop for MqttPublisher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn read_certificate(path: &Path) -> Result<Vec<u8>, NotifyError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| NotifyError::Certificate {
            path: path.to_path_buf(),
            source,
        })
}

async fn forward_outbox(
    mut queued: mpsc::UnboundedReceiver<QueuedMessage>,
    client: AsyncClient,
    cancel: CancellationToken,
) {
    loop {
        let (topic, payload) = tokio::select! {
            _ = cancel.cancelled() => break,
            next = queued.recv() => match next {
                Some(message) => message,
                None => break,
            },
        };

        // Waits while the client's request channel is full
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = client.publish(topic.as_str(), QoS::AtLeastOnce, false, payload) => {
                if let Err(e) = result {
                    error!("Failed to hand message for '{}' to the broker client: {}", topic, e);
                }
            }
        }
    }
    debug!("Broker outbox forwarder stopped");
}

async fn drive_event_loop(
    mut event_loop: EventLoop,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Broker event loop cancelled");
                break;
            }
            event = event_loop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    connected.store(true, Ordering::Release);
                    info!("Connected to broker ({:?})", ack.code);
                }
                Ok(Event::Incoming(Packet::PubAck(ack))) => {
                    debug!("Broker acknowledged publish {}", ack.pkid);
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    connected.store(false, Ordering::Release);
                    info!("Broker disconnect sent");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    if connected.swap(false, Ordering::AcqRel) {
                        error!("Broker connection lost: {}", e);
                    } else {
                        debug!("Broker connection attempt failed: {}", e);
                    }

                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = sleep(RECONNECT_DELAY) => {}
                    }
                }
            }
        }
    }
}
