use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use lumen_common::Command;
use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS, RecvTimeoutError as MqttTimeout};
use std::{
    io::ErrorKind,
    net::{SocketAddr, ToSocketAddrs, UdpSocket},
    sync::mpsc::{Receiver, RecvTimeoutError},
    time::Duration,
};

/// How long a source may block before handing control back to the loop.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, PartialEq, Eq)]
pub enum Incoming {
    Payload(Vec<u8>),
    /// Nothing arrived within `POLL_TIMEOUT`.
    Timeout,
    /// The source will never produce anything again.
    Closed,
}

pub trait CommandSource {
    fn next_payload(&mut self) -> Result<Incoming>;
}

/// Receives one JSON command per UDP datagram.
pub struct NetHandler {
    socket: UdpSocket,
    scratch: Vec<u8>,
}

impl NetHandler {
    pub const MAX_PAYLOAD: usize = 4096;

    pub fn new(port: u16) -> Result<Self> {
        Self::bind(SocketAddr::new([0, 0, 0, 0].into(), port))
    }

    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(false)?;
        socket.set_read_timeout(Some(POLL_TIMEOUT))?;
        info!("Listening for commands on {}", socket.local_addr()?);

        Ok(Self {
            socket,
            scratch: vec![0; Self::MAX_PAYLOAD],
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

impl CommandSource for NetHandler {
    fn next_payload(&mut self) -> Result<Incoming> {
        match self.socket.recv_from(&mut self.scratch) {
            Ok((len, peer)) => {
                let payload = &self.scratch[..len];
                debug!(
                    "Message received [{}]: {}",
                    peer,
                    String::from_utf8_lossy(payload)
                );
                Ok(Incoming::Payload(payload.to_vec()))
            }
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                Ok(Incoming::Timeout)
            }
            Err(err) => Err(anyhow!(err)),
        }
    }
}

/// Takes commands from every publish on one MQTT topic.
pub struct MqttHandler {
    client: Client,
    connection: Connection,
    topic: String,
}

impl MqttHandler {
    const KEEP_ALIVE: Duration = Duration::from_secs(60);
    const RECONNECT_DELAY: Duration = Duration::from_secs(1);
    const REQUEST_CAPACITY: usize = 10;

    /// Nothing happens on the network before the first `next_payload`.
    pub fn new(client_id: &str, broker: &str, port: u16, topic: &str) -> Self {
        let mut options = MqttOptions::new(client_id, broker, port);
        options.set_keep_alive(Self::KEEP_ALIVE);
        let (client, connection) = Client::new(options, Self::REQUEST_CAPACITY);
        info!("Using MQTT broker {}:{}, topic {}", broker, port, topic);

        Self {
            client,
            connection,
            topic: topic.to_owned(),
        }
    }
}

impl CommandSource for MqttHandler {
    fn next_payload(&mut self) -> Result<Incoming> {
        let event = match self.connection.recv_timeout(POLL_TIMEOUT) {
            Ok(Ok(event)) => event,
            Ok(Err(err)) => {
                // The next poll reconnects
                warn!("MQTT connection error: {}", err);
                std::thread::sleep(Self::RECONNECT_DELAY);
                return Ok(Incoming::Timeout);
            }
            Err(MqttTimeout::Timeout) => return Ok(Incoming::Timeout),
            Err(MqttTimeout::Disconnected) => return Ok(Incoming::Closed),
        };

        match event {
            // Subscriptions don't survive a reconnect with a clean session
            Event::Incoming(Packet::ConnAck(_)) => {
                info!("Connected to MQTT broker, subscribing to {}", self.topic);
                self.client.try_subscribe(self.topic.as_str(), QoS::AtMostOnce)?;
                Ok(Incoming::Timeout)
            }
            Event::Incoming(Packet::Publish(publish)) => {
                debug!(
                    "Message received [{}]: {}",
                    publish.topic,
                    String::from_utf8_lossy(&publish.payload)
                );
                Ok(Incoming::Payload(publish.payload.to_vec()))
            }
            _ => Ok(Incoming::Timeout),
        }
    }
}

/// In-process source, mostly for embedding the app.
impl CommandSource for Receiver<Vec<u8>> {
    fn next_payload(&mut self) -> Result<Incoming> {
        match self.recv_timeout(POLL_TIMEOUT) {
            Ok(payload) => Ok(Incoming::Payload(payload)),
            Err(RecvTimeoutError::Timeout) => Ok(Incoming::Timeout),
            Err(RecvTimeoutError::Disconnected) => Ok(Incoming::Closed),
        }
    }
}

/// Fire and forget, there is no acknowledgement.
pub fn send_command(addr: impl ToSocketAddrs, command: &Command) -> Result<()> {
    let socket = UdpSocket::bind(SocketAddr::new([0, 0, 0, 0].into(), 0))?;
    let payload = command.to_payload();
    if payload.len() > NetHandler::MAX_PAYLOAD {
        return Err(anyhow!(
            "Command is too big ({} bytes, max {})",
            payload.len(),
            NetHandler::MAX_PAYLOAD
        ));
    }
    socket.send_to(&payload, addr)?;
    Ok(())
}
