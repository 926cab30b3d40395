use std::fmt::Debug;
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{sleep, spawn, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use tungstenite::{accept, Error, HandshakeError, Message, WebSocket};

type Client = (WebSocket<TcpStream>, SocketAddr);

/// Runs in the background and exchanges messages with the UI loop over mpscs.
pub trait Updater {
    /// Starts the `Updater` without blocking.
    fn start<I, O>(&mut self) -> Result<UpdaterChannel<I, O>>
    where
        I: DeserializeOwned + Send + Sync + Debug + 'static,
        O: Serialize + Send + Sync + Debug + 'static;
    /// Stops the `Updater` if currently running.
    /// Returns `Err` if its thread panicked.
    fn stop(&mut self) -> Result<()>;
}

/// Both ends of the channel to an updater, named from the user's point of view.
pub struct UpdaterChannel<I, O>
where
    I: DeserializeOwned + Send + Sync + Debug + 'static,
    O: Serialize + Send + Sync + Debug + 'static,
{
    /// Messages received by the updater.
    rx: Receiver<I>,
    /// Messages the updater should send.
    tx: Sender<O>,
}

impl<I, O> UpdaterChannel<I, O>
where
    I: DeserializeOwned + Send + Sync + Debug + 'static,
    O: Serialize + Send + Sync + Debug + 'static,
{
    pub fn new(rx: Receiver<I>, tx: Sender<O>) -> Self {
        Self { rx, tx }
    }

    pub fn rx(&mut self) -> &mut Receiver<I> {
        &mut self.rx
    }

    pub fn tx(&mut self) -> &mut Sender<O> {
        &mut self.tx
    }
}

/// Serves any number of websocket clients.
///
/// Every outgoing message is broadcast to all clients, incoming JSON text messages from any client
/// are forwarded to the user. Clients which disconnect are dropped.
pub struct WebsocketUpdater {
    address: String,
    local_addr: Option<SocketAddr>,
    thread_handle: Option<(JoinHandle<()>, Sender<()>)>,
}

impl WebsocketUpdater {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            local_addr: None,
            thread_handle: None,
        }
    }

    /// The address the websocket listens on once started, with the actual port if `0` was asked for.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Logs a socket error. Returns `true` if the client is gone.
    fn client_lost(error: Error, addr: &SocketAddr, action: &str) -> bool {
        match error {
            Error::ConnectionClosed | Error::AlreadyClosed => {
                log::info!("Websocket connection to {} was closed", addr);
                true
            }
            Error::Io(err) if err.kind() == ErrorKind::WouldBlock => false,
            err => {
                log::error!("{} websocket at {} failed: {:?}", action, addr, err);
                false
            }
        }
    }

    fn accept_client(stream: TcpStream, clients: &mut Vec<Client>) {
        let addr = match stream.peer_addr() {
            Ok(addr) => addr,
            Err(err) => {
                log::error!("Dropping a connection without peer address: {:?}", err);
                return;
            }
        };
        match accept(stream) {
            Ok(mut websocket) => {
                // Reads must not block the loop.
                if let Err(err) = websocket.get_mut().set_nonblocking(true) {
                    log::error!("Dropping websocket from {}: {:?}", addr, err);
                    return;
                }
                log::info!("Accepted a websocket connection from {}", addr);
                clients.push((websocket, addr));
            }
            Err(HandshakeError::Interrupted(_)) => {}
            Err(HandshakeError::Failure(err)) => {
                log::error!("Websocket handshake with {} failed: {:?}", addr, err)
            }
        }
    }

    fn broadcast<O>(clients: &mut Vec<Client>, message: &O)
    where
        O: Serialize + Debug,
    {
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(error) => {
                log::error!("Failed to serialize {:?}: {}", message, error);
                return;
            }
        };

        clients.retain_mut(|(socket, addr)| {
            match socket.write_message(Message::Text(text.clone())) {
                Ok(()) => true,
                Err(error) => !Self::client_lost(error, addr, "Writing to"),
            }
        });
    }

    /// Forwards at most one message per client.
    fn receive<I>(clients: &mut Vec<Client>, sender: &Sender<I>)
    where
        I: DeserializeOwned + Debug,
    {
        clients.retain_mut(|(socket, addr)| match socket.read_message() {
            Ok(Message::Text(text)) => {
                match serde_json::from_str(&text) {
                    Ok(message) => {
                        log::debug!("Received from {}: {:?}", addr, message);
                        let _ = sender.send(message);
                    }
                    Err(error) => log::error!("Invalid message from {}: {}", addr, error),
                }
                true
            }
            Ok(Message::Close(_)) => {
                log::info!("{} closed the websocket", addr);
                true
            }
            Ok(_) => true,
            Err(error) => !Self::client_lost(error, addr, "Reading from"),
        });
    }
}

impl Updater for WebsocketUpdater {
    fn start<I, O>(&mut self) -> Result<UpdaterChannel<I, O>>
    where
        I: DeserializeOwned + Send + Sync + Debug + 'static,
        O: Serialize + Send + Sync + Debug + 'static,
    {
        let (to_user, rx) = channel::<I>();
        let (tx, from_user) = channel::<O>();
        let (halt_tx, halt_rx) = channel::<()>();

        log::info!("Opening websocket on '{}'", self.address);
        let server = TcpListener::bind(&self.address)
            .with_context(|| format!("Binding the viewer websocket to {}", self.address))?;
        server.set_nonblocking(true)?;
        self.local_addr = Some(server.local_addr()?);

        let handle = spawn(move || {
            let mut clients = Vec::new();
            loop {
                if halt_rx.try_recv().is_ok() {
                    return;
                }

                match server.accept() {
                    Ok((stream, _)) => Self::accept_client(stream, &mut clients),
                    Err(err) if err.kind() == ErrorKind::WouldBlock => {}
                    Err(err) => log::error!("Accepting a websocket client failed: {:?}", err),
                }

                Self::receive(&mut clients, &to_user);

                while let Ok(message) = from_user.try_recv() {
                    Self::broadcast(&mut clients, &message);
                }

                // Pause the current thread to not use CPU for no reason.
                sleep(Duration::from_millis(1));
            }
        });
        self.thread_handle = Some((handle, halt_tx));

        Ok(UpdaterChannel::new(rx, tx))
    }

    fn stop(&mut self) -> Result<()> {
        match self.thread_handle.take() {
            Some((handle, halt)) => {
                // The thread may already have returned on its own.
                let _ = halt.send(());
                handle.join().map_err(|err| {
                    log::error!("The websocket thread panicked: {:?}", err);
                    anyhow!("The websocket thread panicked")
                })
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_without_start_is_fine() {
        let mut updater = WebsocketUpdater::new("localhost:0");
        assert!(updater.stop().is_ok());
    }

    #[test]
    fn start_and_stop() {
        let mut updater = WebsocketUpdater::new("127.0.0.1:0");
        let mut channel: UpdaterChannel<String, String> = updater.start().unwrap();
        assert_ne!(updater.local_addr().unwrap().port(), 0);
        channel.tx().send("hello".to_string()).unwrap();
        assert!(channel.rx().try_recv().is_err());
        assert!(updater.stop().is_ok());
    }

    #[test]
    fn relays_between_client_and_user() {
        let mut updater = WebsocketUpdater::new("127.0.0.1:0");
        let mut channel: UpdaterChannel<String, String> = updater.start().unwrap();
        let addr = updater.local_addr().unwrap();

        let stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let url = format!("ws://{}/", addr);
        let (mut client, _) = tungstenite::client(url.as_str(), stream).unwrap();

        client
            .write_message(Message::Text("\"ping\"".to_string()))
            .unwrap();
        let received = channel
            .rx()
            .recv_timeout(Duration::from_secs(5))
            .unwrap();
        assert_eq!(received, "ping");

        channel.tx().send("pong".to_string()).unwrap();
        assert_eq!(
            client.read_message().unwrap(),
            Message::Text("\"pong\"".to_string())
        );
        assert!(updater.stop().is_ok());
    }
}
