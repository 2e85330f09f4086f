//! Standalone WebSocket notification channel.
//!
//! Used by `toad watch` when no dev-server provides a hot channel. Clients
//! are accepted on a background thread; a second thread polls them for
//! `@toad:hmr` reports and forwards each one over a crossbeam channel.

use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use crossbeam::channel::Sender;
use parking_lot::Mutex;
use tungstenite::WebSocket;
use tungstenite::protocol::Message;

use super::message::{ClientHashReport, HotMessage};
use crate::host::HotChannel;

/// Maximum port retry attempts
const MAX_PORT_RETRIES: u16 = 10;

/// Poll interval of the acceptor and reader threads
const POLL_INTERVAL: Duration = Duration::from_millis(100);

type Clients = Arc<Mutex<Vec<WebSocket<TcpStream>>>>;

pub struct HotServer {
    clients: Clients,
    port: u16,
    stop: Arc<AtomicBool>,
}

impl HotServer {
    /// Bind near `base_port` and start the acceptor and reader threads.
    pub fn start(base_port: u16, reports: Sender<ClientHashReport>) -> Result<Arc<Self>> {
        let (listener, port) = try_bind_port(base_port, MAX_PORT_RETRIES)?;
        listener.set_nonblocking(true)?;

        let server = Arc::new(Self {
            clients: Arc::new(Mutex::new(Vec::new())),
            port,
            stop: Arc::new(AtomicBool::new(false)),
        });

        let clients = Arc::clone(&server.clients);
        let stop = Arc::clone(&server.stop);
        std::thread::spawn(move || accept_loop(listener, clients, stop));

        let clients = Arc::clone(&server.clients);
        let stop = Arc::clone(&server.stop);
        std::thread::spawn(move || reader_loop(clients, reports, stop));

        Ok(server)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    /// Send a message to every client, dropping the ones that fail.
    pub fn broadcast(&self, message: &HotMessage) {
        let msg = Message::Text(message.to_json().into());
        let mut clients = self.clients.lock();
        if clients.is_empty() {
            crate::debug!("hmr"; "no clients connected");
            return;
        }
        clients.retain_mut(|ws| match ws.send(msg.clone()) {
            Ok(()) => true,
            Err(e) => {
                crate::debug!("hmr"; "client disconnected: {}", e);
                false
            }
        });
        crate::debug!("hmr"; "broadcast to {} clients", clients.len());
    }

    /// Stop both background threads.
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.clients.lock().clear();
    }
}

impl HotChannel for HotServer {
    fn send(&self, message: &HotMessage) {
        self.broadcast(message);
    }
}

impl Drop for HotServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

fn accept_loop(listener: TcpListener, clients: Clients, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, addr)) => {
                crate::debug!("hmr"; "client connected: {}", addr);
                // blocking during the handshake, non-blocking for polling after
                let _ = stream.set_nonblocking(false);
                match tungstenite::accept(stream) {
                    Ok(mut ws) => {
                        let _ = ws.get_ref().set_nonblocking(true);
                        let connected = Message::Text(HotMessage::Connected.to_json().into());
                        if let Err(e) = ws.send(connected) {
                            crate::log!("hmr"; "failed to send connected message: {}", e);
                            continue;
                        }
                        clients.lock().push(ws);
                    }
                    Err(e) => crate::log!("hmr"; "handshake failed: {}", e),
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                crate::log!("hmr"; "accept error: {}", e);
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

fn reader_loop(clients: Clients, reports: Sender<ClientHashReport>, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::SeqCst) {
        std::thread::sleep(POLL_INTERVAL);

        let mut clients = clients.lock();
        let mut disconnected = Vec::new();
        for (i, ws) in clients.iter_mut().enumerate() {
            // drain everything buffered for this client
            loop {
                match ws.read() {
                    Ok(Message::Text(text)) => {
                        if let Some(report) = ClientHashReport::from_json(&text) {
                            if reports.send(report).is_err() {
                                return;
                            }
                        } else {
                            crate::debug!("hmr"; "ignoring frame: {}", &*text);
                        }
                    }
                    Ok(Message::Close(_)) => {
                        disconnected.push(i);
                        break;
                    }
                    Ok(_) => {}
                    Err(tungstenite::Error::Io(ref e))
                        if e.kind() == std::io::ErrorKind::WouldBlock =>
                    {
                        break;
                    }
                    Err(_) => {
                        disconnected.push(i);
                        break;
                    }
                }
            }
        }
        for i in disconnected.into_iter().rev() {
            clients.remove(i);
        }
    }
}

/// Try binding to port, retry with incremented port if in use
fn try_bind_port(base_port: u16, max_retries: u16) -> Result<(TcpListener, u16)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind(format!("127.0.0.1:{}", port)) {
            Ok(listener) => {
                let actual_port = listener.local_addr()?.port();
                return Ok((listener, actual_port));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow::anyhow!(
        "Failed to bind WebSocket server after {} attempts: {}",
        max_retries,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel;

    #[test]
    fn test_try_bind_port_skips_taken_port() {
        let (taken, port) = try_bind_port(0, 1).unwrap();
        let (_next, next_port) = try_bind_port(port, 3).unwrap();
        assert_ne!(port, next_port);
        drop(taken);
    }

    #[test]
    fn test_report_roundtrip() {
        let (tx, rx) = channel::unbounded();
        let server = HotServer::start(0, tx).unwrap();

        let url = format!("ws://127.0.0.1:{}", server.port());
        let (mut client, _) = tungstenite::connect(url).unwrap();

        let Message::Text(hello) = client.read().unwrap() else {
            panic!("expected text frame");
        };
        assert_eq!(HotMessage::from_json(&hello), Some(HotMessage::Connected));

        let frame = r#"{"type":"custom","event":"@toad:hmr","data":["/@toad/module/a.tsx","00"]}"#;
        client.send(Message::Text(frame.to_string().into())).unwrap();
        let report = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(report.id, "/@toad/module/a.tsx");

        server.broadcast(&HotMessage::js_update(["/a.tsx"], 1));
        let Message::Text(update) = client.read().unwrap() else {
            panic!("expected text frame");
        };
        assert!(update.contains("js-update"));

        server.shutdown();
    }
}
