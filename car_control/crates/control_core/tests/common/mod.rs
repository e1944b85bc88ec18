#![allow(dead_code)]

use control_core::transport::{FrameSink, FrameStream, OpenResult, Transport};
use control_core::TransportError;
use futures_util::future::{self, BoxFuture};
use futures_util::{sink, stream};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use url::Url;

pub enum Attempt {
    Refuse,
    Accept,
}

/// The remote end of one accepted fake connection.
pub struct Peer {
    pub to_client: mpsc::UnboundedSender<Result<String, TransportError>>,
    pub from_client: mpsc::UnboundedReceiver<String>,
}

/// Plays back a fixed list of connection attempts. Once the script runs out,
/// further attempts hang forever.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Attempt>>,
    peers: mpsc::UnboundedSender<Peer>,
    attempts: Arc<Mutex<usize>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Attempt>) -> (Self, mpsc::UnboundedReceiver<Peer>, Arc<Mutex<usize>>) {
        let (peers, peer_rx) = mpsc::unbounded_channel();
        let attempts = Arc::new(Mutex::new(0));
        let transport = Self {
            script: Mutex::new(script.into()),
            peers,
            attempts: Arc::clone(&attempts),
        };
        (transport, peer_rx, attempts)
    }
}

impl Transport for ScriptedTransport {
    fn open(&self, _endpoint: &Url) -> BoxFuture<'static, OpenResult> {
        *self.attempts.lock().unwrap() += 1;
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Attempt::Refuse) => Box::pin(future::ready(Err(closed()))),
            Some(Attempt::Accept) => {
                let (out_tx, out_rx) = mpsc::unbounded_channel::<String>();
                let (in_tx, in_rx) = mpsc::unbounded_channel::<Result<String, TransportError>>();
                let _ = self.peers.send(Peer {
                    to_client: in_tx,
                    from_client: out_rx,
                });

                let frames = sink::unfold(out_tx, |tx, text: String| async move {
                    tx.send(text).map_err(|_| closed())?;
                    Ok::<_, TransportError>(tx)
                });
                let incoming = stream::unfold(in_rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                });

                let frames: FrameSink = Box::pin(frames);
                let incoming: FrameStream = Box::pin(incoming);
                Box::pin(future::ready(Ok((frames, incoming))))
            }
            None => Box::pin(future::pending()),
        }
    }
}

pub fn closed() -> TransportError {
    TransportError::WebSocket(tungstenite::Error::ConnectionClosed)
}
