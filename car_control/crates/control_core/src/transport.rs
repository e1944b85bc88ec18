use crate::error::TransportError;
use futures_util::future::{self, BoxFuture};
use futures_util::{Sink, SinkExt, Stream, StreamExt, TryStreamExt};
use std::pin::Pin;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;
pub type OpenResult = Result<(FrameSink, FrameStream), TransportError>;

/// Opens one text-frame connection. The stream ends when the peer closes.
pub trait Transport: Send + Sync + 'static {
    fn open(&self, endpoint: &Url) -> BoxFuture<'static, OpenResult>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

impl Transport for WsTransport {
    fn open(&self, endpoint: &Url) -> BoxFuture<'static, OpenResult> {
        let url = endpoint.to_string();
        Box::pin(async move {
            let (socket, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
            let (write, read) = socket.split();

            let sink = write.with(|text: String| {
                future::ready(Ok::<_, TransportError>(Message::Text(text.into())))
            });
            // Binary, ping and pong frames carry nothing for us; close ends the stream.
            let stream = read
                .map_err(TransportError::from)
                .try_filter_map(|msg| {
                    future::ready(Ok(match msg {
                        Message::Text(text) => Some(text.as_str().to_owned()),
                        _ => None,
                    }))
                });

            let sink: FrameSink = Box::pin(sink);
            let stream: FrameStream = Box::pin(stream);
            Ok((sink, stream))
        })
    }
}
