//! WebSocket subscription for one push channel.

use futures::stream::{self, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use tracelens_core::{Channel, ChannelFrame, EventStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum State {
    Connecting(Url),
    Open(Socket),
    Done,
}

/// Connects to `url` and yields decoded frames for `channel`.
///
/// The first item is [`ChannelFrame::Opened`] or [`ChannelFrame::Failed`].
/// The stream ends on a close frame; dropping it drops the socket.
pub fn subscribe(url: Url, channel: Channel) -> EventStream {
    stream::unfold(State::Connecting(url), move |state| async move {
        match state {
            State::Connecting(url) => match connect_async(url.as_str()).await {
                Ok((socket, _)) => {
                    info!(%channel, %url, "Channel connected");
                    Some((ChannelFrame::Opened, State::Open(socket)))
                }
                Err(e) => {
                    warn!(%channel, %url, error = %e, "Channel handshake failed");
                    Some((ChannelFrame::Failed(e.to_string()), State::Done))
                }
            },
            State::Open(socket) => next_frame(socket, channel).await,
            State::Done => None,
        }
    })
    .boxed()
}

async fn next_frame(mut socket: Socket, channel: Channel) -> Option<(ChannelFrame, State)> {
    loop {
        match socket.next().await {
            Some(Ok(Message::Text(text))) => {
                let frame = match channel.decode(&text) {
                    Ok(event) => ChannelFrame::Event(event),
                    Err(e) => {
                        warn!(%channel, error = %e, "Dropping malformed channel frame");
                        ChannelFrame::Malformed(e.to_string())
                    }
                };
                return Some((frame, State::Open(socket)));
            }
            Some(Ok(Message::Close(_))) | None => {
                info!(%channel, "Channel closed by remote");
                return None;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                warn!(%channel, error = %e, "Channel transport error");
                return Some((ChannelFrame::Failed(e.to_string()), State::Done));
            }
        }
    }
}

/// A stream that fails immediately, for URLs that could not be built.
pub fn failed(channel: Channel, reason: String) -> EventStream {
    debug!(%channel, %reason, "Channel unavailable");
    stream::once(async move { ChannelFrame::Failed(reason) }).boxed()
}
