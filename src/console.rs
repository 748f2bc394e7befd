use anyhow::{Context, Result};
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::select;
use tokio_tungstenite::connect_async;
use tracing::{info, warn};
use tungstenite::Error as WsError;
use tungstenite::client::IntoClientRequest;
use tungstenite::handshake::client::Request;
use tungstenite::http::header::{HeaderValue, ORIGIN};
use tungstenite::protocol::Message as WsMessage;

use crate::cli::ClientArgs;

/// Connect to a relay and bridge it with the terminal: every stdin line goes
/// out as a text message, every message from the relay is printed.
pub async fn run(args: ClientArgs) -> Result<()> {
    let request = build_request(&args)?;
    let (ws, _response) = connect_async(request)
        .await
        .with_context(|| format!("failed to connect to {}", args.url))?;

    info!("connected to {}", args.url);

    let (mut writer, mut reader) = ws.split();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        select! {
            frame = reader.next() => {
                if !handle_frame(frame)? {
                    break;
                }
            }
            line = lines.next_line() => {
                if !handle_line(line?, &mut writer).await? {
                    break;
                }
            }
            ctrl_c = tokio::signal::ctrl_c() => {
                if let Err(error) = ctrl_c {
                    warn!(?error, "ctrl-c handler failed");
                }
                break;
            }
        }
    }

    if let Err(error) = writer.close().await {
        warn!(%error, "failed to close connection cleanly");
    }
    Ok(())
}

/// Build the upgrade request, adding an `Origin` header when asked to.
pub fn build_request(args: &ClientArgs) -> Result<Request> {
    let mut request = args
        .url
        .as_str()
        .into_client_request()
        .with_context(|| format!("invalid relay URL {}", args.url))?;

    if let Some(origin) = &args.origin {
        let value = HeaderValue::from_str(origin).context("invalid origin")?;
        request.headers_mut().insert(ORIGIN, value);
    }

    Ok(request)
}

fn handle_frame(frame: Option<Result<WsMessage, WsError>>) -> Result<bool> {
    match frame {
        Some(Ok(WsMessage::Text(text))) => {
            println!("{}", text.as_str());
            Ok(true)
        }
        Some(Ok(WsMessage::Binary(bytes))) => {
            println!("<{} bytes>", bytes.len());
            Ok(true)
        }
        Some(Ok(WsMessage::Close(_))) | None => {
            println!("*** relay closed the connection");
            Ok(false)
        }
        Some(Ok(_)) => Ok(true),
        Some(Err(err)) => Err(err).context("connection to relay failed"),
    }
}

async fn handle_line<W>(line: Option<String>, writer: &mut W) -> Result<bool>
where
    W: Sink<WsMessage, Error = WsError> + Unpin,
{
    let Some(line) = line else {
        return Ok(false);
    };

    let text = line.trim_end();
    if text.is_empty() {
        return Ok(true);
    }
    if text.eq_ignore_ascii_case("/quit") {
        println!("*** leaving chat");
        return Ok(false);
    }

    writer
        .send(WsMessage::Text(text.into()))
        .await
        .context("failed to send message")?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;

    fn args(url: &str, origin: Option<&str>) -> ClientArgs {
        ClientArgs {
            url: url.to_string(),
            origin: origin.map(str::to_string),
        }
    }

    #[test]
    fn test_request_carries_requested_origin() {
        let request = build_request(&args(
            "ws://127.0.0.1:40080/chat",
            Some("https://chat.example.com"),
        ))
        .expect("valid request");
        assert_eq!(request.uri().path(), "/chat");
        assert_eq!(
            request.headers().get(ORIGIN).unwrap(),
            "https://chat.example.com"
        );
    }

    #[test]
    fn test_request_without_origin_has_no_header() {
        let request = build_request(&args("ws://127.0.0.1:40080/chat", None)).expect("valid request");
        assert!(request.headers().get(ORIGIN).is_none());
    }

    #[test]
    fn test_malformed_url_is_rejected() {
        assert!(build_request(&args("not a url", None)).is_err());
    }

    #[tokio::test]
    async fn test_quit_command_stops_without_sending() {
        let mut sink =
            futures_util::sink::drain().sink_map_err(|never: Infallible| -> WsError { match never {} });
        assert!(!handle_line(Some("/quit".into()), &mut sink).await.unwrap());
        assert!(handle_line(Some("   ".into()), &mut sink).await.unwrap());
        assert!(!handle_line(None, &mut sink).await.unwrap());
    }
}
