//! Live view of a running server.
//!
//! Logs in, subscribes to the event stream, fetches a snapshot into a
//! [`ClientCache`], then applies every event to the cache, logging what changed.
//!
//! # Usage
//!
//! ```bash
//! depot-cli watch -u http://localhost:5000 -n admin -p admin
//! ```

use futures::{SinkExt, StreamExt};
use reqwest::header::{COOKIE, HeaderMap, SET_COOKIE};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, header as ws_header};

use sample_depot_core::UserSummary;
use sample_depot_core::cache::{Applied, ClientCache, Snapshot};
use sample_depot_core::events::{ClientMessage, ServerEvent};
use sample_depot_server::middleware::session::SESSION_COOKIE_NAME;

use super::CliError;

#[derive(Debug, Deserialize)]
struct SessionInfo {
    user: Option<UserSummary>,
}

/// An authenticated HTTP session against the server.
struct Client {
    http: reqwest::Client,
    base_url: String,
    cookie: String,
}

impl Client {
    async fn login(
        base_url: &str,
        name: &str,
        password: &str,
    ) -> Result<(Self, UserSummary), CliError> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        let http = reqwest::Client::new();

        let response = http
            .post(format!("{base_url}/api/login"))
            .json(&serde_json::json!({ "name": name, "password": password }))
            .send()
            .await?
            .error_for_status()?;

        let cookie = session_cookie(response.headers())
            .ok_or_else(|| CliError::Protocol("login set no session cookie".to_owned()))?;
        let user = response
            .json::<SessionInfo>()
            .await?
            .user
            .ok_or_else(|| CliError::Protocol("login returned no user".to_owned()))?;

        Ok((
            Self {
                http,
                base_url,
                cookie,
            },
            user,
        ))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, CliError> {
        Ok(self
            .http
            .get(format!("{}/api{path}", self.base_url))
            .header(COOKIE, &self.cookie)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    async fn snapshot(&self, user: UserSummary) -> Result<Snapshot, CliError> {
        // only admins may list users
        let users = if user.role.is_admin() {
            self.get("/users").await?
        } else {
            vec![user.clone()]
        };

        Ok(Snapshot {
            samples: self.get("/samples").await?,
            sizes: self.get("/sample-sizes").await?,
            shipments: self.get("/shipments").await?,
            users,
            current_user: Some(user),
        })
    }
}

/// The `name=value` pair of the session cookie in a login response.
fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .find(|pair| {
            pair.split_once('=')
                .is_some_and(|(name, _)| name.trim() == SESSION_COOKIE_NAME)
        })
        .map(|pair| pair.trim().to_owned())
}

/// Event stream URL for an `http(s)://` base URL.
fn events_url(base_url: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    let ws_base = base_url
        .strip_prefix("https://")
        .map(|rest| format!("wss://{rest}"))
        .or_else(|| {
            base_url
                .strip_prefix("http://")
                .map(|rest| format!("ws://{rest}"))
        })
        .unwrap_or_else(|| base_url.to_owned());
    format!("{ws_base}/api/events")
}

fn log_outcome(cache: &ClientCache, event: &ServerEvent, outcome: &Applied) {
    match outcome {
        Applied::Unchanged => tracing::debug!(event = event.name(), "Already up to date"),
        Applied::Changed => tracing::info!(
            event = event.name(),
            samples = cache.samples().len(),
            shipments = cache.shipments().len(),
            users = cache.users().len(),
            db_connected = cache.db_connected(),
            "Cache updated"
        ),
        Applied::RoleChanged(role) => tracing::warn!(%role, "Your role changed"),
        Applied::LoggedOut { reason } => tracing::warn!(%reason, "Logged out by server"),
    }
}

/// Decode one event frame and apply it to the cache.
///
/// Frames queued before the snapshot was taken may already be reflected in
/// it; applying them again leaves the cache unchanged.
fn apply_frame(cache: &mut ClientCache, text: &str) -> Option<Applied> {
    let event = match serde_json::from_str::<ServerEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Skipping unrecognized event");
            return None;
        }
    };
    let outcome = cache.apply(&event);
    log_outcome(cache, &event, &outcome);
    Some(outcome)
}

/// Follow the server's events until interrupted or logged out.
///
/// # Errors
///
/// Returns `CliError` if login, the snapshot fetch or the WebSocket fails.
pub async fn run(base_url: &str, name: &str, password: &str) -> Result<(), CliError> {
    let (client, user) = Client::login(base_url, name, password).await?;
    tracing::info!(user_id = %user.id, role = %user.role, "Logged in");

    let mut request = events_url(&client.base_url).into_client_request()?;
    let cookie = HeaderValue::from_str(&client.cookie)
        .map_err(|e| CliError::Protocol(format!("bad session cookie: {e}")))?;
    request.headers_mut().insert(ws_header::COOKIE, cookie);

    // subscribe before the snapshot; events published meanwhile wait in the socket
    let (socket, _) = connect_async(request).await?;
    let (mut sink, mut stream) = socket.split();

    let register = serde_json::to_string(&ClientMessage::Register { user_id: user.id })
        .map_err(|e| CliError::Protocol(e.to_string()))?;
    sink.send(Message::Text(register.into())).await?;

    let mut cache = ClientCache::from_snapshot(client.snapshot(user.clone()).await?);
    tracing::info!(
        samples = cache.samples().len(),
        shipments = cache.shipments().len(),
        "Snapshot loaded"
    );
    tracing::info!("Watching events, press Ctrl+C to stop");

    loop {
        let frame = tokio::select! {
            frame = stream.next() => frame,
            _ = tokio::signal::ctrl_c() => break,
        };
        let text = match frame {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => {
                tracing::info!("Server closed the event stream");
                break;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        };

        if let Some(Applied::LoggedOut { .. }) = apply_frame(&mut cache, text.as_str()) {
            break;
        }
    }

    let _ = sink.send(Message::Close(None)).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue as HttpHeaderValue;
    use sample_depot_core::{MISSING_IMAGE, Sample};

    use super::*;

    #[test]
    fn test_events_url_follows_scheme() {
        assert_eq!(
            events_url("http://localhost:5000/"),
            "ws://localhost:5000/api/events"
        );
        assert_eq!(
            events_url("https://depot.example"),
            "wss://depot.example/api/events"
        );
    }

    #[test]
    fn test_frames_queued_before_snapshot_apply_cleanly() {
        let listed = Sample {
            code: "A123".to_owned(),
            description: None,
            image: MISSING_IMAGE.to_owned(),
        };
        let mut cache = ClientCache::from_snapshot(Snapshot {
            samples: vec![listed.clone()],
            ..Snapshot::default()
        });

        let already_listed = serde_json::to_string(&ServerEvent::SampleAdded(listed))
            .unwrap_or_default();
        assert_eq!(
            apply_frame(&mut cache, &already_listed),
            Some(Applied::Unchanged)
        );

        let missed = serde_json::to_string(&ServerEvent::SampleAdded(Sample {
            code: "B456".to_owned(),
            description: None,
            image: MISSING_IMAGE.to_owned(),
        }))
        .unwrap_or_default();
        assert_eq!(apply_frame(&mut cache, &missed), Some(Applied::Changed));
        assert_eq!(cache.samples().len(), 2);

        assert_eq!(apply_frame(&mut cache, "not json"), None);
    }

    #[test]
    fn test_session_cookie_picks_depot_cookie() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HttpHeaderValue::from_static("other=1; Path=/"));
        headers.append(
            SET_COOKIE,
            HttpHeaderValue::from_static("depot_session=abc123; HttpOnly; Path=/"),
        );
        assert_eq!(
            session_cookie(&headers).as_deref(),
            Some("depot_session=abc123")
        );
        assert_eq!(session_cookie(&HeaderMap::new()), None);
    }
}
