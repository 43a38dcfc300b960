//! Remote-control HTTP API.
//!
//! Requests that touch the selection (next, prev, select, stop) go to the
//! App loop, which owns the navigator, as `Action`s.  Retry leaves the
//! selection alone and goes straight to the player core.
use crate::action::Action;
use crate::core::{CoreEvent, StateStore};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use livetv_proto::protocol::{Channel, Command, PlayerState};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Clone)]
struct HttpState {
    store: Arc<StateStore>,
    event_tx: mpsc::Sender<CoreEvent>,
    action_tx: mpsc::Sender<Action>,
}

#[derive(Serialize)]
struct ApiState {
    player: PlayerState,
    channels: Vec<Channel>,
}

fn router(state: HttpState) -> Router {
    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/next", get(next_channel).post(next_channel))
        .route("/api/prev", get(prev_channel).post(prev_channel))
        .route("/api/select/:id", get(select_channel).post(select_channel))
        .route("/api/retry", get(retry).post(retry))
        .route("/api/stop", get(stop).post(stop))
        .with_state(state)
}

pub fn start_server(
    bind_address: String,
    port: u16,
    store: Arc<StateStore>,
    event_tx: mpsc::Sender<CoreEvent>,
    action_tx: mpsc::Sender<Action>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = router(HttpState {
            store,
            event_tx,
            action_tx,
        });

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP API server listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    })
}

async fn get_state(State(state): State<HttpState>) -> Json<ApiState> {
    Json(ApiState {
        player: state.store.player().await,
        channels: state.store.channels().await,
    })
}

async fn send_action(state: &HttpState, action: Action) -> StatusCode {
    if state.action_tx.send(action).await.is_err() {
        error!("Failed to forward action to the app loop");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::OK
}

async fn send_command(state: &HttpState, cmd: Command) -> StatusCode {
    if state
        .event_tx
        .send(CoreEvent::ClientCommand(cmd))
        .await
        .is_err()
    {
        error!("Failed to send command to the player core");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::OK
}

async fn next_channel(State(state): State<HttpState>) -> StatusCode {
    info!("HTTP API: Next channel");
    send_action(&state, Action::Next).await
}

async fn prev_channel(State(state): State<HttpState>) -> StatusCode {
    info!("HTTP API: Previous channel");
    send_action(&state, Action::Prev).await
}

async fn select_channel(State(state): State<HttpState>, Path(id): Path<usize>) -> StatusCode {
    info!("HTTP API: Select channel {}", id);
    if !state.store.channels().await.iter().any(|c| c.id == id) {
        return StatusCode::NOT_FOUND;
    }
    send_action(&state, Action::SelectId(id)).await
}

async fn retry(State(state): State<HttpState>) -> StatusCode {
    info!("HTTP API: Retry");
    send_command(&state, Command::Retry).await
}

async fn stop(State(state): State<HttpState>) -> StatusCode {
    info!("HTTP API: Stop");
    send_action(&state, Action::Stop).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    struct Harness {
        addr: SocketAddr,
        store: Arc<StateStore>,
        event_rx: mpsc::Receiver<CoreEvent>,
        action_rx: mpsc::Receiver<Action>,
    }

    async fn serve() -> Harness {
        let store = Arc::new(StateStore::default());
        let (event_tx, event_rx) = mpsc::channel(8);
        let (action_tx, action_rx) = mpsc::channel(8);
        let app = router(HttpState {
            store: store.clone(),
            event_tx,
            action_tx,
        });
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Harness {
            addr,
            store,
            event_rx,
            action_rx,
        }
    }

    fn channel(id: usize) -> Channel {
        Channel {
            id,
            name: format!("ch{}", id),
            group: "General".into(),
            url: format!("http://tv/{}.m3u8", id),
            logo: String::new(),
        }
    }

    #[tokio::test]
    async fn state_lists_channels() {
        let h = serve().await;
        h.store.set_channels(vec![channel(0), channel(1)]).await;
        let body: serde_json::Value = reqwest::get(format!("http://{}/api/state", h.addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["channels"].as_array().map(|a| a.len()), Some(2));
        assert_eq!(body["player"]["status"], "Idle");
    }

    #[tokio::test]
    async fn navigation_goes_to_the_app_loop() {
        let mut h = serve().await;
        h.store.set_channels(vec![channel(0), channel(3)]).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("http://{}/api/next", h.addr))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(h.action_rx.recv().await, Some(Action::Next));

        let resp = client
            .get(format!("http://{}/api/select/3", h.addr))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(h.action_rx.recv().await, Some(Action::SelectId(3)));
    }

    #[tokio::test]
    async fn unknown_channel_is_404() {
        let h = serve().await;
        let resp = reqwest::get(format!("http://{}/api/select/42", h.addr))
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn retry_goes_to_the_core() {
        let mut h = serve().await;
        let resp = reqwest::get(format!("http://{}/api/retry", h.addr))
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert!(matches!(
            h.event_rx.recv().await,
            Some(CoreEvent::ClientCommand(Command::Retry))
        ));
    }
}
