use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::Utc;
use shared::{domain::ScheduleStatus, protocol::CreateScheduleRequest};
use tokio::net::TcpListener;

use super::*;
use crate::test_support::schedule;

#[derive(Clone)]
struct ServerState {
    frames: mpsc::UnboundedSender<ClientFrame>,
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ServerState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

fn text_frame(event: &ServerEvent) -> WsMessage {
    WsMessage::Text(serde_json::to_string(event).expect("encode server event"))
}

/// Greets every socket with a malformed frame and a one-schedule snapshot.
/// Creates titled "hang" close the socket instead of acknowledging.
async fn serve_socket(mut socket: WebSocket, state: ServerState) {
    if socket
        .send(WsMessage::Text("{not json".to_string()))
        .await
        .is_err()
    {
        return;
    }
    let snapshot =
        ServerEvent::BroadcastUpdate(vec![schedule("s1", "Launch", ScheduleStatus::Live)]);
    if socket.send(text_frame(&snapshot)).await.is_err() {
        return;
    }

    while let Some(Ok(msg)) = socket.recv().await {
        let WsMessage::Text(text) = msg else {
            continue;
        };
        let Ok(frame) = serde_json::from_str::<ClientFrame>(&text) else {
            continue;
        };
        let _ = state.frames.send(frame.clone());
        let reply = match (&frame.command, frame.ack_id) {
            (ClientCommand::CreateSchedule(request), Some(_)) if request.title == "hang" => {
                let _ = socket.send(WsMessage::Close(None)).await;
                return;
            }
            (ClientCommand::CreateSchedule(request), Some(ack_id)) => {
                let ack = if request.title == "reject" {
                    CommandAck::rejected("Stream key already in use")
                } else {
                    CommandAck::ok()
                };
                Some(ServerEvent::Ack { ack_id, ack })
            }
            (ClientCommand::GetProcessStats, _) => Some(ServerEvent::ProcessStats(ProcessStats {
                running_streams: 1,
                ..ProcessStats::default()
            })),
            _ => None,
        };
        if let Some(reply) = reply {
            if socket.send(text_frame(&reply)).await.is_err() {
                return;
            }
        }
    }
}

async fn spawn_schedule_server() -> (String, mpsc::UnboundedReceiver<ClientFrame>) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (frames, frames_rx) = mpsc::unbounded_channel();
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(ServerState { frames });
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), frames_rx)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<ChannelEvent>) -> ChannelEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("channel event in time")
        .expect("channel event stream open")
}

async fn connected(
    reconnect: ReconnectPolicy,
) -> (
    Arc<ConnectionManager>,
    mpsc::UnboundedReceiver<ChannelEvent>,
    mpsc::UnboundedReceiver<ClientFrame>,
) {
    let (server_url, frames) = spawn_schedule_server().await;
    let (manager, mut events) = ConnectionManager::new(&server_url, reconnect).expect("manager");
    manager.connect().await.expect("connect");
    assert_eq!(next_event(&mut events).await, ChannelEvent::Connected);
    match next_event(&mut events).await {
        ChannelEvent::Snapshot(schedules) => assert_eq!(schedules.len(), 1),
        other => panic!("expected snapshot, got {other:?}"),
    }
    (manager, events, frames)
}

fn create_command(title: &str) -> ClientCommand {
    ClientCommand::CreateSchedule(CreateScheduleRequest {
        title: title.to_string(),
        video_identifier: "launch.mp4".to_string(),
        broadcast_date_time: Utc::now(),
        rtmp_server: "rtmp://a.rtmp.youtube.com/live2".to_string(),
        stream_key: "key-1".to_string(),
        duration_minutes: None,
    })
}

#[test]
fn http_urls_map_to_websocket_endpoint() {
    assert_eq!(
        websocket_url("http://127.0.0.1:3000").expect("url").as_str(),
        "ws://127.0.0.1:3000/ws"
    );
    assert_eq!(
        websocket_url("https://streams.example.org/base/")
            .expect("url")
            .as_str(),
        "wss://streams.example.org/base/ws"
    );
    assert_eq!(
        websocket_url("ws://10.0.0.2:9000/socket").expect("url").as_str(),
        "ws://10.0.0.2:9000/socket"
    );
}

#[test]
fn unsupported_urls_are_rejected() {
    assert!(matches!(
        websocket_url("ftp://example.org"),
        Err(TransportError::InvalidUrl { .. })
    ));
    assert!(matches!(
        websocket_url("not a url"),
        Err(TransportError::InvalidUrl { .. })
    ));
}

#[test]
fn reconnect_delays_are_clamped() {
    let zero = ReconnectPolicy::new(true, Duration::ZERO, Duration::from_secs(5));
    assert_eq!(zero.initial_delay, Duration::from_millis(1));
    assert_eq!(zero.next_delay(zero.initial_delay), Duration::from_millis(2));

    let inverted = ReconnectPolicy::new(true, Duration::from_secs(10), Duration::from_secs(2));
    assert_eq!(inverted.initial_delay, Duration::from_secs(2));
    assert_eq!(inverted.next_delay(inverted.initial_delay), Duration::from_secs(2));

    let settings = ClientSettings {
        reconnect_initial_delay: Duration::ZERO,
        ..ClientSettings::default()
    };
    assert_eq!(
        ReconnectPolicy::from_settings(&settings).initial_delay,
        Duration::from_millis(1)
    );

    let literal = ReconnectPolicy {
        enabled: true,
        initial_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
    };
    assert_eq!(literal.next_delay(Duration::ZERO), Duration::from_millis(1));
}

#[tokio::test]
async fn commands_fail_fast_while_disconnected() {
    let (manager, _events) =
        ConnectionManager::new("http://127.0.0.1:9", ReconnectPolicy::disabled()).expect("manager");

    assert!(matches!(
        manager.emit(ClientCommand::EmergencyStopAll).await,
        Err(TransportError::NotConnected)
    ));
    assert!(matches!(
        manager
            .emit_with_ack(create_command("x"), Duration::from_secs(1))
            .await,
        Err(TransportError::NotConnected)
    ));
}

#[tokio::test]
async fn connect_failure_is_reported() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let (manager, _events) =
        ConnectionManager::new(&format!("http://{addr}"), ReconnectPolicy::disabled())
            .expect("manager");
    assert!(matches!(
        manager.connect().await,
        Err(TransportError::Connect { .. })
    ));
    assert!(!manager.is_connected().await);
}

#[tokio::test]
async fn snapshot_is_forwarded_after_connected_and_malformed_frames_are_skipped() {
    let (manager, mut events, _frames) = connected(ReconnectPolicy::disabled()).await;
    assert!(manager.is_connected().await);

    // A second connect while connected opens nothing new.
    manager.connect().await.expect("reconnect no-op");
    assert!(events.try_recv().is_err());
    manager.disconnect().await;
}

#[tokio::test]
async fn create_acks_are_correlated() {
    let (manager, _events, mut frames) = connected(ReconnectPolicy::disabled()).await;

    let ack = manager
        .emit_with_ack(create_command("Launch"), Duration::from_secs(5))
        .await
        .expect("ack");
    assert_eq!(ack, CommandAck::ok());

    let rejected = manager
        .emit_with_ack(create_command("reject"), Duration::from_secs(5))
        .await
        .expect("ack");
    assert!(!rejected.success);
    assert_eq!(rejected.error.as_deref(), Some("Stream key already in use"));

    let first = frames.recv().await.expect("frame");
    let second = frames.recv().await.expect("frame");
    assert!(first.ack_id.is_some());
    assert_ne!(first.ack_id, second.ack_id);
    manager.disconnect().await;
}

#[tokio::test]
async fn fire_and_forget_commands_carry_no_ack_id() {
    let (manager, mut events, mut frames) = connected(ReconnectPolicy::disabled()).await;

    manager
        .emit(ClientCommand::GetProcessStats)
        .await
        .expect("emit");
    let frame = frames.recv().await.expect("frame");
    assert_eq!(frame.ack_id, None);
    assert_eq!(frame.command, ClientCommand::GetProcessStats);

    match next_event(&mut events).await {
        ChannelEvent::ProcessStats(stats) => assert_eq!(stats.running_streams, 1),
        other => panic!("expected process stats, got {other:?}"),
    }
    manager.disconnect().await;
}

#[tokio::test]
async fn disconnect_reports_once() {
    let (manager, mut events, _frames) = connected(ReconnectPolicy::disabled()).await;

    manager.disconnect().await;
    manager.disconnect().await;

    assert_eq!(next_event(&mut events).await, ChannelEvent::Disconnected);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(events.try_recv().is_err());
    assert!(matches!(
        manager.emit(ClientCommand::EmergencyStopAll).await,
        Err(TransportError::NotConnected)
    ));
}

#[tokio::test]
async fn server_close_fails_waiting_create() {
    let (manager, mut events, _frames) = connected(ReconnectPolicy::disabled()).await;

    let result = manager
        .emit_with_ack(create_command("hang"), Duration::from_secs(5))
        .await;
    assert!(matches!(result, Err(TransportError::ChannelClosed { .. })));
    assert_eq!(next_event(&mut events).await, ChannelEvent::Disconnected);
    assert!(!manager.is_connected().await);
}

#[tokio::test]
async fn dropped_connection_is_reestablished() {
    let policy = ReconnectPolicy {
        enabled: true,
        initial_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(100),
    };
    let (manager, mut events, _frames) = connected(policy).await;

    let _ = manager
        .emit_with_ack(create_command("hang"), Duration::from_secs(5))
        .await;
    assert_eq!(next_event(&mut events).await, ChannelEvent::Disconnected);
    assert_eq!(next_event(&mut events).await, ChannelEvent::Connected);
    assert!(matches!(
        next_event(&mut events).await,
        ChannelEvent::Snapshot(_)
    ));

    manager.disconnect().await;
    assert_eq!(next_event(&mut events).await, ChannelEvent::Disconnected);
}
