//! Live WebSocket endpoints
//!
//! - GET /ws/kitchen/{restaurant_id}?token=<JWT>: 厨房显示屏
//! - GET /ws/cashier/{restaurant_id}?token=<JWT>: 收银台
//! - GET /ws/customer/{bill_id}: 顾客订单页（公开）
//!
//! 协议（Server → Client，JSON）:
//! - 连接后先发 `{"message":"ready","bills":[...]}` 当前快照
//! - 之后每个事件 `{"message":"event","event":{"type":...}}`
//! - 订阅者落后于缓冲区时重新发送 `ready` 快照

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use shared::error::AppError;
use shared::live::{LiveMessage, Topic};
use tokio::time::Duration;
use uuid::Uuid;

use super::extract::{Path, Query};
use crate::auth::{Capability, verify_token};
use crate::live::Delivery;
use crate::state::AppState;

const PING_INTERVAL: Duration = Duration::from_secs(30);

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws/kitchen/{restaurant_id}", get(kitchen_ws))
        .route("/ws/cashier/{restaurant_id}", get(cashier_ws))
        .route("/ws/customer/{bill_id}", get(customer_ws))
}

#[derive(Deserialize)]
pub struct WsAuthQuery {
    token: String,
}

/// Verify a staff token for a restaurant-scoped topic
pub fn authorize_staff_topic(
    state: &AppState,
    token: &str,
    topic: Topic,
    required: &[Capability],
) -> Result<(), AppError> {
    let identity = verify_token(token, &state.jwt_secret)?;
    identity.require_any(required)?;
    identity.ensure_restaurant(topic.key())
}

/// GET /ws/kitchen/{restaurant_id}?token=<JWT>
pub async fn kitchen_ws(
    State(state): State<AppState>,
    Path(restaurant_id): Path<i64>,
    Query(query): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let topic = Topic::Kitchen(restaurant_id);
    authorize_staff_topic(
        &state,
        &query.token,
        topic,
        &[Capability::KitchenStaff, Capability::CaptainStaff],
    )?;
    Ok(ws.on_upgrade(move |socket| live_session(socket, state, topic)))
}

/// GET /ws/cashier/{restaurant_id}?token=<JWT>
pub async fn cashier_ws(
    State(state): State<AppState>,
    Path(restaurant_id): Path<i64>,
    Query(query): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let topic = Topic::Cashier(restaurant_id);
    authorize_staff_topic(&state, &query.token, topic, &[Capability::CashierStaff])?;
    Ok(ws.on_upgrade(move |socket| live_session(socket, state, topic)))
}

/// GET /ws/customer/{bill_id}
pub async fn customer_ws(
    State(state): State<AppState>,
    Path(bill_id): Path<i64>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    // 账单必须存在
    state.query.order_detail(bill_id).await?;
    let topic = Topic::Customer(bill_id);
    Ok(ws.on_upgrade(move |socket| live_session(socket, state, topic)))
}

async fn live_session(socket: WebSocket, state: AppState, topic: Topic) {
    let (mut sink, mut stream) = socket.split();
    let connection = Uuid::new_v4();

    // 先订阅再取快照，避免快照与首个事件之间的空隙
    let mut subscription = state.router.subscribe(topic, connection);
    let shutdown = state.router.shutdown_token();

    tracing::info!(%topic, %connection, "Live WS connected");

    if send_ready(&mut sink, &state, topic).await.is_err() {
        state.router.unsubscribe(topic, connection);
        return;
    }

    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.tick().await; // skip immediate

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }

            _ = ping_interval.tick() => {
                if sink.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }

            delivery = subscription.recv() => {
                match delivery {
                    Delivery::Event(event) => {
                        if send_message(&mut sink, &LiveMessage::Event { event }).await.is_err() {
                            break;
                        }
                    }
                    Delivery::Lagged(skipped) => {
                        tracing::warn!(%topic, %connection, skipped, "Live subscriber lagged, resending snapshot");
                        if send_ready(&mut sink, &state, topic).await.is_err() {
                            break;
                        }
                    }
                    Delivery::Closed => break,
                }
            }

            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    // 客户端只读；其他消息忽略
                    _ => {}
                }
            }
        }
    }

    state.router.unsubscribe(topic, connection);
    tracing::info!(%topic, %connection, "Live WS disconnected");
}

type WsSink = SplitSink<WebSocket, Message>;

async fn send_ready(sink: &mut WsSink, state: &AppState, topic: Topic) -> Result<(), ()> {
    let bills = match state.query.snapshot_for_topic(topic).await {
        Ok(bills) => bills,
        Err(e) => {
            let err: AppError = e.into();
            tracing::error!(%topic, code = err.code.code(), "Failed to load live snapshot");
            let _ = sink.send(Message::Close(None)).await;
            return Err(());
        }
    };
    send_message(sink, &LiveMessage::Ready { bills }).await
}

async fn send_message(sink: &mut WsSink, msg: &LiveMessage) -> Result<(), ()> {
    let json = serde_json::to_string(msg).map_err(|e| {
        tracing::error!(error = %e, "Failed to serialize live message");
    })?;
    sink.send(Message::Text(json.into())).await.map_err(|_| ())
}
