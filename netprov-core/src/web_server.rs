use crate::orchestrator::{Admission, ConnectionOrchestrator};
use crate::session::ServiceSession;
use crate::traits::WifiScanner;
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// SSID 最大长度（IEEE 802.11）
pub const MAX_SSID_LEN: usize = 32;
/// WPA2 口令长度范围
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 64;

/// Web 服务器状态
pub struct AppState {
    pub orchestrator: Arc<ConnectionOrchestrator>,
    pub session: Arc<ServiceSession>,
    pub scanner: Arc<dyn WifiScanner>,
}

/// /connect 的请求体
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectRequest {
    pub ssid: String,
    #[serde(default)]
    pub password: String,
}

impl ConnectRequest {
    fn validate(&self) -> Result<(), String> {
        if self.ssid.is_empty() {
            return Err("ssid must not be empty".to_string());
        }
        if self.ssid.len() > MAX_SSID_LEN {
            return Err(format!("ssid is longer than {} bytes", MAX_SSID_LEN));
        }
        let len = self.password.len();
        if len != 0 && !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
            return Err(format!(
                "password must be {}..={} bytes",
                MIN_PASSWORD_LEN, MAX_PASSWORD_LEN
            ));
        }
        Ok(())
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(serve_root))
        .route("/scan", get(api_scan))
        .route("/online", get(api_online))
        .route("/status", get(api_status))
        .route("/connect", post(api_connect))
        .route("/generate_204", get(handle_captive_portal))
        .with_state(state)
}

/// Serves until `shutdown` turns `true`.
pub async fn run_server(
    bind_addr: SocketAddr,
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
) -> crate::Result<()> {
    let app = router(state);

    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!("🌐 Web server listening on {}", bind_addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
            tracing::info!("Web server shutting down");
        })
        .await?;
    Ok(())
}

async fn serve_root() -> impl IntoResponse {
    "Provisioning server is running"
}

/// 扫描周围的 Wi-Fi 网络
async fn api_scan(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.scanner.scan().await {
        Ok(networks) => (StatusCode::OK, Json(networks)).into_response(),
        Err(e) => {
            tracing::error!("Scan failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn api_online(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({ "connection": state.session.is_connected() }))
}

async fn api_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.session.snapshot())
}

/// 处理连接请求。
/// 连接过程会让热点短暂中断，所以只确认请求已被受理就立即返回，
/// 结果由客户端通过 /online 或 /status 轮询获得。
async fn api_connect(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ConnectRequest>, JsonRejection>,
) -> impl IntoResponse {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => return reply(rejection.status(), false, &rejection.body_text()),
    };
    tracing::debug!(ssid = %payload.ssid, "Handling /connect request");

    if let Err(message) = payload.validate() {
        return reply(StatusCode::BAD_REQUEST, false, &message);
    }

    match state
        .orchestrator
        .request_connection(payload.ssid, payload.password)
    {
        Admission::Accepted(_) => reply(
            StatusCode::OK,
            true,
            "Connection request accepted. Poll /online for the result.",
        ),
        Admission::Busy => reply(
            StatusCode::CONFLICT,
            false,
            "Another connection attempt is in progress.",
        ),
        Admission::Closed => reply(
            StatusCode::SERVICE_UNAVAILABLE,
            false,
            "Wired link detected, provisioning has ended.",
        ),
    }
}

fn reply(status: StatusCode, execution: bool, message: &str) -> axum::response::Response {
    (
        status,
        Json(serde_json::json!({ "execution": execution, "message": message })),
    )
        .into_response()
}

/// 处理捕获门户检测请求（Captive Portal Detection）
///
/// 手机连上热点后会访问 generate_204 之类的地址确认是否有互联网，
/// 直接回 204 避免系统弹出"无互联网连接"。
async fn handle_captive_portal() -> impl IntoResponse {
    (StatusCode::NO_CONTENT, "")
}
