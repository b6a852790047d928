use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use client_core::{ClientSettings, FormController, RequestPhase};
use futures::StreamExt;
use shared::{domain::ExcuseCategory, error::ExcuseError, protocol::GenerateExcuseRequest};
use tokio::{
    net::TcpListener,
    sync::{oneshot, Mutex},
};

#[derive(Clone)]
struct ServerState {
    tx: Arc<Mutex<Option<oneshot::Sender<GenerateExcuseRequest>>>>,
    reply: Reply,
}

#[derive(Clone)]
enum Reply {
    Chunks(Vec<&'static str>),
    Status(StatusCode),
    Empty,
}

async fn handle_generate(
    State(state): State<ServerState>,
    Json(payload): Json<GenerateExcuseRequest>,
) -> Response {
    if let Some(tx) = state.tx.lock().await.take() {
        let _ = tx.send(payload);
    }

    match state.reply {
        Reply::Chunks(chunks) => {
            let body = futures::stream::iter(chunks).then(|chunk| async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok::<_, std::io::Error>(chunk)
            });
            Body::from_stream(body).into_response()
        }
        Reply::Status(status) => (status, "generation backend unavailable").into_response(),
        Reply::Empty => StatusCode::OK.into_response(),
    }
}

async fn spawn_generation_server(
    reply: Reply,
) -> anyhow::Result<(String, oneshot::Receiver<GenerateExcuseRequest>)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (tx, rx) = oneshot::channel();
    let state = ServerState {
        tx: Arc::new(Mutex::new(Some(tx))),
        reply,
    };
    let app = Router::new()
        .route("/api/generateExcuse", post(handle_generate))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), rx))
}

fn controller_for(server_url: String) -> Arc<FormController> {
    let settings = ClientSettings {
        server_url,
        ..ClientSettings::default()
    };
    FormController::from_settings(&settings).expect("controller")
}

#[tokio::test]
async fn streamed_excuse_reaches_generated_text() {
    let (server_url, payload_rx) =
        spawn_generation_server(Reply::Chunks(vec!["Sudden ", "doctor's appointment."]))
            .await
            .expect("spawn server");
    let controller = controller_for(server_url);

    controller.update_text("My car broke down unexpectedly");
    controller.update_category(ExcuseCategory::Medical);
    controller.submit().await.expect("submit");

    let payload = payload_rx.await.expect("payload");
    assert!(payload.prompt.contains("My car broke down unexpectedly"));
    assert!(payload.prompt.contains("medical"));

    let text = controller.generated_text();
    assert_eq!(text.as_str(), "Sudden doctor's appointment.");
    assert!(text.is_finished());
    let state = controller.form_state();
    assert!(!state.is_locked);
    assert_eq!(state.phase, RequestPhase::Idle);
}

#[tokio::test]
async fn server_error_status_surfaces_request_failure() {
    let (server_url, _payload_rx) =
        spawn_generation_server(Reply::Status(StatusCode::INTERNAL_SERVER_ERROR))
            .await
            .expect("spawn server");
    let controller = controller_for(server_url);
    controller.update_text("Forgot the anniversary dinner");

    let err = controller.submit().await.expect_err("must fail");

    assert_eq!(err, ExcuseError::request_failed("500 Internal Server Error"));
    assert!(controller.generated_text().is_empty());
    assert!(!controller.form_state().is_locked);
}

#[tokio::test]
async fn empty_response_produces_no_text() {
    let (server_url, _payload_rx) = spawn_generation_server(Reply::Empty)
        .await
        .expect("spawn server");
    let controller = controller_for(server_url);
    controller.update_text("Skipped the team standup");

    controller.submit().await.expect("submit");

    let text = controller.generated_text();
    assert!(text.is_empty());
    assert!(text.is_finished());
}

#[tokio::test]
async fn unreachable_server_surfaces_request_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");

    let controller = controller_for(format!("http://{addr}"));
    controller.update_text("Power outage at my place");

    let err = controller.submit().await.expect_err("must fail");
    assert!(matches!(err, ExcuseError::RequestFailed { .. }));
    assert!(!controller.form_state().is_locked);
}

#[tokio::test]
async fn short_input_never_reaches_the_server() {
    let (server_url, mut payload_rx) =
        spawn_generation_server(Reply::Chunks(vec!["unused"]))
            .await
            .expect("spawn server");
    let controller = controller_for(server_url);
    controller.update_text("nope");

    let err = controller.submit().await.expect_err("must fail validation");

    assert!(matches!(err, ExcuseError::Validation { .. }));
    assert!(controller.form_state().is_invalid);
    assert!(payload_rx.try_recv().is_err());
}
