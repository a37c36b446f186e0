//! Integration tests for orchestrated startup and shutdown.

use std::sync::Arc;
use std::time::Duration;

use metadata_emulator::config::claims::Claims;
use metadata_emulator::config::schema::EmulatorConfig;
use metadata_emulator::credentials::{ResolvedCredential, Strategy};
use metadata_emulator::lifecycle::{LifecycleError, Orchestrator};
use metadata_emulator::server::MetadataServer;
use tokio::sync::oneshot;

mod common;

fn test_claims() -> Claims {
    serde_json::from_str(&common::claims_json(
        "proj",
        "svc@proj.iam.gserviceaccount.com",
    ))
    .unwrap()
}

fn build_server(port: u16) -> MetadataServer {
    let config = EmulatorConfig {
        bind_interface: "127.0.0.1".to_string(),
        port,
        ..EmulatorConfig::default()
    };
    let credential = ResolvedCredential::new(Strategy::Tpm, None, None);
    MetadataServer::new(config, Arc::new(credential), Arc::new(test_claims())).unwrap()
}

#[tokio::test]
async fn graceful_shutdown_on_signal() {
    let port = 28461;
    let server = build_server(port);
    let mut orchestrator = Orchestrator::new(server);

    let (signal_tx, signal_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        let result = orchestrator
            .run(async {
                let _ = signal_rx.await;
            })
            .await;
        result.is_ok()
    });

    // Wait until the server answers.
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let url = format!("http://127.0.0.1:{port}/computeMetadata/v1/project/project-id");
    let mut serving = false;
    for _ in 0..50 {
        if let Ok(res) = client
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
        {
            assert_eq!(res.status(), 200);
            serving = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(serving, "server never came up");

    signal_tx.send(()).unwrap();
    assert!(handle.await.unwrap(), "orchestrated run should end cleanly");

    // The listener is gone after shutdown.
    assert!(client
        .get(&url)
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .is_err());
}

#[tokio::test]
async fn start_failure_is_fatal_before_any_signal() {
    let port = 28462;
    // Occupy the port so start() cannot bind.
    let _occupied = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .unwrap();

    let server = build_server(port);
    let mut orchestrator = Orchestrator::new(server);

    let err = orchestrator
        .run(std::future::pending())
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Start(_)));
}
