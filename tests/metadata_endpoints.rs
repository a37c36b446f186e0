//! Integration tests for the metadata HTTP surface.

use std::sync::Arc;

use async_trait::async_trait;
use mds_sdk::MetadataClient;
use metadata_emulator::config::claims::Claims;
use metadata_emulator::config::schema::EmulatorConfig;
use metadata_emulator::credentials::{
    self, cross_check, AccessToken, CredentialError, IdentityMismatch, KeyDescriptor,
    ResolvedCredential, Strategy, TokenSource,
};
use metadata_emulator::server::MetadataServer;

mod common;

struct StaticTokenSource;

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn token(&self) -> Result<AccessToken, CredentialError> {
        Ok(AccessToken {
            access_token: "static-test-token".to_string(),
            expires_in: 3600,
            token_type: "Bearer".to_string(),
        })
    }
}

fn test_claims() -> Claims {
    serde_json::from_str(&common::claims_json(
        "proj",
        "svc@proj.iam.gserviceaccount.com",
    ))
    .unwrap()
}

fn test_config(port: u16) -> EmulatorConfig {
    EmulatorConfig {
        bind_interface: "127.0.0.1".to_string(),
        port,
        ..EmulatorConfig::default()
    }
}

fn static_credential() -> ResolvedCredential {
    ResolvedCredential::new(
        Strategy::ServiceAccountFile,
        Some(Arc::new(StaticTokenSource)),
        Some(KeyDescriptor {
            client_email: "svc@proj.iam.gserviceaccount.com".to_string(),
            project_id: "proj".to_string(),
        }),
    )
}

#[tokio::test]
async fn serves_declared_identity() {
    let port = 28451;
    let mut server = MetadataServer::new(
        test_config(port),
        Arc::new(static_credential()),
        Arc::new(test_claims()),
    )
    .unwrap();
    server.start().await.unwrap();

    // Bind settings round-trip: the observable address equals the inputs.
    let local = server.local_addr().unwrap();
    assert_eq!(local.to_string(), format!("127.0.0.1:{port}"));

    let client = MetadataClient::new(&format!("http://{local}"));
    assert_eq!(client.project_id().await.unwrap(), "proj");
    assert_eq!(
        client.email("default").await.unwrap(),
        "svc@proj.iam.gserviceaccount.com"
    );
    let scopes = client.scopes("default").await.unwrap();
    assert_eq!(scopes.len(), 2);
    assert_eq!(scopes[0], "https://www.googleapis.com/auth/cloud-platform");

    let token = client.token("default").await.unwrap();
    assert_eq!(token.access_token, "static-test-token");
    assert_eq!(token.token_type, "Bearer");

    // Lookup by email works; unknown accounts do not.
    assert!(client
        .email("svc@proj.iam.gserviceaccount.com")
        .await
        .is_ok());
    assert!(client.email("missing").await.is_err());

    server.shutdown().await.unwrap();
    assert!(client.project_id().await.is_err());
}

#[tokio::test]
async fn metadata_paths_require_flavor_header() {
    let port = 28452;
    let mut server = MetadataServer::new(
        test_config(port),
        Arc::new(static_credential()),
        Arc::new(test_claims()),
    )
    .unwrap();
    server.start().await.unwrap();

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let res = client
        .get(format!(
            "http://127.0.0.1:{port}/computeMetadata/v1/project/project-id"
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 403);
    assert_eq!(res.headers().get("Metadata-Flavor").unwrap(), "Google");
    assert_eq!(
        res.headers().get("Server").unwrap(),
        "Metadata Server for VM"
    );

    // The root listing is not a metadata path and stays open.
    let res = client
        .get(format!("http://127.0.0.1:{port}/"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn token_issuance_failure_maps_to_bad_gateway() {
    // A real key file with placeholder PEM: resolution succeeds, issuance
    // cannot.
    let port = 28453;
    let key = common::write_temp(&common::key_file_json(
        "proj",
        "svc@proj.iam.gserviceaccount.com",
    ));
    let claims = test_claims();
    let config = EmulatorConfig {
        service_account_file: Some(key.path().to_path_buf()),
        ..test_config(port)
    };

    let credential = credentials::resolve(Strategy::ServiceAccountFile, &config, &claims).unwrap();
    assert!(cross_check(&credential, &claims).is_empty());

    let mut server =
        MetadataServer::new(config, Arc::new(credential), Arc::new(claims)).unwrap();
    server.start().await.unwrap();

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let res = client
        .get(format!(
            "http://127.0.0.1:{port}/computeMetadata/v1/instance/service-accounts/default/token"
        ))
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 502);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn email_mismatch_warns_but_startup_proceeds() {
    let port = 28454;
    let key = common::write_temp(&common::key_file_json(
        "proj",
        "other@proj.iam.gserviceaccount.com",
    ));
    let claims = test_claims();
    let config = EmulatorConfig {
        service_account_file: Some(key.path().to_path_buf()),
        ..test_config(port)
    };

    let credential = credentials::resolve(Strategy::ServiceAccountFile, &config, &claims).unwrap();

    let findings = cross_check(&credential, &claims);
    assert_eq!(findings.len(), 1);
    assert!(matches!(findings[0], IdentityMismatch::Email { .. }));

    // Mismatches are advisory: the server still starts and serves the
    // declared identity.
    let mut server =
        MetadataServer::new(config, Arc::new(credential), Arc::new(claims)).unwrap();
    server.start().await.unwrap();

    let client = MetadataClient::new(&format!("http://127.0.0.1:{port}"));
    assert_eq!(client.project_id().await.unwrap(), "proj");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn tpm_credential_defers_token_issuance() {
    let port = 28455;
    let credential = ResolvedCredential::new(Strategy::Tpm, None, None);
    let mut server = MetadataServer::new(
        test_config(port),
        Arc::new(credential),
        Arc::new(test_claims()),
    )
    .unwrap();
    server.start().await.unwrap();

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let res = client
        .get(format!(
            "http://127.0.0.1:{port}/computeMetadata/v1/instance/service-accounts/default/token"
        ))
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 501);

    // Identity endpoints keep working without a token source.
    let res = client
        .get(format!(
            "http://127.0.0.1:{port}/computeMetadata/v1/instance/hostname"
        ))
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "vm.test.internal");

    server.shutdown().await.unwrap();
}
