//! End-to-end attachment storage against a filesystem-backed server

use careplan_content_store::StorageProvider;
use careplan_e2e_tests::utils::TestServer;
use careplan_server::ServerConfig;
use pretty_assertions::assert_eq;
use serde_json::Value;

#[tokio::test]
async fn test_attachment_upload_read_delete() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let config = ServerConfig {
        storage_provider: StorageProvider::Filesystem,
        upload_dir: dir.path().display().to_string(),
        ..ServerConfig::default()
    };
    let server = TestServer::start_with(config).await?;
    let client = reqwest::Client::new();

    let response = client
        .post(server.url("/attachments/patients/12/xray.png"))
        .header("x-user-id", "1")
        .header("x-user-role", "doctor")
        .body(vec![0x89, b'P', b'N', b'G'])
        .send()
        .await?;
    assert_eq!(response.status().as_u16(), 201);

    let blob: Value = response.json().await?;
    assert_eq!(blob["url"], "/uploads/patients/12/xray.png");
    assert_eq!(blob["size"], 4);
    assert!(dir.path().join("patients/12/xray.png").exists());

    let bytes = client
        .get(server.url("/attachments/patients/12/xray.png"))
        .header("x-user-id", "2")
        .header("x-user-role", "reception")
        .send()
        .await?
        .bytes()
        .await?;
    assert_eq!(bytes.as_ref(), &[0x89, b'P', b'N', b'G']);

    let forbidden = client
        .post(server.url("/attachments/patients/12/notes.txt"))
        .header("x-user-id", "2")
        .header("x-user-role", "reception")
        .body("x")
        .send()
        .await?;
    assert_eq!(forbidden.status().as_u16(), 403);

    let deleted = client
        .delete(server.url("/attachments/patients/12/xray.png"))
        .header("x-user-id", "1")
        .header("x-user-role", "admin")
        .send()
        .await?;
    assert_eq!(deleted.status().as_u16(), 204);
    assert!(!dir.path().join("patients/12/xray.png").exists());

    Ok(())
}

#[tokio::test]
async fn test_health_reports_dependencies() -> anyhow::Result<()> {
    let server = TestServer::start().await?;

    let health: Value = reqwest::get(server.url("/health")).await?.json().await?;
    assert_eq!(health["status"], "UP");
    assert_eq!(health["dependencies"]["planStore"]["status"], "UP");

    Ok(())
}
