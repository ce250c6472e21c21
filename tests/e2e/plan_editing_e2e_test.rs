//! End-to-end plan editing: a controller drives a real server over HTTP
//! and a second session reads back what was persisted.

use careplan_client::{Command, ControllerError, PlanTransport, PlanView};
use careplan_core::{EdgeId, NodeId, PatientId, Role, NODE_PALETTE};
use careplan_e2e_tests::utils::TestServer;
use careplan_server::ServerConfig;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

#[tokio::test]
async fn test_doctor_builds_plan_and_staff_reads_it() -> anyhow::Result<()> {
    let server = TestServer::start().await?;

    let mut doctor = server.controller(1, Role::Doctor, 100)?;
    assert_eq!(doctor.load().await, PlanView::NoPlan);

    doctor.create_plan().await?;
    doctor.dispatch(Command::add_node("Diagnosis", NODE_PALETTE[0]))?;
    doctor.dispatch(Command::add_node("Tests", NODE_PALETTE[1]))?;
    doctor.dispatch(Command::add_node("Medications", NODE_PALETTE[2]))?;
    doctor.dispatch(Command::connect("1", "2"))?;
    doctor.dispatch(Command::connect("2", "3"))?;
    doctor.dispatch(Command::SetNotes {
        id: NodeId::from("3"),
        notes: "metformin 500mg".to_string(),
    })?;

    let status = doctor.flush().await;
    assert_eq!(status.failed, 0);

    let mut staff = server.controller(2, Role::Staff, 100)?;
    assert_eq!(staff.load().await, PlanView::Loaded);
    assert_eq!(*staff.snapshot(), *doctor.snapshot());
    assert_eq!(staff.snapshot().node(&NodeId::from("3")).unwrap().data.notes, "metformin 500mg");

    assert!(matches!(
        staff.dispatch(Command::add_node("x", "")),
        Err(ControllerError::ReadOnly(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_rapid_edits_persist_latest_snapshot() -> anyhow::Result<()> {
    let server = TestServer::start().await?;

    let mut doctor = server.controller(1, Role::Admin, 200)?;
    doctor.load().await;
    doctor.create_plan().await?;

    for i in 0..25 {
        doctor.dispatch(Command::add_node(format!("Step {}", i), ""))?;
    }
    for i in 1..25 {
        doctor.dispatch(Command::connect(i.to_string(), (i + 1).to_string()))?;
    }

    let status = doctor.flush().await;
    assert_eq!(status.failed, 0);
    assert!(status.completed >= 1);

    let mut reader = server.controller(3, Role::Reception, 200)?;
    reader.load().await;
    assert_eq!(reader.snapshot().nodes.len(), 25);
    assert_eq!(reader.snapshot().edges.len(), 24);
    assert_eq!(*reader.snapshot(), *doctor.snapshot());

    Ok(())
}

#[tokio::test]
async fn test_delete_node_persists_without_dangling_edges() -> anyhow::Result<()> {
    let server = TestServer::start().await?;

    let mut doctor = server.controller(1, Role::Doctor, 300)?;
    doctor.load().await;
    doctor.create_plan().await?;
    doctor.dispatch(Command::add_node("A", ""))?;
    doctor.dispatch(Command::add_node("B", ""))?;
    doctor.dispatch(Command::add_node("C", ""))?;
    doctor.dispatch(Command::connect("1", "2"))?;
    doctor.dispatch(Command::connect("2", "3"))?;
    doctor.dispatch(Command::DeleteNode(NodeId::from("2")))?;
    doctor.dispatch(Command::add_node("D", ""))?;
    doctor.flush().await;

    let transport = server.transport(9, Role::Staff)?;
    let stored = transport.fetch(PatientId(300)).await?.expect("plan stored");

    assert!(stored.edges.is_empty());
    let ids: Vec<&str> = stored.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "3", "4"]);

    Ok(())
}

#[tokio::test]
async fn test_last_writer_wins_across_sessions() -> anyhow::Result<()> {
    let server = TestServer::start().await?;

    let mut first = server.controller(1, Role::Doctor, 400)?;
    first.load().await;
    first.create_plan().await?;

    let mut second = server.controller(2, Role::Doctor, 400)?;
    assert_eq!(second.load().await, PlanView::Loaded);

    first.dispatch(Command::add_node("from first", ""))?;
    first.flush().await;

    second.dispatch(Command::add_node("from second", ""))?;
    second.dispatch(Command::Disconnect(EdgeId::from("missing")))?;
    second.flush().await;

    let mut reader = server.controller(3, Role::Staff, 400)?;
    reader.load().await;
    let labels: Vec<String> = reader
        .snapshot()
        .nodes
        .iter()
        .map(|n| n.data.label.clone())
        .collect();
    assert_eq!(labels, vec!["from second".to_string()]);

    Ok(())
}

#[tokio::test]
async fn test_raw_api_strips_editor_fields() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let client = reqwest::Client::new();

    let response = client
        .post(server.url("/api/treatments/plan"))
        .header("x-user-id", "1")
        .header("x-user-role", "doctor")
        .json(&json!({
            "patientId": "500",
            "nodes": [{
                "id": 1, "type": "custom", "position": {"x": 10, "y": 20},
                "selected": true, "dragging": false,
                "style": {"backgroundColor": "#ccffcc"},
                "data": {"label": "Legacy", "onNoteChange": {}, "onDelete": {}}
            }],
            "edges": [{"id": "e1-2", "source": "1", "target": "2"}]
        }))
        .send()
        .await?;
    assert_eq!(response.status().as_u16(), 200);

    let plan: Value = client
        .get(server.url("/plan?patientId=500"))
        .header("x-user-id", "1")
        .header("x-user-role", "staff")
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(
        plan["nodes"][0],
        json!({
            "id": "1", "type": "custom", "position": {"x": 10.0, "y": 20.0},
            "data": {"label": "Legacy", "notes": "", "additionalNotes": "", "color": "#ccffcc"}
        })
    );
    assert_eq!(plan["edges"], json!([]));

    let missing: Value = client
        .get(server.url("/plan?patientId=501"))
        .header("x-user-id", "1")
        .header("x-user-role", "staff")
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(missing, Value::Null);

    Ok(())
}

#[tokio::test]
async fn test_sqlite_backed_server_round_trip() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let config = ServerConfig {
        database_url: format!("sqlite://{}", dir.path().join("plans.db").display()),
        ..ServerConfig::default()
    };
    let server = TestServer::start_with(config).await?;

    let mut doctor = server.controller(1, Role::Doctor, 600)?;
    assert_eq!(doctor.load().await, PlanView::NoPlan);
    doctor.create_plan().await?;
    doctor.dispatch(Command::add_node("Diagnosis", NODE_PALETTE[3]))?;
    doctor.dispatch(Command::add_node("Referral", NODE_PALETTE[4]))?;
    doctor.dispatch(Command::connect("1", "2"))?;
    assert_eq!(doctor.flush().await.failed, 0);

    let mut reader = server.controller(2, Role::Staff, 600)?;
    reader.load().await;
    assert_eq!(*reader.snapshot(), *doctor.snapshot());

    Ok(())
}
