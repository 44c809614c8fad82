//! Live PostgreSQL tests. Skipped unless `DB_MIRROR_TEST_DATABASE_URL` is set.

use anyhow::{Context, Result};
use db_mirror_postgresql::{
    ConnectionManager, ExecOutcome, MirrorExecutor, MirrorTarget, StaticMirrorConfig,
    TableResolver,
};
use mirror_core::{Attributes, MirrorEvent, MirrorValue};
use std::sync::Arc;
use tokio_postgres::NoTls;

const TEST_URL_VAR: &str = "DB_MIRROR_TEST_DATABASE_URL";
const TABLE: &str = "db_mirror_live_accounts";

fn test_url() -> Option<String> {
    match std::env::var(TEST_URL_VAR) {
        Ok(url) if !url.trim().is_empty() => Some(url),
        _ => {
            eprintln!("{TEST_URL_VAR} not set, skipping live PostgreSQL test");
            None
        }
    }
}

async fn admin_client(url: &str) -> Result<tokio_postgres::Client> {
    let (client, connection) = tokio_postgres::connect(url, NoTls)
        .await
        .context("Failed to connect to PostgreSQL")?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            eprintln!("Connection error: {e}");
        }
    });

    Ok(client)
}

fn live_executor(url: &str) -> MirrorExecutor {
    let config = StaticMirrorConfig::new(Some(MirrorTarget::Url(url.to_string())));
    let manager = ConnectionManager::postgres(Arc::new(config));
    MirrorExecutor::new(
        Arc::new(manager),
        TableResolver::new().with_override("LiveAccount", TABLE),
    )
}

fn event(operation: &str, attributes: Attributes) -> MirrorEvent {
    MirrorEvent::new("LiveAccount", "id-1", operation, attributes)
}

#[tokio::test]
async fn test_create_update_destroy_roundtrip() -> Result<()> {
    let Some(url) = test_url() else {
        return Ok(());
    };
    let client = admin_client(&url).await?;
    client
        .batch_execute(&format!(
            "DROP TABLE IF EXISTS {TABLE};
             CREATE TABLE {TABLE} (
                 id TEXT PRIMARY KEY,
                 name TEXT,
                 balance NUMERIC(19, 4),
                 opened_on DATE,
                 updated_at TIMESTAMPTZ,
                 settings JSONB
             )"
        ))
        .await?;

    let executor = live_executor(&url);
    let attributes = Attributes::new()
        .with("id", "id-1")
        .with("name", "Test")
        .with("balance", MirrorValue::Decimal("1234.5".into()))
        .with("opened_on", MirrorValue::Date("2024-01-15".into()))
        .with("updated_at", MirrorValue::Timestamp("2024-03-01T10:30:00Z".into()))
        .with("settings", MirrorValue::Json(r#"{"currency":"USD"}"#.into()));

    // Replaying a create leaves a single row.
    for _ in 0..2 {
        executor.execute(&event("create", attributes.clone())).await?;
    }
    let count: i64 = client
        .query_one(&format!("SELECT COUNT(*) FROM {TABLE}"), &[])
        .await?
        .get(0);
    assert_eq!(count, 1);

    let updated = Attributes::new().with("id", "id-1").with("name", "Updated");
    let outcome = executor.execute(&event("update", updated)).await?;
    assert_eq!(outcome, ExecOutcome::Applied { rows: 1 });
    let name: String = client
        .query_one(&format!("SELECT name FROM {TABLE} WHERE id = 'id-1'"), &[])
        .await?
        .get(0);
    assert_eq!(name, "Updated");

    executor
        .execute(&event("destroy", Attributes::new()))
        .await?;
    let count: i64 = client
        .query_one(&format!("SELECT COUNT(*) FROM {TABLE}"), &[])
        .await?
        .get(0);
    assert_eq!(count, 0);

    client.batch_execute(&format!("DROP TABLE {TABLE}")).await?;
    Ok(())
}
