use chrono::Utc;
use migrate_rs::config::Config;
use migrate_rs::orchestrator::{MigrationOrchestrator, WorkItem};
use migrate_rs::remote::{MockShell, RemoteCommand, ShellRecord};
use migrate_rs::storage::{Environment, Mailbox, MigrationBatch, RecordStore};
use migrate_rs::telemetry::Telemetry;
use migrate_rs::vault::SecretVault;
use migrate_rs::MigrationError;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;

struct Fixture {
    store: RecordStore,
    vault: SecretVault,
    shell: Arc<MockShell>,
    orchestrator: MigrationOrchestrator,
}

async fn setup() -> Fixture {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    let store = RecordStore::new(pool.clone());
    store.init_db().await.unwrap();

    let vault = SecretVault::new(pool);
    vault.init_db().await.unwrap();

    let service = Config::default().service;
    vault
        .store(&service.admin_password_secret, "online-admin-password")
        .await
        .unwrap();

    let shell = Arc::new(MockShell::new());
    let orchestrator = MigrationOrchestrator::new(
        store.clone(),
        vault.clone(),
        Arc::clone(&shell) as Arc<dyn migrate_rs::remote::RemoteShell>,
        service,
        Telemetry::new(),
    );

    Fixture {
        store,
        vault,
        shell,
        orchestrator,
    }
}

fn environment() -> Environment {
    Environment {
        customer_id: "customer-1".to_string(),
        environment_id: "env-1".to_string(),
        name: "Contoso On-Premises".to_string(),
        organization: "contoso.onmicrosoft.com".to_string(),
        endpoint: "https://mail.contoso.com/powershell".to_string(),
        username: "svc-migrate@contoso.com".to_string(),
        password_secret: "env-1-password".to_string(),
    }
}

fn batch(started: bool) -> MigrationBatch {
    MigrationBatch {
        environment_id: "env-1".to_string(),
        batch_id: "batch-1".to_string(),
        customer_id: "customer-1".to_string(),
        name: "First Wave".to_string(),
        start_time: Utc::now(),
        started,
        target_delivery_domain: "contoso.mail.onmicrosoft.com".to_string(),
    }
}

fn mailbox(id: &str, address: &str, batch_id: &str) -> Mailbox {
    Mailbox {
        environment_id: "env-1".to_string(),
        mailbox_id: id.to_string(),
        display_name: format!("User {}", id),
        name: format!("user{}", id),
        sam_account_name: format!("user{}", id),
        user_principal_name: address.to_string(),
        primary_smtp_address: address.to_string(),
        migration_batch_id: batch_id.to_string(),
    }
}

async fn seed_environment(fixture: &Fixture) {
    fixture.store.upsert_environment(&environment()).await.unwrap();
    fixture
        .vault
        .store("env-1-password", "on-prem-password")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_batch_created_builds_csv_and_mutates_nothing() {
    let fixture = setup().await;
    seed_environment(&fixture).await;

    fixture
        .store
        .upsert_mailboxes(&[
            mailbox("01", "a@contoso.com", "batch-1"),
            mailbox("02", "b@contoso.com", "batch-1"),
            mailbox("03", "c@contoso.com", ""),
        ])
        .await
        .unwrap();
    fixture.store.upsert_batch(&batch(false)).await.unwrap();

    fixture
        .orchestrator
        .handle(WorkItem::BatchCreated(batch(false)))
        .await
        .unwrap();

    let invocations = fixture.shell.invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].len(), 1);

    match &invocations[0][0] {
        RemoteCommand::NewMigrationBatch {
            csv_data,
            name,
            source_endpoint,
            target_delivery_domain,
        } => {
            assert_eq!(csv_data, b"EmailAddress\na@contoso.com\nb@contoso.com");
            assert_eq!(name, "First Wave");
            assert_eq!(source_endpoint, "Contoso On-Premises");
            assert_eq!(target_delivery_domain, "contoso.mail.onmicrosoft.com");
        }
        other => panic!("unexpected command: {}", other.name()),
    }

    // Success is defined by the remote call alone; no local mutation
    let stored = fixture
        .store
        .get_batch("env-1", "batch-1")
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.started);
}

#[tokio::test]
async fn test_start_already_started_locally_skips_remote() {
    let fixture = setup().await;
    seed_environment(&fixture).await;
    fixture.store.upsert_batch(&batch(true)).await.unwrap();

    fixture
        .orchestrator
        .handle(WorkItem::BatchStartRequested(batch(true)))
        .await
        .unwrap();

    assert!(fixture.shell.invocations().is_empty());
}

#[tokio::test]
async fn test_start_issues_remote_start_and_persists_flag() {
    let fixture = setup().await;
    seed_environment(&fixture).await;
    fixture.store.upsert_batch(&batch(false)).await.unwrap();

    // Probe sees a batch that has not started yet
    fixture
        .shell
        .push_records(vec![ShellRecord::from_pairs(&[("Status", "Created")])]);
    fixture.shell.push_records(vec![]);

    fixture
        .orchestrator
        .handle(WorkItem::BatchStartRequested(batch(false)))
        .await
        .unwrap();

    let invocations = fixture.shell.invocations();
    assert_eq!(invocations.len(), 2);
    assert_eq!(invocations[0][0].name(), "Get-MigrationBatch");
    assert_eq!(invocations[1][0].name(), "Start-MigrationBatch");

    let stored = fixture
        .store
        .get_batch("env-1", "batch-1")
        .await
        .unwrap()
        .unwrap();
    assert!(stored.started);
}

#[tokio::test]
async fn test_start_tolerates_batch_already_started_remotely() {
    let fixture = setup().await;
    seed_environment(&fixture).await;
    fixture.store.upsert_batch(&batch(false)).await.unwrap();

    // The remote side already runs this batch: persist the flag, never
    // issue a second start
    fixture
        .shell
        .push_records(vec![ShellRecord::from_pairs(&[("Status", "Syncing")])]);

    fixture
        .orchestrator
        .handle(WorkItem::BatchStartRequested(batch(false)))
        .await
        .unwrap();

    let invocations = fixture.shell.invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0][0].name(), "Get-MigrationBatch");

    let stored = fixture
        .store
        .get_batch("env-1", "batch-1")
        .await
        .unwrap()
        .unwrap();
    assert!(stored.started);
}

#[tokio::test]
async fn test_missing_secret_fails_before_any_remote_call() {
    let fixture = setup().await;

    let mut env = environment();
    env.password_secret = "absent-secret".to_string();
    fixture.store.upsert_environment(&env).await.unwrap();

    let err = fixture
        .orchestrator
        .handle(WorkItem::EnvironmentDiscovered(env))
        .await
        .unwrap_err();

    assert!(matches!(err, MigrationError::CredentialResolution(_)));
    assert!(fixture.shell.invocations().is_empty());
}

#[tokio::test]
async fn test_environment_discovery_persists_mailboxes() {
    let fixture = setup().await;
    seed_environment(&fixture).await;

    fixture.shell.push_records(vec![
        ShellRecord::from_pairs(&[
            ("Guid", "guid-1"),
            ("DisplayName", "User One"),
            ("Name", "userone"),
            ("SamAccountName", "userone"),
            ("UserPrincipalName", "one@contoso.com"),
            ("PrimarySmtpAddress", "one@contoso.com"),
        ]),
        ShellRecord::from_pairs(&[
            ("Guid", "guid-2"),
            ("DisplayName", "User Two"),
            ("Name", "usertwo"),
            ("SamAccountName", "usertwo"),
            ("UserPrincipalName", "two@contoso.com"),
            ("PrimarySmtpAddress", "two@contoso.com"),
        ]),
    ]);
    fixture.shell.push_records(vec![]);

    fixture
        .orchestrator
        .handle(WorkItem::EnvironmentDiscovered(environment()))
        .await
        .unwrap();

    let invocations = fixture.shell.invocations();
    assert_eq!(invocations.len(), 2);
    assert_eq!(invocations[0][0].name(), "Get-Mailbox");
    assert_eq!(invocations[1][0].name(), "New-MigrationEndpoint");

    let discovered = fixture.store.unassigned_mailboxes("env-1").await.unwrap();
    assert_eq!(discovered.len(), 2);
    assert_eq!(discovered[0].mailbox_id, "guid-1");
    assert_eq!(discovered[1].primary_smtp_address, "two@contoso.com");
}

#[tokio::test]
async fn test_delete_batch_clears_assignments_and_record() {
    let fixture = setup().await;
    seed_environment(&fixture).await;
    fixture.store.upsert_batch(&batch(true)).await.unwrap();
    fixture
        .store
        .upsert_mailbox(&mailbox("01", "a@contoso.com", "batch-1"))
        .await
        .unwrap();

    fixture
        .orchestrator
        .handle(WorkItem::BatchDeleteRequested(batch(true)))
        .await
        .unwrap();

    let invocations = fixture.shell.invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0][0].name(), "Remove-MigrationBatch");

    // The batch record is gone; its mailboxes return to the pool
    assert!(fixture
        .store
        .get_batch("env-1", "batch-1")
        .await
        .unwrap()
        .is_none());

    let unassigned = fixture.store.unassigned_mailboxes("env-1").await.unwrap();
    assert_eq!(unassigned.len(), 1);
    assert_eq!(unassigned[0].mailbox_id, "01");
}

#[tokio::test]
async fn test_start_for_unknown_batch_is_not_found() {
    let fixture = setup().await;
    seed_environment(&fixture).await;

    let err = fixture
        .orchestrator
        .handle(WorkItem::BatchStartRequested(batch(false)))
        .await
        .unwrap_err();

    assert!(matches!(err, MigrationError::NotFound(_)));
    assert!(fixture.shell.invocations().is_empty());
}

#[tokio::test]
async fn test_remote_failure_propagates_with_messages() {
    let fixture = setup().await;
    seed_environment(&fixture).await;
    fixture.store.upsert_batch(&batch(false)).await.unwrap();

    fixture.shell.push_errors(vec![
        "The endpoint could not be reached".to_string(),
        "Session closed by remote host".to_string(),
    ]);

    let err = fixture
        .orchestrator
        .handle(WorkItem::BatchCreated(batch(false)))
        .await
        .unwrap_err();

    match err {
        MigrationError::RemoteExecution { messages } => {
            assert_eq!(messages.len(), 2);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_batch_statistics_runs_compound_pipeline() {
    let fixture = setup().await;
    seed_environment(&fixture).await;
    fixture.store.upsert_batch(&batch(true)).await.unwrap();

    fixture
        .shell
        .push_records(vec![ShellRecord::from_pairs(&[
        ("Identity", "one@contoso.com"),
        ("Status", "Syncing"),
    ])]);

    let records = fixture
        .orchestrator
        .batch_statistics(&batch(true))
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].property("Status"), Some("Syncing"));

    let invocations = fixture.shell.invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].len(), 2);
    assert_eq!(invocations[0][0].name(), "Get-MigrationUser");
    assert_eq!(invocations[0][1].name(), "Get-MigrationUserStatistics");
}
