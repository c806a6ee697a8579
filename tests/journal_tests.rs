mod common;

use atm_controller::application::transaction::TransactionEngine;
use atm_controller::config::AtmConfig;
use atm_controller::domain::account::Balance;
use atm_controller::domain::transaction::PendingWithdrawal;
use common::Rig;
use serde_json::json;

fn journaled() -> Rig {
    Rig::with_config(AtmConfig {
        journal_withdrawals: true,
        ..AtmConfig::default()
    })
}

async fn leave_intent(rig: &Rig, key: &str, previous: u64, new: u64) {
    let intent = PendingWithdrawal {
        key: key.to_string(),
        amount: previous - new,
        previous_balance: Balance(previous),
        new_balance: Balance(new),
    };
    rig.store
        .insert(
            &format!("/ATM/Pending/{key}"),
            json!(serde_json::to_string(&intent).unwrap()),
        )
        .await;
}

#[tokio::test]
async fn test_start_reverts_interrupted_withdrawal() {
    let rig = journaled();
    rig.account("-Nx1", "4821", "9137", 3000).await;
    leave_intent(&rig, "-Nx1", 5000, 3000).await;

    rig.terminal().start().await.unwrap();

    assert_eq!(rig.field("-Nx1", "balance").await.as_deref(), Some("5000"));
    assert_eq!(rig.global("/ATM/Pending/-Nx1").await.as_deref(), Some(""));
}

#[tokio::test]
async fn test_start_clears_confirmed_dispense() {
    let rig = journaled();
    rig.account("-Nx1", "4821", "9137", 3000).await;
    rig.store
        .insert("/ATM/Users/-Nx1/transactionCompleted", json!("1"))
        .await;
    leave_intent(&rig, "-Nx1", 5000, 3000).await;

    rig.terminal().start().await.unwrap();

    assert_eq!(rig.field("-Nx1", "balance").await.as_deref(), Some("3000"));
    assert_eq!(rig.global("/ATM/Pending/-Nx1").await.as_deref(), Some(""));
}

#[tokio::test]
async fn test_start_leaves_diverged_intent() {
    let rig = journaled();
    rig.account("-Nx1", "4821", "9137", 1234).await;
    leave_intent(&rig, "-Nx1", 5000, 3000).await;

    rig.terminal().start().await.unwrap();

    assert_eq!(rig.field("-Nx1", "balance").await.as_deref(), Some("1234"));
    assert!(rig.global("/ATM/Pending/-Nx1").await.unwrap().contains("previousBalance"));
}

#[tokio::test]
async fn test_start_survives_unlistable_journal() {
    let rig = journaled();
    rig.account("-Nx1", "4821", "9137", 3000).await;
    leave_intent(&rig, "-Nx1", 5000, 3000).await;
    rig.store.fail_listing_at("/ATM/Pending").await;

    rig.terminal().start().await.unwrap();

    assert_eq!(rig.field("-Nx1", "balance").await.as_deref(), Some("3000"));
    assert!(rig.store.writes_to("/ATM/Pending/-Nx1").await.is_empty());
}

#[tokio::test]
async fn test_stuck_homing_is_not_refunded_on_restart() {
    let rig = journaled();
    rig.account("-Nx1", "4821", "9137", 5000).await;
    rig.keys("4821# 3 9137# 1 2000#").await;
    let terminal = rig.terminal();
    terminal.start().await.unwrap();

    rig.actuator.refuse_servo_angle(0).await;
    terminal.run().await.unwrap();
    assert_eq!(rig.actuator.servo_moves_to(rig.config.dispense_angle).await, 1);

    // the servo is still stuck, so reconcile without homing it first
    let report = TransactionEngine::new(rig.collaborators(), (&rig.config).into())
        .with_journal()
        .reconcile_pending()
        .await
        .unwrap();
    assert!(report.reverted.is_empty());
    assert_eq!(rig.field("-Nx1", "balance").await.as_deref(), Some("3000"));
    assert_eq!(rig.field("-Nx1", "transactionCompleted").await.as_deref(), Some("1"));
}

#[tokio::test]
async fn test_journal_disabled_ignores_intents() {
    let rig = Rig::new();
    rig.account("-Nx1", "4821", "9137", 3000).await;
    leave_intent(&rig, "-Nx1", 5000, 3000).await;

    rig.terminal().start().await.unwrap();

    assert_eq!(rig.field("-Nx1", "balance").await.as_deref(), Some("3000"));
    assert!(rig.store.writes_to("/ATM/Pending/-Nx1").await.is_empty());
}

#[tokio::test]
async fn test_dispense_fault_is_recovered_on_restart() {
    let rig = journaled();
    rig.account("-Nx1", "4821", "9137", 5000).await;
    rig.keys("4821# 3 9137# 1 2000#").await;
    let terminal = rig.terminal();
    terminal.start().await.unwrap();

    rig.actuator.fail_commands(true);
    let outcomes = terminal.run().await.unwrap();
    assert!(outcomes.is_empty());
    assert_eq!(rig.field("-Nx1", "balance").await.as_deref(), Some("3000"));

    rig.actuator.fail_commands(false);
    rig.terminal().start().await.unwrap();
    assert_eq!(rig.field("-Nx1", "balance").await.as_deref(), Some("5000"));
}
