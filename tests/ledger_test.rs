use anyhow::Result;
use fiscus::application::AppError;
use fiscus::domain::{TransactionKind, TransactionStatus, replay_balance};
use uuid::Uuid;

mod common;
use common::test_engine;

#[tokio::test]
async fn test_end_to_end_wallet_lifecycle() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let user = Uuid::new_v4();

    // Fresh wallet starts empty
    let wallet = engine.ensure_wallet(&user).await?;
    assert_eq!(wallet.balance, 0);
    assert_eq!(engine.get_balance(&user).await?, 0);

    // Credit 100
    let credit = engine.credit(&user, 100_000_000).await?;
    assert_eq!(credit.kind, TransactionKind::Credit);
    assert_eq!(credit.status, TransactionStatus::Completed);
    assert_eq!(engine.get_balance(&user).await?, 100_000_000);

    // Charge 40 reserves the funds as a pending debit
    let debit = engine.charge(&user, 40_000_000, Some("op-a")).await?;
    assert_eq!(debit.kind, TransactionKind::Debit);
    assert_eq!(debit.status, TransactionStatus::Pending);
    assert_eq!(engine.get_balance(&user).await?, 60_000_000);

    // Complete the debit
    let completed = engine.complete_transaction(debit.id).await?;
    assert_eq!(completed.status, TransactionStatus::Completed);

    // Refund it: balance restored, original marked refunded, new credit
    // references the original
    let refund = engine.refund_transaction(debit.id).await?;
    assert_eq!(refund.original.status, TransactionStatus::Refunded);
    let refund_credit = refund.credit.expect("first refund creates a credit");
    assert_eq!(refund_credit.kind, TransactionKind::RefundCredit);
    assert_eq!(refund_credit.status, TransactionStatus::Completed);
    assert_eq!(refund_credit.refund_of, Some(debit.id));
    assert_eq!(refund_credit.amount, 40_000_000);
    assert_eq!(engine.get_balance(&user).await?, 100_000_000);

    let txns = engine.transactions_for_user(&user).await?;
    assert_eq!(txns.len(), 3); // credit, debit, refund credit

    Ok(())
}

#[tokio::test]
async fn test_balance_read_never_creates_a_wallet() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let user = Uuid::new_v4();

    assert_eq!(engine.get_balance(&user).await?, 0);

    // Still no wallet: the transaction listing refuses
    let err = engine.transactions_for_user(&user).await.unwrap_err();
    assert!(matches!(err, AppError::WalletNotFound(_)));

    Ok(())
}

#[tokio::test]
async fn test_ensure_wallet_returns_the_same_wallet() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let user = Uuid::new_v4();

    let first = engine.ensure_wallet(&user).await?;
    let second = engine.ensure_wallet(&user).await?;
    assert_eq!(first.id, second.id);

    // Different users get different wallets
    let other = engine.ensure_wallet(&Uuid::new_v4()).await?;
    assert_ne!(first.id, other.id);

    Ok(())
}

#[tokio::test]
async fn test_concurrent_ensure_wallet_creates_one_wallet() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let user = Uuid::new_v4();

    let (a, b) = tokio::join!(engine.ensure_wallet(&user), engine.ensure_wallet(&user));
    assert_eq!(a?.id, b?.id);

    Ok(())
}

#[tokio::test]
async fn test_credit_rejects_non_positive_amounts() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let user = Uuid::new_v4();

    for amount in [0, -5_000_000] {
        let err = engine.credit(&user, amount).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidAmount(_)));
    }

    // Validation happens before any mutation: still no wallet
    let err = engine.transactions_for_user(&user).await.unwrap_err();
    assert!(matches!(err, AppError::WalletNotFound(_)));

    Ok(())
}

#[tokio::test]
async fn test_charge_rejects_non_positive_amounts() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let user = Uuid::new_v4();

    let err = engine.charge(&user, 0, Some("op-zero")).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount(_)));

    Ok(())
}

#[tokio::test]
async fn test_charge_beyond_balance_fails_and_leaves_balance() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let user = Uuid::new_v4();

    engine.credit(&user, 5_000_000).await?;

    let err = engine.charge(&user, 10_000_000, None).await.unwrap_err();
    match err {
        AppError::InsufficientFunds {
            balance, required, ..
        } => {
            assert_eq!(balance, 5_000_000);
            assert_eq!(required, 10_000_000);
        }
        other => panic!("expected InsufficientFunds, got {other:?}"),
    }

    assert_eq!(engine.get_balance(&user).await?, 5_000_000);
    // No debit transaction was recorded
    let txns = engine.transactions_for_user(&user).await?;
    assert_eq!(txns.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_charge_is_idempotent_per_operation_id() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let user = Uuid::new_v4();

    engine.credit(&user, 100_000_000).await?;

    let first = engine.charge(&user, 10_000_000, Some("op-1")).await?;
    let replay = engine.charge(&user, 10_000_000, Some("op-1")).await?;

    assert_eq!(first.id, replay.id);
    assert_eq!(engine.get_balance(&user).await?, 90_000_000);

    let debits: Vec<_> = engine
        .transactions_for_user(&user)
        .await?
        .into_iter()
        .filter(|t| t.kind == TransactionKind::Debit)
        .collect();
    assert_eq!(debits.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_duplicate_operation_id_ignores_new_amount() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let user = Uuid::new_v4();

    engine.credit(&user, 1_000_000_000).await?;

    let first = engine.charge(&user, 40_000_000, Some("op-a")).await?;
    let replay = engine.charge(&user, 999_000_000, Some("op-a")).await?;

    assert_eq!(replay.id, first.id);
    assert_eq!(replay.amount, 40_000_000);
    assert_eq!(engine.get_balance(&user).await?, 960_000_000);

    Ok(())
}

#[tokio::test]
async fn test_concurrent_charges_with_same_operation_id_debit_once() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let user = Uuid::new_v4();

    engine.credit(&user, 100_000_000).await?;

    let (a, b) = tokio::join!(
        engine.charge(&user, 10_000_000, Some("op-race")),
        engine.charge(&user, 10_000_000, Some("op-race"))
    );
    let a = a?;
    let b = b?;

    assert_eq!(a.id, b.id);
    assert_eq!(engine.get_balance(&user).await?, 90_000_000);

    Ok(())
}

#[tokio::test]
async fn test_charges_without_operation_id_are_not_deduplicated() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let user = Uuid::new_v4();

    engine.credit(&user, 100_000_000).await?;
    engine.charge(&user, 10_000_000, None).await?;
    engine.charge(&user, 10_000_000, None).await?;

    assert_eq!(engine.get_balance(&user).await?, 80_000_000);

    Ok(())
}

#[tokio::test]
async fn test_complete_transaction_is_idempotent() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let user = Uuid::new_v4();

    engine.credit(&user, 50_000_000).await?;
    let debit = engine.charge(&user, 20_000_000, None).await?;

    let completed = engine.complete_transaction(debit.id).await?;
    assert_eq!(completed.status, TransactionStatus::Completed);

    let again = engine.complete_transaction(debit.id).await?;
    assert_eq!(again.id, completed.id);
    assert_eq!(again.status, TransactionStatus::Completed);

    // Completing never touches the balance
    assert_eq!(engine.get_balance(&user).await?, 30_000_000);

    Ok(())
}

#[tokio::test]
async fn test_complete_unknown_transaction_fails() -> Result<()> {
    let (engine, _temp) = test_engine().await?;

    let err = engine.complete_transaction(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, AppError::TransactionNotFound(_)));

    Ok(())
}

#[tokio::test]
async fn test_complete_refunded_transaction_returns_it_unchanged() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let user = Uuid::new_v4();

    engine.credit(&user, 50_000_000).await?;
    let debit = engine.charge(&user, 20_000_000, None).await?;
    engine.refund_transaction(debit.id).await?;

    // Status never moves backward from refunded
    let txn = engine.complete_transaction(debit.id).await?;
    assert_eq!(txn.status, TransactionStatus::Refunded);
    assert_eq!(engine.get_balance(&user).await?, 50_000_000);

    Ok(())
}

#[tokio::test]
async fn test_refund_unknown_transaction_fails() -> Result<()> {
    let (engine, _temp) = test_engine().await?;

    let err = engine.refund_transaction(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, AppError::TransactionNotFound(_)));

    Ok(())
}

#[tokio::test]
async fn test_refund_is_idempotent() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let user = Uuid::new_v4();

    engine.credit(&user, 100_000_000).await?;
    let debit = engine.charge(&user, 40_000_000, None).await?;
    engine.complete_transaction(debit.id).await?;

    let first = engine.refund_transaction(debit.id).await?;
    assert!(first.credit.is_some());
    assert_eq!(engine.get_balance(&user).await?, 100_000_000);

    // Second refund is a no-op replay, not an error and not a double credit
    let second = engine.refund_transaction(debit.id).await?;
    assert!(second.credit.is_none());
    assert_eq!(second.original.status, TransactionStatus::Refunded);
    assert_eq!(engine.get_balance(&user).await?, 100_000_000);

    let refund_credits: Vec<_> = engine
        .transactions_for_user(&user)
        .await?
        .into_iter()
        .filter(|t| t.kind == TransactionKind::RefundCredit)
        .collect();
    assert_eq!(refund_credits.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_refunding_a_pending_debit_cancels_the_reservation() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let user = Uuid::new_v4();

    engine.credit(&user, 100_000_000).await?;
    let debit = engine.charge(&user, 40_000_000, Some("op-cancel")).await?;
    assert_eq!(engine.get_balance(&user).await?, 60_000_000);

    // Never completed; refunding releases the held funds
    let outcome = engine.refund_transaction(debit.id).await?;
    assert_eq!(outcome.original.status, TransactionStatus::Refunded);
    assert_eq!(engine.get_balance(&user).await?, 100_000_000);

    Ok(())
}

#[tokio::test]
async fn test_credits_cannot_be_refunded() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let user = Uuid::new_v4();

    let credit = engine.credit(&user, 100_000_000).await?;
    let err = engine.refund_transaction(credit.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotRefundable(_)));
    assert_eq!(engine.get_balance(&user).await?, 100_000_000);

    Ok(())
}

#[tokio::test]
async fn test_balance_always_matches_replayed_log() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let user = Uuid::new_v4();

    engine.credit(&user, 250_000_000).await?;
    let c1 = engine.charge(&user, 75_000_000, Some("op-1")).await?;
    engine.charge(&user, 30_000_000, None).await?;
    engine.complete_transaction(c1.id).await?;
    engine.refund_transaction(c1.id).await?;
    engine.credit(&user, 10_000_000).await?;
    // Replays change nothing
    engine.charge(&user, 75_000_000, Some("op-1")).await?;
    engine.refund_transaction(c1.id).await?;

    let stored = engine.get_balance(&user).await?;
    assert_eq!(stored, 250_000_000 - 30_000_000 + 10_000_000);

    let txns = engine.transactions_for_user(&user).await?;
    assert_eq!(replay_balance(&txns), stored);

    let report = engine.check_integrity().await?;
    assert!(report.is_clean(), "drift: {:?}", report.drift);
    assert_eq!(report.wallet_count, 1);

    Ok(())
}
