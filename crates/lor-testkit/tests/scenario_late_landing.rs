//! Scenario: transactions that land after the poll window.
//!
//! 1. A create that lands 13s after submission is the only order; nothing
//!    is rebuilt while its blockhash is still valid.
//! 2. With the order account reused across builds, a late landing still
//!    yields exactly one open order, and a rebuild after expiry targets the
//!    same account without colliding.
//! 3. A send that times out but was delivered is followed by its own
//!    signature and confirmed without a second send.
//! 4. A transaction held past its blockhash lifetime is dropped; the
//!    rebuild lands instead.
//! 5. A late cancel returns its own txid.

use std::time::Duration;

use lor_chain::{Signer, TransactionExt};
use lor_config::Commitment;
use lor_execution::{
    CreateOrderCommand, ErrorCode, FailureReason, RequestValidator, RetryPolicy,
    SubmissionPipeline,
};
use lor_testkit::{
    address, cancel_order_body, create_order_body, owner, SendOutcome, Sim, VenueCall,
};

fn pipeline(sim: &Sim) -> SubmissionPipeline {
    SubmissionPipeline::new(
        sim.venue.clone(),
        sim.chain.clone(),
        RetryPolicy::default(),
        Commitment::Confirmed,
    )
}

fn command(seed: u8) -> CreateOrderCommand {
    RequestValidator::default()
        .create_order(&create_order_body(&owner(seed), address(10), address(11)))
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn create_landing_after_the_poll_window_is_the_only_order() {
    let sim = Sim::new();
    sim.chain
        .script([SendOutcome::LandsAfter(Duration::from_secs(13))]);

    let created = pipeline(&sim).create_order(&command(1)).await.unwrap();

    assert_eq!(sim.venue.calls(VenueCall::CreateOrder), 1);
    let sent = sim.chain.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].txid(), Some(created.txid));
    // The 12s window passed, the node said the blockhash was still good.
    assert!(sim.chain.blockhash_checks() >= 1);

    let open = sim.ledger.open_orders(&owner(1).pubkey());
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].public_key, created.order_pubkey.to_string());
}

#[tokio::test(start_paused = true)]
async fn reused_order_account_landing_late_is_created_once() {
    let sim = Sim::new();
    sim.venue.reuse_order_account();
    sim.chain
        .script([SendOutcome::LandsAfter(Duration::from_secs(13))]);

    let created = pipeline(&sim).create_order(&command(2)).await.unwrap();

    assert_eq!(sim.chain.sends(), 1);
    assert_eq!(sim.ledger.open_orders(&owner(2).pubkey()).len(), 1);
    assert!(sim.ledger.is_open(&created.order_pubkey));
}

#[tokio::test(start_paused = true)]
async fn reused_order_account_is_rebuilt_only_after_expiry() {
    let sim = Sim::new();
    sim.venue.reuse_order_account();
    sim.chain.script([SendOutcome::NeverLands, SendOutcome::Land]);

    let created = pipeline(&sim).create_order(&command(3)).await.unwrap();

    assert_eq!(sim.venue.calls(VenueCall::CreateOrder), 2);
    assert_eq!(sim.chain.sends(), 2);
    let open = sim.ledger.open_orders(&owner(3).pubkey());
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].public_key, created.order_pubkey.to_string());
}

#[tokio::test(start_paused = true)]
async fn creating_an_order_account_that_is_already_open_fails_on_chain() {
    let sim = Sim::new();
    sim.venue.reuse_order_account();
    let relay = pipeline(&sim);

    relay.create_order(&command(4)).await.unwrap();
    let err = relay.create_order(&command(4)).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::SubmissionFailed);
    assert_eq!(err.reason, Some(FailureReason::ProgramError));
    assert_eq!(sim.chain.sends(), 2);
    assert_eq!(sim.ledger.open_orders(&owner(4).pubkey()).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn delivered_send_that_timed_out_is_confirmed_without_resending() {
    let sim = Sim::new();
    sim.chain.script([SendOutcome::LandsButSendTimesOut]);

    let created = pipeline(&sim).create_order(&command(5)).await.unwrap();

    assert_eq!(sim.chain.sends(), 1);
    assert_eq!(sim.venue.calls(VenueCall::CreateOrder), 1);
    assert_eq!(sim.chain.sent()[0].txid(), Some(created.txid));
    assert_eq!(sim.ledger.open_orders(&owner(5).pubkey()).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn transaction_held_past_its_blockhash_is_dropped_and_rebuilt() {
    let sim = Sim::new();
    sim.chain.script([
        SendOutcome::LandsAfter(Duration::from_secs(20)),
        SendOutcome::Land,
    ]);

    let created = pipeline(&sim).create_order(&command(6)).await.unwrap();

    let sent = sim.chain.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].txid(), Some(created.txid));
    assert_eq!(sim.ledger.open_orders(&owner(6).pubkey()).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_landing_late_returns_its_txid() {
    let sim = Sim::new();
    let maker = owner(7);
    let order = address(55);
    sim.ledger
        .seed_open_order(maker.pubkey(), order, address(10), address(11), 5, 7);
    sim.chain
        .script([SendOutcome::LandsAfter(Duration::from_secs(13))]);
    let cmd = RequestValidator::default()
        .cancel_order(&cancel_order_body(&maker, order))
        .unwrap();

    let txid = pipeline(&sim).cancel_order(&cmd).await.unwrap();

    assert_eq!(sim.chain.sends(), 1);
    assert_eq!(sim.chain.sent()[0].txid(), Some(txid));
    assert!(!sim.ledger.is_open(&order));
}
