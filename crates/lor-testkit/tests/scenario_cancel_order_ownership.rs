//! Scenario: cancel-order ownership and idempotence.
//!
//! 1. Cancelling someone else's order is NotFound and builds nothing.
//! 2. Cancelling an unknown order is NotFound and builds nothing.
//! 3. A confirmed cancel removes the order; cancelling it again is NotFound.

use lor_chain::Signer;
use lor_config::Commitment;
use lor_execution::{ErrorCode, RequestValidator, RetryPolicy, SubmissionPipeline};
use lor_testkit::{address, cancel_order_body, owner, Sim, VenueCall};

fn pipeline(sim: &Sim) -> SubmissionPipeline {
    SubmissionPipeline::new(
        sim.venue.clone(),
        sim.chain.clone(),
        RetryPolicy::default(),
        Commitment::Confirmed,
    )
}

#[tokio::test(start_paused = true)]
async fn cancelling_another_owners_order_is_not_found() {
    let sim = Sim::new();
    let maker = owner(1);
    let intruder = owner(2);
    let order = address(50);
    sim.ledger
        .seed_open_order(maker.pubkey(), order, address(10), address(11), 5, 7);

    let cmd = RequestValidator::default()
        .cancel_order(&cancel_order_body(&intruder, order))
        .unwrap();
    let err = pipeline(&sim).cancel_order(&cmd).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::NotFound);
    assert_eq!(err.http_status(), 404);
    assert_eq!(sim.venue.calls(VenueCall::GetOrders), 1);
    assert_eq!(sim.venue.builds(), 0);
    assert_eq!(sim.chain.sends(), 0);
    assert!(sim.ledger.is_open(&order));
}

#[tokio::test(start_paused = true)]
async fn cancelling_unknown_order_is_not_found() {
    let sim = Sim::new();
    let cmd = RequestValidator::default()
        .cancel_order(&cancel_order_body(&owner(3), address(51)))
        .unwrap();

    let err = pipeline(&sim).cancel_order(&cmd).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
    assert_eq!(sim.venue.calls(VenueCall::CancelOrder), 0);
}

#[tokio::test(start_paused = true)]
async fn second_cancel_of_same_order_is_not_found() {
    let sim = Sim::new();
    let maker = owner(4);
    let order = address(52);
    sim.ledger
        .seed_open_order(maker.pubkey(), order, address(10), address(11), 5, 7);
    let cmd = RequestValidator::default()
        .cancel_order(&cancel_order_body(&maker, order))
        .unwrap();
    let relay = pipeline(&sim);

    let txid = relay.cancel_order(&cmd).await.unwrap();
    assert!(!txid.is_empty());
    assert!(!sim.ledger.is_open(&order));
    assert_eq!(sim.chain.sends(), 1);

    let err = relay.cancel_order(&cmd).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
    assert_eq!(sim.venue.calls(VenueCall::CancelOrder), 1);
    assert_eq!(sim.chain.sends(), 1);

    let history = sim.ledger.order_history(&maker.pubkey(), 10, None);
    assert_eq!(history[0].state.as_deref(), Some("Cancelled"));
    assert_eq!(history[0].cancel_txid.as_deref(), Some(txid.as_str()));
}

#[tokio::test(start_paused = true)]
async fn created_order_can_be_cancelled_by_its_owner() {
    let sim = Sim::new();
    let kp = owner(5);
    let validator = RequestValidator::default();
    let relay = pipeline(&sim);

    let create = validator
        .create_order(&lor_testkit::create_order_body(&kp, address(10), address(11)))
        .unwrap();
    let created = relay.create_order(&create).await.unwrap();

    let cancel = validator
        .cancel_order(&cancel_order_body(&kp, created.order_pubkey))
        .unwrap();
    relay.cancel_order(&cancel).await.unwrap();
    assert!(sim.ledger.open_orders(&kp.pubkey()).is_empty());
}
