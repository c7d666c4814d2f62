//! JupiterLimitOrderApi against a mocked venue (httpmock, no real network).

use std::time::Duration;

use httpmock::prelude::*;
use lor_chain::{Hash, Pubkey, TransactionExt, VersionedTransaction};
use lor_venue::{
    CancelOrderParams, CreateOrderParams, HistoryPage, JupiterLimitOrderApi, LimitOrderVenue,
    VenueError,
};
use serde_json::json;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::message::Message;
use solana_sdk::transaction::Transaction;

const OWNER: Pubkey = Pubkey::new_from_array([21u8; 32]);
const ORDER: Pubkey = Pubkey::new_from_array([22u8; 32]);
const USDC: Pubkey = Pubkey::new_from_array([23u8; 32]);
const SOL: Pubkey = Pubkey::new_from_array([24u8; 32]);

/// What the venue hands back: owner pays and signs, nothing signed yet.
fn owner_tx() -> VersionedTransaction {
    let ix = Instruction::new_with_bytes(
        Pubkey::new_from_array([9u8; 32]),
        &[1, 2, 3],
        vec![AccountMeta::new(OWNER, true)],
    );
    let msg = Message::new_with_blockhash(&[ix], Some(&OWNER), &Hash::new_from_array([5u8; 32]));
    VersionedTransaction::from(Transaction::new_unsigned(msg))
}

fn api(server: &MockServer) -> JupiterLimitOrderApi {
    JupiterLimitOrderApi::new_with_base_url(server.url("/limit/v1"), Duration::from_secs(2))
        .unwrap()
}

fn page(cursor: Option<&str>) -> HistoryPage {
    HistoryPage {
        wallet: OWNER,
        take: 20,
        cursor: cursor.map(str::to_string),
    }
}

#[tokio::test]
async fn create_order_posts_camel_case_body_and_decodes_transaction() {
    let server = MockServer::start_async().await;
    let tx = owner_tx();
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/limit/v1/createOrder")
                .json_body(json!({
                    "owner": OWNER.to_string(),
                    "inAmount": "100000",
                    "outAmount": "250000",
                    "inputMint": USDC.to_string(),
                    "outputMint": SOL.to_string(),
                    "expiredAt": null,
                    "base": OWNER.to_string(),
                }));
            then.status(200).json_body(json!({
                "tx": tx.to_base64().unwrap(),
                "orderPubkey": ORDER.to_string(),
            }));
        })
        .await;

    let built = api(&server)
        .create_order(&CreateOrderParams {
            owner: OWNER,
            input_mint: USDC,
            output_mint: SOL,
            in_amount: 100_000,
            out_amount: 250_000,
            expired_at: None,
        })
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(built.order_pubkey, ORDER);
    assert_eq!(built.tx.required_signers(), &[OWNER]);
    assert!(!built.tx.is_fully_signed());
}

#[tokio::test]
async fn cancel_order_takes_first_of_txs() {
    let server = MockServer::start_async().await;
    let tx = owner_tx();
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/limit/v1/cancelOrders")
                .body_contains(ORDER.to_string());
            then.status(200).json_body(json!({ "txs": [tx.to_base64().unwrap()] }));
        })
        .await;

    let got = api(&server)
        .cancel_order(&CancelOrderParams {
            owner: OWNER,
            order_pubkey: ORDER,
        })
        .await
        .unwrap();
    assert_eq!(got, owner_tx());
}

#[tokio::test]
async fn cancel_order_with_no_transaction_is_decode_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/limit/v1/cancelOrders");
            then.status(200).json_body(json!({ "txs": [] }));
        })
        .await;

    let err = api(&server)
        .cancel_order(&CancelOrderParams {
            owner: OWNER,
            order_pubkey: ORDER,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, VenueError::Decode(_)), "got {err:?}");
}

#[tokio::test]
async fn garbage_transaction_is_invalid_transaction() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/limit/v1/createOrder");
            then.status(200).json_body(json!({
                "tx": "not base64 !!",
                "orderPubkey": ORDER.to_string(),
            }));
        })
        .await;

    let err = api(&server)
        .create_order(&CreateOrderParams {
            owner: OWNER,
            input_mint: USDC,
            output_mint: SOL,
            in_amount: 1,
            out_amount: 1,
            expired_at: Some(4_000_000_000),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, VenueError::InvalidTransaction(_)), "got {err:?}");
}

#[tokio::test]
async fn error_status_carries_venue_message() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/limit/v1/openOrders");
            then.status(429).json_body(json!({ "error": "rate limited" }));
        })
        .await;

    let err = api(&server).get_orders(&OWNER).await.unwrap_err();
    assert_eq!(
        err,
        VenueError::Api {
            status: 429,
            message: "rate limited".into()
        }
    );
}

#[tokio::test]
async fn open_orders_are_filtered_to_owner() {
    let server = MockServer::start_async().await;
    let other = Pubkey::new_from_array([30u8; 32]).to_string();
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/limit/v1/openOrders")
                .query_param("wallet", OWNER.to_string());
            then.status(200).json_body(json!([
                {
                    "publicKey": ORDER.to_string(),
                    "account": {
                        "maker": OWNER.to_string(),
                        "inputMint": USDC.to_string(),
                        "outputMint": SOL.to_string(),
                        "inAmount": "100000"
                    }
                },
                {
                    "publicKey": Pubkey::new_from_array([31u8; 32]).to_string(),
                    "account": {
                        "maker": other,
                        "inputMint": USDC.to_string(),
                        "outputMint": SOL.to_string()
                    }
                }
            ]));
        })
        .await;

    let orders = api(&server).get_orders(&OWNER).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].public_key, ORDER.to_string());
}

#[tokio::test]
async fn history_passes_take_and_cursor_through() {
    let server = MockServer::start_async().await;
    let orders = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/limit/v1/orderHistory")
                .query_param("wallet", OWNER.to_string())
                .query_param("take", "20")
                .query_param("cursor", "opaque-123");
            then.status(200).json_body(json!([{
                "id": 7,
                "orderKey": ORDER.to_string(),
                "inputMint": USDC.to_string(),
                "outputMint": SOL.to_string(),
                "state": "Cancelled"
            }]));
        })
        .await;
    let trades = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/limit/v1/tradeHistory")
                .query_param("cursor", "opaque-123");
            then.status(200).json_body(json!([]));
        })
        .await;

    let venue = api(&server);
    let history = venue
        .get_order_history(&page(Some("opaque-123")))
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].state.as_deref(), Some("Cancelled"));
    assert!(venue
        .get_trade_history(&page(Some("opaque-123")))
        .await
        .unwrap()
        .is_empty());

    orders.assert_async().await;
    trades.assert_async().await;
}

#[tokio::test]
async fn counts_accept_bare_and_wrapped_numbers() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/limit/v1/orderHistoryCount");
            then.status(200).json_body(json!(12));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/limit/v1/tradeHistoryCount");
            then.status(200).json_body(json!({ "count": 3 }));
        })
        .await;

    let venue = api(&server);
    assert_eq!(venue.get_order_history_count(&OWNER).await.unwrap(), 12);
    assert_eq!(venue.get_trade_history_count(&OWNER).await.unwrap(), 3);
}

#[tokio::test]
async fn api_key_is_sent_as_header() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/limit/v1/orderHistoryCount")
                .header("x-api-key", "k-123");
            then.status(200).json_body(json!(0));
        })
        .await;

    let venue = api(&server).with_api_key(Some("k-123".into()));
    assert_eq!(venue.get_order_history_count(&OWNER).await.unwrap(), 0);
    mock.assert_async().await;
}
