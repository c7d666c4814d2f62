//! HttpChainRpc against a mocked JSON-RPC node (httpmock, no real network).

use std::time::Duration;

use httpmock::prelude::*;
use lor_chain::{
    keypair_from_seed, ChainRpc, Hash, HttpChainRpc, Pubkey, RpcError, Signer, TransactionExt,
    VersionedTransaction,
};
use serde_json::json;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::message::Message;
use solana_sdk::transaction::Transaction;

fn signed_tx() -> VersionedTransaction {
    let owner = keypair_from_seed(&[11u8; 32]).unwrap();
    let ix = Instruction::new_with_bytes(
        Pubkey::new_from_array([1u8; 32]),
        &[9],
        vec![AccountMeta::new(owner.pubkey(), true)],
    );
    let msg = Message::new_with_blockhash(&[ix], Some(&owner.pubkey()), &Hash::new_from_array([2u8; 32]));
    let mut tx = VersionedTransaction::from(Transaction::new_unsigned(msg));
    tx.sign_as(&owner).unwrap();
    tx
}

fn client(server: &MockServer) -> HttpChainRpc {
    HttpChainRpc::new(server.url("/rpc"), "confirmed", Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn send_transaction_posts_base64_and_returns_signature() {
    let server = MockServer::start_async().await;
    let tx = signed_tx();
    let txid = tx.txid().unwrap();

    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/rpc")
                .body_contains("\"sendTransaction\"")
                .body_contains(tx.to_base64().unwrap())
                .body_contains("\"encoding\":\"base64\"");
            then.status(200)
                .json_body(json!({"jsonrpc": "2.0", "id": 1, "result": txid.clone()}));
        })
        .await;

    let got = client(&server).send_transaction(&tx).await.unwrap();
    assert_eq!(got, tx.txid().unwrap());
    mock.assert_async().await;
}

#[tokio::test]
async fn rpc_error_object_is_surfaced_with_code_and_message() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/rpc");
            then.status(200).json_body(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {
                    "code": -32002,
                    "message": "Transaction simulation failed: Blockhash not found",
                    "data": {"err": "BlockhashNotFound"}
                }
            }));
        })
        .await;

    let err = client(&server)
        .send_transaction(&signed_tx())
        .await
        .unwrap_err();
    match err {
        RpcError::Rpc { code, message, data } => {
            assert_eq!(code, -32002);
            assert!(message.contains("Blockhash not found"));
            assert_eq!(data, Some(json!({"err": "BlockhashNotFound"})));
        }
        other => panic!("expected Rpc error, got {other:?}"),
    }
}

#[tokio::test]
async fn signature_status_parses_confirmed_and_unknown() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/rpc").body_contains("known-sig");
            then.status(200).json_body(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {
                    "context": {"slot": 100},
                    "value": [{
                        "slot": 99,
                        "confirmations": 3,
                        "err": null,
                        "confirmationStatus": "confirmed"
                    }]
                }
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/rpc").body_contains("unknown-sig");
            then.status(200).json_body(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {"context": {"slot": 100}, "value": [null]}
            }));
        })
        .await;

    let rpc = client(&server);
    let status = rpc.signature_status("known-sig").await.unwrap().unwrap();
    assert_eq!(status.slot, 99);
    assert_eq!(status.confirmation_status.as_deref(), Some("confirmed"));
    assert!(status.err.is_none());

    assert!(rpc.signature_status("unknown-sig").await.unwrap().is_none());
}

#[tokio::test]
async fn blockhash_validity_is_read_from_context_value() {
    let server = MockServer::start_async().await;
    let fresh = Hash::new_from_array([2u8; 32]);
    let stale = Hash::new_from_array([3u8; 32]);
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/rpc")
                .body_contains("\"isBlockhashValid\"")
                .body_contains(fresh.to_string());
            then.status(200).json_body(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {"context": {"slot": 120}, "value": true}
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/rpc")
                .body_contains("\"isBlockhashValid\"")
                .body_contains(stale.to_string());
            then.status(200).json_body(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {"context": {"slot": 120}, "value": false}
            }));
        })
        .await;

    let rpc = client(&server);
    assert!(rpc.is_blockhash_valid(&fresh).await.unwrap());
    assert!(!rpc.is_blockhash_valid(&stale).await.unwrap());
}

#[tokio::test]
async fn gateway_error_without_json_is_http_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/rpc");
            then.status(503).body("upstream down");
        })
        .await;

    let err = client(&server).health().await.unwrap_err();
    assert_eq!(err, RpcError::Http { status: 503 });
}

#[tokio::test]
async fn slow_node_times_out() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/rpc");
            then.status(200)
                .delay(Duration::from_millis(800))
                .json_body(json!({"jsonrpc": "2.0", "id": 1, "result": "ok"}));
        })
        .await;

    let rpc =
        HttpChainRpc::new(server.url("/rpc"), "confirmed", Duration::from_millis(100)).unwrap();
    let err = rpc.health().await.unwrap_err();
    assert!(matches!(err, RpcError::Timeout(_)), "got {err:?}");
}

#[tokio::test]
async fn refused_connection_is_transport_error() {
    // Port 9 (discard) is essentially never listening on loopback.
    let rpc = HttpChainRpc::new("http://127.0.0.1:9/", "confirmed", Duration::from_secs(2))
        .unwrap();
    let err = rpc.health().await.unwrap_err();
    assert!(
        matches!(err, RpcError::Transport(_) | RpcError::Timeout(_)),
        "got {err:?}"
    );
}

#[test]
fn debug_output_hides_url() {
    let rpc = HttpChainRpc::new(
        "https://rpc.example.invalid/?api-key=secret",
        "confirmed",
        Duration::from_secs(1),
    )
    .unwrap();
    let dbg = format!("{rpc:?}");
    assert!(!dbg.contains("secret"));
}
