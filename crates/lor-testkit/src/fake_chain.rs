//! Deterministic in-memory chain node.
//!
//! Every submitted transaction must carry valid ed25519 signatures for all
//! its required signers and a blockhash the venue issued less than the
//! blockhash lifetime ago, as a real node would check. What happens after
//! acceptance is scripted per send; with an empty script transactions land
//! and confirm immediately. Delayed landings are applied lazily, on the next
//! call that observes the chain.

use std::collections::{HashMap, VecDeque};
use std::mem;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use lor_chain::{ChainRpc, Hash, RpcError, SignatureStatus, TransactionExt, VersionedTransaction};
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::ledger::Ledger;

/// How long a blockhash stays usable unless changed with
/// [`FakeChain::set_blockhash_ttl`].
pub const DEFAULT_BLOCKHASH_TTL: Duration = Duration::from_secs(15);

/// Outcome of one `sendTransaction` call.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Accepted; lands and confirms.
    Land,
    /// Rejected at submission with this error.
    Fail(RpcError),
    /// Accepted but never seen again (dropped, blockhash expired).
    NeverLands,
    /// Accepted, lands, and fails on chain with this `err` value.
    FailOnChain(Value),
    /// Accepted; lands this long after the send if its blockhash is still
    /// valid by then, otherwise it is dropped.
    LandsAfter(Duration),
    /// Lands, but the send call times out before the node answers.
    LandsButSendTimesOut,
}

#[derive(Debug)]
struct Pending {
    at: Instant,
    tx: VersionedTransaction,
    txid: String,
}

#[derive(Debug, Default)]
struct ChainState {
    script: VecDeque<SendOutcome>,
    /// Outcome once the script is exhausted; `Land` when unset.
    fallback: Option<SendOutcome>,
    statuses: HashMap<String, SignatureStatus>,
    pending: Vec<Pending>,
    sent: Vec<VersionedTransaction>,
    sends: u32,
    status_polls: u32,
    blockhash_checks: u32,
    health_checks: u32,
    health: Option<RpcError>,
    next_slot: u64,
    blockhash_ttl: Duration,
}

#[derive(Debug)]
pub struct FakeChain {
    ledger: Ledger,
    state: Mutex<ChainState>,
}

impl FakeChain {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger,
            state: Mutex::new(ChainState {
                blockhash_ttl: DEFAULT_BLOCKHASH_TTL,
                ..ChainState::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue outcomes for the next sends, in order.
    pub fn script<I: IntoIterator<Item = SendOutcome>>(&self, outcomes: I) {
        self.lock().script.extend(outcomes);
    }

    /// Outcome for every send after the script runs out.
    pub fn always(&self, outcome: SendOutcome) {
        self.lock().fallback = Some(outcome);
    }

    pub fn set_unhealthy(&self, err: Option<RpcError>) {
        self.lock().health = err;
    }

    pub fn set_blockhash_ttl(&self, ttl: Duration) {
        self.lock().blockhash_ttl = ttl;
    }

    pub fn sends(&self) -> u32 {
        self.lock().sends
    }

    pub fn status_polls(&self) -> u32 {
        self.lock().status_polls
    }

    pub fn blockhash_checks(&self) -> u32 {
        self.lock().blockhash_checks
    }

    pub fn health_checks(&self) -> u32 {
        self.lock().health_checks
    }

    /// Every transaction passed to `send_transaction`, including rejected ones.
    pub fn sent(&self) -> Vec<VersionedTransaction> {
        self.lock().sent.clone()
    }

    pub fn total_calls(&self) -> u32 {
        let st = self.lock();
        st.sends + st.status_polls + st.blockhash_checks + st.health_checks
    }

    fn blockhash_valid_at(&self, hash: &Hash, at: Instant) -> bool {
        let ttl = self.lock().blockhash_ttl;
        self.ledger
            .blockhash_issued_at(hash)
            .map(|issued| at < issued + ttl)
            .unwrap_or(false)
    }

    /// Land every delayed transaction whose time has come.
    fn settle(&self) {
        let now = Instant::now();
        let due: Vec<Pending> = {
            let mut st = self.lock();
            let (due, later): (Vec<Pending>, Vec<Pending>) = mem::take(&mut st.pending)
                .into_iter()
                .partition(|p| p.at <= now);
            st.pending = later;
            due
        };
        for p in due {
            if self.blockhash_valid_at(p.tx.message.recent_blockhash(), p.at) {
                self.land(&p.tx, &p.txid);
            }
        }
    }

    fn land(&self, tx: &VersionedTransaction, txid: &str) {
        let err = self.ledger.apply(tx, txid).err();
        self.record(txid, err);
    }

    fn record(&self, txid: &str, err: Option<Value>) {
        let mut st = self.lock();
        st.next_slot += 1;
        let status = SignatureStatus {
            slot: st.next_slot,
            confirmations: None,
            err,
            confirmation_status: Some("finalized".into()),
        };
        st.statuses.insert(txid.to_string(), status);
    }
}

fn signature_failure() -> RpcError {
    RpcError::Rpc {
        code: -32003,
        message: "Transaction signature verification failure".into(),
        data: None,
    }
}

fn blockhash_not_found() -> RpcError {
    RpcError::Rpc {
        code: -32002,
        message: "Transaction simulation failed: Blockhash not found".into(),
        data: Some(json!({ "err": "BlockhashNotFound" })),
    }
}

#[async_trait]
impl ChainRpc for FakeChain {
    async fn send_transaction(&self, tx: &VersionedTransaction) -> Result<String, RpcError> {
        self.settle();
        {
            let mut st = self.lock();
            st.sends += 1;
            st.sent.push(tx.clone());
        }

        let Some(txid) = tx.txid().filter(|_| tx.is_fully_signed()) else {
            return Err(signature_failure());
        };
        let outcome = {
            let mut st = self.lock();
            st.script
                .pop_front()
                .or_else(|| st.fallback.clone())
                .unwrap_or(SendOutcome::Land)
        };
        // Scripted rejections win over the blockhash check.
        let outcome = match outcome {
            SendOutcome::Fail(err) => return Err(err),
            other => other,
        };
        let now = Instant::now();
        if !self.blockhash_valid_at(tx.message.recent_blockhash(), now) {
            return Err(blockhash_not_found());
        }

        match outcome {
            SendOutcome::Fail(_) | SendOutcome::NeverLands => {}
            SendOutcome::FailOnChain(err) => self.record(&txid, Some(err)),
            SendOutcome::Land => self.land(tx, &txid),
            SendOutcome::LandsAfter(delay) => self.lock().pending.push(Pending {
                at: now + delay,
                tx: tx.clone(),
                txid: txid.clone(),
            }),
            SendOutcome::LandsButSendTimesOut => {
                self.land(tx, &txid);
                return Err(RpcError::Timeout("sendTransaction timed out".into()));
            }
        }
        Ok(txid)
    }

    async fn signature_status(&self, signature: &str) -> Result<Option<SignatureStatus>, RpcError> {
        self.settle();
        let mut st = self.lock();
        st.status_polls += 1;
        Ok(st.statuses.get(signature).cloned())
    }

    async fn is_blockhash_valid(&self, blockhash: &Hash) -> Result<bool, RpcError> {
        self.settle();
        self.lock().blockhash_checks += 1;
        Ok(self.blockhash_valid_at(blockhash, Instant::now()))
    }

    async fn health(&self) -> Result<(), RpcError> {
        let mut st = self.lock();
        st.health_checks += 1;
        match &st.health {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}
