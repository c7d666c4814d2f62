//! Deterministic in-memory venue.
//!
//! Builds real legacy transactions (owner as fee payer and signer, a distinct
//! blockhash per build) against the fake program, serves reads from the
//! shared [`Ledger`], counts every call, and can be scripted to fail.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use lor_chain::{Hash, Pubkey, VersionedTransaction};
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::message::Message;
use solana_sdk::transaction::Transaction;
use lor_schemas::{OpenOrder, OrderHistoryItem, TradeHistoryItem};
use lor_venue::{
    BuiltOrder, CancelOrderParams, CreateOrderParams, HistoryPage, LimitOrderVenue, VenueError,
};

use crate::ledger::{Ledger, FAKE_PROGRAM, TAG_CANCEL, TAG_CREATE};

/// Venue endpoints, used to count calls and script failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VenueCall {
    CreateOrder,
    CancelOrder,
    GetOrders,
    OrderHistory,
    OrderHistoryCount,
    TradeHistory,
    TradeHistoryCount,
}

#[derive(Debug, Default)]
struct VenueState {
    calls: HashMap<VenueCall, u32>,
    /// One-shot failures, consumed in order.
    scripted: HashMap<VenueCall, VecDeque<VenueError>>,
    /// Failures returned on every call.
    always: HashMap<VenueCall, VenueError>,
    builds: u64,
    pages: Vec<HistoryPage>,
    /// Extra required signer added to every built transaction.
    foreign_signer: Option<Pubkey>,
    /// Derive the order account from the owner alone, so every create for
    /// an owner targets the same account.
    reuse_order_account: bool,
}

#[derive(Debug)]
pub struct FakeVenue {
    ledger: Ledger,
    state: Mutex<VenueState>,
}

impl FakeVenue {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger,
            state: Mutex::new(VenueState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VenueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the next call to `call` with `err`. Queued failures are consumed
    /// in order before the venue answers normally again.
    pub fn fail_next(&self, call: VenueCall, err: VenueError) {
        self.lock().scripted.entry(call).or_default().push_back(err);
    }

    /// Fail every call to `call` with `err`.
    pub fn fail_always(&self, call: VenueCall, err: VenueError) {
        self.lock().always.insert(call, err);
    }

    /// Build transactions that also need `signer`'s signature.
    pub fn require_foreign_signer(&self, signer: Pubkey) {
        self.lock().foreign_signer = Some(signer);
    }

    /// Give every create for an owner the same order account, as the real
    /// venue does when the order is derived from `base == owner`.
    pub fn reuse_order_account(&self) {
        self.lock().reuse_order_account = true;
    }

    pub fn calls(&self, call: VenueCall) -> u32 {
        self.lock().calls.get(&call).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.lock().calls.values().sum()
    }

    /// Number of transactions built (create and cancel).
    pub fn builds(&self) -> u64 {
        self.lock().builds
    }

    /// History pages requested so far, in call order.
    pub fn pages(&self) -> Vec<HistoryPage> {
        self.lock().pages.clone()
    }

    fn enter(&self, call: VenueCall) -> Result<(), VenueError> {
        let mut st = self.lock();
        *st.calls.entry(call).or_default() += 1;
        if let Some(err) = st.scripted.get_mut(&call).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        match st.always.get(&call) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn build(
        &self,
        owner: Pubkey,
        accounts: Vec<AccountMeta>,
        data: Vec<u8>,
    ) -> VersionedTransaction {
        let (build, foreign) = {
            let mut st = self.lock();
            st.builds += 1;
            (st.builds, st.foreign_signer)
        };

        let mut blockhash = [0u8; 32];
        blockhash[..8].copy_from_slice(&build.to_le_bytes());
        blockhash[31] = 0xbb;
        let blockhash = Hash::new_from_array(blockhash);
        self.ledger.issue_blockhash(blockhash);

        let mut metas = vec![AccountMeta::new(owner, true)];
        metas.extend(accounts);
        if let Some(signer) = foreign {
            metas.push(AccountMeta::new_readonly(signer, true));
        }
        let ix = Instruction::new_with_bytes(FAKE_PROGRAM, &data, metas);
        let msg = Message::new_with_blockhash(&[ix], Some(&owner), &blockhash);
        VersionedTransaction::from(Transaction::new_unsigned(msg))
    }
}

/// Order account address for the `n`th build; stable across runs.
fn order_address(owner: &Pubkey, n: u64) -> Pubkey {
    let mut bytes = owner.to_bytes();
    for (b, x) in bytes.iter_mut().zip(n.to_le_bytes()) {
        *b ^= x ^ 0x5c;
    }
    bytes[31] = 0x0d;
    Pubkey::new_from_array(bytes)
}

#[async_trait]
impl LimitOrderVenue for FakeVenue {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn create_order(&self, params: &CreateOrderParams) -> Result<BuiltOrder, VenueError> {
        self.enter(VenueCall::CreateOrder)?;
        // Unless reuse is on, every build gets its own order account.
        let n = if self.lock().reuse_order_account {
            0
        } else {
            u64::from(self.calls(VenueCall::CreateOrder))
        };
        let order_pubkey = order_address(&params.owner, n);

        let mut data = vec![TAG_CREATE];
        data.extend_from_slice(&params.in_amount.to_le_bytes());
        data.extend_from_slice(&params.out_amount.to_le_bytes());

        let tx = self.build(
            params.owner,
            vec![
                AccountMeta::new(order_pubkey, false),
                AccountMeta::new_readonly(params.input_mint, false),
                AccountMeta::new_readonly(params.output_mint, false),
            ],
            data,
        );
        Ok(BuiltOrder { tx, order_pubkey })
    }

    async fn cancel_order(
        &self,
        params: &CancelOrderParams,
    ) -> Result<VersionedTransaction, VenueError> {
        self.enter(VenueCall::CancelOrder)?;
        Ok(self.build(
            params.owner,
            vec![AccountMeta::new(params.order_pubkey, false)],
            vec![TAG_CANCEL],
        ))
    }

    async fn get_orders(&self, owner: &Pubkey) -> Result<Vec<OpenOrder>, VenueError> {
        self.enter(VenueCall::GetOrders)?;
        Ok(self.ledger.open_orders(owner))
    }

    async fn get_order_history(
        &self,
        page: &HistoryPage,
    ) -> Result<Vec<OrderHistoryItem>, VenueError> {
        self.enter(VenueCall::OrderHistory)?;
        self.lock().pages.push(page.clone());
        Ok(self
            .ledger
            .order_history(&page.wallet, page.take, page.cursor.as_deref()))
    }

    async fn get_order_history_count(&self, wallet: &Pubkey) -> Result<u64, VenueError> {
        self.enter(VenueCall::OrderHistoryCount)?;
        Ok(self.ledger.order_history_count(wallet))
    }

    async fn get_trade_history(
        &self,
        page: &HistoryPage,
    ) -> Result<Vec<TradeHistoryItem>, VenueError> {
        self.enter(VenueCall::TradeHistory)?;
        self.lock().pages.push(page.clone());
        Ok(self
            .ledger
            .trade_history(&page.wallet, page.take, page.cursor.as_deref()))
    }

    async fn get_trade_history_count(&self, wallet: &Pubkey) -> Result<u64, VenueError> {
        self.enter(VenueCall::TradeHistoryCount)?;
        Ok(self.ledger.trade_history_count(wallet))
    }
}
