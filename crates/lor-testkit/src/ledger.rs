//! In-memory stand-in for the on-chain order book.
//!
//! The fake venue reads from it; the fake chain writes to it when a
//! transaction lands. A cancel therefore only takes effect once its
//! transaction is confirmed, exactly like the real system of record.
//! It also remembers when each blockhash was handed out, which is what the
//! fake chain ages blockhashes against.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lor_chain::{Hash, Pubkey, VersionedTransaction};
use lor_schemas::{OpenOrder, OrderAccount, OrderHistoryItem, TradeHistoryItem, TradeOrderRef};
use serde_json::{json, Value};
use tokio::time::Instant;

/// Program id of the fake limit-order program.
pub const FAKE_PROGRAM: Pubkey = Pubkey::new_from_array([0x4a; 32]);

pub(crate) const TAG_CREATE: u8 = 1;
pub(crate) const TAG_CANCEL: u8 = 2;

#[derive(Debug, Default)]
struct LedgerState {
    open: Vec<OpenOrder>,
    order_history: Vec<OrderHistoryItem>,
    trade_history: Vec<TradeHistoryItem>,
    next_row: i64,
    blockhashes: HashMap<Hash, Instant>,
}

impl LedgerState {
    fn next_row(&mut self) -> i64 {
        self.next_row += 1;
        self.next_row
    }
}

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    inner: Arc<Mutex<LedgerState>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn issue_blockhash(&self, hash: Hash) {
        self.lock().blockhashes.insert(hash, Instant::now());
    }

    /// When the venue handed out `hash`; `None` for a hash it never issued.
    pub fn blockhash_issued_at(&self, hash: &Hash) -> Option<Instant> {
        self.lock().blockhashes.get(hash).copied()
    }

    /// Place an open order directly, as if created earlier.
    pub fn seed_open_order(
        &self,
        maker: Pubkey,
        order: Pubkey,
        input_mint: Pubkey,
        output_mint: Pubkey,
        in_amount: u64,
        out_amount: u64,
    ) {
        let mut st = self.lock();
        let row = st.next_row();
        st.open.push(open_order(maker, order, input_mint, output_mint, in_amount, out_amount));
        st.order_history.push(OrderHistoryItem {
            id: row,
            order_key: order.to_string(),
            maker: Some(maker.to_string()),
            input_mint: input_mint.to_string(),
            output_mint: output_mint.to_string(),
            in_amount: Some(in_amount.to_string()),
            ori_in_amount: Some(in_amount.to_string()),
            out_amount: Some(out_amount.to_string()),
            ori_out_amount: Some(out_amount.to_string()),
            expired_at: None,
            state: Some("Open".into()),
            create_txid: None,
            cancel_txid: None,
            updated_at: None,
            created_at: None,
        });
    }

    /// Record a fill against `order`. The trade belongs to the order's maker.
    pub fn seed_trade(&self, order: Pubkey, in_amount: u64, out_amount: u64) {
        let mut st = self.lock();
        let row = st.next_row();
        let mints = st
            .order_history
            .iter()
            .find(|h| h.order_key == order.to_string())
            .map(|h| (h.input_mint.clone(), h.output_mint.clone()));
        st.trade_history.push(TradeHistoryItem {
            id: row,
            in_amount: Some(in_amount.to_string()),
            out_amount: Some(out_amount.to_string()),
            txid: Some(format!("trade-{row}")),
            updated_at: None,
            created_at: None,
            order: Some(TradeOrderRef {
                id: None,
                order_key: order.to_string(),
                input_mint: mints.as_ref().map(|m| m.0.clone()),
                output_mint: mints.map(|m| m.1),
            }),
        });
    }

    pub fn open_orders(&self, wallet: &Pubkey) -> Vec<OpenOrder> {
        let wallet = wallet.to_string();
        self.lock()
            .open
            .iter()
            .filter(|o| o.is_owned_by(&wallet))
            .cloned()
            .collect()
    }

    pub fn is_open(&self, order: &Pubkey) -> bool {
        let key = order.to_string();
        self.lock().open.iter().any(|o| o.public_key == key)
    }

    /// Newest first; `cursor` is the id of the last row already seen.
    pub fn order_history(&self, wallet: &Pubkey, take: u32, cursor: Option<&str>) -> Vec<OrderHistoryItem> {
        let wallet = wallet.to_string();
        let before = cursor.and_then(|c| c.parse::<i64>().ok()).unwrap_or(i64::MAX);
        let st = self.lock();
        let mut rows: Vec<_> = st
            .order_history
            .iter()
            .filter(|h| h.maker.as_deref() == Some(wallet.as_str()) && h.id < before)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.id.cmp(&a.id));
        rows.truncate(take as usize);
        rows
    }

    pub fn order_history_count(&self, wallet: &Pubkey) -> u64 {
        let wallet = wallet.to_string();
        self.lock()
            .order_history
            .iter()
            .filter(|h| h.maker.as_deref() == Some(wallet.as_str()))
            .count() as u64
    }

    pub fn trade_history(&self, wallet: &Pubkey, take: u32, cursor: Option<&str>) -> Vec<TradeHistoryItem> {
        let before = cursor.and_then(|c| c.parse::<i64>().ok()).unwrap_or(i64::MAX);
        let owned = self.order_keys_of(wallet);
        let st = self.lock();
        let mut rows: Vec<_> = st
            .trade_history
            .iter()
            .filter(|t| {
                t.id < before
                    && t.order
                        .as_ref()
                        .map(|o| owned.contains(&o.order_key))
                        .unwrap_or(false)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.id.cmp(&a.id));
        rows.truncate(take as usize);
        rows
    }

    pub fn trade_history_count(&self, wallet: &Pubkey) -> u64 {
        let owned = self.order_keys_of(wallet);
        self.lock()
            .trade_history
            .iter()
            .filter(|t| {
                t.order
                    .as_ref()
                    .map(|o| owned.contains(&o.order_key))
                    .unwrap_or(false)
            })
            .count() as u64
    }

    fn order_keys_of(&self, wallet: &Pubkey) -> Vec<String> {
        let wallet = wallet.to_string();
        self.lock()
            .order_history
            .iter()
            .filter(|h| h.maker.as_deref() == Some(wallet.as_str()))
            .map(|h| h.order_key.clone())
            .collect()
    }

    /// Apply the effect of a landed transaction built by the fake venue.
    ///
    /// Creating an order account that is already open fails the way the
    /// program does, with the transaction error as `Err`.
    pub(crate) fn apply(&self, tx: &VersionedTransaction, txid: &str) -> Result<(), Value> {
        let keys = tx.message.static_account_keys();
        let Some(ix) = tx.message.instructions().first() else {
            return Ok(());
        };
        if keys.get(usize::from(ix.program_id_index)) != Some(&FAKE_PROGRAM) {
            return Ok(());
        }
        let key = |i: usize| {
            ix.accounts
                .get(i)
                .and_then(|k| keys.get(usize::from(*k)))
                .copied()
        };

        match ix.data.first() {
            Some(&TAG_CREATE) => {
                let (Some(owner), Some(order), Some(input_mint), Some(output_mint)) =
                    (key(0), key(1), key(2), key(3))
                else {
                    return Ok(());
                };
                if self.is_open(&order) {
                    return Err(json!({ "InstructionError": [0, { "Custom": 0 }] }));
                }
                let in_amount = read_u64(&ix.data, 1);
                let out_amount = read_u64(&ix.data, 9);
                self.seed_open_order(owner, order, input_mint, output_mint, in_amount, out_amount);
                let mut st = self.lock();
                if let Some(h) = st
                    .order_history
                    .iter_mut()
                    .rev()
                    .find(|h| h.order_key == order.to_string())
                {
                    h.create_txid = Some(txid.to_string());
                }
            }
            Some(&TAG_CANCEL) => {
                let Some(order) = key(1) else {
                    return Ok(());
                };
                let order_key = order.to_string();
                let mut st = self.lock();
                st.open.retain(|o| o.public_key != order_key);
                if let Some(h) = st
                    .order_history
                    .iter_mut()
                    .rev()
                    .find(|h| h.order_key == order_key)
                {
                    h.state = Some("Cancelled".into());
                    h.cancel_txid = Some(txid.to_string());
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn read_u64(data: &[u8], at: usize) -> u64 {
    data.get(at..at + 8)
        .and_then(|b| <[u8; 8]>::try_from(b).ok())
        .map(u64::from_le_bytes)
        .unwrap_or(0)
}

fn open_order(
    maker: Pubkey,
    order: Pubkey,
    input_mint: Pubkey,
    output_mint: Pubkey,
    in_amount: u64,
    out_amount: u64,
) -> OpenOrder {
    OpenOrder {
        public_key: order.to_string(),
        account: OrderAccount {
            maker: maker.to_string(),
            input_mint: input_mint.to_string(),
            output_mint: output_mint.to_string(),
            ori_in_amount: Some(in_amount.to_string()),
            ori_out_amount: Some(out_amount.to_string()),
            in_amount: Some(in_amount.to_string()),
            out_amount: Some(out_amount.to_string()),
            expired_at: None,
            base: Some(maker.to_string()),
            waiting: Some(false),
        },
    }
}
