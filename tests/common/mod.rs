//! In-memory chain, indexer and helpers shared by the integration tests
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_dyn_abi::DynSolValue;
use anyhow::{anyhow, Result};

use chainlens::config::NetworkConfig;
use chainlens::core::ChainHandle;
use chainlens::domain::abi::EventSignature;
use chainlens::domain::ReceiptSummary;
use chainlens::infrastructure::ethereum::{
    BlockTag, ChainClient, LogQuery, RawBlock, RawLog, RawTransaction,
};
use chainlens::infrastructure::indexer::{ContractSource, IndexedTransaction, IndexerClient};

pub const CHAIN_ID: u64 = 1001;

pub fn network() -> NetworkConfig {
    NetworkConfig {
        name: "test".to_string(),
        rpc: "http://127.0.0.1:8545".to_string(),
        chain_id: Some(CHAIN_ID),
        symbol: "KAIA".to_string(),
        explorer_url: None,
        indexer_url: None,
        indexer_key_env: None,
    }
}

pub fn handle(chain: Arc<FakeChain>) -> ChainHandle {
    ChainHandle::new(network(), chain)
}

pub fn handle_with_indexer(chain: Arc<FakeChain>, indexer: Arc<FakeIndexer>) -> ChainHandle {
    ChainHandle::new(network(), chain).with_indexer(indexer)
}

pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

pub fn encode_return(value: DynSolValue) -> Bytes {
    DynSolValue::Tuple(vec![value]).abi_encode_params().into()
}

pub fn ether(amount: u64) -> U256 {
    U256::from(amount) * U256::from(10u64).pow(U256::from(18u64))
}

/// A `Transfer(from, to, value)` log as the node returns it
pub fn transfer_log(contract: Address, block: u64, log_index: u64, from: Address, to: Address, value: U256) -> RawLog {
    RawLog {
        address: contract,
        topics: vec![
            EventSignature::erc20_transfer().topic0,
            from.into_word(),
            to.into_word(),
        ],
        data: Bytes::from(value.to_be_bytes::<32>().to_vec()),
        block_number: Some(block),
        log_index: Some(log_index),
        transaction_hash: Some(B256::from(U256::from(block * 1_000 + log_index))),
    }
}

#[derive(Default)]
struct ChainState {
    latest: u64,
    blocks: HashMap<u64, RawBlock>,
    logs: Vec<RawLog>,
    failing_windows: HashSet<u64>,
    queries: Vec<LogQuery>,
    code: HashMap<Address, Bytes>,
    balances: HashMap<Address, U256>,
    /// Canned `eth_call` results by selector; missing selectors revert
    calls: HashMap<[u8; 4], Bytes>,
    transactions: HashMap<B256, RawTransaction>,
    sent: Vec<Bytes>,
    receipts: HashMap<B256, ReceiptSummary>,
    /// Receipt status for upcoming broadcasts, oldest first; default success
    receipt_outcomes: VecDeque<bool>,
    send_error: Option<String>,
    rpc_calls: usize,
}

/// In-memory `ChainClient`
#[derive(Default)]
pub struct FakeChain {
    state: Mutex<ChainState>,
}

impl FakeChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ChainState> {
        self.state.lock().unwrap()
    }

    pub fn set_latest(&self, latest: u64) {
        self.state().latest = latest;
    }

    pub fn add_block(&self, block: RawBlock) {
        let mut state = self.state();
        state.latest = state.latest.max(block.number);
        state.blocks.insert(block.number, block);
    }

    pub fn add_log(&self, log: RawLog) {
        self.state().logs.push(log);
    }

    pub fn fail_window_starting_at(&self, from_block: u64) {
        self.state().failing_windows.insert(from_block);
    }

    pub fn queries(&self) -> Vec<LogQuery> {
        self.state().queries.clone()
    }

    pub fn set_code(&self, address: Address, code: Bytes) {
        self.state().code.insert(address, code);
    }

    pub fn set_balance(&self, address: Address, balance: U256) {
        self.state().balances.insert(address, balance);
    }

    pub fn set_call(&self, signature: &str, output: Bytes) {
        self.state().calls.insert(selector(signature), output);
    }

    pub fn add_transaction(&self, tx: RawTransaction) {
        let hash: B256 = tx.hash.parse().unwrap();
        self.state().transactions.insert(hash, tx);
    }

    pub fn queue_receipt(&self, success: bool) {
        self.state().receipt_outcomes.push_back(success);
    }

    pub fn fail_sends(&self, message: &str) {
        self.state().send_error = Some(message.to_string());
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.state().sent.clone()
    }

    pub fn rpc_calls(&self) -> usize {
        self.state().rpc_calls
    }
}

#[async_trait::async_trait]
impl ChainClient for FakeChain {
    async fn chain_id(&self) -> Result<u64> {
        self.state().rpc_calls += 1;
        Ok(CHAIN_ID)
    }

    async fn block_number(&self) -> Result<u64> {
        let mut state = self.state();
        state.rpc_calls += 1;
        Ok(state.latest)
    }

    async fn get_block(&self, tag: BlockTag, include_txs: bool) -> Result<Option<RawBlock>> {
        let mut state = self.state();
        state.rpc_calls += 1;
        let number = match tag {
            BlockTag::Latest | BlockTag::Pending => state.latest,
            BlockTag::Number(number) => number,
        };
        Ok(state.blocks.get(&number).cloned().map(|mut block| {
            if !include_txs {
                block.transactions.clear();
            }
            block
        }))
    }

    async fn get_transaction(&self, hash: B256) -> Result<Option<RawTransaction>> {
        let mut state = self.state();
        state.rpc_calls += 1;
        Ok(state.transactions.get(&hash).cloned())
    }

    async fn get_receipt(&self, hash: B256) -> Result<Option<ReceiptSummary>> {
        let mut state = self.state();
        state.rpc_calls += 1;
        Ok(state.receipts.get(&hash).cloned())
    }

    async fn get_balance(&self, address: Address) -> Result<U256> {
        let mut state = self.state();
        state.rpc_calls += 1;
        Ok(state.balances.get(&address).copied().unwrap_or_default())
    }

    async fn get_code(&self, address: Address) -> Result<Bytes> {
        let mut state = self.state();
        state.rpc_calls += 1;
        Ok(state.code.get(&address).cloned().unwrap_or_default())
    }

    async fn gas_price(&self) -> Result<u128> {
        self.state().rpc_calls += 1;
        Ok(25_000_000_000)
    }

    async fn transaction_count(&self, _address: Address) -> Result<u64> {
        let mut state = self.state();
        state.rpc_calls += 1;
        Ok(state.sent.len() as u64)
    }

    async fn call(&self, _to: Address, data: Bytes) -> Result<Bytes> {
        let mut state = self.state();
        state.rpc_calls += 1;
        if data.len() < 4 {
            return Err(anyhow!("execution reverted"));
        }
        let key = [data[0], data[1], data[2], data[3]];
        state
            .calls
            .get(&key)
            .cloned()
            .ok_or_else(|| anyhow!("execution reverted"))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256> {
        let mut state = self.state();
        state.rpc_calls += 1;
        if let Some(message) = state.send_error.clone() {
            return Err(anyhow!(message));
        }
        let hash = keccak256(&raw);
        let success = state.receipt_outcomes.pop_front().unwrap_or(true);
        let block_number = state.latest + 1;
        state.latest = block_number;
        state.receipts.insert(
            hash,
            ReceiptSummary {
                transaction_hash: hash,
                block_number: Some(block_number),
                success,
                gas_used: 60_000,
            },
        );
        state.sent.push(raw);
        Ok(hash)
    }

    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<RawLog>> {
        let mut state = self.state();
        state.rpc_calls += 1;
        state.queries.push(*query);
        if state.failing_windows.contains(&query.from_block) {
            return Err(anyhow!("query returned more than 10000 results"));
        }
        // newest first, so the scanner has to sort
        let mut logs: Vec<RawLog> = state
            .logs
            .iter()
            .filter(|log| {
                let block = log.block_number.unwrap_or(0);
                log.address == query.address
                    && log.topics.first() == Some(&query.topic0)
                    && block >= query.from_block
                    && block <= query.to_block
            })
            .cloned()
            .collect();
        logs.reverse();
        Ok(logs)
    }

    async fn pending_transaction_count(&self) -> Result<u64> {
        self.state().rpc_calls += 1;
        Ok(3)
    }

    fn endpoint_name(&self) -> String {
        "fake".to_string()
    }
}

#[derive(Default)]
struct IndexerState {
    /// Newest first, like the real API with `sort=desc`
    transactions: Vec<IndexedTransaction>,
    failing_pages: HashSet<u32>,
    sources: HashMap<Address, ContractSource>,
    abis: HashMap<Address, String>,
    requests: usize,
}

/// In-memory `IndexerClient`
#[derive(Default)]
pub struct FakeIndexer {
    state: Mutex<IndexerState>,
}

impl FakeIndexer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> std::sync::MutexGuard<'_, IndexerState> {
        self.state.lock().unwrap()
    }

    /// `count` transactions, newest first, hashes numbered from 1
    pub fn with_history(count: usize, address: Address) -> Arc<Self> {
        let indexer = Self::new();
        indexer.state().transactions = (1..=count)
            .map(|n| IndexedTransaction {
                block_number: (10_000 - n).to_string(),
                time_stamp: (1_700_000_000 - n).to_string(),
                hash: format!("{:#x}", B256::from(U256::from(n))),
                nonce: n.to_string(),
                from: format!("{:#x}", address),
                to: "0x0000000000000000000000000000000000000002".to_string(),
                value: "1500000000000000000".to_string(),
                gas: "21000".to_string(),
                gas_price: "25000000000".to_string(),
                input: "0x".to_string(),
                is_error: "0".to_string(),
            })
            .collect();
        indexer
    }

    pub fn fail_page(&self, page: u32) {
        self.state().failing_pages.insert(page);
    }

    pub fn heal_page(&self, page: u32) {
        self.state().failing_pages.remove(&page);
    }

    pub fn set_source(&self, address: Address, source: ContractSource) {
        self.state().sources.insert(address, source);
    }

    pub fn set_abi(&self, address: Address, abi: &str) {
        self.state().abis.insert(address, abi.to_string());
    }

    pub fn requests(&self) -> usize {
        self.state().requests
    }
}

#[async_trait::async_trait]
impl IndexerClient for FakeIndexer {
    async fn contract_abi(&self, address: Address) -> Result<Option<String>> {
        let mut state = self.state();
        state.requests += 1;
        Ok(state.abis.get(&address).cloned())
    }

    async fn contract_source(&self, address: Address) -> Result<Option<ContractSource>> {
        let mut state = self.state();
        state.requests += 1;
        Ok(state.sources.get(&address).cloned())
    }

    async fn transactions(&self, _address: Address, page: u32, offset: usize) -> Result<Vec<IndexedTransaction>> {
        let mut state = self.state();
        state.requests += 1;
        if state.failing_pages.contains(&page) {
            return Err(anyhow!("indexer timed out"));
        }
        let start = (page as usize - 1) * offset;
        Ok(state.transactions.iter().skip(start).take(offset).cloned().collect())
    }

    async fn transaction_by_hash(&self, _hash: B256) -> Result<Option<RawTransaction>> {
        self.state().requests += 1;
        Ok(None)
    }

    fn name(&self) -> String {
        "fake-indexer".to_string()
    }
}

pub fn raw_block(number: u64, timestamp: u64, transactions: Vec<RawTransaction>) -> RawBlock {
    RawBlock {
        number,
        hash: format!("{:#x}", B256::from(U256::from(number))),
        parent_hash: format!("{:#x}", B256::from(U256::from(number.saturating_sub(1)))),
        timestamp,
        gas_used: 21_000 * transactions.len() as u64,
        gas_limit: 30_000_000,
        base_fee_per_gas: Some(25_000_000_000),
        miner: format!("{:#x}", Address::ZERO),
        transaction_count: transactions.len() as u64,
        transactions,
    }
}

pub fn raw_tx(n: u64, from: Address, to: Address, block: u64) -> RawTransaction {
    RawTransaction {
        hash: format!("{:#x}", B256::from(U256::from(n))),
        from: format!("{:#x}", from),
        to: Some(format!("{:#x}", to)),
        value: ether(1),
        input: Bytes::new(),
        gas: 21_000,
        gas_price: Some(U256::from(25_000_000_000u64)),
        nonce: n,
        block_number: Some(block),
        tx_type: Some(0),
    }
}
