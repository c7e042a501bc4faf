//! In-memory chain used by unit tests.

use crate::client::{
    AccountInfo, BroadcastError, BroadcastResponse, ChainClient, ChainConnector,
    ConnectionError, QueryError, RequestError, RouteEntry,
};
use crate::config::{AppConfig, ClientConfig, CustomConfig, IbcConfig};
use async_trait::async_trait;
use ibcload_types::{
    decode_signed_tx, BlockHeight, BlockSummary, ChainId, ChainTarget, Coin, IbcHeight,
    PacketTimeout, SigningAccount, TransferSpec, TxFee,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// BIP-39 test vectors.
pub const TEST_MNEMONICS: [&str; 3] = [
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
    "legal winner thank year wave sausage worth useful legal winner thank yellow",
    "letter advice cage absurd amount doctor acoustic avoid letter advice cage above",
];

pub const TEST_HD_PATH: &str = "m/44'/118'/0'/0/0";

pub fn test_signer(index: usize) -> SigningAccount {
    SigningAccount::from_mnemonic(TEST_MNEMONICS[index], TEST_HD_PATH, "cosmos").unwrap()
}

pub fn test_fee() -> TxFee {
    TxFee {
        amount: Coin::new("uatom", 5000),
        gas_limit: 200_000,
        memo: "load".into(),
    }
}

pub fn test_spec(msgs_per_tx: usize) -> TransferSpec {
    TransferSpec {
        coin: Coin::new("uatom", 1),
        receiver: "osmo1receiver".into(),
        source_port: "transfer".into(),
        source_channel: "channel-0".into(),
        msgs_per_tx,
        timeout: PacketTimeout::default(),
    }
}

pub fn chain_target(id: &str) -> ChainTarget {
    ChainTarget {
        chain_id: ChainId::new(id),
        rpc: format!("http://{id}:26657"),
        rest: format!("http://{id}:1317"),
        token_denom: format!("u{id}"),
        account_prefix: "cosmos".into(),
        account_hd_path: TEST_HD_PATH.into(),
        dst_address: format!("{id}1receiver"),
    }
}

pub fn test_config(chains: &[&str], mnemonics: usize) -> AppConfig {
    AppConfig {
        custom: CustomConfig {
            mnemonics: TEST_MNEMONICS[..mnemonics]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            gas_limit: 200_000,
            fee_amount: 5000,
            memo: String::new(),
        },
        client: ClientConfig::default(),
        ibc: IbcConfig {
            chains: chains.iter().map(|id| chain_target(id)).collect(),
        },
    }
}

/// A transaction seen by [`MockChain::broadcast`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTx {
    /// Latest committed height when the transaction arrived.
    pub height: u64,
    pub sequence: u64,
    pub message_count: usize,
    pub code: u32,
}

struct MockState {
    height: u64,
    genesis: SystemTime,
    block_interval: Duration,
    account: AccountInfo,
    routes: Vec<RouteEntry>,
    codes: VecDeque<u32>,
    broadcasts: Vec<RecordedTx>,
    pending: usize,
    committed: HashMap<u64, usize>,
    skip_on_next_wait: u64,
    fail_queries: bool,
    status_calls: usize,
}

/// A chain that produces blocks on demand.
///
/// Waiting for a height commits every block up to it immediately, so loops
/// run without real time passing. Accepted transactions land in the next
/// committed block.
#[derive(Clone)]
pub struct MockChain {
    chain_id: ChainId,
    state: Arc<Mutex<MockState>>,
}

impl MockChain {
    pub fn new(chain_id: &str, height: u64) -> Self {
        Self {
            chain_id: ChainId::new(chain_id),
            state: Arc::new(Mutex::new(MockState {
                height,
                genesis: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
                block_interval: Duration::from_secs(5),
                account: AccountInfo {
                    account_number: 1,
                    sequence: 0,
                },
                routes: Vec::new(),
                codes: VecDeque::new(),
                broadcasts: Vec::new(),
                pending: 0,
                committed: HashMap::new(),
                skip_on_next_wait: 0,
                fail_queries: false,
                status_calls: 0,
            })),
        }
    }

    pub fn with_account(self, account_number: u64, sequence: u64) -> Self {
        self.state.lock().account = AccountInfo {
            account_number,
            sequence,
        };
        self
    }

    pub fn with_route(self, remote: &str, channel: &str) -> Self {
        self.state.lock().routes.push(RouteEntry {
            remote_chain_id: ChainId::new(remote),
            port_id: "transfer".into(),
            channel_id: channel.into(),
            counterparty_height: Some(IbcHeight::new(1, 500)),
        });
        self
    }

    /// Answer the next broadcasts with `codes`, in order. Later ones get 0.
    pub fn script_codes(&self, codes: impl IntoIterator<Item = u32>) {
        self.state.lock().codes.extend(codes);
    }

    /// Commit `blocks` extra blocks during the next wait.
    pub fn skip_blocks_on_next_wait(&self, blocks: u64) {
        self.state.lock().skip_on_next_wait = blocks;
    }

    pub fn fail_queries(&self) {
        self.state.lock().fail_queries = true;
    }

    pub fn height(&self) -> u64 {
        self.state.lock().height
    }

    pub fn broadcasts(&self) -> Vec<RecordedTx> {
        self.state.lock().broadcasts.clone()
    }

    pub fn sequences(&self) -> Vec<u64> {
        self.broadcasts().iter().map(|tx| tx.sequence).collect()
    }

    pub fn status_calls(&self) -> usize {
        self.state.lock().status_calls
    }

    fn unavailable(what: &'static str) -> QueryError {
        QueryError::Request {
            what,
            source: RequestError::Status {
                status: 503,
                body: "node unavailable".into(),
            },
        }
    }

    fn check(&self, what: &'static str) -> Result<(), QueryError> {
        if self.state.lock().fail_queries {
            return Err(Self::unavailable(what));
        }
        Ok(())
    }
}

impl MockState {
    fn commit_block(&mut self) {
        self.height += 1;
        let txs = std::mem::take(&mut self.pending);
        self.committed.insert(self.height, txs);
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn chain_id(&self) -> Result<ChainId, QueryError> {
        self.check("status")?;
        Ok(self.chain_id.clone())
    }

    async fn latest_height(&self) -> Result<BlockHeight, QueryError> {
        self.check("status")?;
        let mut state = self.state.lock();
        state.status_calls += 1;
        Ok(BlockHeight(state.height))
    }

    async fn block(&self, height: BlockHeight) -> Result<BlockSummary, QueryError> {
        self.check("block")?;
        let state = self.state.lock();
        if height.0 > state.height {
            return Err(QueryError::BlockNotFound(height));
        }
        Ok(BlockSummary {
            height,
            time: state.genesis + state.block_interval * height.0 as u32,
            tx_count: state.committed.get(&height.0).copied().unwrap_or(0),
        })
    }

    async fn wait_for_height(&self, height: BlockHeight) -> Result<(), QueryError> {
        self.check("status")?;
        let mut state = self.state.lock();
        while state.height < height.0 {
            state.commit_block();
        }
        for _ in 0..std::mem::take(&mut state.skip_on_next_wait) {
            state.commit_block();
        }
        Ok(())
    }

    async fn account_info(&self, _address: &str) -> Result<AccountInfo, QueryError> {
        self.check("account")?;
        Ok(self.state.lock().account)
    }

    async fn broadcast(&self, tx_bytes: Vec<u8>) -> Result<BroadcastResponse, BroadcastError> {
        if self.state.lock().fail_queries {
            return Err(BroadcastError::Request(RequestError::Status {
                status: 503,
                body: "node unavailable".into(),
            }));
        }
        let tx = decode_signed_tx(&tx_bytes)
            .map_err(|e| BroadcastError::Request(RequestError::Decode(e.to_string())))?;

        let mut state = self.state.lock();
        let code = state.codes.pop_front().unwrap_or(0);
        if code == 0 {
            state.pending += 1;
        }
        let height = state.height;
        state.broadcasts.push(RecordedTx {
            height,
            sequence: tx.sequence,
            message_count: tx.message_count,
            code,
        });

        Ok(BroadcastResponse {
            code,
            log: if code == 0 {
                String::new()
            } else {
                format!("mock rejection {code}")
            },
            hash: format!("{:064X}", state.broadcasts.len()),
        })
    }

    async fn routing_table(&self) -> Result<Vec<RouteEntry>, QueryError> {
        self.check("channels")?;
        Ok(self.state.lock().routes.clone())
    }

    async fn channel_client_height(
        &self,
        _port: &str,
        _channel: &str,
    ) -> Result<Option<IbcHeight>, QueryError> {
        self.check("channel client state")?;
        Ok(Some(IbcHeight::new(1, 500)))
    }
}

/// Hands out registered [`MockChain`]s; unknown or unreachable chains fail.
#[derive(Default)]
pub struct MockConnector {
    chains: HashMap<String, MockChain>,
    unreachable: HashSet<String>,
}

impl MockConnector {
    pub fn with_chain(mut self, chain: &MockChain) -> Self {
        self.chains
            .insert(chain.chain_id.as_str().to_string(), chain.clone());
        self
    }

    pub fn with_unreachable(mut self, chain_id: &str) -> Self {
        self.unreachable.insert(chain_id.to_string());
        self
    }
}

#[async_trait]
impl ChainConnector for MockConnector {
    type Client = MockChain;

    async fn connect(&self, target: &ChainTarget) -> Result<MockChain, ConnectionError> {
        let id = target.chain_id.as_str();
        match self.chains.get(id) {
            Some(chain) if !self.unreachable.contains(id) => Ok(chain.clone()),
            _ => Err(ConnectionError::Unreachable {
                endpoint: target.rpc.clone(),
                source: RequestError::Status {
                    status: 503,
                    body: "connection refused".into(),
                },
            }),
        }
    }
}

/// CometBFT's answer to `broadcast_tx_sync` when the mempool is full.
pub const MEMPOOL_FULL_RPC_ERROR: &str = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32603,"message":"Internal error","data":"mempool is full: number of txs 5000 (max: 5000), total txs bytes 2250000 (max: 1073741824)"}}"#;

/// Answer every HTTP request on a local port with `body` and return the
/// base URL.
pub async fn serve_json(body: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let body = body.to_string();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let body = body.clone();
            tokio::spawn(async move {
                read_request(&mut stream).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    format!("http://{addr}")
}

async fn read_request(stream: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
        let length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= end + 4 + length {
            return;
        }
    }
}
