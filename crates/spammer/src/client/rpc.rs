//! HTTP implementation of [`ChainClient`].

use super::types::{
    AccountResponse, BlockResult, BroadcastTxResult, ChannelClientStateResponse,
    ChannelsResponse, JsonRpcRequest, JsonRpcResponse, StatusResult,
};
use super::{
    AccountInfo, BroadcastError, BroadcastResponse, ChainClient, ChainConnector,
    ConnectionError, QueryError, RequestError, RouteEntry,
};
use crate::config::ClientConfig;
use async_trait::async_trait;
use base64::Engine as _;
use ibcload_types::{
    BlockHeight, BlockSummary, ChainId, ChainTarget, IbcHeight, CODE_MEMPOOL_FULL,
};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

const TRANSFER_PORT: &str = "transfer";
const ERROR_BODY_LIMIT: usize = 512;
const MEMPOOL_FULL_ERROR: &str = "mempool is full";

/// Client for one chain's Tendermint RPC and REST gateway endpoints.
#[derive(Clone)]
pub struct RpcClient {
    chain: ChainId,
    rpc: Url,
    rest: Url,
    http: reqwest::Client,
    config: ClientConfig,
    cancel: CancellationToken,
    next_id: Arc<AtomicU64>,
}

impl RpcClient {
    /// Build a client without contacting the node.
    pub fn new(
        target: &ChainTarget,
        config: ClientConfig,
        cancel: CancellationToken,
    ) -> Result<Self, ConnectionError> {
        let rpc = parse_endpoint("rpc", &target.rpc)?;
        let rest = parse_endpoint("rest", &target.rest)?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ConnectionError::Builder)?;

        Ok(Self {
            chain: target.chain_id.clone(),
            rpc,
            rest,
            http,
            config,
            cancel,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Run `fut` unless the run is cancelled first.
    async fn cancellable<T>(
        &self,
        fut: impl Future<Output = Result<T, RequestError>>,
    ) -> Result<T, RequestError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(RequestError::Cancelled),
            result = fut => result,
        }
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<(StatusCode, Vec<u8>), RequestError> {
        self.cancellable(async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok((status, body.to_vec()))
        })
        .await
    }

    async fn rpc_call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, RequestError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);
        trace!(chain = %self.chain, method, id, "JSON-RPC request");

        let (status, body) = self.send(self.http.post(self.rpc.clone()).json(&request)).await?;
        match serde_json::from_slice::<JsonRpcResponse<T>>(&body) {
            Ok(JsonRpcResponse {
                error: Some(error), ..
            }) => Err(RequestError::Rpc {
                code: error.code,
                message: error.describe(),
            }),
            Ok(JsonRpcResponse {
                result: Some(result),
                ..
            }) => Ok(result),
            Ok(_) => Err(RequestError::Decode(format!("{method}: response has no result"))),
            Err(_) if !status.is_success() => Err(status_error(status, &body)),
            Err(e) => Err(RequestError::Decode(format!("{method}: {e}"))),
        }
    }

    async fn rest_get<T: DeserializeOwned>(&self, path: &str) -> Result<T, RequestError> {
        let url = self
            .rest
            .join(path.trim_start_matches('/'))
            .map_err(|e| RequestError::Decode(format!("bad path {path}: {e}")))?;
        trace!(chain = %self.chain, %url, "REST request");

        let (status, body) = self.send(self.http.get(url)).await?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        serde_json::from_slice(&body).map_err(|e| RequestError::Decode(format!("{path}: {e}")))
    }

    async fn status(&self) -> Result<StatusResult, QueryError> {
        self.rpc_call("status", json!({}))
            .await
            .map_err(|source| QueryError::request("status", source))
    }

    async fn client_state(
        &self,
        port: &str,
        channel: &str,
    ) -> Result<ChannelClientStateResponse, QueryError> {
        self.rest_get(&format!(
            "ibc/core/channel/v1/channels/{channel}/ports/{port}/client_state"
        ))
        .await
        .map_err(|source| QueryError::request("channel client state", source))
    }
}

#[async_trait]
impl ChainClient for RpcClient {
    async fn chain_id(&self) -> Result<ChainId, QueryError> {
        Ok(ChainId::new(self.status().await?.node_info.network))
    }

    async fn latest_height(&self) -> Result<BlockHeight, QueryError> {
        Ok(BlockHeight(self.status().await?.sync_info.latest_block_height))
    }

    async fn block(&self, height: BlockHeight) -> Result<BlockSummary, QueryError> {
        let result: BlockResult = self
            .rpc_call("block", json!({ "height": height.0.to_string() }))
            .await
            .map_err(|source| QueryError::request("block", source))?;

        let header = result.block.header;
        if header.height != height.0 {
            return Err(QueryError::BlockNotFound(height));
        }
        let time = parse_block_time(&header.time)?;
        Ok(BlockSummary {
            height,
            time,
            tx_count: result.block.data.txs.map_or(0, |txs| txs.len()),
        })
    }

    async fn wait_for_height(&self, height: BlockHeight) -> Result<(), QueryError> {
        let started = Instant::now();
        loop {
            let current = self.latest_height().await?;
            if current >= height {
                return Ok(());
            }

            let ahead = height.0 - current.0;
            if ahead > self.config.max_wait_blocks {
                return Err(QueryError::TooFarAhead {
                    target: height,
                    current,
                    ahead,
                    max: self.config.max_wait_blocks,
                });
            }
            if started.elapsed() >= self.config.wait_timeout {
                return Err(QueryError::WaitTimeout {
                    target: height,
                    current,
                    waited: started.elapsed(),
                });
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(QueryError::Cancelled),
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }

    async fn account_info(&self, address: &str) -> Result<AccountInfo, QueryError> {
        let response: AccountResponse = self
            .rest_get(&format!("cosmos/auth/v1beta1/accounts/{address}"))
            .await
            .map_err(|source| match source {
                RequestError::Status { status: 404, .. } => {
                    QueryError::AccountNotFound(address.to_string())
                }
                source => QueryError::request("account", source),
            })?;

        let (account_number, sequence) =
            response
                .number_and_sequence()
                .ok_or_else(|| QueryError::Malformed {
                    what: "account",
                    reason: format!("no account_number in {}", response.account),
                })?;
        Ok(AccountInfo {
            account_number,
            sequence,
        })
    }

    async fn broadcast(&self, tx_bytes: Vec<u8>) -> Result<BroadcastResponse, BroadcastError> {
        let tx = base64::engine::general_purpose::STANDARD.encode(tx_bytes);
        let result: BroadcastTxResult =
            match self.rpc_call("broadcast_tx_sync", json!({ "tx": tx })).await {
                Ok(result) => result,
                // CometBFT reports a full mempool as an RPC error, not a CheckTx code.
                Err(RequestError::Rpc { message, .. }) if message.contains(MEMPOOL_FULL_ERROR) => {
                    return Ok(BroadcastResponse {
                        code: CODE_MEMPOOL_FULL,
                        log: message,
                        hash: String::new(),
                    });
                }
                Err(e) => return Err(e.into()),
            };

        if result.code != 0 {
            debug!(
                chain = %self.chain,
                code = result.code,
                codespace = %result.codespace,
                log = %result.log,
                "CheckTx rejected transaction"
            );
        }
        Ok(BroadcastResponse {
            code: result.code,
            log: result.log,
            hash: result.hash,
        })
    }

    async fn routing_table(&self) -> Result<Vec<RouteEntry>, QueryError> {
        let channels: ChannelsResponse = self
            .rest_get("ibc/core/channel/v1/channels?pagination.limit=1000")
            .await
            .map_err(|source| QueryError::request("channels", source))?;

        let mut routes = Vec::new();
        for channel in channels
            .channels
            .into_iter()
            .filter(|c| c.is_open() && c.port_id == TRANSFER_PORT)
        {
            let state = self.client_state(&channel.port_id, &channel.channel_id).await?;
            let Some(client) = state.identified_client_state else {
                continue;
            };
            let Some(remote) = client.chain_id() else {
                continue;
            };
            routes.push(RouteEntry {
                remote_chain_id: ChainId::new(remote),
                counterparty_height: client
                    .latest_height()
                    .map(|(number, height)| IbcHeight::new(number, height)),
                port_id: channel.port_id,
                channel_id: channel.channel_id,
            });
        }

        debug!(chain = %self.chain, routes = routes.len(), "Loaded routing table");
        Ok(routes)
    }

    async fn channel_client_height(
        &self,
        port: &str,
        channel: &str,
    ) -> Result<Option<IbcHeight>, QueryError> {
        let state = self.client_state(port, channel).await?;
        Ok(state
            .identified_client_state
            .and_then(|client| client.latest_height())
            .map(|(number, height)| IbcHeight::new(number, height)))
    }
}

/// Opens [`RpcClient`]s sharing one configuration and cancellation token.
#[derive(Clone)]
pub struct RpcConnector {
    config: ClientConfig,
    cancel: CancellationToken,
}

impl RpcConnector {
    pub fn new(config: ClientConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }
}

#[async_trait]
impl ChainConnector for RpcConnector {
    type Client = RpcClient;

    async fn connect(&self, target: &ChainTarget) -> Result<RpcClient, ConnectionError> {
        let client = RpcClient::new(target, self.config.clone(), self.cancel.clone())?;
        let status: StatusResult = client
            .rpc_call("status", json!({}))
            .await
            .map_err(|source| ConnectionError::Unreachable {
                endpoint: target.rpc.clone(),
                source,
            })?;

        debug!(
            chain = %target.chain_id,
            network = %status.node_info.network,
            height = status.sync_info.latest_block_height,
            catching_up = status.sync_info.catching_up,
            "Connected to node"
        );
        Ok(client)
    }
}

fn parse_endpoint(kind: &'static str, endpoint: &str) -> Result<Url, ConnectionError> {
    // Url::join drops the last path segment unless it ends with a slash.
    let normalized = if endpoint.ends_with('/') {
        endpoint.to_string()
    } else {
        format!("{endpoint}/")
    };
    Url::parse(&normalized).map_err(|e| ConnectionError::InvalidEndpoint {
        kind,
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })
}

fn status_error(status: StatusCode, body: &[u8]) -> RequestError {
    let text = String::from_utf8_lossy(body);
    let body = match text.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.into_owned(),
    };
    RequestError::Status {
        status: status.as_u16(),
        body,
    }
}

fn parse_block_time(time: &str) -> Result<SystemTime, QueryError> {
    humantime::parse_rfc3339(time)
        .or_else(|_| humantime::parse_rfc3339_weak(time))
        .map_err(|e| QueryError::Malformed {
            what: "block time",
            reason: format!("{time}: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{serve_json, MEMPOOL_FULL_RPC_ERROR};
    use std::time::Duration;

    fn target(rpc: &str, rest: &str) -> ChainTarget {
        ChainTarget {
            chain_id: ChainId::new("gaia"),
            rpc: rpc.into(),
            rest: rest.into(),
            token_denom: "uatom".into(),
            account_prefix: "cosmos".into(),
            account_hd_path: "m/44'/118'/0'/0/0".into(),
            dst_address: String::new(),
        }
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let url = parse_endpoint("rest", "http://localhost:1317/api").unwrap();
        let joined = url.join("cosmos/auth/v1beta1/accounts/x").unwrap();
        assert_eq!(joined.as_str(), "http://localhost:1317/api/cosmos/auth/v1beta1/accounts/x");
    }

    #[test]
    fn test_invalid_endpoint() {
        let result = RpcClient::new(
            &target("not a url", "http://localhost:1317"),
            ClientConfig::default(),
            CancellationToken::new(),
        );
        assert!(matches!(
            result,
            Err(ConnectionError::InvalidEndpoint { kind: "rpc", .. })
        ));
    }

    #[test]
    fn test_parse_block_time_with_nanos() {
        let time = parse_block_time("2024-05-01T10:00:00.500000000Z").unwrap();
        let base = parse_block_time("2024-05-01T10:00:00Z").unwrap();
        assert_eq!(time.duration_since(base).unwrap(), Duration::from_millis(500));
        assert!(parse_block_time("yesterday").is_err());
    }

    #[test]
    fn test_status_error_truncates_body() {
        let body = "x".repeat(2 * ERROR_BODY_LIMIT);
        match status_error(StatusCode::BAD_GATEWAY, body.as_bytes()) {
            RequestError::Status { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body.len(), ERROR_BODY_LIMIT + 3);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_request_returns_promptly() {
        let cancel = CancellationToken::new();
        // Reserved TEST-NET address; the request would hang until timeout.
        let client = RpcClient::new(
            &target("http://192.0.2.1:26657", "http://192.0.2.1:1317"),
            ClientConfig::default(),
            cancel.clone(),
        )
        .unwrap();
        cancel.cancel();

        let err = client.latest_height().await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_mempool_full_rpc_error_maps_to_code() {
        let url = serve_json(MEMPOOL_FULL_RPC_ERROR).await;
        let client =
            RpcClient::new(&target(&url, &url), ClientConfig::default(), CancellationToken::new())
                .unwrap();

        let response = client.broadcast(vec![1, 2, 3]).await.unwrap();
        assert_eq!(response.code, CODE_MEMPOOL_FULL);
        assert!(response.log.contains("mempool is full"));
        assert!(response.hash.is_empty());
    }

    #[tokio::test]
    async fn test_other_rpc_errors_fail_broadcast() {
        let body = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32603,"message":"Internal error","data":"tx already exists in cache"}}"#;
        let url = serve_json(body).await;
        let client =
            RpcClient::new(&target(&url, &url), ClientConfig::default(), CancellationToken::new())
                .unwrap();

        let err = client.broadcast(vec![1, 2, 3]).await.unwrap_err();
        assert!(matches!(
            err,
            BroadcastError::Request(RequestError::Rpc { code: -32603, .. })
        ));
    }
}
