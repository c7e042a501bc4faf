//! Fan-out of send loops over chain pairs.
//!
//! A multi-transfer run spawns one task per source chain. Each source task
//! connects once, loads the chain's routing table, and spawns one send loop
//! per destination; all loops of a source share its client. Every task runs
//! to completion independently: a failure is recorded in the [`RunReport`]
//! and never cancels siblings.

use crate::client::{ChainClient, ChainConnector, RouteEntry};
use crate::config::{AppConfig, ConfigError};
use crate::error::SpammerError;
use crate::runner::{SendLoop, SendLoopConfig, SendLoopReport};
use futures::future::join_all;
use ibcload_types::{
    ChainId, ChainTarget, Coin, PacketTimeout, RunParameters, SigningAccount, TransferSpec,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{error, info};

/// Transfers from every source to every other destination.
#[derive(Debug, Clone)]
pub struct MultiTransferRequest {
    pub sources: Vec<ChainId>,
    pub destinations: Vec<ChainId>,
    /// Amount per message, in each source chain's token denom.
    pub amount: u128,
    pub params: RunParameters,
    pub timeout: PacketTimeout,
}

/// Transfers over one explicit channel.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub source: ChainId,
    pub port: String,
    pub channel: String,
    pub receiver: String,
    pub coin: Coin,
    pub params: RunParameters,
    pub timeout: PacketTimeout,
}

/// Result of one (source, destination) task.
#[derive(Debug)]
pub struct PairOutcome {
    pub source: ChainId,
    pub destination: ChainId,
    pub result: Result<SendLoopReport, SpammerError>,
}

/// Outcomes of every task in a run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<PairOutcome>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &PairOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    /// Number of pairs stopped by cancellation rather than a chain failure.
    pub fn cancelled(&self) -> usize {
        self.failures()
            .filter(|o| matches!(&o.result, Err(e) if e.is_cancelled()))
            .count()
    }

    pub fn outcome(&self, source: &str, destination: &str) -> Option<&PairOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.source.as_str() == source && o.destination.as_str() == destination)
    }

    /// Print the report to stdout.
    pub fn print(&self) {
        println!("\n=== Run Report ===");
        for outcome in &self.outcomes {
            match &outcome.result {
                Ok(report) => report.print(),
                Err(e) => {
                    println!("\n--- {} -> {} ---", outcome.source, outcome.destination);
                    println!("Failed: {e}");
                }
            }
        }
        let failed = self.failures().count();
        println!(
            "\n{} of {} chain pairs completed",
            self.outcomes.len() - failed,
            self.outcomes.len()
        );
    }
}

/// Source chain and the destinations it sends to, with each destination's
/// mnemonic index.
#[derive(Debug, Clone)]
struct SourcePlan {
    source: Arc<ChainTarget>,
    destinations: Vec<(usize, Arc<ChainTarget>)>,
}

/// Runs send loops for a set of chain pairs.
pub struct Orchestrator<K> {
    connector: Arc<K>,
    config: Arc<AppConfig>,
}

impl<K> Orchestrator<K>
where
    K: ChainConnector + 'static,
{
    pub fn new(connector: K, config: AppConfig) -> Self {
        Self {
            connector: Arc::new(connector),
            config: Arc::new(config),
        }
    }

    /// Validate a multi-transfer request and resolve its chain pairs.
    ///
    /// A destination equal to its source is skipped; the remaining
    /// destinations sign with the mnemonic at their position in that list.
    fn plan(&self, request: &MultiTransferRequest) -> Result<Vec<SourcePlan>, ConfigError> {
        if request.sources.is_empty() || request.destinations.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one source and one destination chain are required".into(),
            ));
        }

        let mut seen = HashSet::new();
        let mut sources = Vec::with_capacity(request.sources.len());
        for id in &request.sources {
            if !seen.insert(id) {
                return Err(ConfigError::Invalid(format!("source chain {id} given twice")));
            }
            sources.push(Arc::new(self.config.require_chain(id.as_str(), "src")?.clone()));
        }

        let mut destinations = Vec::with_capacity(request.destinations.len());
        for id in &request.destinations {
            let chain = self.config.require_chain(id.as_str(), "dst")?;
            if chain.dst_address.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    chain: id.to_string(),
                    field: "dst_address",
                });
            }
            destinations.push(Arc::new(chain.clone()));
        }

        let available = self.config.custom.mnemonics.len();
        if available < destinations.len() {
            return Err(ConfigError::NotEnoughMnemonics {
                needed: destinations.len(),
                available,
            });
        }

        Ok(sources
            .into_iter()
            .map(|source| SourcePlan {
                destinations: destinations
                    .iter()
                    .filter(|dst| dst.chain_id != source.chain_id)
                    .cloned()
                    .enumerate()
                    .collect(),
                source,
            })
            .collect())
    }

    /// Run every (source, destination) pair to completion.
    ///
    /// Returns `Err` only for invalid requests, before any task starts.
    pub async fn run_multi(&self, request: MultiTransferRequest) -> Result<RunReport, ConfigError> {
        let plans = self.plan(&request)?;
        let request = Arc::new(request);

        let tasks = plans.into_iter().map(|plan| {
            let source = plan.source.chain_id.clone();
            let destinations: Vec<ChainId> =
                plan.destinations.iter().map(|(_, d)| d.chain_id.clone()).collect();
            let handle = tokio::spawn(run_source(
                self.connector.clone(),
                self.config.clone(),
                plan,
                request.clone(),
            ));
            async move { (source, destinations, handle.await) }
        });

        let mut report = RunReport::default();
        for (source, destinations, joined) in join_all(tasks).await {
            match joined {
                Ok(outcomes) => report.outcomes.extend(outcomes),
                Err(e) => {
                    let reason = panic_reason(e);
                    error!(src = %source, %reason, "Source task panicked");
                    report
                        .outcomes
                        .extend(destinations.into_iter().map(|destination| PairOutcome {
                            source: source.clone(),
                            destination,
                            result: Err(SpammerError::TaskPanicked(reason.clone())),
                        }));
                }
            }
        }
        Ok(report)
    }

    /// Run transfers over one explicit channel, signing with the first mnemonic.
    pub async fn run_single(&self, request: TransferRequest) -> Result<RunReport, ConfigError> {
        let source = self.config.require_chain(request.source.as_str(), "src")?.clone();
        let mnemonic = self.config.mnemonic(0)?.to_string();
        let destination = ChainId::new(format!("{}/{}", request.port, request.channel));

        let result = self
            .run_transfer(source, mnemonic, destination.clone(), request.clone())
            .await;
        log_outcome(&request.source, &destination, &result);

        Ok(RunReport {
            outcomes: vec![PairOutcome {
                source: request.source,
                destination,
                result,
            }],
        })
    }

    async fn run_transfer(
        &self,
        source: ChainTarget,
        mnemonic: String,
        destination: ChainId,
        request: TransferRequest,
    ) -> Result<SendLoopReport, SpammerError> {
        let client = Arc::new(self.connector.connect(&source).await?);
        let counterparty_height = if request.timeout.absolute || request.timeout.height.is_zero() {
            None
        } else {
            client
                .channel_client_height(&request.port, &request.channel)
                .await?
        };

        let signer = SigningAccount::from_mnemonic(
            &mnemonic,
            &source.account_hd_path,
            &source.account_prefix,
        )?;
        let spec = TransferSpec {
            coin: request.coin.normalize_ibc_denom(),
            receiver: request.receiver,
            source_port: request.port,
            source_channel: request.channel,
            msgs_per_tx: request.params.msgs_per_tx,
            timeout: request.timeout,
        };
        let config = SendLoopConfig {
            source: source.chain_id.clone(),
            destination,
            params: request.params,
            fee: self.config.fee_for(&source),
            policy: self.config.client.rejection_policy,
        };

        let mut send_loop =
            SendLoop::prepare(client, config, signer, spec, counterparty_height).await?;
        send_loop.run().await
    }
}

async fn run_source<K: ChainConnector + 'static>(
    connector: Arc<K>,
    config: Arc<AppConfig>,
    plan: SourcePlan,
    request: Arc<MultiTransferRequest>,
) -> Vec<PairOutcome> {
    let source = plan.source.chain_id.clone();

    let setup = async {
        let client = connector.connect(&plan.source).await?;
        let routes = client.routing_table().await?;
        Ok::<_, SpammerError>((Arc::new(client), routes))
    }
    .await;

    let (client, routes) = match setup {
        Ok(setup) => setup,
        Err(e) => {
            error!(src = %source, error = %e, "Failed to set up source chain");
            let reason = e.to_string();
            return plan
                .destinations
                .iter()
                .map(|(_, destination)| PairOutcome {
                    source: source.clone(),
                    destination: destination.chain_id.clone(),
                    result: Err(SpammerError::SourceUnavailable {
                        chain: source.clone(),
                        reason: reason.clone(),
                    }),
                })
                .collect();
        }
    };

    let tasks = plan.destinations.into_iter().map(|(account_index, destination)| {
        let route = routes
            .iter()
            .find(|route| route.remote_chain_id == destination.chain_id)
            .cloned();
        let destination_id = destination.chain_id.clone();
        let handle = tokio::spawn(run_pair(
            client.clone(),
            config.clone(),
            plan.source.clone(),
            destination,
            route,
            account_index,
            request.clone(),
        ));
        async move { (destination_id, handle.await) }
    });

    join_all(tasks)
        .await
        .into_iter()
        .map(|(destination, joined)| {
            let result = joined.unwrap_or_else(|e| Err(SpammerError::TaskPanicked(panic_reason(e))));
            log_outcome(&source, &destination, &result);
            PairOutcome {
                source: source.clone(),
                destination,
                result,
            }
        })
        .collect()
}

async fn run_pair<C: ChainClient + 'static>(
    client: Arc<C>,
    config: Arc<AppConfig>,
    source: Arc<ChainTarget>,
    destination: Arc<ChainTarget>,
    route: Option<RouteEntry>,
    account_index: usize,
    request: Arc<MultiTransferRequest>,
) -> Result<SendLoopReport, SpammerError> {
    let route = route.ok_or_else(|| SpammerError::Routing {
        src_chain: source.chain_id.clone(),
        dst_chain: destination.chain_id.clone(),
    })?;
    info!(
        src = %source.chain_id,
        dst = %destination.chain_id,
        port = %route.port_id,
        channel = %route.channel_id,
        account_index,
        "Resolved route"
    );

    let signer = SigningAccount::from_mnemonic(
        config.mnemonic(account_index)?,
        &source.account_hd_path,
        &source.account_prefix,
    )?;
    let spec = TransferSpec {
        coin: Coin::new(source.token_denom.clone(), request.amount).normalize_ibc_denom(),
        receiver: destination.dst_address.clone(),
        source_port: route.port_id,
        source_channel: route.channel_id,
        msgs_per_tx: request.params.msgs_per_tx,
        timeout: request.timeout,
    };
    let loop_config = SendLoopConfig {
        source: source.chain_id.clone(),
        destination: destination.chain_id.clone(),
        params: request.params,
        fee: config.fee_for(&source),
        policy: config.client.rejection_policy,
    };

    let mut send_loop =
        SendLoop::prepare(client, loop_config, signer, spec, route.counterparty_height).await?;
    send_loop.run().await
}

fn log_outcome(source: &ChainId, destination: &ChainId, result: &Result<SendLoopReport, SpammerError>) {
    match result {
        Ok(report) => info!(
            src = %source,
            dst = %destination,
            blocks = report.blocks_completed,
            "Send loop completed"
        ),
        Err(e) => error!(src = %source, dst = %destination, error = %e, "Send loop failed"),
    }
}

fn panic_reason(e: JoinError) -> String {
    if !e.is_panic() {
        return e.to_string();
    }
    let payload = e.into_panic();
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
