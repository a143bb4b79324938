//! Chain client construction.

use std::time::Duration;

use log::info;
use snafu::ResultExt;
use subxt::backend::rpc::reconnecting_rpc_client::{PingConfig, RpcClient};
use subxt::{OnlineClient, PolkadotConfig};

use crate::error::{ChainConnectionSnafu, Result};

/// The connected client type used throughout the pipeline.
pub type Api = OnlineClient<PolkadotConfig>;

/// Connection settings for the chain client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Websocket URL of the node, e.g. `ws://127.0.0.1:9944`.
    pub url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Timeout for establishing the connection.
    pub connection_timeout: Duration,
}

impl ClientConfig {
    /// Settings for `url` with the stock timeouts.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            request_timeout: Duration::from_secs(60),
            connection_timeout: Duration::from_secs(10),
        }
    }
}

/// Connects to the node behind a reconnecting websocket transport with
/// keep-alive pings, so a dropped connection is re-established without the
/// submitter noticing.
pub async fn connect(config: &ClientConfig) -> Result<Api> {
    info!("Connecting to Substrate node at {}", config.url);

    let rpc = RpcClient::builder()
        .request_timeout(config.request_timeout)
        .connection_timeout(config.connection_timeout)
        .enable_ws_ping(PingConfig::new())
        .build(config.url.clone())
        .await
        .map_err(|err| subxt::Error::Other(err.to_string()))
        .context(ChainConnectionSnafu)?;

    let api = OnlineClient::from_rpc_client(rpc)
        .await
        .context(ChainConnectionSnafu)?;

    info!("Substrate client connected");
    Ok(api)
}
