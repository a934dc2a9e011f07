//! Chain connection helpers. The full JSON-RPC/WS client implementation is
//! out of scope (SPEC_FULL §D) — bind to `alloy`'s provider rather than
//! hand-roll a client.

use alloy::{
    network::{Ethereum, EthereumWallet},
    providers::{
        fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, WalletFiller},
        Identity, ProviderBuilder, RootProvider,
    },
    pubsub::PubSubFrontend,
    signers::local::PrivateKeySigner,
    transports::http::{reqwest::Url, Client, Http},
};
use eyre::{Result, WrapErr};

type StandardFillers =
    JoinFill<Identity, JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>>;

pub type HttpChainProvider = FillProvider<
    JoinFill<StandardFillers, WalletFiller<EthereumWallet>>,
    RootProvider<Http<Client>>,
    Http<Client>,
    Ethereum,
>;

pub type WsChainProvider = FillProvider<
    JoinFill<StandardFillers, WalletFiller<EthereumWallet>>,
    RootProvider<PubSubFrontend>,
    PubSubFrontend,
    Ethereum,
>;

/// Connects over WebSocket for log subscription (§4.9 "WebSocket
/// preferred"). Falls back to [`connect_http`] on dial failure.
pub async fn connect_ws(ws_url: &str, private_key_hex: &str) -> Result<WsChainProvider> {
    let url: Url = ws_url.parse().wrap_err_with(|| format!("invalid ws url: {ws_url}"))?;
    let signer = signer_from_hex(private_key_hex)?;
    let wallet = EthereumWallet::from(signer);
    let ws = alloy::providers::WsConnect::new(url);
    ProviderBuilder::new()
        .with_recommended_fillers()
        .wallet(wallet)
        .on_ws(ws)
        .await
        .wrap_err("failed to connect over websocket")
}

pub async fn connect_http(http_url: &str, private_key_hex: &str) -> Result<HttpChainProvider> {
    let url: Url = http_url.parse().wrap_err_with(|| format!("invalid http url: {http_url}"))?;
    let signer = signer_from_hex(private_key_hex)?;
    let wallet = EthereumWallet::from(signer);
    Ok(ProviderBuilder::new()
        .with_recommended_fillers()
        .wallet(wallet)
        .on_http(url))
}

fn signer_from_hex(private_key_hex: &str) -> Result<PrivateKeySigner> {
    private_key_hex
        .parse()
        .wrap_err("failed to parse private key into a signer")
}

/// Swaps a `wss://` URL for its `https://` equivalent, used when the
/// WebSocket dial fails and the Event Listener falls back to HTTP polling.
pub fn ws_to_http(ws_url: &str) -> String {
    ws_url.replacen("wss://", "https://", 1).replacen("ws://", "http://", 1)
}
