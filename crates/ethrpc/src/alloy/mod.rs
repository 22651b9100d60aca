pub mod errors;

use {
    crate::AlloyProvider,
    alloy::{
        network::EthereumWallet,
        providers::{Provider, ProviderBuilder},
        rpc::client::ClientBuilder,
    },
    url::Url,
};

/// Read-only provider, e.g. for polling logs.
pub fn provider(url: &Url) -> AlloyProvider {
    let rpc = ClientBuilder::default().http(url.clone());
    ProviderBuilder::new().connect_client(rpc).erased()
}

/// Provider that fills nonces, gas and chain id and signs transactions with
/// the wallet signer matching each transaction's `from`.
pub fn provider_with_wallet(url: &Url, wallet: EthereumWallet) -> AlloyProvider {
    let rpc = ClientBuilder::default().http(url.clone());
    ProviderBuilder::new()
        .wallet(wallet)
        .connect_client(rpc)
        .erased()
}
