//! Boundary between the provisioning pipeline and the chain.
//!
//! Every state changing call waits for its receipt, so when a method returns
//! `Ok` the effect is final on the node. Failures are classified into
//! [`ChainError`] so callers can tell "already done" apart from fatal errors.

use {
    crate::distributor::AirdropRecord,
    alloy::primitives::{Address, B256, TxHash, U256},
    ethrpc::alloy::errors::ChainError,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Chain: Send + Sync {
    /// Address of a previous deployment of the named contract on this
    /// network. `None` unless the chain still has code there that was built
    /// from the current artifact with the same constructor arguments.
    async fn deployment(&self, name: &str, args: Vec<Address>)
    -> Result<Option<Address>, ChainError>;

    /// Deploys the named contract with the given constructor arguments,
    /// records it in the address book and returns its address.
    async fn deploy(&self, name: &str, args: Vec<Address>) -> Result<Address, ChainError>;

    /// Calls the contract's one-time `initialize()`.
    async fn initialize(&self, contract: Address) -> Result<TxHash, ChainError>;

    async fn grant_role(
        &self,
        contract: Address,
        role: B256,
        grantee: Address,
    ) -> Result<TxHash, ChainError>;

    /// Lets `operator` move all of `owner`'s assets. Sent by `owner`.
    async fn set_approval_for_all(
        &self,
        contract: Address,
        owner: Address,
        operator: Address,
    ) -> Result<TxHash, ChainError>;

    /// Lets `spender` move up to `amount` of `owner`'s balance. Sent by
    /// `owner`.
    async fn approve(
        &self,
        contract: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxHash, ChainError>;

    async fn mint(&self, contract: Address, to: Address, amount: U256)
    -> Result<TxHash, ChainError>;

    /// Transfers from the deployer's balance.
    async fn transfer(
        &self,
        contract: Address,
        to: Address,
        amount: U256,
    ) -> Result<TxHash, ChainError>;

    /// Current owner of an asset, `None` if it was never minted.
    async fn owner_of(&self, contract: Address, token_id: U256)
    -> Result<Option<Address>, ChainError>;

    async fn batch_mint(
        &self,
        contract: Address,
        records: Vec<AirdropRecord>,
    ) -> Result<TxHash, ChainError>;
}
