//! Typed classification of chain call failures.
//!
//! Reverts are classified by their revert data rather than by the node's
//! human readable message, so that "already done" results can be told apart
//! from genuine failures independently of the node implementation.

use {
    alloy::{
        contract::Error as ContractError,
        primitives::{Bytes, TxHash, hex},
        providers::PendingTransactionError,
        sol_types::{Revert, SolError},
        transports::{RpcError, TransportError},
    },
    contracts::alloy::{Initializable::InvalidInitialization, LEGACY_ALREADY_INITIALIZED},
};

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The target's one-time initializer has already run.
    #[error("contract is already initialized")]
    AlreadyInitialized,
    #[error("execution reverted: {0}")]
    Reverted(String),
    #[error("transaction {0:?} was mined but reverted")]
    Failed(TxHash),
    #[error("node error: {0}")]
    Node(#[source] TransportError),
    #[error("contract interaction failed: {0}")]
    Contract(#[source] ContractError),
    #[error("transaction was not confirmed: {0}")]
    Unconfirmed(#[from] PendingTransactionError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChainError {
    /// Whether the failed call's effect is already in place on chain.
    pub fn is_already_done(&self) -> bool {
        matches!(self, Self::AlreadyInitialized)
    }
}

impl From<TransportError> for ChainError {
    fn from(err: TransportError) -> Self {
        match revert_data(&err) {
            Some(data) => classify_revert(&data),
            None => Self::Node(err),
        }
    }
}

impl From<ContractError> for ChainError {
    fn from(err: ContractError) -> Self {
        match err {
            ContractError::TransportError(err) => err.into(),
            err => Self::Contract(err),
        }
    }
}

/// Tagged result of a chain call whose failure may mean the work was done
/// before.
#[derive(Debug)]
pub enum Outcome<T> {
    Ok(T),
    AlreadyDone(ChainError),
    Fatal(ChainError),
}

impl<T> From<Result<T, ChainError>> for Outcome<T> {
    fn from(result: Result<T, ChainError>) -> Self {
        match result {
            Ok(value) => Self::Ok(value),
            Err(err) if err.is_already_done() => Self::AlreadyDone(err),
            Err(err) => Self::Fatal(err),
        }
    }
}

fn revert_data(err: &TransportError) -> Option<Bytes> {
    match err {
        // Nodes report reverts found during gas estimation as RPC errors that
        // carry the revert data; errors without it come from the node itself.
        RpcError::ErrorResp(payload) => {
            let data = payload.as_revert_data();
            tracing::debug!(?payload, has_revert_data = data.is_some(), "rpc error response");
            data
        }
        _ => None,
    }
}

pub fn classify_revert(data: &[u8]) -> ChainError {
    if data.starts_with(&InvalidInitialization::SELECTOR) {
        return ChainError::AlreadyInitialized;
    }
    match Revert::abi_decode(data) {
        Ok(revert) if revert.reason == LEGACY_ALREADY_INITIALIZED => ChainError::AlreadyInitialized,
        Ok(revert) => ChainError::Reverted(revert.reason),
        Err(_) => ChainError::Reverted(hex::encode_prefixed(data)),
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        alloy::rpc::json_rpc::ErrorPayload,
        serde_json::value::to_raw_value,
    };

    fn revert(reason: &str) -> Vec<u8> {
        Revert {
            reason: reason.to_string(),
        }
        .abi_encode()
    }

    fn rpc_error(data: Option<&[u8]>) -> TransportError {
        TransportError::ErrorResp(ErrorPayload {
            code: 3,
            message: "execution reverted".into(),
            data: data.map(|data| to_raw_value(&hex::encode_prefixed(data)).unwrap()),
        })
    }

    #[test]
    fn initializer_reverts_are_already_done() {
        assert!(classify_revert(&InvalidInitialization {}.abi_encode()).is_already_done());
        assert!(classify_revert(&revert(LEGACY_ALREADY_INITIALIZED)).is_already_done());
    }

    #[test]
    fn other_reverts_are_not_already_done() {
        let err = classify_revert(&revert("AccessControl: account is missing role"));
        assert!(
            matches!(&err, ChainError::Reverted(reason) if reason == "AccessControl: account is missing role")
        );
        // A message that merely mentions initialization is not the canonical
        // reason.
        assert!(!classify_revert(&revert("not yet initialized")).is_already_done());
        assert!(matches!(
            classify_revert(&[0xde, 0xad, 0xbe, 0xef]),
            ChainError::Reverted(reason) if reason == "0xdeadbeef"
        ));
    }

    #[test]
    fn transport_errors_are_classified_by_revert_data() {
        let already = ChainError::from(rpc_error(Some(&InvalidInitialization {}.abi_encode())));
        assert!(already.is_already_done());

        let node = ChainError::from(TransportError::ErrorResp(ErrorPayload::internal_error()));
        assert!(matches!(node, ChainError::Node(_)));

        let contract = ChainError::from(ContractError::TransportError(rpc_error(Some(&revert(
            "ERC721: invalid token ID",
        )))));
        assert!(matches!(contract, ChainError::Reverted(_)));
    }

    #[test]
    fn outcome_tags_results() {
        assert!(matches!(Outcome::from(Ok::<_, ChainError>(1)), Outcome::Ok(1)));
        assert!(matches!(
            Outcome::<()>::from(Err(ChainError::AlreadyInitialized)),
            Outcome::AlreadyDone(_)
        ));
        assert!(matches!(
            Outcome::<()>::from(Err(ChainError::Failed(TxHash::ZERO))),
            Outcome::Fatal(_)
        ));
    }
}
