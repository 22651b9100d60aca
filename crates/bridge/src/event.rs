//! Transfer events as seen by the bridge.

use {
    alloy::{
        primitives::{Address, B256, TxHash, U256},
        rpc::types::Log,
    },
    anyhow::Result,
    contracts::{
        Generation,
        TokenStandard,
        alloy::{IERC20, IERC721},
    },
};

/// What was moved: a single asset or an amount in base units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Moved {
    TokenId(U256),
    Value(U256),
}

/// A decoded `Transfer` log, tagged with the generation of the subscription
/// that observed it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferEvent {
    pub generation: Generation,
    pub contract: Address,
    pub from: Address,
    pub to: Address,
    pub moved: Moved,
    pub block_number: Option<u64>,
    pub block_hash: Option<B256>,
    pub transaction_hash: Option<TxHash>,
    pub transaction_index: Option<u64>,
    pub log_index: Option<u64>,
}

impl TransferEvent {
    pub fn standard(&self) -> TokenStandard {
        match self.moved {
            Moved::TokenId(_) => TokenStandard::Erc721,
            Moved::Value(_) => TokenStandard::Erc20,
        }
    }

    /// Decodes a log according to the token standard of the emitting
    /// contract. Both standards share the `Transfer` topic and differ only in
    /// whether the third parameter is indexed.
    pub fn decode(log: &Log, standard: TokenStandard, generation: Generation) -> Result<Self> {
        let (from, to, moved) = match standard {
            TokenStandard::Erc721 => {
                let transfer = log.log_decode::<IERC721::Transfer>()?.inner.data;
                (transfer.from, transfer.to, Moved::TokenId(transfer.tokenId))
            }
            TokenStandard::Erc20 => {
                let transfer = log.log_decode::<IERC20::Transfer>()?.inner.data;
                (transfer.from, transfer.to, Moved::Value(transfer.value))
            }
        };
        Ok(Self {
            generation,
            contract: log.address(),
            from,
            to,
            moved,
            block_number: log.block_number,
            block_hash: log.block_hash,
            transaction_hash: log.transaction_hash,
            transaction_index: log.transaction_index,
            log_index: log.log_index,
        })
    }
}


#[cfg(test)]
mod tests {
    use {
        super::*,
        alloy::{
            primitives::{Log as PrimitiveLog, LogData},
            sol_types::SolEvent,
        },
    };

    fn rpc_log(data: LogData) -> Log {
        Log {
            inner: PrimitiveLog {
                address: Address::with_last_byte(0xa1),
                data,
            },
            block_number: Some(7),
            log_index: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn decodes_both_standards() {
        let from = Address::with_last_byte(1);
        let to = Address::with_last_byte(2);

        let nft = IERC721::Transfer {
            from,
            to,
            tokenId: U256::from(1003),
        };
        let event = TransferEvent::decode(
            &rpc_log(nft.encode_log_data()),
            TokenStandard::Erc721,
            Generation(2),
        )
        .unwrap();
        assert_eq!(event.moved, Moved::TokenId(U256::from(1003)));
        assert_eq!(event.generation, Generation(2));
        assert_eq!(event.contract, Address::with_last_byte(0xa1));
        assert_eq!(event.block_number, Some(7));

        let coin = IERC20::Transfer {
            from,
            to,
            value: U256::from(5),
        };
        let event = TransferEvent::decode(
            &rpc_log(coin.encode_log_data()),
            TokenStandard::Erc20,
            Generation(2),
        )
        .unwrap();
        assert_eq!(event.standard(), TokenStandard::Erc20);
        assert_eq!((event.from, event.to), (from, to));
    }

    #[test]
    fn standard_mismatch_fails_to_decode() {
        let coin = IERC20::Transfer {
            from: Address::ZERO,
            to: Address::ZERO,
            value: U256::from(5),
        };
        assert!(
            TransferEvent::decode(
                &rpc_log(coin.encode_log_data()),
                TokenStandard::Erc721,
                Generation::default()
            )
            .is_err()
        );
    }
}
