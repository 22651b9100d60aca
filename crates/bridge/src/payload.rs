//! JSON bodies posted to the webhook sink, one shape per token standard.

use {
    crate::event::{Moved, TransferEvent},
    alloy::primitives::{Address, B256, TxHash},
    chrono::{DateTime, SecondsFormat, Utc},
    contracts::TokenStandard,
    serde::Serialize,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Timestamp {
    pub iso: String,
}

/// Fields shared by both payload shapes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Envelope {
    pub from_address: String,
    pub to_address: String,
    pub block_number: Option<u64>,
    pub block_hash: Option<B256>,
    pub block_timestamp: Timestamp,
    pub log_index: Option<u64>,
    pub transaction_hash: Option<TxHash>,
    pub transaction_index: Option<u64>,
    pub token_address: String,
    pub confirmed: bool,
    #[serde(rename = "objectId")]
    pub object_id: Option<TxHash>,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NftTransfer {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub token_id: String,
    pub amount: &'static str,
    pub transaction_type: &'static str,
    pub contract_type: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TokenTransfer {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Nft(NftTransfer),
    Token(TokenTransfer),
}

fn lowercase(address: Address) -> String {
    address.to_string().to_lowercase()
}

impl Payload {
    /// Normalizes an event. `now` stamps the block timestamp and the record
    /// times, the log itself carries no time.
    pub fn new(event: &TransferEvent, now: DateTime<Utc>) -> Self {
        let now = now.to_rfc3339_opts(SecondsFormat::Millis, true);
        let envelope = Envelope {
            from_address: lowercase(event.from),
            to_address: lowercase(event.to),
            block_number: event.block_number,
            block_hash: event.block_hash,
            block_timestamp: Timestamp { iso: now.clone() },
            log_index: event.log_index,
            transaction_hash: event.transaction_hash,
            transaction_index: event.transaction_index,
            token_address: event.contract.to_string(),
            confirmed: true,
            object_id: event.transaction_hash,
            created_at: now.clone(),
            updated_at: now,
        };
        match event.moved {
            Moved::TokenId(token_id) => Self::Nft(NftTransfer {
                envelope,
                token_id: token_id.to_string(),
                amount: "1",
                transaction_type: "Single",
                contract_type: "ERC721",
            }),
            Moved::Value(value) => Self::Token(TokenTransfer {
                envelope,
                value: value.to_string(),
            }),
        }
    }

    pub fn standard(&self) -> TokenStandard {
        match self {
            Self::Nft(_) => TokenStandard::Erc721,
            Self::Token(_) => TokenStandard::Erc20,
        }
    }

    pub fn envelope(&self) -> &Envelope {
        match self {
            Self::Nft(payload) => &payload.envelope,
            Self::Token(payload) => &payload.envelope,
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::event::testing::transfer,
        alloy::primitives::{U256, address},
        chrono::TimeZone,
        contracts::Generation,
        serde_json::json,
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn nft_payload_shape() {
        let event = transfer(
            Generation(1),
            address!("0x5FbDB2315678afecb367f032d93F642f64180aa3"),
            address!("0xBcd4042DE499D14e55001CcbB24a551F3b954096"),
            Address::with_last_byte(1),
        );

        let body = serde_json::to_value(Payload::new(&event, now())).unwrap();

        let tx = format!("0x{}", "22".repeat(32));
        assert_eq!(
            body,
            json!({
                "from_address": "0xbcd4042de499d14e55001ccbb24a551f3b954096",
                "to_address": "0x0000000000000000000000000000000000000001",
                "block_number": 42,
                "block_hash": format!("0x{}", "11".repeat(32)),
                "block_timestamp": {"iso": "2024-05-01T12:30:00.000Z"},
                "log_index": 3,
                "transaction_hash": tx,
                "transaction_index": 0,
                "token_address": "0x5FbDB2315678afecb367f032d93F642f64180aa3",
                "confirmed": true,
                "objectId": tx,
                "createdAt": "2024-05-01T12:30:00.000Z",
                "updatedAt": "2024-05-01T12:30:00.000Z",
                "token_id": "1000",
                "amount": "1",
                "transaction_type": "Single",
                "contract_type": "ERC721",
            })
        );
    }

    #[test]
    fn token_payload_carries_decimal_value() {
        let mut event = transfer(
            Generation(1),
            Address::with_last_byte(0xa2),
            Address::with_last_byte(1),
            Address::with_last_byte(2),
        );
        event.moved = Moved::Value(U256::from(10u64).pow(U256::from(22u64)));

        let payload = Payload::new(&event, now());
        assert_eq!(payload.standard(), TokenStandard::Erc20);

        let body = serde_json::to_value(&payload).unwrap();
        assert_eq!(body["value"], "10000000000000000000000");
        assert!(body.get("token_id").is_none());
        assert!(body.get("contract_type").is_none());
        assert!(body.get("transaction_type").is_none());
    }
}
