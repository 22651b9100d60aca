//! The toolchain's record of which address each contract was deployed to on
//! a network, stored as `<root>/<network>/<ContractName>.json`.
//!
//! The address book only says where to look; whether a recorded contract
//! still exists is for the chain to answer.

use {
    crate::registry::ContractRegistry,
    alloy::primitives::{Address, Bytes, TxHash},
    anyhow::{Context, Result},
    serde::{Deserialize, Serialize},
    std::{fs, io, path::PathBuf},
};

#[derive(Clone, Debug)]
pub struct AddressBook {
    dir: PathBuf,
}

/// One deployment record. Fields other than the address are optional so
/// records written by the toolchain parse as well.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<TxHash>,
    /// Creation code the contract was deployed from, without constructor
    /// arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytecode: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<Address>>,
}

impl AddressBook {
    pub fn new(root: impl Into<PathBuf>, network: &str) -> Self {
        Self {
            dir: root.into().join(network),
        }
    }

    /// Record of `name`, `None` if it was never deployed on this network.
    pub fn entry(&self, name: &str) -> Result<Option<Entry>> {
        let path = self.path(name);
        let contents = match fs::read(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()));
            }
        };
        let entry = serde_json::from_slice(&contents)
            .with_context(|| format!("malformed deployment record {}", path.display()))?;
        Ok(Some(entry))
    }

    pub fn address(&self, name: &str) -> Result<Option<Address>> {
        Ok(self.entry(name)?.map(|entry| entry.address))
    }

    pub fn record(&self, name: &str, entry: &Entry) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let path = self.path(name);
        fs::write(&path, serde_json::to_vec_pretty(entry)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::debug!(name, address = ?entry.address, path = %path.display(), "recorded deployment");
        Ok(())
    }

    /// Addresses of every registry contract, failing if any of them was not
    /// deployed yet.
    pub fn resolve(&self, registry: &ContractRegistry) -> Result<Vec<(String, Address)>> {
        registry
            .specs()
            .iter()
            .map(|spec| {
                let address = self
                    .address(&spec.name)?
                    .with_context(|| format!("{} has not been deployed", spec.name))?;
                Ok((spec.name.clone(), address))
            })
            .collect()
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

#[cfg(test)]
mod tests {
    use {super::*, alloy::primitives::address};

    #[test]
    fn reads_toolchain_records_and_ignores_extra_fields() {
        let dir = tempfile::tempdir().unwrap();
        let network = dir.path().join("localhost");
        fs::create_dir_all(&network).unwrap();
        fs::write(
            network.join("SomeNFT.json"),
            r#"{
                "address": "0x5FbDB2315678afecb367f032d93F642f64180aa3",
                "abi": [],
                "receipt": {"status": 1}
            }"#,
        )
        .unwrap();

        let book = AddressBook::new(dir.path(), "localhost");
        assert_eq!(
            book.address("SomeNFT").unwrap(),
            Some(address!("0x5fbdb2315678afecb367f032d93f642f64180aa3"))
        );
        assert_eq!(book.address("SomeCoin").unwrap(), None);
        assert_eq!(book.entry("SomeNFT").unwrap().unwrap().bytecode, None);
    }

    #[test]
    fn records_keep_the_deployed_code_and_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let book = AddressBook::new(dir.path(), "localhost");
        let entry = Entry {
            address: Address::with_last_byte(0xa4),
            transaction_hash: Some(TxHash::repeat_byte(1)),
            bytecode: Some(Bytes::from_static(&[0x60, 0x80])),
            args: Some(vec![Address::with_last_byte(0xa1), Address::with_last_byte(0xa2)]),
        };

        book.record("Airdrop", &entry).unwrap();
        assert_eq!(book.entry("Airdrop").unwrap(), Some(entry));
    }

    #[test]
    fn recorded_addresses_resolve_per_network() {
        let dir = tempfile::tempdir().unwrap();
        let book = AddressBook::new(dir.path(), "localhost");
        let registry = ContractRegistry::standard().unwrap();

        for (i, spec) in registry.specs().iter().enumerate() {
            let entry = Entry {
                address: Address::repeat_byte(i as u8 + 1),
                ..Default::default()
            };
            book.record(&spec.name, &entry).unwrap();
        }

        let resolved = book.resolve(&registry).unwrap();
        assert_eq!(resolved.len(), 4);
        assert_eq!(resolved[3], ("Airdrop".to_string(), Address::repeat_byte(4)));
        assert!(
            AddressBook::new(dir.path(), "sepolia")
                .resolve(&registry)
                .is_err()
        );
    }
}
