use {
    crate::{chain::Chain, distributor::AirdropRecord},
    alloy::{
        network::{Ethereum, ReceiptResponse, TransactionBuilder},
        primitives::{Address, B256, TxHash, U256},
        providers::{PendingTransactionBuilder, Provider},
        rpc::types::{TransactionReceipt, TransactionRequest},
    },
    anyhow::anyhow,
    contracts::{
        AddressBook,
        Artifacts,
        address_book::Entry,
        alloy::{AccessControl, IAirdrop, IERC20, IERC20Mintable, IERC721, Initializable},
    },
    ethrpc::{AlloyProvider, alloy::errors::ChainError},
};

/// [`Chain`] backed by a node. State changing calls without an explicit
/// owner are sent from the deployer.
pub struct Onchain {
    provider: AlloyProvider,
    deployer: Address,
    artifacts: Artifacts,
    address_book: AddressBook,
}

impl Onchain {
    pub fn new(
        provider: AlloyProvider,
        deployer: Address,
        artifacts: Artifacts,
        address_book: AddressBook,
    ) -> Self {
        Self {
            provider,
            deployer,
            artifacts,
            address_book,
        }
    }
}

/// Creation code followed by the ABI encoded constructor arguments.
/// Addresses are static ABI types, each encodes to exactly one word.
fn init_code(creation_code: &[u8], args: &[Address]) -> Vec<u8> {
    let mut code = creation_code.to_vec();
    for arg in args {
        code.extend_from_slice(arg.into_word().as_slice());
    }
    code
}

fn check_status(receipt: TransactionReceipt) -> Result<TransactionReceipt, ChainError> {
    if !receipt.status() {
        return Err(ChainError::Failed(receipt.transaction_hash));
    }
    Ok(receipt)
}

/// Waits for the transaction to be mined and fails if it reverted.
async fn confirm(
    pending: PendingTransactionBuilder<Ethereum>,
) -> Result<TransactionReceipt, ChainError> {
    let receipt = check_status(pending.get_receipt().await?)?;
    tracing::debug!(tx = ?receipt.transaction_hash, block = ?receipt.block_number, "transaction confirmed");
    Ok(receipt)
}

#[async_trait::async_trait]
impl Chain for Onchain {
    async fn deployment(
        &self,
        name: &str,
        args: Vec<Address>,
    ) -> Result<Option<Address>, ChainError> {
        let Some(entry) = self.address_book.entry(name)? else {
            return Ok(None);
        };
        let address = entry.address;
        let code = self.provider.get_code_at(address).await?;
        if code.is_empty() {
            tracing::warn!(name, ?address, "recorded deployment has no code, redeploying");
            return Ok(None);
        }

        let artifact = self.artifacts.load(name)?;
        let current = match (&entry.bytecode, &entry.args) {
            (Some(bytecode), recorded_args) => {
                *bytecode == artifact.bytecode
                    && recorded_args.as_ref().is_none_or(|recorded| *recorded == args)
            }
            // Records without creation code can only be compared by the code
            // the chain holds.
            (None, _) => {
                artifact.deployed_bytecode.is_empty() || code == artifact.deployed_bytecode
            }
        };
        if !current {
            tracing::info!(name, ?address, "contract or its dependencies changed, redeploying");
            return Ok(None);
        }
        Ok(Some(address))
    }

    async fn deploy(&self, name: &str, args: Vec<Address>) -> Result<Address, ChainError> {
        let creation_code = self.artifacts.load(name)?.bytecode;
        let tx = TransactionRequest::default()
            .with_from(self.deployer)
            .with_deploy_code(init_code(&creation_code, &args));
        let receipt = confirm(self.provider.send_transaction(tx).await?).await?;
        let address = receipt
            .contract_address
            .ok_or_else(|| anyhow!("deployment of {name} did not create a contract"))?;
        self.address_book.record(
            name,
            &Entry {
                address,
                transaction_hash: Some(receipt.transaction_hash),
                bytecode: Some(creation_code),
                args: Some(args),
            },
        )?;
        Ok(address)
    }

    async fn initialize(&self, contract: Address) -> Result<TxHash, ChainError> {
        let pending = Initializable::new(contract, self.provider.clone())
            .initialize()
            .from(self.deployer)
            .send()
            .await?;
        Ok(confirm(pending).await?.transaction_hash)
    }

    async fn grant_role(
        &self,
        contract: Address,
        role: B256,
        grantee: Address,
    ) -> Result<TxHash, ChainError> {
        let pending = AccessControl::new(contract, self.provider.clone())
            .grantRole(role, grantee)
            .from(self.deployer)
            .send()
            .await?;
        Ok(confirm(pending).await?.transaction_hash)
    }

    async fn set_approval_for_all(
        &self,
        contract: Address,
        owner: Address,
        operator: Address,
    ) -> Result<TxHash, ChainError> {
        let pending = IERC721::new(contract, self.provider.clone())
            .setApprovalForAll(operator, true)
            .from(owner)
            .send()
            .await?;
        Ok(confirm(pending).await?.transaction_hash)
    }

    async fn approve(
        &self,
        contract: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxHash, ChainError> {
        let pending = IERC20::new(contract, self.provider.clone())
            .approve(spender, amount)
            .from(owner)
            .send()
            .await?;
        Ok(confirm(pending).await?.transaction_hash)
    }

    async fn mint(
        &self,
        contract: Address,
        to: Address,
        amount: U256,
    ) -> Result<TxHash, ChainError> {
        let pending = IERC20Mintable::new(contract, self.provider.clone())
            .mint(to, amount)
            .from(self.deployer)
            .send()
            .await?;
        Ok(confirm(pending).await?.transaction_hash)
    }

    async fn transfer(
        &self,
        contract: Address,
        to: Address,
        amount: U256,
    ) -> Result<TxHash, ChainError> {
        let pending = IERC20::new(contract, self.provider.clone())
            .transfer(to, amount)
            .from(self.deployer)
            .send()
            .await?;
        Ok(confirm(pending).await?.transaction_hash)
    }

    async fn owner_of(
        &self,
        contract: Address,
        token_id: U256,
    ) -> Result<Option<Address>, ChainError> {
        match IERC721::new(contract, self.provider.clone())
            .ownerOf(token_id)
            .call()
            .await
        {
            Ok(owner) => Ok(Some(owner)),
            // Unminted ids revert, with a reason or a custom error depending
            // on the library version.
            Err(err) => match ChainError::from(err) {
                ChainError::Reverted(reason) => {
                    tracing::debug!(%token_id, %reason, "asset is not minted");
                    Ok(None)
                }
                err => Err(err),
            },
        }
    }

    async fn batch_mint(
        &self,
        contract: Address,
        records: Vec<AirdropRecord>,
    ) -> Result<TxHash, ChainError> {
        let recipients = records
            .into_iter()
            .map(|record| IAirdrop::Recipient {
                to: record.recipient,
                tokenId: U256::from(record.token_id),
            })
            .collect();
        let pending = IAirdrop::new(contract, self.provider.clone())
            .batchMint(recipients)
            .from(self.deployer)
            .send()
            .await?;
        Ok(confirm(pending).await?.transaction_hash)
    }
}
