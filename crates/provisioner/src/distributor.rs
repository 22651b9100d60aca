//! Post-deployment configuration: roles, delegate approvals, initial
//! balances and the asset airdrop.

use {
    crate::{chain::Chain, orchestrator::Deployed},
    alloy::primitives::{Address, B256, TxHash, U256},
    anyhow::Context,
    contracts::{ContractKind, alloy::minter_role},
    ethrpc::{
        accounts::{Account, Accounts},
        alloy::errors::ChainError,
    },
    std::sync::Arc,
};

/// First asset id handed out by the airdrop.
pub const TOKEN_ID_BASE: u64 = 1000;
/// Number of consecutive asset ids each user receives.
pub const TOKENS_PER_USER: u64 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AirdropRecord {
    pub recipient: Address,
    pub token_id: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoleGrant {
    pub contract: Address,
    pub role: B256,
    pub grantee: Address,
}

/// Amounts in base units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Amounts {
    /// Minted as coin and transferred as token to every seeded account.
    pub seed: U256,
    /// Coin and token allowance granted by the delegatee to the admin.
    pub allowance: U256,
}

impl Default for Amounts {
    fn default() -> Self {
        Self {
            seed: crate::arguments::whole_tokens(10_000),
            allowance: crate::arguments::whole_tokens(100_000_000_000_000),
        }
    }
}

/// Assigns `per_user` consecutive ids starting at `base` to each user, in
/// user order. Fails if the ids do not fit into `u64`.
pub fn build_airdrop_records(
    users: &[Address],
    base: u64,
    per_user: u64,
) -> anyhow::Result<Vec<AirdropRecord>> {
    let count = u64::try_from(users.len())
        .ok()
        .and_then(|users| users.checked_mul(per_user))
        .context("too many airdrop records")?;
    if let Some(last) = count.checked_sub(1) {
        base.checked_add(last)
            .with_context(|| format!("{count} airdrop ids starting at {base} overflow"))?;
    }
    let mut records = Vec::with_capacity(usize::try_from(count)?);
    let mut token_id = base;
    for &recipient in users {
        for _ in 0..per_user {
            records.push(AirdropRecord {
                recipient,
                token_id,
            });
            // Wraps only after the last id, which is never used.
            token_id = token_id.wrapping_add(1);
        }
    }
    Ok(records)
}

pub struct Distributor {
    chain: Arc<dyn Chain>,
    accounts: Accounts,
    amounts: Amounts,
}

impl Distributor {
    pub fn new(chain: Arc<dyn Chain>, accounts: Accounts, amounts: Amounts) -> Self {
        Self {
            chain,
            accounts,
            amounts,
        }
    }

    /// The grants the deployment needs: the admin may mint assets and coins,
    /// the distribution contract may mint assets.
    pub fn role_grants(&self, deployed: &Deployed) -> anyhow::Result<Vec<RoleGrant>> {
        let minter = minter_role();
        let asset = deployed.address(ContractKind::Asset)?;
        let coin = deployed.address(ContractKind::Coin)?;
        let distributor = deployed.address(ContractKind::Distributor)?;
        Ok(vec![
            RoleGrant {
                contract: asset,
                role: minter,
                grantee: self.accounts.admin.address,
            },
            RoleGrant {
                contract: asset,
                role: minter,
                grantee: distributor,
            },
            RoleGrant {
                contract: coin,
                role: minter,
                grantee: self.accounts.admin.address,
            },
        ])
    }

    /// Granting a role that is already held is a no-op on chain, so this is
    /// safe to repeat.
    pub async fn grant_role(&self, grant: RoleGrant) -> Result<TxHash, ChainError> {
        let tx = self
            .chain
            .grant_role(grant.contract, grant.role, grant.grantee)
            .await?;
        tracing::debug!(?grant, ?tx, "granted role");
        Ok(tx)
    }

    /// Lets `admin` move all of `delegatee`'s assets and up to the configured
    /// allowance of its coins and tokens. The approvals are sent by the
    /// delegatee.
    pub async fn authorize_delegate(
        &self,
        delegatee: &Account,
        admin: &Account,
        deployed: &Deployed,
    ) -> Result<(), ChainError> {
        let asset = deployed.address(ContractKind::Asset)?;
        self.chain
            .set_approval_for_all(asset, delegatee.address, admin.address)
            .await?;
        for kind in [ContractKind::Coin, ContractKind::Token] {
            self.chain
                .approve(
                    deployed.address(kind)?,
                    delegatee.address,
                    admin.address,
                    self.amounts.allowance,
                )
                .await?;
        }
        tracing::debug!(delegatee = ?delegatee.address, admin = ?admin.address, "delegate authorized");
        Ok(())
    }

    /// Whether a previous run already issued assets. Checks the first airdrop
    /// id, which is minted together with the initial balances.
    pub async fn already_seeded(&self, deployed: &Deployed) -> Result<bool, ChainError> {
        let asset = deployed.address(ContractKind::Asset)?;
        let owner = self
            .chain
            .owner_of(asset, U256::from(TOKEN_ID_BASE))
            .await?;
        if let Some(owner) = owner {
            tracing::debug!(?owner, token_id = TOKEN_ID_BASE, "asset already issued");
        }
        Ok(owner.is_some())
    }

    /// Mints `amount` coin to the delegatee, then mints `amount` coin and
    /// transfers `amount` token to every user.
    pub async fn seed_balances(
        &self,
        users: &[Account],
        amount: U256,
        deployed: &Deployed,
    ) -> Result<(), ChainError> {
        let coin = deployed.address(ContractKind::Coin)?;
        let token = deployed.address(ContractKind::Token)?;
        self.chain
            .mint(coin, self.accounts.delegatee.address, amount)
            .await?;
        for user in users {
            self.chain.mint(coin, user.address, amount).await?;
            self.chain.transfer(token, user.address, amount).await?;
            tracing::debug!(user = ?user.address, %amount, "seeded balances");
        }
        Ok(())
    }

    /// Mints every record's asset to its recipient in a single transaction.
    pub async fn batch_distribute(
        &self,
        deployed: &Deployed,
        records: Vec<AirdropRecord>,
    ) -> Result<TxHash, ChainError> {
        let distributor = deployed.address(ContractKind::Distributor)?;
        let count = records.len();
        for record in &records {
            tracing::debug!(recipient = ?record.recipient, token_id = record.token_id, "airdrop");
        }
        let tx = self.chain.batch_mint(distributor, records).await?;
        tracing::info!(count, ?tx, "airdropped assets");
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users(count: u8) -> Vec<Address> {
        (1..=count).map(Address::with_last_byte).collect()
    }

    #[test]
    fn airdrop_ids_are_contiguous_per_user() {
        let users = users(15);
        let records = build_airdrop_records(&users, TOKEN_ID_BASE, TOKENS_PER_USER).unwrap();

        assert_eq!(records.len(), 150);
        for (offset, record) in records.iter().enumerate() {
            assert_eq!(record.token_id, TOKEN_ID_BASE + offset as u64);
            assert_eq!(record.recipient, users[offset / 10]);
        }
        assert_eq!(records.last().unwrap().token_id, 1149);
    }

    #[test]
    fn airdrop_edge_sizes() {
        assert!(build_airdrop_records(&[], TOKEN_ID_BASE, TOKENS_PER_USER).unwrap().is_empty());
        assert!(build_airdrop_records(&users(3), TOKEN_ID_BASE, 0).unwrap().is_empty());

        let single = build_airdrop_records(&users(1), 7, 3).unwrap();
        let ids: Vec<_> = single.iter().map(|record| record.token_id).collect();
        assert_eq!(ids, [7, 8, 9]);
    }

    #[test]
    fn airdrop_ids_must_fit_into_u64() {
        let last = build_airdrop_records(&users(2), u64::MAX - 3, 2).unwrap();
        assert_eq!(last.last().unwrap().token_id, u64::MAX);

        assert!(build_airdrop_records(&users(2), u64::MAX - 2, 2).is_err());
        assert!(build_airdrop_records(&users(3), 0, u64::MAX).is_err());
        assert!(build_airdrop_records(&[], u64::MAX, u64::MAX).unwrap().is_empty());
    }
}
