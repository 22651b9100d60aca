//! The fixed roster of accounts the provisioner and the bridge work with.
//!
//! Roles are assigned by position in the signer list of the development
//! mnemonic: index 0 deploys, indices 1 to 15 are the seeded users, 17 is the
//! delegatee and 18 the admin acting on its behalf. Index 16 is unused.

use {
    alloy::{
        network::EthereumWallet,
        primitives::Address,
        signers::local::{MnemonicBuilder, PrivateKeySigner, coins_bip39::English},
    },
    anyhow::{Context, Result, ensure},
    std::ops::Range,
};

/// Mnemonic of the local development node's pre-funded accounts.
pub const DEV_MNEMONIC: &str = "test test test test test test test test test test test junk";

const DEPLOYER: usize = 0;
const USERS: Range<usize> = 1..16;
const DELEGATEE: usize = 17;
const ADMIN: usize = 18;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Deployer,
    User,
    Delegatee,
    Admin,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Account {
    pub role: Role,
    pub address: Address,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Accounts {
    pub deployer: Account,
    pub users: Vec<Account>,
    pub delegatee: Account,
    pub admin: Account,
}

impl Accounts {
    /// Assigns roles by position in `addresses`.
    pub fn from_addresses(addresses: &[Address]) -> Result<Self> {
        ensure!(
            addresses.len() > ADMIN,
            "the roster needs at least {} accounts, got {}",
            ADMIN + 1,
            addresses.len()
        );
        let account = |role, index: usize| Account {
            role,
            address: addresses[index],
        };
        Ok(Self {
            deployer: account(Role::Deployer, DEPLOYER),
            users: USERS.map(|index| account(Role::User, index)).collect(),
            delegatee: account(Role::Delegatee, DELEGATEE),
            admin: account(Role::Admin, ADMIN),
        })
    }

    pub fn user_addresses(&self) -> Vec<Address> {
        self.users.iter().map(|user| user.address).collect()
    }
}

pub struct Roster {
    signers: Vec<PrivateKeySigner>,
    accounts: Accounts,
}

impl Roster {
    pub fn from_mnemonic(phrase: &str) -> Result<Self> {
        let signers = (0..=ADMIN)
            .map(|index| {
                let index = u32::try_from(index)?;
                MnemonicBuilder::<English>::default()
                    .phrase(phrase)
                    .index(index)?
                    .build()
                    .with_context(|| format!("failed to derive signer {index}"))
            })
            .collect::<Result<Vec<_>>>()?;
        let addresses: Vec<_> = signers.iter().map(PrivateKeySigner::address).collect();
        Ok(Self {
            accounts: Accounts::from_addresses(&addresses)?,
            signers,
        })
    }

    pub fn accounts(&self) -> &Accounts {
        &self.accounts
    }

    /// Wallet holding the keys of the accounts that send transactions. The
    /// deployer is the default signer.
    pub fn wallet(&self) -> EthereumWallet {
        let mut wallet = EthereumWallet::new(self.signers[DEPLOYER].clone());
        wallet.register_signer(self.signers[DELEGATEE].clone());
        wallet
    }
}

#[cfg(test)]
mod tests {
    use {super::*, alloy::primitives::address};

    #[test]
    fn dev_mnemonic_roles() {
        let roster = Roster::from_mnemonic(DEV_MNEMONIC).unwrap();
        let accounts = roster.accounts();

        assert_eq!(
            accounts.deployer.address,
            address!("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266")
        );
        assert_eq!(
            accounts.delegatee.address,
            address!("0xbda5747bfd65f08deb54cb465eb87d40e51b197e")
        );
        assert_eq!(
            accounts.admin.address,
            address!("0xdd2fd4581271e230360230f9337d5c0430bf44c0")
        );
        assert_eq!(accounts.users.len(), 15);
        assert!(accounts.users.iter().all(|user| user.role == Role::User));
    }

    #[test]
    fn short_signer_lists_are_rejected() {
        let addresses: Vec<_> = (0..18).map(Address::with_last_byte).collect();
        assert!(Accounts::from_addresses(&addresses).is_err());

        let addresses: Vec<_> = (0..19).map(Address::with_last_byte).collect();
        let accounts = Accounts::from_addresses(&addresses).unwrap();
        assert_eq!(accounts.user_addresses().first(), Some(&Address::with_last_byte(1)));
        assert_eq!(accounts.user_addresses().last(), Some(&Address::with_last_byte(15)));
        assert_eq!(accounts.admin.address, Address::with_last_byte(18));
    }
}
