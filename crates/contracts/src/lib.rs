pub mod address_book;
pub mod alloy;
pub mod artifacts;
pub mod deployment;
pub mod registry;

pub use {
    address_book::AddressBook,
    artifacts::Artifacts,
    deployment::{DeployedContract, Generation},
    registry::{ContractKind, ContractRegistry, ContractSpec, TokenStandard},
};
