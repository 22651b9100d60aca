//! Bindings for the provisioned contracts.
//!
//! Only the functions, events and errors the provisioner and the bridge
//! interact with are declared here. Creation code is not part of the
//! bindings, it is read from the toolchain's build artifacts instead (see
//! [`crate::artifacts`]).

use alloy::primitives::{B256, keccak256};

alloy::sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface Initializable {
        /// OpenZeppelin 5 revert for a second call to an initializer.
        error InvalidInitialization();

        function initialize() external;
    }

    #[allow(missing_docs)]
    #[sol(rpc)]
    interface AccessControl {
        function grantRole(bytes32 role, address account) external;
    }

    #[allow(missing_docs)]
    #[sol(rpc)]
    interface IERC721 {
        event Transfer(address indexed from, address indexed to, uint256 indexed tokenId);

        function ownerOf(uint256 tokenId) external view returns (address);
        function setApprovalForAll(address operator, bool approved) external;
    }

    #[allow(missing_docs)]
    #[sol(rpc)]
    interface IERC20 {
        event Transfer(address indexed from, address indexed to, uint256 value);

        function approve(address spender, uint256 amount) external returns (bool);
        function transfer(address to, uint256 amount) external returns (bool);
    }

    #[allow(missing_docs)]
    #[sol(rpc)]
    interface IERC20Mintable {
        function mint(address to, uint256 amount) external;
    }

    #[allow(missing_docs)]
    #[sol(rpc)]
    interface IAirdrop {
        struct Recipient {
            address to;
            uint256 tokenId;
        }

        function batchMint(Recipient[] calldata recipients) external;
    }
}

/// OpenZeppelin 4 revert reason for a second call to an initializer.
pub const LEGACY_ALREADY_INITIALIZED: &str = "Initializable: contract is already initialized";

/// Role allowing its holder to mint on the asset and coin contracts.
pub fn minter_role() -> B256 {
    keccak256("MINTER_ROLE")
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        alloy::{
            primitives::hex,
            sol_types::{SolCall, SolError, SolEvent},
        },
    };

    #[test]
    fn minter_role_matches_access_control_constant() {
        assert_eq!(
            minter_role(),
            B256::from(hex!(
                "9f2df0fed2c77648de5860a4cc508cd0818c85b8b8a1ab4ceeef8d981c8956a6"
            ))
        );
    }

    #[test]
    fn selectors_match_deployed_abi() {
        assert_eq!(Initializable::InvalidInitialization::SELECTOR, hex!("f92ee8a9"));
        assert_eq!(Initializable::initializeCall::SELECTOR, hex!("8129fc1c"));
        assert_eq!(AccessControl::grantRoleCall::SELECTOR, hex!("2f2ff15d"));
        assert_eq!(IERC721::setApprovalForAllCall::SELECTOR, hex!("a22cb465"));
    }

    #[test]
    fn both_token_standards_share_the_transfer_topic() {
        assert_eq!(
            IERC721::Transfer::SIGNATURE_HASH,
            IERC20::Transfer::SIGNATURE_HASH
        );
    }
}
