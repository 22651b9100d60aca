//! Static description of the contracts that get provisioned and how they
//! depend on each other.

use {std::collections::HashSet, strum::Display};

/// The part a contract plays in the deployment. Each kind appears at most
/// once in a registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractKind {
    /// Non-fungible asset contract.
    Asset,
    /// Mintable fungible coin.
    Coin,
    /// Fungible token whose supply is held by the deployer.
    Token,
    /// Batch distribution contract minting assets to many recipients.
    Distributor,
}

/// Token standard of the `Transfer` events a contract emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenStandard {
    Erc721,
    Erc20,
}

impl ContractKind {
    /// Standard of the transfers the bridge mirrors for this kind, `None` if
    /// the contract is not observed.
    pub fn standard(self) -> Option<TokenStandard> {
        match self {
            Self::Asset => Some(TokenStandard::Erc721),
            Self::Coin | Self::Token => Some(TokenStandard::Erc20),
            Self::Distributor => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstructorArg {
    /// Address of another contract of the registry, which therefore has to be
    /// deployed first.
    AddressOf(ContractKind),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractSpec {
    /// Artifact and address book name.
    pub name: String,
    pub kind: ContractKind,
    pub args: Vec<ConstructorArg>,
    /// Whether the contract has a one-time `initialize()` that must run after
    /// deployment.
    pub initializer: bool,
}

impl ContractSpec {
    pub fn new(name: impl Into<String>, kind: ContractKind) -> Self {
        Self {
            name: name.into(),
            kind,
            args: Vec::new(),
            initializer: false,
        }
    }

    pub fn with_arg(mut self, arg: ConstructorArg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn with_initializer(mut self) -> Self {
        self.initializer = true;
        self
    }

    pub fn dependencies(&self) -> impl Iterator<Item = ContractKind> + '_ {
        self.args.iter().map(|arg| match arg {
            ConstructorArg::AddressOf(kind) => *kind,
        })
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("contract kind {0} is declared more than once")]
    Duplicate(ContractKind),
    #[error("{name} depends on {dependency} which is not part of the registry")]
    UnknownDependency {
        name: String,
        dependency: ContractKind,
    },
    #[error("dependency cycle between {0:?}")]
    Cycle(Vec<String>),
}

#[derive(Clone, Debug)]
pub struct ContractRegistry {
    specs: Vec<ContractSpec>,
}

impl ContractRegistry {
    pub fn new(specs: Vec<ContractSpec>) -> Result<Self, RegistryError> {
        let mut kinds = HashSet::new();
        for spec in &specs {
            if !kinds.insert(spec.kind) {
                return Err(RegistryError::Duplicate(spec.kind));
            }
        }
        let registry = Self { specs };
        registry.deploy_order()?;
        Ok(registry)
    }

    /// The asset, coin and token contracts followed by the airdrop contract
    /// that mints assets and therefore needs the asset's address.
    pub fn standard() -> Result<Self, RegistryError> {
        Self::new(vec![
            ContractSpec::new("SomeNFT", ContractKind::Asset).with_initializer(),
            ContractSpec::new("SomeCoin", ContractKind::Coin).with_initializer(),
            ContractSpec::new("SomeToken", ContractKind::Token).with_initializer(),
            ContractSpec::new("Airdrop", ContractKind::Distributor)
                .with_arg(ConstructorArg::AddressOf(ContractKind::Asset)),
        ])
    }

    pub fn specs(&self) -> &[ContractSpec] {
        &self.specs
    }

    pub fn get(&self, kind: ContractKind) -> Option<&ContractSpec> {
        self.specs.iter().find(|spec| spec.kind == kind)
    }

    /// Orders the specs so every contract comes after the contracts whose
    /// addresses it takes. Contracts without a dependency relation keep their
    /// declaration order.
    pub fn deploy_order(&self) -> Result<Vec<&ContractSpec>, RegistryError> {
        for spec in &self.specs {
            if let Some(dependency) = spec
                .dependencies()
                .find(|dependency| self.get(*dependency).is_none())
            {
                return Err(RegistryError::UnknownDependency {
                    name: spec.name.clone(),
                    dependency,
                });
            }
        }

        let mut placed = HashSet::new();
        let mut pending: Vec<&ContractSpec> = self.specs.iter().collect();
        let mut order = Vec::with_capacity(pending.len());
        while !pending.is_empty() {
            let ready = pending
                .iter()
                .position(|spec| spec.dependencies().all(|kind| placed.contains(&kind)));
            let Some(index) = ready else {
                return Err(RegistryError::Cycle(
                    pending.iter().map(|spec| spec.name.clone()).collect(),
                ));
            };
            let spec = pending.remove(index);
            placed.insert(spec.kind);
            order.push(spec);
        }
        Ok(order)
    }
}
