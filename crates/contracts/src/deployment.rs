use {
    crate::registry::ContractKind,
    alloy::primitives::Address,
    std::fmt::{self, Display, Formatter},
};

/// One deploy-and-listen epoch. Incremented on every successful rebuild.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for Generation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A contract as deployed for a given generation. The address is stable for
/// the lifetime of that generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeployedContract {
    pub name: String,
    pub kind: ContractKind,
    pub address: Address,
    pub generation: Generation,
}
