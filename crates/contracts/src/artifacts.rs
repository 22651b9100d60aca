//! Access to the bytecode produced by the external build toolchain.
//!
//! The toolchain writes one JSON artifact per contract somewhere below its
//! artifacts directory (e.g. `artifacts/contracts/SomeNFT.sol/SomeNFT.json`)
//! next to `*.dbg.json` debug files and a `build-info` directory.

use {
    alloy::primitives::Bytes,
    anyhow::{Context, Result, ensure},
    serde::Deserialize,
    std::{fs, path::PathBuf},
    walkdir::WalkDir,
};

#[derive(Clone, Debug)]
pub struct Artifacts {
    root: PathBuf,
}

/// The compiled form of one contract.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Creation code, without constructor arguments.
    pub bytecode: Bytes,
    /// Code the chain stores once the constructor ran. Contracts with
    /// immutables differ from it in the immutable slots.
    #[serde(default)]
    pub deployed_bytecode: Bytes,
}

impl Artifacts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Loads the artifact of the contract `name`. Fails for abstract
    /// contracts and interfaces.
    pub fn load(&self, name: &str) -> Result<Artifact> {
        let file_name = format!("{name}.json");
        let path = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|entry| entry.file_name() != "build-info")
            .find_map(|entry| match entry {
                Ok(entry) if entry.file_type().is_file() && entry.file_name() == file_name.as_str() => {
                    Some(Ok(entry.into_path()))
                }
                Ok(_) => None,
                Err(err) => Some(Err(err)),
            })
            .transpose()
            .with_context(|| format!("failed to search {}", self.root.display()))?
            .with_context(|| format!("no artifact for {name} below {}", self.root.display()))?;
        let contents =
            fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let artifact: Artifact = serde_json::from_slice(&contents)
            .with_context(|| format!("malformed artifact {}", path.display()))?;
        ensure!(
            !artifact.bytecode.is_empty(),
            "{name} has no creation code, is it abstract or an interface?"
        );
        Ok(artifact)
    }
}
