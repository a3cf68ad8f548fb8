//! Contract factories backed by compiled build artifacts.
//!
//! Both common layouts are understood:
//! - Hardhat: `artifacts/contracts/<Name>.sol/<Name>.json` with a `bytecode` string.
//! - Foundry: `out/<Name>.sol/<Name>.json` with a `bytecode.object` string.

use std::path::{Path, PathBuf};

use alloy_core::primitives::Bytes;
use anyhow::{Context, Result};
use serde_json::Value;

use crate::{ContractId, Factory};

/// Maximum directory depth searched below the artifacts root.
const MAX_SEARCH_DEPTH: usize = 8;

/// Resolves contract identifiers to creation bytecode.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Find the artifact file of a contract.
    pub fn locate(&self, contract: &ContractId) -> Result<PathBuf> {
        if !self.root.is_dir() {
            anyhow::bail!(
                "Artifacts directory not found: {} (compile the contracts first)",
                self.root.display()
            );
        }

        let source_dir = format!("{contract}.sol");
        let file_name = format!("{contract}.json");

        find_artifact(&self.root, &source_dir, &file_name, 0)?.with_context(|| {
            format!(
                "No artifact for contract {} under {}",
                contract,
                self.root.display()
            )
        })
    }

    /// Load the factory (creation bytecode) of a contract.
    pub fn load(&self, contract: &ContractId) -> Result<Factory> {
        let path = self.locate(contract)?;
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let artifact: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        let bytecode = parse_bytecode(&artifact)
            .with_context(|| format!("Invalid bytecode in {}", path.display()))?;

        tracing::debug!(
            contract = %contract,
            path = %path.display(),
            size = bytecode.len(),
            "Loaded contract artifact"
        );

        Ok(Factory {
            contract: contract.clone(),
            bytecode,
        })
    }
}

/// Depth-first search for `<source_dir>/<file_name>`.
fn find_artifact(
    dir: &Path,
    source_dir: &str,
    file_name: &str,
    depth: usize,
) -> Result<Option<PathBuf>> {
    let candidate = dir.join(source_dir).join(file_name);
    if candidate.is_file() {
        return Ok(Some(candidate));
    }

    if depth >= MAX_SEARCH_DEPTH {
        return Ok(None);
    }

    let mut subdirs: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect();
    // Deterministic order when several artifacts share a name.
    subdirs.sort();

    for subdir in subdirs {
        if let Some(found) = find_artifact(&subdir, source_dir, file_name, depth + 1)? {
            return Ok(Some(found));
        }
    }

    Ok(None)
}

/// Extract creation bytecode from a Hardhat or Foundry artifact.
fn parse_bytecode(artifact: &Value) -> Result<Bytes> {
    let hex_code = match &artifact["bytecode"] {
        Value::String(code) => code.as_str(),
        Value::Object(obj) => obj
            .get("object")
            .and_then(Value::as_str)
            .context("bytecode.object is missing")?,
        _ => anyhow::bail!("bytecode field is missing"),
    };

    let stripped = hex_code.trim_start_matches("0x");
    if stripped.is_empty() {
        anyhow::bail!("artifact has no creation bytecode (abstract contract or interface?)");
    }
    if stripped.contains("__") {
        anyhow::bail!("bytecode contains unlinked library placeholders");
    }

    let bytes = hex::decode(stripped).context("bytecode is not valid hex")?;
    Ok(Bytes::from(bytes))
}
