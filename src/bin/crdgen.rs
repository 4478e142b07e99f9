//! # CRD Generator
//!
//! Prints the provider's CustomResourceDefinitions as one multi-document YAML
//! stream.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/litellm.crossplane.io.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use anyhow::{Context, Result};
use kube::CustomResourceExt;
use provider_litellm::crd::{Key, ProviderConfig, ProviderConfigUsage, Team};

fn main() -> Result<()> {
    let crds = [
        Key::crd(),
        Team::crd(),
        ProviderConfig::crd(),
        ProviderConfigUsage::crd(),
    ];

    let mut documents = Vec::with_capacity(crds.len());
    for crd in &crds {
        let name = crd.metadata.name.as_deref().unwrap_or_default();
        documents.push(
            serde_yaml::to_string(crd).with_context(|| format!("Failed to serialize CRD {name}"))?,
        );
    }
    print!("{}", documents.join("---\n"));
    Ok(())
}
