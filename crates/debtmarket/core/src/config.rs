use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use debtmarket_crypto::Address;
use serde::{Deserialize, Serialize};

use crate::error::DebtMarketError;
use crate::terms::TermsKind;
use crate::types::{Amount, BlockContext, UNIT};

/// A terms contract registered at genesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermsContractConfig {
    /// The contract address is derived from this label.
    pub label: String,
    pub kind: TermsKind,
}

/// Genesis balance of one holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationConfig {
    /// Label of a currency listed in [`DeploymentConfig::currencies`].
    pub currency: String,
    pub holder: Address,
    pub amount: Amount,
}

/// Everything needed to stand up one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    /// Only the owner may mint currency, manage transfer agents and register terms contracts.
    pub owner: Address,
    pub kernel_label: String,
    pub router_label: String,
    pub token_label: String,
    pub genesis: BlockContext,
    pub terms_contracts: Vec<TermsContractConfig>,
    pub currencies: Vec<String>,
    pub allocations: Vec<AllocationConfig>,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            owner: Address::derive("deployment-owner"),
            kernel_label: "debt-kernel".to_string(),
            router_label: "repayment-router".to_string(),
            token_label: "debt-token".to_string(),
            // 2023-11-14T22:13:20Z
            genesis: BlockContext::new(1, 1_700_000_000),
            terms_contracts: vec![TermsContractConfig {
                label: "fixed-schedule".to_string(),
                kind: TermsKind::FixedSchedule,
            }],
            currencies: vec!["REP".to_string()],
            allocations: Vec::new(),
        }
    }
}

impl DeploymentConfig {
    pub fn from_json_str(json: &str) -> Result<Self, DebtMarketError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| DebtMarketError::Config(format!("invalid deployment config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DebtMarketError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DebtMarketError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    /// Devnet config with `amount` whole units of the first currency given to each holder.
    pub fn devnet(holders: &[Address], amount: Amount) -> Self {
        let config = Self::default();
        let currency = config.currencies.first().cloned().unwrap_or_default();
        let allocations = holders
            .iter()
            .map(|holder| AllocationConfig {
                currency: currency.clone(),
                holder: *holder,
                amount: amount.saturating_mul(UNIT),
            })
            .collect();
        Self {
            allocations,
            ..config
        }
    }

    pub fn validate(&self) -> Result<(), DebtMarketError> {
        let mut labels = BTreeSet::new();
        let contract_labels = [&self.kernel_label, &self.router_label, &self.token_label]
            .into_iter()
            .chain(self.terms_contracts.iter().map(|t| &t.label));
        for label in contract_labels {
            if label.is_empty() {
                return Err(DebtMarketError::Config("empty contract label".to_string()));
            }
            if !labels.insert(label.as_str()) {
                return Err(DebtMarketError::Config(format!(
                    "duplicate contract label '{label}'"
                )));
            }
        }

        let currencies: BTreeSet<&str> = self.currencies.iter().map(String::as_str).collect();
        if currencies.len() != self.currencies.len() {
            return Err(DebtMarketError::Config("duplicate currency label".to_string()));
        }
        for allocation in &self.allocations {
            if !currencies.contains(allocation.currency.as_str()) {
                return Err(DebtMarketError::Config(format!(
                    "allocation references unknown currency '{}'",
                    allocation.currency
                )));
            }
            if allocation.holder.is_null() {
                return Err(DebtMarketError::Config(
                    "allocation to the null address".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn addresses(&self) -> DeploymentAddresses {
        let router = Address::derive(&self.router_label);
        DeploymentAddresses {
            owner: self.owner,
            kernel: Address::derive(&self.kernel_label),
            router,
            token: Address::derive(&self.token_label),
            issuance_version: router,
            terms_contracts: self
                .terms_contracts
                .iter()
                .map(|t| (t.label.clone(), Address::derive(&t.label)))
                .collect(),
            currencies: self
                .currencies
                .iter()
                .map(|label| (label.clone(), currency_address(label)))
                .collect(),
        }
    }
}

/// Address of the currency registered under `label`.
pub fn currency_address(label: &str) -> Address {
    Address::derive_parts(&[b"currency", label.as_bytes()])
}

/// Addresses of a deployment's contracts, derived from its config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentAddresses {
    pub owner: Address,
    pub kernel: Address,
    pub router: Address,
    pub token: Address,
    /// Orders must name this as their issuance version. It is the router
    /// that will service the resulting agreements.
    pub issuance_version: Address,
    pub terms_contracts: BTreeMap<String, Address>,
    pub currencies: BTreeMap<String, Address>,
}

impl DeploymentAddresses {
    pub fn terms_contract(&self, label: &str) -> Result<Address, DebtMarketError> {
        self.terms_contracts
            .get(label)
            .copied()
            .ok_or_else(|| DebtMarketError::Config(format!("no terms contract '{label}'")))
    }

    pub fn currency(&self, label: &str) -> Result<Address, DebtMarketError> {
        self.currencies
            .get(label)
            .copied()
            .ok_or_else(|| DebtMarketError::Config(format!("no currency '{label}'")))
    }
}
