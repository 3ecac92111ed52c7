use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Args;
use debtmarket_core::{
    Amount, DebtOrder, DeploymentConfig, FixedScheduleTerms, OrderRole, SignedDebtOrder,
};
use debtmarket_crypto::{Address, OrderSigner};
use serde_json::json;
use tracing::{info, warn};

use super::print_json;

#[derive(Debug, Args)]
pub struct NewOrderArgs {
    #[arg(long)]
    debtor: Address,
    #[arg(long)]
    creditor: Address,
    /// Principal in base units
    #[arg(long)]
    principal: Amount,
    /// Currency label from the deployment config
    #[arg(long, default_value = "REP")]
    currency: String,
    /// Terms contract label from the deployment config
    #[arg(long, default_value = "fixed-schedule")]
    terms: String,
    /// Total repayment expected over the term, in base units
    #[arg(long)]
    expected: Amount,
    /// Term length in blocks
    #[arg(long)]
    term_blocks: u64,
    #[arg(long, default_value_t = 0)]
    debtor_fee: Amount,
    #[arg(long, default_value_t = 0)]
    creditor_fee: Amount,
    #[arg(long, requires = "underwriter_fee")]
    underwriter: Option<Address>,
    #[arg(long)]
    underwriter_fee: Option<Amount>,
    #[arg(long, default_value_t = 0)]
    risk_rating: u128,
    #[arg(long, requires = "relayer_fee")]
    relayer: Option<Address>,
    #[arg(long)]
    relayer_fee: Option<Amount>,
    /// Seconds from now until the order expires
    #[arg(long, default_value_t = 7 * 86_400)]
    expires_in: u64,
    /// Defaults to the current time in nanoseconds
    #[arg(long)]
    salt: Option<u128>,
    #[arg(long)]
    out: Option<PathBuf>,
}

pub fn new_order(config: &DeploymentConfig, args: &NewOrderArgs) -> anyhow::Result<()> {
    let addresses = config.addresses();
    let now = Utc::now();
    let expires_at = u64::try_from(now.timestamp())
        .context("system clock is before the unix epoch")?
        .saturating_add(args.expires_in);
    let salt = match args.salt {
        Some(salt) => salt,
        None => now
            .timestamp_nanos_opt()
            .and_then(|nanos| u128::try_from(nanos).ok())
            .unwrap_or_default(),
    };

    let mut builder = DebtOrder::builder(addresses.kernel, addresses.issuance_version)
        .debtor(args.debtor)
        .creditor(args.creditor)
        .principal(addresses.currency(&args.currency)?, args.principal)
        .fees(args.debtor_fee, args.creditor_fee)
        .terms(
            addresses.terms_contract(&args.terms)?,
            FixedScheduleTerms::encode(args.expected, args.term_blocks),
        )
        .expires_at(expires_at)
        .salt(salt);
    if let Some(underwriter) = args.underwriter {
        builder = builder.underwriter(
            underwriter,
            args.underwriter_fee.unwrap_or_default(),
            args.risk_rating,
        );
    }
    if let Some(relayer) = args.relayer {
        builder = builder.relayer(relayer, args.relayer_fee.unwrap_or_default());
    }
    let order = builder.build();
    info!(agreement_id = %order.agreement_id(), expires_at, "order template created");

    write_output(&SignedDebtOrder::unsigned(order), args.out.as_deref())
}

pub fn hash_order(config: &DeploymentConfig, path: &Path) -> anyhow::Result<()> {
    let signed = read_order(path)?;
    warn_on_foreign_kernel(config, &signed.order);
    let order = &signed.order;

    let signatures: serde_json::Map<String, serde_json::Value> = OrderRole::ALL
        .iter()
        .map(|role| {
            (
                role.to_string(),
                json!(!signed.signature(*role).is_empty()),
            )
        })
        .collect();

    print_json(&json!({
        "agreement_id": order.agreement_id(),
        "debt_order_hash": order.debt_order_hash(),
        "underwriter_commitment_hash": order.underwriter_commitment_hash(),
        "signed": signatures,
    }))
}

pub fn sign_order(
    config: &DeploymentConfig,
    path: &Path,
    role: OrderRole,
    secret: &str,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let signed = read_order(path)?;
    warn_on_foreign_kernel(config, &signed.order);

    let signer = OrderSigner::from_hex(secret).context("parsing signing secret")?;
    let party = signed.order.party(role);
    if party != signer.address() {
        bail!(
            "secret belongs to {} but the order's {role} is {party}",
            signer.address()
        );
    }

    let signed = signed.sign_as(role, &signer);
    info!(agreement_id = %signed.agreement_id(), %role, "order signed");
    write_output(&signed, out)
}

/// Accepts either a bare order or one that already carries signatures.
fn read_order(path: &Path) -> anyhow::Result<SignedDebtOrder> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading order {}", path.display()))?;
    if let Ok(signed) = serde_json::from_str::<SignedDebtOrder>(&raw) {
        return Ok(signed);
    }
    let order: DebtOrder = serde_json::from_str(&raw)
        .with_context(|| format!("parsing order {}", path.display()))?;
    Ok(SignedDebtOrder::unsigned(order))
}

fn warn_on_foreign_kernel(config: &DeploymentConfig, order: &DebtOrder) {
    let addresses = config.addresses();
    if order.kernel != addresses.kernel {
        warn!(
            order_kernel = %order.kernel,
            deployment_kernel = %addresses.kernel,
            "order is bound to a different kernel and will not fill on this deployment"
        );
    }
}

fn write_output(signed: &SignedDebtOrder, out: Option<&Path>) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            let body = serde_json::to_string_pretty(signed)?;
            std::fs::write(path, body)
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "order written");
            Ok(())
        }
        None => print_json(signed),
    }
}
