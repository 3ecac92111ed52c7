use debtmarket_crypto::OrderSigner;
use serde_json::json;

use super::print_json;

pub fn keygen(seed: Option<&str>) -> anyhow::Result<()> {
    let signer = match seed {
        Some(seed) => OrderSigner::from_hex(seed)?,
        None => OrderSigner::generate(),
    };
    print_json(&json!({
        "address": signer.address(),
        "secret": signer.secret_hex(),
    }))
}
