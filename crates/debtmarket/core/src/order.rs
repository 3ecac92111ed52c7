//! Debt orders, issuance commitments and their canonical hashes.
//!
//! ## Canonical byte layout
//!
//! Every hash is BLAKE3-256 over a fixed concatenation. Addresses and hashes
//! are 32 raw bytes, `u128` values 16 bytes big-endian, `u64` values 8 bytes
//! big-endian. Field order never changes; signatures are checked against it.
//!
//! | hash | preimage | bytes |
//! |------|----------|-------|
//! | issuance commitment (= agreement id) | issuanceVersion ‖ debtor ‖ underwriter ‖ riskRating ‖ termsContract ‖ termsParameters ‖ salt | 192 |
//! | debt order | kernel ‖ issuanceHash ‖ underwriterFee ‖ principal ‖ principalCurrency ‖ debtorFee ‖ creditorFee ‖ relayer ‖ relayerFee ‖ expiration | 216 |
//! | underwriter commitment | kernel ‖ issuanceHash ‖ underwriterFee ‖ principal ‖ principalCurrency ‖ expiration | 136 |
//!
//! Debtor and creditor sign the debt-order hash; the underwriter signs the
//! underwriter-commitment hash.

use debtmarket_crypto::{Address, Hash256, OrderSigner, SignatureTriple};
use serde::{Deserialize, Serialize};

use crate::error::DebtMarketError;
use crate::types::{AgreementId, Amount, TermsParameters};

pub const ADDRESS_FIELD_COUNT: usize = 6;
pub const NUMERIC_FIELD_COUNT: usize = 8;
pub const PARAM_FIELD_COUNT: usize = 1;
pub const SIGNATURE_SLOT_COUNT: usize = 3;

pub const ISSUANCE_COMMITMENT_LEN: usize = 192;
pub const DEBT_ORDER_PREIMAGE_LEN: usize = 216;
pub const UNDERWRITER_COMMITMENT_LEN: usize = 136;

/// A signing role on a debt order. The discriminant is the signature slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderRole {
    Debtor = 0,
    Creditor = 1,
    Underwriter = 2,
}

impl OrderRole {
    pub const ALL: [OrderRole; SIGNATURE_SLOT_COUNT] =
        [OrderRole::Debtor, OrderRole::Creditor, OrderRole::Underwriter];

    pub fn slot(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for OrderRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            OrderRole::Debtor => "debtor",
            OrderRole::Creditor => "creditor",
            OrderRole::Underwriter => "underwriter",
        })
    }
}

impl std::str::FromStr for OrderRole {
    type Err = DebtMarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debtor" => Ok(OrderRole::Debtor),
            "creditor" => Ok(OrderRole::Creditor),
            "underwriter" => Ok(OrderRole::Underwriter),
            other => Err(DebtMarketError::InvalidOrder(format!(
                "unknown signing role '{other}'"
            ))),
        }
    }
}

/// Fixed-width big-endian writer for canonical hash preimages.
struct CanonicalEncoder {
    buf: Vec<u8>,
}

impl CanonicalEncoder {
    fn with_capacity(len: usize) -> Self {
        Self {
            buf: Vec::with_capacity(len),
        }
    }

    fn bytes32(mut self, bytes: &[u8; 32]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    fn u128(mut self, value: u128) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    fn u64(mut self, value: u64) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// The identity-defining subset of a debt order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceCommitment {
    pub issuance_version: Address,
    pub debtor: Address,
    pub underwriter: Address,
    pub underwriter_risk_rating: u128,
    pub terms_contract: Address,
    pub terms_parameters: TermsParameters,
    pub salt: u128,
}

impl IssuanceCommitment {
    pub fn canonical_bytes(&self) -> Vec<u8> {
        CanonicalEncoder::with_capacity(ISSUANCE_COMMITMENT_LEN)
            .bytes32(self.issuance_version.as_bytes())
            .bytes32(self.debtor.as_bytes())
            .bytes32(self.underwriter.as_bytes())
            .u128(self.underwriter_risk_rating)
            .bytes32(self.terms_contract.as_bytes())
            .bytes32(self.terms_parameters.as_bytes())
            .u128(self.salt)
            .finish()
    }

    /// The agreement identifier this commitment would be registered under.
    pub fn hash(&self) -> AgreementId {
        AgreementId(Hash256::digest(&self.canonical_bytes()))
    }
}

/// Full terms of a proposed loan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtOrder {
    pub kernel: Address,
    pub issuance_version: Address,
    pub debtor: Address,
    /// Null until the order is filled.
    pub creditor: Address,
    pub underwriter: Address,
    pub relayer: Address,
    pub principal_amount: Amount,
    pub principal_currency: Address,
    pub debtor_fee: Amount,
    pub creditor_fee: Amount,
    pub underwriter_fee: Amount,
    pub relayer_fee: Amount,
    pub underwriter_risk_rating: u128,
    pub terms_contract: Address,
    pub terms_parameters: TermsParameters,
    pub expiration_timestamp: u64,
    pub salt: u128,
}

impl DebtOrder {
    pub fn builder(kernel: Address, issuance_version: Address) -> DebtOrderBuilder {
        DebtOrderBuilder::new(kernel, issuance_version)
    }

    pub fn issuance_commitment(&self) -> IssuanceCommitment {
        IssuanceCommitment {
            issuance_version: self.issuance_version,
            debtor: self.debtor,
            underwriter: self.underwriter,
            underwriter_risk_rating: self.underwriter_risk_rating,
            terms_contract: self.terms_contract,
            terms_parameters: self.terms_parameters,
            salt: self.salt,
        }
    }

    pub fn agreement_id(&self) -> AgreementId {
        self.issuance_commitment().hash()
    }

    pub fn debt_order_bytes(&self) -> Vec<u8> {
        let issuance = self.agreement_id();
        CanonicalEncoder::with_capacity(DEBT_ORDER_PREIMAGE_LEN)
            .bytes32(self.kernel.as_bytes())
            .bytes32(issuance.as_hash().as_bytes())
            .u128(self.underwriter_fee)
            .u128(self.principal_amount)
            .bytes32(self.principal_currency.as_bytes())
            .u128(self.debtor_fee)
            .u128(self.creditor_fee)
            .bytes32(self.relayer.as_bytes())
            .u128(self.relayer_fee)
            .u64(self.expiration_timestamp)
            .finish()
    }

    pub fn underwriter_commitment_bytes(&self) -> Vec<u8> {
        let issuance = self.agreement_id();
        CanonicalEncoder::with_capacity(UNDERWRITER_COMMITMENT_LEN)
            .bytes32(self.kernel.as_bytes())
            .bytes32(issuance.as_hash().as_bytes())
            .u128(self.underwriter_fee)
            .u128(self.principal_amount)
            .bytes32(self.principal_currency.as_bytes())
            .u64(self.expiration_timestamp)
            .finish()
    }

    pub fn debt_order_hash(&self) -> Hash256 {
        Hash256::digest(&self.debt_order_bytes())
    }

    pub fn underwriter_commitment_hash(&self) -> Hash256 {
        Hash256::digest(&self.underwriter_commitment_bytes())
    }

    /// The hash a party in `role` signs.
    pub fn signing_hash(&self, role: OrderRole) -> Hash256 {
        match role {
            OrderRole::Debtor | OrderRole::Creditor => self.debt_order_hash(),
            OrderRole::Underwriter => self.underwriter_commitment_hash(),
        }
    }

    /// Address expected to have produced the signature for `role`.
    pub fn party(&self, role: OrderRole) -> Address {
        match role {
            OrderRole::Debtor => self.debtor,
            OrderRole::Creditor => self.creditor,
            OrderRole::Underwriter => self.underwriter,
        }
    }

    pub fn has_underwriter(&self) -> bool {
        !self.underwriter.is_null()
    }

    pub fn has_relayer(&self) -> bool {
        !self.relayer.is_null()
    }

    /// Flatten into the wire field arrays accepted by the kernel.
    pub fn to_fields(&self) -> OrderFields {
        OrderFields {
            addresses: [
                self.issuance_version,
                self.debtor,
                self.underwriter,
                self.terms_contract,
                self.principal_currency,
                self.relayer,
            ],
            values: [
                self.underwriter_risk_rating,
                self.salt,
                self.principal_amount,
                self.underwriter_fee,
                self.relayer_fee,
                self.creditor_fee,
                self.debtor_fee,
                u128::from(self.expiration_timestamp),
            ],
            params: [self.terms_parameters],
        }
    }

    /// Rebuild an order from wire fields, bound to `kernel` and `creditor`.
    pub fn from_fields(
        kernel: Address,
        creditor: Address,
        fields: &OrderFields,
    ) -> Result<Self, DebtMarketError> {
        let [issuance_version, debtor, underwriter, terms_contract, principal_currency, relayer] =
            fields.addresses;
        let [
            underwriter_risk_rating,
            salt,
            principal_amount,
            underwriter_fee,
            relayer_fee,
            creditor_fee,
            debtor_fee,
            expiration,
        ] = fields.values;
        let expiration_timestamp = u64::try_from(expiration).map_err(|_| {
            DebtMarketError::InvalidOrder(format!(
                "expiration timestamp {expiration} does not fit in 64 bits"
            ))
        })?;

        Ok(Self {
            kernel,
            issuance_version,
            debtor,
            creditor,
            underwriter,
            relayer,
            principal_amount,
            principal_currency,
            debtor_fee,
            creditor_fee,
            underwriter_fee,
            relayer_fee,
            underwriter_risk_rating,
            terms_contract,
            terms_parameters: fields.params[0],
            expiration_timestamp,
            salt,
        })
    }
}

/// Chained constructor for [`DebtOrder`]. Unset parties are null, unset amounts zero.
#[derive(Clone, Debug)]
pub struct DebtOrderBuilder {
    order: DebtOrder,
}

impl DebtOrderBuilder {
    pub fn new(kernel: Address, issuance_version: Address) -> Self {
        Self {
            order: DebtOrder {
                kernel,
                issuance_version,
                debtor: Address::NULL,
                creditor: Address::NULL,
                underwriter: Address::NULL,
                relayer: Address::NULL,
                principal_amount: 0,
                principal_currency: Address::NULL,
                debtor_fee: 0,
                creditor_fee: 0,
                underwriter_fee: 0,
                relayer_fee: 0,
                underwriter_risk_rating: 0,
                terms_contract: Address::NULL,
                terms_parameters: TermsParameters::default(),
                expiration_timestamp: 0,
                salt: 0,
            },
        }
    }

    pub fn debtor(mut self, debtor: Address) -> Self {
        self.order.debtor = debtor;
        self
    }

    pub fn creditor(mut self, creditor: Address) -> Self {
        self.order.creditor = creditor;
        self
    }

    pub fn underwriter(mut self, underwriter: Address, fee: Amount, risk_rating: u128) -> Self {
        self.order.underwriter = underwriter;
        self.order.underwriter_fee = fee;
        self.order.underwriter_risk_rating = risk_rating;
        self
    }

    pub fn relayer(mut self, relayer: Address, fee: Amount) -> Self {
        self.order.relayer = relayer;
        self.order.relayer_fee = fee;
        self
    }

    pub fn principal(mut self, currency: Address, amount: Amount) -> Self {
        self.order.principal_currency = currency;
        self.order.principal_amount = amount;
        self
    }

    pub fn fees(mut self, debtor_fee: Amount, creditor_fee: Amount) -> Self {
        self.order.debtor_fee = debtor_fee;
        self.order.creditor_fee = creditor_fee;
        self
    }

    pub fn terms(mut self, terms_contract: Address, parameters: TermsParameters) -> Self {
        self.order.terms_contract = terms_contract;
        self.order.terms_parameters = parameters;
        self
    }

    pub fn expires_at(mut self, timestamp: u64) -> Self {
        self.order.expiration_timestamp = timestamp;
        self
    }

    pub fn salt(mut self, salt: u128) -> Self {
        self.order.salt = salt;
        self
    }

    pub fn build(self) -> DebtOrder {
        self.order
    }
}

/// Wire form of an order's terms, in the slot layout documented at module level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFields {
    pub addresses: [Address; ADDRESS_FIELD_COUNT],
    pub values: [u128; NUMERIC_FIELD_COUNT],
    pub params: [TermsParameters; PARAM_FIELD_COUNT],
}

/// Wire form of the three signature slots (debtor, creditor, underwriter).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignatureFields {
    pub v: [u8; SIGNATURE_SLOT_COUNT],
    pub r: [[u8; 32]; SIGNATURE_SLOT_COUNT],
    pub s: [[u8; 32]; SIGNATURE_SLOT_COUNT],
}

impl SignatureFields {
    pub fn triple(&self, role: OrderRole) -> SignatureTriple {
        let slot = role.slot();
        SignatureTriple {
            v: self.v[slot],
            r: self.r[slot],
            s: self.s[slot],
        }
    }
}

/// A debt order plus one signature slot per role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedDebtOrder {
    pub order: DebtOrder,
    pub debtor_signature: SignatureTriple,
    pub creditor_signature: SignatureTriple,
    pub underwriter_signature: SignatureTriple,
}

impl SignedDebtOrder {
    pub fn unsigned(order: DebtOrder) -> Self {
        Self {
            order,
            debtor_signature: SignatureTriple::EMPTY,
            creditor_signature: SignatureTriple::EMPTY,
            underwriter_signature: SignatureTriple::EMPTY,
        }
    }

    pub fn from_parts(order: DebtOrder, signatures: &SignatureFields) -> Self {
        Self {
            order,
            debtor_signature: signatures.triple(OrderRole::Debtor),
            creditor_signature: signatures.triple(OrderRole::Creditor),
            underwriter_signature: signatures.triple(OrderRole::Underwriter),
        }
    }

    /// Sign the hash appropriate for `role` and store it in that slot.
    pub fn sign_as(mut self, role: OrderRole, signer: &OrderSigner) -> Self {
        let signature = signer.sign_hash(&self.order.signing_hash(role));
        *self.signature_mut(role) = signature;
        self
    }

    pub fn signature(&self, role: OrderRole) -> &SignatureTriple {
        match role {
            OrderRole::Debtor => &self.debtor_signature,
            OrderRole::Creditor => &self.creditor_signature,
            OrderRole::Underwriter => &self.underwriter_signature,
        }
    }

    fn signature_mut(&mut self, role: OrderRole) -> &mut SignatureTriple {
        match role {
            OrderRole::Debtor => &mut self.debtor_signature,
            OrderRole::Creditor => &mut self.creditor_signature,
            OrderRole::Underwriter => &mut self.underwriter_signature,
        }
    }

    pub fn agreement_id(&self) -> AgreementId {
        self.order.agreement_id()
    }

    pub fn signature_fields(&self) -> SignatureFields {
        let mut fields = SignatureFields::default();
        for role in OrderRole::ALL {
            let triple = self.signature(role);
            fields.v[role.slot()] = triple.v;
            fields.r[role.slot()] = triple.r;
            fields.s[role.slot()] = triple.s;
        }
        fields
    }
}
