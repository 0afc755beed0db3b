//! Test doubles: a scripted mint that really signs, a Lightning client
//! whose invoices are real bolt11 strings, and a fixed rate source.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bitcoin::hashes::{sha256, Hash};
use bitcoin::secp256k1::rand::rngs::OsRng;
use bitcoin::secp256k1::rand::Rng;
use bitcoin::secp256k1::Secp256k1;
use ecash::dhke::{blind_message, sign_message, unblind_message};
use ecash::melt::{MeltQuoteRequest, MeltQuoteResponse, MeltQuoteState, MeltRequest, MeltResponse};
use ecash::restore::{RestoreRequest, RestoreResponse};
use ecash::util::unix_time;
use ecash::{
    Amount, BlindSignature, BlindedMessage, CheckStateRequest, CheckStateResponse, CurrencyUnit,
    Id, Keys, KeySet, KeySetInfo, MintUrl, Proof, ProofState, Proofs, PublicKey, Secret,
    SecretKey, State, SwapRequest, SwapResponse, Token,
};
use lightning_invoice::{Bolt11Invoice, Currency, InvoiceBuilder, PaymentSecret};
use mintpay::error::{Error, ErrorResponse};
use mintpay::{InvoiceHandle, InvoiceStatus, LightningClient, MintConnector, RateSource};

/// How the fake mint reacts to the next swap call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapBehavior {
    /// Process and respond
    Normal,
    /// Connection drops before the request is processed
    FailUnprocessed,
    /// Request is processed but the response is lost
    FailAfterProcessing,
}

/// How the fake mint reacts to the next melt call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeltBehavior {
    /// Pay the invoice and respond PAID
    Normal,
    /// Pay the invoice but lose the response
    FailAfterProcessing,
    /// Respond PENDING without paying
    ReturnPending,
    /// Respond UNPAID
    ReturnUnpaid,
}

#[derive(Debug)]
struct QuoteRecord {
    amount: Amount,
    fee_reserve: Amount,
    expiry: u64,
    state: MeltQuoteState,
    request: String,
}

#[derive(Debug)]
struct MintInner {
    spent: HashSet<PublicKey>,
    pending: HashSet<PublicKey>,
    // Signatures the mint would re-issue on restore, keyed by blinded point
    issued: HashMap<PublicKey, BlindSignature>,
    quotes: HashMap<String, QuoteRecord>,
    swap_behavior: SwapBehavior,
    melt_behavior: MeltBehavior,
    swap_calls: u32,
    melt_calls: u32,
    quote_counter: u32,
}

/// A mint that holds real signing keys
#[derive(Debug)]
pub struct FakeMint {
    pub mint_url: MintUrl,
    pub keyset_id: Id,
    pub keys: Keys,
    secret_keys: BTreeMap<Amount, SecretKey>,
    input_fee_ppk: u64,
    fee_reserve: Amount,
    change_amounts: Vec<Amount>,
    lightning: Option<Arc<FakeLightning>>,
    inner: Mutex<MintInner>,
}

impl FakeMint {
    pub fn new(mint_url: &str, input_fee_ppk: u64) -> Self {
        let mut secret_keys = BTreeMap::new();
        let mut public_keys = BTreeMap::new();
        for order in 0..17u32 {
            let amount = Amount::from(2u64.pow(order));
            let secret_key = SecretKey::generate();
            public_keys.insert(amount, secret_key.public_key());
            secret_keys.insert(amount, secret_key);
        }
        let keys = Keys::new(public_keys);
        let keyset_id = Id::from(&keys);

        Self {
            mint_url: MintUrl::from_str(mint_url).expect("valid url"),
            keyset_id,
            keys,
            secret_keys,
            input_fee_ppk,
            fee_reserve: Amount::from(2),
            change_amounts: vec![Amount::ONE],
            lightning: None,
            inner: Mutex::new(MintInner {
                spent: HashSet::new(),
                pending: HashSet::new(),
                issued: HashMap::new(),
                quotes: HashMap::new(),
                swap_behavior: SwapBehavior::Normal,
                melt_behavior: MeltBehavior::Normal,
                swap_calls: 0,
                melt_calls: 0,
                quote_counter: 0,
            }),
        }
    }

    /// Wire the Lightning double the mint "pays" invoices through
    pub fn with_lightning(mut self, lightning: Arc<FakeLightning>) -> Self {
        self.lightning = Some(lightning);
        self
    }

    pub fn set_swap_behavior(&self, behavior: SwapBehavior) {
        self.inner.lock().expect("lock").swap_behavior = behavior;
    }

    pub fn set_melt_behavior(&self, behavior: MeltBehavior) {
        self.inner.lock().expect("lock").melt_behavior = behavior;
    }

    pub fn set_quote_state(&self, quote_id: &str, state: MeltQuoteState) {
        let mut inner = self.inner.lock().expect("lock");
        if let Some(quote) = inner.quotes.get_mut(quote_id) {
            quote.state = state;
        }
    }

    pub fn quote_ids(&self) -> Vec<String> {
        self.inner.lock().expect("lock").quotes.keys().cloned().collect()
    }

    pub fn swap_calls(&self) -> u32 {
        self.inner.lock().expect("lock").swap_calls
    }

    pub fn melt_calls(&self) -> u32 {
        self.inner.lock().expect("lock").melt_calls
    }

    pub fn mark_spent(&self, proofs: &Proofs) {
        let mut inner = self.inner.lock().expect("lock");
        for proof in proofs {
            inner.spent.insert(proof.y().expect("y"));
        }
    }

    /// Issue valid, unspent proofs summing to `amount`
    pub fn issue_proofs(&self, amount: Amount) -> Proofs {
        let amounts = amount.split_into(&self.keys.amounts()).expect("representable");
        amounts
            .into_iter()
            .map(|amount| {
                let secret = Secret::generate();
                let (blinded, r) = blind_message(secret.as_bytes(), None).expect("blind");
                let signing_key = self.secret_keys.get(&amount).expect("denomination");
                let signed = sign_message(signing_key, &blinded).expect("sign");
                let c =
                    unblind_message(&signed, &r, &signing_key.public_key()).expect("unblind");
                Proof::new(amount, self.keyset_id, secret, c)
            })
            .collect()
    }

    /// A single-mint token worth `amount`
    pub fn issue_token(&self, amount: Amount) -> Token {
        Token::new(
            self.mint_url.clone(),
            self.issue_proofs(amount),
            Some(CurrencyUnit::Sat),
            None,
        )
        .expect("token")
    }

    fn sign_outputs(&self, inner: &mut MintInner, outputs: &[BlindedMessage]) -> Vec<BlindSignature> {
        outputs
            .iter()
            .map(|output| {
                let signing_key = self
                    .secret_keys
                    .get(&output.amount)
                    .expect("denomination known");
                let signature = BlindSignature {
                    amount: output.amount,
                    keyset_id: output.keyset_id,
                    c: sign_message(signing_key, &output.b).expect("sign"),
                    dleq: None,
                };
                inner.issued.insert(output.b, signature.clone());
                signature
            })
            .collect()
    }

    /// Sign blank outputs with assigned change amounts
    fn sign_change(
        &self,
        inner: &mut MintInner,
        blanks: &[BlindedMessage],
    ) -> Vec<BlindSignature> {
        blanks
            .iter()
            .zip(self.change_amounts.iter())
            .map(|(blank, amount)| {
                let signing_key = self.secret_keys.get(amount).expect("denomination");
                let signature = BlindSignature {
                    amount: *amount,
                    keyset_id: blank.keyset_id,
                    c: sign_message(signing_key, &blank.b).expect("sign"),
                    dleq: None,
                };
                inner.issued.insert(blank.b, signature.clone());
                signature
            })
            .collect()
    }

    fn consume_inputs(&self, inner: &mut MintInner, inputs: &Proofs) -> Result<(), Error> {
        let ys: Vec<PublicKey> = inputs
            .iter()
            .map(|proof| proof.y().expect("y"))
            .collect();
        if ys.iter().any(|y| inner.spent.contains(y)) {
            return Err(Error::Mint(ErrorResponse {
                code: 11001,
                detail: Some("Token already spent".to_string()),
            }));
        }
        for y in ys {
            inner.spent.insert(y);
        }
        Ok(())
    }
}

#[async_trait]
impl MintConnector for FakeMint {
    async fn get_keysets(&self, _mint_url: &MintUrl) -> Result<Vec<KeySetInfo>, Error> {
        Ok(vec![KeySetInfo {
            id: self.keyset_id,
            unit: CurrencyUnit::Sat,
            active: true,
            input_fee_ppk: self.input_fee_ppk,
        }])
    }

    async fn get_keys(&self, _mint_url: &MintUrl, keyset_id: Id) -> Result<KeySet, Error> {
        if keyset_id != self.keyset_id {
            return Err(Error::UnknownKeySet(keyset_id));
        }
        Ok(KeySet {
            id: self.keyset_id,
            unit: CurrencyUnit::Sat,
            keys: self.keys.clone(),
        })
    }

    async fn post_swap(
        &self,
        _mint_url: &MintUrl,
        request: SwapRequest,
    ) -> Result<SwapResponse, Error> {
        let mut inner = self.inner.lock().expect("lock");
        inner.swap_calls += 1;

        match inner.swap_behavior {
            SwapBehavior::FailUnprocessed => {
                inner.swap_behavior = SwapBehavior::Normal;
                Err(Error::Network("connection refused".to_string()))
            }
            SwapBehavior::FailAfterProcessing => {
                inner.swap_behavior = SwapBehavior::Normal;
                self.consume_inputs(&mut inner, request.inputs())?;
                self.sign_outputs(&mut inner, request.outputs());
                Err(Error::Network("connection reset by peer".to_string()))
            }
            SwapBehavior::Normal => {
                self.consume_inputs(&mut inner, request.inputs())?;
                let signatures = self.sign_outputs(&mut inner, request.outputs());
                Ok(SwapResponse::new(signatures))
            }
        }
    }

    async fn post_melt_quote(
        &self,
        _mint_url: &MintUrl,
        request: MeltQuoteRequest,
    ) -> Result<MeltQuoteResponse, Error> {
        let mut inner = self.inner.lock().expect("lock");
        inner.quote_counter += 1;
        let quote_id = format!("quote-{}", inner.quote_counter);

        let amount = Amount::from(
            request
                .request
                .amount_milli_satoshis()
                .expect("amount-bearing invoice")
                / 1000,
        );

        inner.quotes.insert(
            quote_id.clone(),
            QuoteRecord {
                amount,
                fee_reserve: self.fee_reserve,
                expiry: unix_time() + 600,
                state: MeltQuoteState::Unpaid,
                request: request.request.to_string(),
            },
        );

        Ok(MeltQuoteResponse {
            quote: quote_id,
            amount,
            fee_reserve: self.fee_reserve,
            state: MeltQuoteState::Unpaid,
            expiry: unix_time() + 600,
        })
    }

    async fn get_melt_quote(
        &self,
        _mint_url: &MintUrl,
        quote_id: &str,
    ) -> Result<MeltQuoteResponse, Error> {
        let inner = self.inner.lock().expect("lock");
        let quote = inner.quotes.get(quote_id).ok_or(Error::Mint(ErrorResponse {
            code: 20005,
            detail: Some("Unknown quote".to_string()),
        }))?;
        Ok(MeltQuoteResponse {
            quote: quote_id.to_string(),
            amount: quote.amount,
            fee_reserve: quote.fee_reserve,
            state: quote.state,
            expiry: quote.expiry,
        })
    }

    async fn post_melt(
        &self,
        _mint_url: &MintUrl,
        request: MeltRequest,
    ) -> Result<MeltResponse, Error> {
        let mut inner = self.inner.lock().expect("lock");
        inner.melt_calls += 1;

        let behavior = inner.melt_behavior;
        let quote_request = inner
            .quotes
            .get(&request.quote)
            .map(|quote| quote.request.clone())
            .ok_or(Error::Mint(ErrorResponse {
                code: 20005,
                detail: Some("Unknown quote".to_string()),
            }))?;

        match behavior {
            MeltBehavior::ReturnUnpaid => Ok(MeltResponse {
                state: MeltQuoteState::Unpaid,
                payment_preimage: None,
                change: None,
            }),
            MeltBehavior::ReturnPending => {
                let ys: Vec<PublicKey> = request
                    .inputs
                    .iter()
                    .map(|proof| proof.y().expect("y"))
                    .collect();
                inner.pending.extend(ys);
                if let Some(quote) = inner.quotes.get_mut(&request.quote) {
                    quote.state = MeltQuoteState::Pending;
                }
                Ok(MeltResponse {
                    state: MeltQuoteState::Pending,
                    payment_preimage: None,
                    change: None,
                })
            }
            MeltBehavior::Normal | MeltBehavior::FailAfterProcessing => {
                self.consume_inputs(&mut inner, &request.inputs)?;
                let change = request
                    .outputs
                    .as_ref()
                    .map(|blanks| self.sign_change(&mut inner, blanks));
                if let Some(quote) = inner.quotes.get_mut(&request.quote) {
                    quote.state = MeltQuoteState::Paid;
                }
                if let Some(lightning) = &self.lightning {
                    lightning.mark_paid_by_request(&quote_request);
                }
                if behavior == MeltBehavior::FailAfterProcessing {
                    inner.melt_behavior = MeltBehavior::Normal;
                    return Err(Error::Timeout);
                }
                Ok(MeltResponse {
                    state: MeltQuoteState::Paid,
                    payment_preimage: Some("preimage".to_string()),
                    change,
                })
            }
        }
    }

    async fn post_check_state(
        &self,
        _mint_url: &MintUrl,
        request: CheckStateRequest,
    ) -> Result<CheckStateResponse, Error> {
        let inner = self.inner.lock().expect("lock");
        let states = request
            .ys
            .into_iter()
            .map(|y| {
                let state = if inner.spent.contains(&y) {
                    State::Spent
                } else if inner.pending.contains(&y) {
                    State::Pending
                } else {
                    State::Unspent
                };
                ProofState {
                    y,
                    state,
                    witness: None,
                }
            })
            .collect();
        Ok(CheckStateResponse { states })
    }

    async fn post_restore(
        &self,
        _mint_url: &MintUrl,
        request: RestoreRequest,
    ) -> Result<RestoreResponse, Error> {
        let inner = self.inner.lock().expect("lock");
        let mut outputs = Vec::new();
        let mut signatures = Vec::new();
        for output in request.outputs {
            if let Some(signature) = inner.issued.get(&output.b) {
                outputs.push(output);
                signatures.push(signature.clone());
            }
        }
        Ok(RestoreResponse {
            outputs,
            signatures,
        })
    }
}

#[derive(Debug, Default)]
struct LnInner {
    counter: u32,
    invoices: HashMap<String, (InvoiceStatus, String)>,
}

/// Lightning double whose invoices are signed bolt11 strings
#[derive(Debug, Default)]
pub struct FakeLightning {
    inner: Mutex<LnInner>,
}

impl FakeLightning {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, invoice_id: &str, status: InvoiceStatus) {
        let mut inner = self.inner.lock().expect("lock");
        if let Some(entry) = inner.invoices.get_mut(invoice_id) {
            entry.0 = status;
        }
    }

    pub fn mark_paid_by_request(&self, request: &str) {
        let mut inner = self.inner.lock().expect("lock");
        for entry in inner.invoices.values_mut() {
            if entry.1 == request {
                entry.0 = InvoiceStatus::Paid;
            }
        }
    }
}

#[async_trait]
impl LightningClient for FakeLightning {
    async fn create_invoice(
        &self,
        amount: Amount,
        memo: &str,
        _expiry_secs: u64,
    ) -> Result<InvoiceHandle, Error> {
        let request = fake_bolt11(amount.to_u64() * 1000, memo.to_string()).to_string();

        let mut inner = self.inner.lock().expect("lock");
        inner.counter += 1;
        let id = format!("inv-{}", inner.counter);
        inner
            .invoices
            .insert(id.clone(), (InvoiceStatus::Unpaid, request.clone()));

        Ok(InvoiceHandle { id, request })
    }

    async fn invoice_status(&self, invoice_id: &str) -> Result<InvoiceStatus, Error> {
        let inner = self.inner.lock().expect("lock");
        inner
            .invoices
            .get(invoice_id)
            .map(|entry| entry.0)
            .ok_or_else(|| Error::Lightning(format!("unknown invoice {invoice_id}")))
    }
}

/// Fixed-rate source: one token unit is worth the configured number of sats
#[derive(Debug)]
pub struct FixedRate(pub f64);

#[async_trait]
impl RateSource for FixedRate {
    async fn unit_value(&self, _mint_url: &MintUrl, _unit: &CurrencyUnit) -> Result<f64, Error> {
        Ok(self.0)
    }
}

/// A signed bolt11 invoice nothing will ever pay
pub fn fake_bolt11(amount_msat: u64, description: String) -> Bolt11Invoice {
    let private_key = bitcoin::secp256k1::SecretKey::from_slice(
        &[
            0xe1, 0x26, 0xf6, 0x8f, 0x7e, 0xaf, 0xcc, 0x8b, 0x74, 0xf5, 0x4d, 0x26, 0x9f, 0xe2,
            0x06, 0xbe, 0x71, 0x50, 0x00, 0xf9, 0x4d, 0xac, 0x06, 0x7d, 0x1c, 0x04, 0xa8, 0xca,
            0x3b, 0x2d, 0xb7, 0x34,
        ][..],
    )
    .expect("32 bytes");

    let mut rng = OsRng;
    let mut random_bytes = [0u8; 32];
    rng.fill(&mut random_bytes);

    let payment_hash = sha256::Hash::from_slice(&random_bytes).expect("32 bytes");
    let payment_secret = PaymentSecret([42u8; 32]);

    InvoiceBuilder::new(Currency::Bitcoin)
        .description(description)
        .payment_hash(payment_hash)
        .payment_secret(payment_secret)
        .amount_milli_satoshis(amount_msat)
        .current_timestamp()
        .min_final_cltv_expiry_delta(144)
        .build_signed(|hash| Secp256k1::new().sign_ecdsa_recoverable(hash, &private_key))
        .expect("valid invoice")
}
