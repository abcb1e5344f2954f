//! Shared fixtures for the contract tests.

use std::sync::Arc;

use estate_gate::CallerIdentity;
use estate_store::{InMemoryLedgerStore, LedgerStore};
use estate_types::{ManualClock, Organization};
use serde_json::Value;

use crate::config::LedgerConfig;
use crate::error::ContractResult;
use crate::ledger::EstateLedger;
use crate::request::{Invocation, Request};

pub(crate) const INV: Organization = Organization::Investor;
pub(crate) const GOV: Organization = Organization::Government;
pub(crate) const BNK: Organization = Organization::Bank;
pub(crate) const AUD: Organization = Organization::Audit;
pub(crate) const TPY: Organization = Organization::ThirdParty;
pub(crate) const SYS: Organization = Organization::Sysadmin;

pub(crate) struct Harness {
    pub ledger: EstateLedger<InMemoryLedgerStore>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::default());
        let ledger = EstateLedger::with_clock(
            InMemoryLedgerStore::new(),
            LedgerConfig::default(),
            clock.clone(),
        )
        .unwrap();
        Self { ledger, clock }
    }

    /// Seller H1 (balance 0), buyer H2 (balance 1000), both investors, and
    /// realty C1 owned by H1.
    pub fn seeded() -> Self {
        let h = Self::new();
        h.register("H1", INV, 0);
        h.register("H2", INV, 1000);
        h.create_realty("C1", "H1");
        h
    }

    /// Invoke and commit. The clock moves one millisecond per call so
    /// records written by successive calls order by time.
    pub fn call(&self, org: Organization, function: &str, args: &[&str]) -> ContractResult<Value> {
        self.clock.advance(chrono::Duration::milliseconds(1));
        let caller = CallerIdentity::new(org.as_str(), Some("tester".into()));
        self.ledger
            .invoke_named(&caller, &Invocation::new(function, args.iter().copied()))
            .map(|outcome| outcome.result)
    }

    pub fn endorse(
        &self,
        org: Organization,
        function: &str,
        args: &[&str],
    ) -> ContractResult<crate::ledger::Endorsement> {
        let request = Request::parse(&Invocation::new(function, args.iter().copied()))?;
        self.ledger.endorse(&CallerIdentity::of(org), request)
    }

    pub fn height(&self) -> u64 {
        self.ledger.store().height().unwrap()
    }

    pub fn tick(&self) {
        self.clock.advance(chrono::Duration::seconds(1));
    }

    pub fn register(&self, hash: &str, org: Organization, balance: u64) -> Value {
        let balance = balance.to_string();
        self.call(
            org,
            "Register",
            &[hash, "ID", hash, "555", "a@b.c", "pw", org.as_str(), "", "", &balance],
        )
        .unwrap()
    }

    pub fn create_realty(&self, cert: &str, owner: &str) -> Value {
        self.call(
            GOV,
            "CreateRealty",
            &[cert, "CERT", "HOUSE", "NORMAL", owner, "InvestorMSP", "[]"],
        )
        .unwrap()
    }

    /// Sale of C1 from H1 to H2.
    pub fn create_sale(&self, uuid: &str, price: u64) -> ContractResult<Value> {
        self.create_sale_with_tax(uuid, price, 0)
    }

    pub fn create_sale_with_tax(&self, uuid: &str, price: u64, tax: u64) -> ContractResult<Value> {
        let (price, tax) = (price.to_string(), tax.to_string());
        self.call(
            INV,
            "CreateTransaction",
            &["C1", uuid, "H1", "InvestorMSP", "H2", "InvestorMSP", "", "[]", &tax, &price],
        )
    }

    /// Buyer H2 pays seller H1 towards `uuid`.
    pub fn pay(&self, uuid: &str, payment: &str, amount: u64) -> ContractResult<Value> {
        let amount = amount.to_string();
        self.call(
            INV,
            "PayForTransaction",
            &[uuid, payment, "TRANSFER", &amount, "H2", "InvestorMSP", "H1", "InvestorMSP"],
        )
    }

    pub fn balance(&self, hash: &str) -> u64 {
        self.call(BNK, "GetBalance", &[hash, "InvestorMSP"]).unwrap()["balance"]
            .as_u64()
            .unwrap()
    }

    pub fn realty(&self, cert: &str) -> Value {
        self.call(GOV, "QueryRealty", &[cert]).unwrap()
    }

    pub fn transaction(&self, uuid: &str) -> Value {
        self.call(GOV, "QueryTransaction", &[uuid]).unwrap()
    }

    /// Provenance actions for one entity, oldest first.
    pub fn actions(&self, doc_type: &str, entity: &str) -> Vec<String> {
        self.call(AUD, "QueryProvenance", &[doc_type, entity])
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["action"].as_str().unwrap().to_string())
            .collect()
    }
}
