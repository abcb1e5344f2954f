use std::sync::Arc;

use estate_gate::{AccessRequest, AuthorizationGate, CallerIdentity, Operation};
use estate_store::{CommitReceipt, LedgerStore, StoreError, StoreTransaction, WriteSet};
use estate_types::{Clock, SystemClock, TxId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::audit::AuditTrail;
use crate::config::LedgerConfig;
use crate::context::InvocationContext;
use crate::contracts::ContractRegistry;
use crate::error::{ContractError, ContractResult};
use crate::mortgages::MortgageBook;
use crate::payments::PaymentLedger;
use crate::realty::RealtyRegistry;
use crate::request::{Invocation, Request};
use crate::taxes::TaxOffice;
use crate::transactions::TransactionEngine;
use crate::users::UserRegistry;

type Engine = TransactionEngine<RealtyRegistry>;

/// The wired-up service graph.
#[derive(Clone, Debug)]
struct Services {
    users: UserRegistry,
    realty: RealtyRegistry,
    transactions: Engine,
    payments: PaymentLedger<Engine>,
    contracts: ContractRegistry,
    mortgages: MortgageBook<RealtyRegistry>,
    taxes: TaxOffice<Engine>,
    audit: AuditTrail<RealtyRegistry, Engine>,
}

impl Services {
    fn new() -> Self {
        let realty = RealtyRegistry;
        let transactions = TransactionEngine::new(realty);
        Self {
            users: UserRegistry,
            realty,
            payments: PaymentLedger::new(transactions.clone()),
            audit: AuditTrail::new(realty, transactions.clone()),
            mortgages: MortgageBook::new(realty),
            taxes: TaxOffice::new(transactions.clone()),
            transactions,
            contracts: ContractRegistry,
        }
    }
}

/// An executed but not yet committed invocation.
#[derive(Clone, Debug)]
pub struct Endorsement {
    pub tx_id: TxId,
    pub operation: Operation,
    pub result: Value,
    pub write_set: WriteSet,
}

impl Endorsement {
    pub fn is_read_only(&self) -> bool {
        self.write_set.is_read_only()
    }
}

/// Result of a committed (or read-only) invocation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationOutcome {
    pub tx_id: TxId,
    pub operation: Operation,
    pub result: Value,
    /// Absent for invocations that wrote nothing.
    pub receipt: Option<CommitReceipt>,
}

/// Entry point of the contract layer.
///
/// `endorse` authorizes the caller and runs the operation against a
/// transaction view, producing a write set. `commit` validates that write set
/// against current state and applies it atomically.
pub struct EstateLedger<S> {
    store: S,
    gate: AuthorizationGate,
    config: LedgerConfig,
    clock: Arc<dyn Clock>,
    services: Services,
}

impl<S: LedgerStore> EstateLedger<S> {
    pub fn new(store: S, config: LedgerConfig) -> ContractResult<Self> {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: S,
        config: LedgerConfig,
        clock: Arc<dyn Clock>,
    ) -> ContractResult<Self> {
        let gate = AuthorizationGate::with_default_stages(config.gate.clone())?;
        Ok(Self {
            store,
            gate,
            config,
            clock,
            services: Services::new(),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn gate(&self) -> &AuthorizationGate {
        &self.gate
    }

    /// Authorize and execute `request` without committing.
    pub fn endorse(
        &self,
        caller: &CallerIdentity,
        request: Request,
    ) -> ContractResult<Endorsement> {
        let operation = request.operation();
        let decision = self
            .gate
            .evaluate(&AccessRequest::new(operation, caller.clone()))?;
        if !decision.is_accepted() {
            let reason = decision.reason().unwrap_or_default();
            tracing::warn!(operation = %operation, caller = %caller.msp_id, %reason, "invocation denied");
            return Err(ContractError::unauthorized(
                operation.as_str(),
                &caller.msp_id,
                reason,
            ));
        }
        let organization = caller.organization().map_err(|e| {
            ContractError::unauthorized(operation.as_str(), &caller.msp_id, e.to_string())
        })?;

        let tx_id = TxId::new();
        let txn = StoreTransaction::begin(&self.store, organization, tx_id.clone());
        let mut ctx = InvocationContext::new(
            txn,
            caller.clone(),
            operation,
            self.clock.now(),
            &self.config,
        );
        let result = self.execute(&mut ctx, request)?;
        let write_set = ctx.into_write_set();
        tracing::debug!(
            tx = %tx_id.short_id(),
            operation = %operation,
            reads = write_set.reads.len(),
            writes = write_set.writes.len(),
            "invocation endorsed"
        );
        Ok(Endorsement {
            tx_id,
            operation,
            result,
            write_set,
        })
    }

    /// Validate and apply an endorsement. Read-only endorsements are returned
    /// without touching the store.
    pub fn commit(&self, endorsement: Endorsement) -> ContractResult<InvocationOutcome> {
        let Endorsement {
            tx_id,
            operation,
            result,
            write_set,
        } = endorsement;
        if write_set.is_read_only() {
            return Ok(InvocationOutcome {
                tx_id,
                operation,
                result,
                receipt: None,
            });
        }
        let receipt = self.store.commit(&write_set).map_err(|e: StoreError| {
            if e.is_mvcc_conflict() {
                tracing::warn!(tx = %tx_id.short_id(), operation = %operation, error = %e, "commit rejected");
            }
            ContractError::from(e)
        })?;
        tracing::info!(
            tx = %tx_id.short_id(),
            operation = %operation,
            organization = %write_set.organization,
            seq = receipt.seq,
            writes = receipt.write_count,
            "invocation committed"
        );
        Ok(InvocationOutcome {
            tx_id,
            operation,
            result,
            receipt: Some(receipt),
        })
    }

    /// Endorse and commit in one step.
    pub fn invoke(
        &self,
        caller: &CallerIdentity,
        request: Request,
    ) -> ContractResult<InvocationOutcome> {
        let endorsement = self.endorse(caller, request)?;
        self.commit(endorsement)
    }

    /// Parse and invoke a flat named operation.
    pub fn invoke_named(
        &self,
        caller: &CallerIdentity,
        invocation: &Invocation,
    ) -> ContractResult<InvocationOutcome> {
        self.invoke(caller, Request::parse(invocation)?)
    }

    fn execute(&self, ctx: &mut InvocationContext<'_>, request: Request) -> ContractResult<Value> {
        let s = &self.services;
        match request {
            Request::Register(r) => json(s.users.register(ctx, r)?),
            Request::UpdateUser(r) => json(s.users.update(ctx, r)?),
            Request::GetUser(account) => json(s.users.get(ctx, &account)?),
            Request::ListUsersByOrganization(org) => json(s.users.list_by_organization(ctx, org)?),
            Request::GetBalance(account) => json(s.users.balance(ctx, &account)?),
            Request::InitLedger => json(s.users.init_ledger(ctx)?),

            Request::CreateRealty(r) => json(s.realty.create(ctx, r)?),
            Request::UpdateRealty(r) => json(s.realty.update(ctx, r)?),
            Request::QueryRealty(cert) => json(s.realty.query(ctx, &cert)?),
            Request::QueryRealtyList {
                page_size,
                bookmark,
            } => json(s.realty.list(ctx, page_size, &bookmark)?),
            Request::QueryRealtyByOwner(owner) => json(s.realty.by_owner(ctx, &owner)?),
            Request::FreezeRealty {
                realty_cert_hash,
                reason,
            } => json(s.realty.freeze(ctx, &realty_cert_hash, &reason)?),
            Request::UnfreezeRealty {
                realty_cert_hash,
                reason,
            } => json(s.realty.unfreeze(ctx, &realty_cert_hash, &reason)?),

            Request::CreateTransaction(r) => json(s.transactions.create(ctx, r)?),
            Request::CheckTransaction {
                transaction_uuid,
                status,
            } => json(s.transactions.check(ctx, &transaction_uuid, status)?),
            Request::UpdateTransaction {
                transaction_uuid,
                status,
            } => json(s.transactions.update(ctx, &transaction_uuid, status)?),
            Request::CompleteTransaction(uuid) => json(s.transactions.complete(ctx, &uuid)?),
            Request::QueryTransaction(uuid) => json(s.transactions.query(ctx, &uuid)?),
            Request::QueryTransactionList {
                page_size,
                bookmark,
            } => json(s.transactions.list(ctx, page_size, &bookmark)?),

            Request::CreatePayment(r) => json(s.payments.create(ctx, r)?),
            Request::PayForTransaction(r) => json(s.payments.pay_for_transaction(ctx, r)?),
            Request::QueryPayment(uuid) => json(s.payments.query(ctx, &uuid)?),
            Request::QueryPaymentsByTransaction(uuid) => {
                json(s.payments.by_transaction(ctx, &uuid)?)
            }

            Request::CreateContract(r) => json(s.contracts.create(ctx, r)?),
            Request::QueryContract(uuid) => json(s.contracts.query(ctx, &uuid)?),
            Request::UpdateContractStatus {
                contract_uuid,
                status,
            } => json(s.contracts.update_status(ctx, &contract_uuid, status)?),
            Request::UpdateContract(r) => json(s.contracts.update(ctx, r)?),

            Request::CreateMortgage(r) => json(s.mortgages.create(ctx, r)?),
            Request::ApproveMortgage(uuid) => json(s.mortgages.approve(ctx, &uuid)?),
            Request::CloseMortgage(uuid) => json(s.mortgages.close(ctx, &uuid)?),
            Request::QueryMortgage(uuid) => json(s.mortgages.query(ctx, &uuid)?),

            Request::CreateTax(r) => json(s.taxes.create(ctx, r)?),
            Request::PayTax(uuid) => json(s.taxes.pay(ctx, &uuid)?),
            Request::VerifyTaxPayment(uuid) => json(s.taxes.verify(ctx, &uuid)?),
            Request::QueryTax(uuid) => json(s.taxes.query(ctx, &uuid)?),

            Request::AuditTransaction(r) => json(s.audit.audit_transaction(ctx, r)?),
            Request::AddAuditLog(r) => json(s.audit.add_audit_log(ctx, r)?),
            Request::GetAuditLogs {
                target_id,
                target_type,
            }
            | Request::QueryAuditHistory {
                target_id,
                target_type,
            } => json(s.audit.logs(ctx, &target_id, target_type)?),
            Request::AnalyzeAuditRecords(target_type) => json(s.audit.analyze(ctx, target_type)?),
            Request::QueryProvenance {
                doc_type,
                entity_id,
            } => json(s.audit.provenance(ctx, doc_type, &entity_id)?),
        }
    }
}

impl<S> std::fmt::Debug for EstateLedger<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EstateLedger")
            .field("config", &self.config)
            .field("stages", &self.gate.stage_count())
            .finish_non_exhaustive()
    }
}

fn json<T: Serialize>(value: T) -> ContractResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| ContractError::Store(StoreError::Serialization(e.to_string())))
}

#[cfg(test)]
mod tests {
    use estate_gate::CallerIdentity;
    use estate_store::{verify_journal, LedgerStore};

    use crate::testkit::*;

    #[test]
    fn full_payment_completes_the_sale() {
        let h = Harness::seeded();
        h.create_sale("T1", 100).unwrap();
        let settled = h.pay("T1", "P1", 100).unwrap();
        assert_eq!(settled["transaction"]["status"], "COMPLETED");
        assert!(settled.get("refund").map_or(true, |r| r.is_null()));

        let realty = h.realty("C1");
        assert_eq!(realty["status"], "NORMAL");
        assert_eq!(realty["currentOwnerCitizenIDHash"], "H2");
        assert_eq!(realty["previousOwnersCitizenIDHashList"], serde_json::json!(["H1"]));
        assert_eq!(h.balance("H2"), 900);
        assert_eq!(h.balance("H1"), 100);
    }

    #[test]
    fn overpayment_is_refunded_to_the_buyer() {
        let h = Harness::seeded();
        h.create_sale("T1", 100).unwrap();
        let partial = h.pay("T1", "P1", 60).unwrap();
        assert_eq!(partial["transaction"]["status"], "PENDING");
        let settled = h.pay("T1", "P2", 50).unwrap();
        assert_eq!(settled["transaction"]["status"], "COMPLETED");
        assert_eq!(settled["refund"]["paymentUUID"], "P2-refund");
        assert_eq!(settled["refund"]["amount"], 10);
        assert_eq!(h.balance("H2"), 900);
        assert_eq!(h.balance("H1"), 100);
    }

    #[test]
    fn rejected_invocation_writes_nothing() {
        let h = Harness::seeded();
        h.register("H3", INV, 0);
        let height = h.height();
        let err = h
            .call(
                INV,
                "CreateTransaction",
                &["C1", "T1", "H3", "InvestorMSP", "H2", "InvestorMSP", "", "[]", "0", "100"],
            )
            .unwrap_err();
        assert_eq!(err.kind(), "ConsistencyError");
        assert_eq!(h.height(), height);
        let err = h.call(GOV, "QueryTransaction", &["T1"]).unwrap_err();
        assert_eq!(err.kind(), "NotFoundError");
    }

    #[test]
    fn only_government_and_investors_update_realty() {
        let h = Harness::seeded();
        for org in [BNK, TPY] {
            let err = h
                .call(org, "UpdateRealty", &["C1", "SHOP", "", "", "", ""])
                .unwrap_err();
            assert_eq!(err.kind(), "AuthorizationError");
        }
        assert_eq!(h.realty("C1")["realtyType"], "HOUSE");
    }

    #[test]
    fn unknown_msp_is_refused() {
        let h = Harness::seeded();
        let caller = CallerIdentity::new("ShadowMSP", None);
        let invocation = crate::request::Invocation::new("QueryRealty", ["C1"]);
        let err = h.ledger.invoke_named(&caller, &invocation).unwrap_err();
        assert_eq!(err.kind(), "AuthorizationError");
    }

    #[test]
    fn queries_are_not_committed() {
        let h = Harness::seeded();
        let height = h.height();
        let caller = CallerIdentity::of(GOV);
        let invocation = crate::request::Invocation::new("QueryRealty", ["C1"]);
        let outcome = h.ledger.invoke_named(&caller, &invocation).unwrap();
        assert!(outcome.receipt.is_none());
        assert_eq!(outcome.result["realtyCertHash"], "C1");
        assert_eq!(h.height(), height);
    }

    #[test]
    fn stale_endorsement_fails_validation() {
        let h = Harness::seeded();
        h.create_sale("T1", 100).unwrap();
        let first = h
            .endorse(INV, "PayForTransaction", &["T1", "P1", "TRANSFER", "100", "H2", "InvestorMSP", "H1", "InvestorMSP"])
            .unwrap();
        let second = h
            .endorse(INV, "PayForTransaction", &["T1", "P2", "TRANSFER", "100", "H2", "InvestorMSP", "H1", "InvestorMSP"])
            .unwrap();
        h.ledger.commit(first).unwrap();
        let err = h.ledger.commit(second).unwrap_err();
        assert_eq!(err.kind(), "MvccConflictError");
        assert_eq!(h.balance("H2"), 900);
    }

    #[test]
    fn journal_chains_every_commit() {
        let h = Harness::seeded();
        h.create_sale("T1", 100).unwrap();
        h.pay("T1", "P1", 100).unwrap();
        let journal = h.ledger.store().journal().unwrap();
        assert_eq!(journal.len() as u64, h.height());
        verify_journal(&journal).unwrap();
    }
}
