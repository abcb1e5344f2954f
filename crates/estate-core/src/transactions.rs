//! Sale transactions and their forward-only lifecycle.

use std::collections::BTreeSet;

use estate_store::{decode_json, Page};
use estate_types::{Amount, Collection, CompositeKey, DocType, Organization, Timestamp, TransactionStatus};
use serde::{Deserialize, Serialize};

use crate::context::InvocationContext;
use crate::error::{ContractError, ContractResult};
use crate::payments;
use crate::provenance;
use crate::realty::RealtyService;
use crate::users::{self, require_non_empty, AccountRef};

/// Public half of a sale transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    #[serde(rename = "transactionUUID")]
    pub transaction_uuid: String,
    pub realty_cert_hash: String,
    #[serde(rename = "sellerCitizenIDHash")]
    pub seller_citizen_id_hash: String,
    pub seller_organization: Organization,
    #[serde(rename = "buyerCitizenIDHash")]
    pub buyer_citizen_id_hash: String,
    pub buyer_organization: Organization,
    pub status: TransactionStatus,
    pub create_time: Timestamp,
    pub update_time: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_time: Option<Timestamp>,
}

impl TransactionRecord {
    pub fn seller(&self) -> AccountRef {
        AccountRef::new(&self.seller_citizen_id_hash, self.seller_organization)
    }

    pub fn buyer(&self) -> AccountRef {
        AccountRef::new(&self.buyer_citizen_id_hash, self.buyer_organization)
    }
}

/// Private terms, in `TransactionPrivateCollection`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionTerms {
    pub price: Amount,
    pub tax: Amount,
    #[serde(rename = "paymentUUIDList")]
    pub payment_uuid_list: Vec<String>,
    #[serde(rename = "contractUUID")]
    pub contract_uuid: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionView {
    #[serde(flatten)]
    pub record: TransactionRecord,
    #[serde(flatten)]
    pub terms: Option<TransactionTerms>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateTransaction {
    pub realty_cert_hash: String,
    pub transaction_uuid: String,
    pub seller: AccountRef,
    pub buyer: AccountRef,
    pub contract_uuid: String,
    pub payment_uuids: Vec<String>,
    pub tax: Amount,
    pub price: Amount,
}

/// What the payment ledger and the audit trail may do to a transaction.
pub trait TransactionService: Send + Sync {
    fn load(&self, ctx: &mut InvocationContext<'_>, uuid: &str) -> ContractResult<TransactionRecord>;

    fn terms(&self, ctx: &mut InvocationContext<'_>, uuid: &str)
        -> ContractResult<TransactionTerms>;

    /// Attach a payment id to the transaction's payment list.
    fn link_payment(
        &self,
        ctx: &mut InvocationContext<'_>,
        uuid: &str,
        payment_uuid: &str,
    ) -> ContractResult<TransactionTerms>;

    /// Complete a fully paid transaction from any open state.
    fn settle(&self, ctx: &mut InvocationContext<'_>, uuid: &str)
        -> ContractResult<TransactionRecord>;

    /// Move to `next` if the lifecycle allows it; a no-op when already there.
    /// Returns the status before the call.
    fn advance(
        &self,
        ctx: &mut InvocationContext<'_>,
        uuid: &str,
        next: TransactionStatus,
        action: &str,
    ) -> ContractResult<TransactionStatus>;
}

/// Transaction service, cascading into the realty registry.
#[derive(Clone, Debug, Default)]
pub struct TransactionEngine<R> {
    realty: R,
}

impl<R: RealtyService> TransactionEngine<R> {
    pub fn new(realty: R) -> Self {
        Self { realty }
    }

    pub fn create(
        &self,
        ctx: &mut InvocationContext<'_>,
        request: CreateTransaction,
    ) -> ContractResult<TransactionView> {
        let uuid = request.transaction_uuid.as_str();
        require_non_empty("transactionUUID", uuid)?;
        require_non_empty("realtyCertHash", &request.realty_cert_hash)?;
        if request.price.is_zero() {
            return Err(ContractError::validation("price must be positive"));
        }
        if request.seller.citizen_id_hash == request.buyer.citizen_id_hash {
            return Err(ContractError::validation("buyer and seller must differ"));
        }
        let unique: BTreeSet<&String> = request.payment_uuids.iter().collect();
        if unique.len() != request.payment_uuids.len() {
            return Err(ContractError::validation("paymentUUIDList contains duplicates"));
        }

        let key = CompositeKey::transaction(uuid)?;
        if ctx.txn.get_shared(&key)?.is_some() {
            return Err(ContractError::conflict(
                "CreateTransaction",
                uuid,
                "transaction already exists",
            ));
        }
        users::load_user(ctx, &request.seller)?;
        users::load_user(ctx, &request.buyer)?;

        let cert = request.realty_cert_hash.as_str();
        self.realty.load(ctx, cert)?;
        let owner = self.realty.ownership(ctx, cert)?.owner();
        if owner != request.seller {
            return Err(ContractError::consistency(
                "CreateTransaction",
                uuid,
                format!("seller {} is not the recorded owner of {cert}", request.seller),
            ));
        }

        let mut prepaid = Vec::with_capacity(request.payment_uuids.len());
        for payment_uuid in &request.payment_uuids {
            let payment = payments::load(ctx, payment_uuid)?;
            if payment.payer() != request.buyer || payment.receiver() != request.seller {
                return Err(ContractError::consistency(
                    "CreateTransaction",
                    uuid,
                    format!("payment {payment_uuid} is not from buyer to seller"),
                ));
            }
            if payment.transaction_uuid.is_some() {
                return Err(ContractError::conflict(
                    "CreateTransaction",
                    payment_uuid,
                    "payment is already linked to a transaction",
                ));
            }
            prepaid.push(payment);
        }
        let prepaid_total = Amount::checked_sum(prepaid.iter().map(|p| p.amount))
            .ok_or_else(|| ContractError::validation("payment total overflows"))?;
        if prepaid_total >= request.price {
            return Err(ContractError::consistency(
                "CreateTransaction",
                uuid,
                "linked payments already cover the price",
            ));
        }

        self.realty.reserve(ctx, cert, uuid)?;

        let now = ctx.now();
        let record = TransactionRecord {
            transaction_uuid: request.transaction_uuid.clone(),
            realty_cert_hash: request.realty_cert_hash,
            seller_citizen_id_hash: request.seller.citizen_id_hash,
            seller_organization: request.seller.organization,
            buyer_citizen_id_hash: request.buyer.citizen_id_hash,
            buyer_organization: request.buyer.organization,
            status: TransactionStatus::Pending,
            create_time: now,
            update_time: now,
            completed_time: None,
        };
        let terms = TransactionTerms {
            price: request.price,
            tax: request.tax,
            payment_uuid_list: request.payment_uuids,
            contract_uuid: request.contract_uuid,
        };
        ctx.txn.put_shared_json(&key, &record)?;
        ctx.txn
            .put_private_json(Collection::TransactionPrivate, &key, &terms)?;
        for mut payment in prepaid {
            payment.transaction_uuid = Some(record.transaction_uuid.clone());
            payments::store(ctx, &payment)?;
        }
        provenance::record(
            ctx,
            DocType::Transaction,
            &record.transaction_uuid,
            "createTransaction",
            Vec::new(),
        )?;
        tracing::info!(
            transaction = %record.transaction_uuid,
            realty = %record.realty_cert_hash,
            price = %terms.price,
            "transaction created"
        );
        Ok(view(ctx, record, Some(terms)))
    }

    /// First review of a PENDING transaction.
    pub fn check(
        &self,
        ctx: &mut InvocationContext<'_>,
        uuid: &str,
        next: TransactionStatus,
    ) -> ContractResult<TransactionView> {
        if !matches!(
            next,
            TransactionStatus::InProgress | TransactionStatus::Approved | TransactionStatus::Rejected
        ) {
            return Err(ContractError::validation(format!(
                "a check cannot set status {next}"
            )));
        }
        let record = self.load(ctx, uuid)?;
        if record.status != TransactionStatus::Pending {
            return Err(ContractError::conflict(
                "CheckTransaction",
                uuid,
                format!("transaction is {}, only PENDING can be checked", record.status),
            ));
        }
        let record = self.apply(ctx, record, next, "checkTransaction")?;
        self.with_terms(ctx, record)
    }

    pub fn update(
        &self,
        ctx: &mut InvocationContext<'_>,
        uuid: &str,
        next: TransactionStatus,
    ) -> ContractResult<TransactionView> {
        if next == TransactionStatus::Completed {
            return Err(ContractError::validation(
                "COMPLETED is reached through CompleteTransaction or payment",
            ));
        }
        let record = self.load(ctx, uuid)?;
        ensure_transition(&record, next)?;
        let record = self.apply(ctx, record, next, "updateTransaction")?;
        self.with_terms(ctx, record)
    }

    pub fn complete(
        &self,
        ctx: &mut InvocationContext<'_>,
        uuid: &str,
    ) -> ContractResult<TransactionView> {
        let record = self.load(ctx, uuid)?;
        if record.status.is_terminal() {
            return Err(ContractError::conflict(
                "CompleteTransaction",
                uuid,
                format!("transaction is already {}", record.status),
            ));
        }
        if !record.status.is_approved() {
            return Err(ContractError::consistency(
                "CompleteTransaction",
                uuid,
                "transaction must be IN_PROGRESS or APPROVED",
            ));
        }
        let record = self.apply(ctx, record, TransactionStatus::Completed, "completeTransaction")?;
        self.with_terms(ctx, record)
    }

    pub fn query(
        &self,
        ctx: &mut InvocationContext<'_>,
        uuid: &str,
    ) -> ContractResult<TransactionView> {
        let record = self.load(ctx, uuid)?;
        self.with_terms(ctx, record)
    }

    pub fn list(
        &self,
        ctx: &mut InvocationContext<'_>,
        page_size: usize,
        bookmark: &str,
    ) -> ContractResult<Page<TransactionView>> {
        let request = ctx.page_request(page_size, bookmark)?;
        let page = ctx
            .txn
            .scan_shared(&CompositeKey::namespace(DocType::Transaction), &request)?
            .try_map(|(_, bytes)| decode_json::<TransactionRecord>(&bytes))?;
        page.try_map(|record| self.with_terms(ctx, record))
    }

    fn with_terms(
        &self,
        ctx: &mut InvocationContext<'_>,
        record: TransactionRecord,
    ) -> ContractResult<TransactionView> {
        let terms = if ctx.txn.can_access(Collection::TransactionPrivate) {
            Some(self.terms(ctx, &record.transaction_uuid)?)
        } else {
            None
        };
        Ok(view(ctx, record, terms))
    }

    /// Write a status change and its realty cascade.
    fn apply(
        &self,
        ctx: &mut InvocationContext<'_>,
        mut record: TransactionRecord,
        next: TransactionStatus,
        action: &str,
    ) -> ContractResult<TransactionRecord> {
        let previous = record.status;
        let now = ctx.now();
        let mut fields = vec!["status".to_string()];
        match next {
            TransactionStatus::Rejected => {
                self.realty
                    .release(ctx, &record.realty_cert_hash, &record.transaction_uuid)?;
            }
            TransactionStatus::Completed => {
                self.realty.transfer_ownership(
                    ctx,
                    &record.realty_cert_hash,
                    &record.buyer(),
                    &record.transaction_uuid,
                )?;
                record.completed_time = Some(now);
                fields.push("completedTime".into());
            }
            _ => {}
        }
        record.status = next;
        record.update_time = now;
        let key = CompositeKey::transaction(&record.transaction_uuid)?;
        ctx.txn.put_shared_json(&key, &record)?;
        provenance::record(ctx, DocType::Transaction, &record.transaction_uuid, action, fields)?;
        tracing::info!(
            transaction = %record.transaction_uuid,
            from = %previous,
            to = %next,
            action,
            "transaction status changed"
        );
        Ok(record)
    }
}

impl<R: RealtyService> TransactionService for TransactionEngine<R> {
    fn load(&self, ctx: &mut InvocationContext<'_>, uuid: &str) -> ContractResult<TransactionRecord> {
        let key = CompositeKey::transaction(uuid)?;
        ctx.txn
            .get_shared_json(&key)?
            .ok_or_else(|| ContractError::not_found("transaction", uuid))
    }

    fn terms(
        &self,
        ctx: &mut InvocationContext<'_>,
        uuid: &str,
    ) -> ContractResult<TransactionTerms> {
        let key = CompositeKey::transaction(uuid)?;
        ctx.txn
            .get_private_json(Collection::TransactionPrivate, &key)?
            .ok_or_else(|| ContractError::not_found("transaction terms", uuid))
    }

    fn link_payment(
        &self,
        ctx: &mut InvocationContext<'_>,
        uuid: &str,
        payment_uuid: &str,
    ) -> ContractResult<TransactionTerms> {
        let mut record = self.load(ctx, uuid)?;
        let mut terms = self.terms(ctx, uuid)?;
        if terms.payment_uuid_list.iter().any(|p| p == payment_uuid) {
            return Err(ContractError::conflict(
                ctx.operation().as_str(),
                payment_uuid,
                format!("payment already linked to {uuid}"),
            ));
        }
        terms.payment_uuid_list.push(payment_uuid.to_string());
        record.update_time = ctx.now();
        let key = CompositeKey::transaction(uuid)?;
        ctx.txn.put_shared_json(&key, &record)?;
        ctx.txn
            .put_private_json(Collection::TransactionPrivate, &key, &terms)?;
        Ok(terms)
    }

    fn settle(
        &self,
        ctx: &mut InvocationContext<'_>,
        uuid: &str,
    ) -> ContractResult<TransactionRecord> {
        let record = self.load(ctx, uuid)?;
        if record.status.is_terminal() {
            return Err(ContractError::conflict(
                ctx.operation().as_str(),
                uuid,
                format!("transaction is already {}", record.status),
            ));
        }
        self.apply(ctx, record, TransactionStatus::Completed, "settleTransaction")
    }

    fn advance(
        &self,
        ctx: &mut InvocationContext<'_>,
        uuid: &str,
        next: TransactionStatus,
        action: &str,
    ) -> ContractResult<TransactionStatus> {
        let record = self.load(ctx, uuid)?;
        let previous = record.status;
        if previous == next {
            return Ok(previous);
        }
        if next == TransactionStatus::Completed && !previous.is_approved() {
            return Err(ContractError::consistency(
                ctx.operation().as_str(),
                uuid,
                "transaction must be IN_PROGRESS or APPROVED to complete",
            ));
        }
        ensure_transition(&record, next)?;
        self.apply(ctx, record, next, action)?;
        Ok(previous)
    }
}

fn ensure_transition(record: &TransactionRecord, next: TransactionStatus) -> ContractResult<()> {
    if record.status.can_transition_to(next) {
        return Ok(());
    }
    Err(ContractError::conflict(
        "status change",
        &record.transaction_uuid,
        format!("cannot move from {} to {next}", record.status),
    ))
}

fn view(
    ctx: &InvocationContext<'_>,
    record: TransactionRecord,
    terms: Option<TransactionTerms>,
) -> TransactionView {
    let terms = terms.filter(|_| ctx.txn.can_access(Collection::TransactionPrivate));
    TransactionView { record, terms }
}
