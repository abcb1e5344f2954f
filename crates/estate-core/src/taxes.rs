//! Transfer taxes assessed on sale transactions and collected from the buyer.

use chrono::Months;
use estate_store::decode_json;
use estate_types::{
    Amount, CompositeKey, DocType, IdentityHasher, Organization, TaxStatus, Timestamp,
    TransactionStatus,
};
use serde::{Deserialize, Serialize};

use crate::context::InvocationContext;
use crate::error::{ContractError, ContractResult};
use crate::provenance;
use crate::transactions::TransactionService;
use crate::users::{self, require_non_empty, AccountRef};

/// Months between assessment and the due date.
const DUE_MONTHS: u32 = 1;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tax {
    #[serde(rename = "taxUUID")]
    pub tax_uuid: String,
    #[serde(rename = "transactionUUID")]
    pub transaction_uuid: String,
    pub tax_type: String,
    pub amount: Amount,
    #[serde(rename = "payerCitizenIDHash")]
    pub payer_citizen_id_hash: String,
    pub payer_organization: Organization,
    /// Government account credited on payment.
    #[serde(rename = "collectorCitizenIDHash")]
    pub collector_citizen_id_hash: String,
    pub status: TaxStatus,
    pub create_time: Timestamp,
    pub due_time: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_time: Option<Timestamp>,
}

impl Tax {
    pub fn payer(&self) -> AccountRef {
        AccountRef::new(&self.payer_citizen_id_hash, self.payer_organization)
    }

    pub fn collector(&self) -> AccountRef {
        AccountRef::new(&self.collector_citizen_id_hash, Organization::Government)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateTax {
    pub tax_uuid: String,
    pub transaction_uuid: String,
    pub tax_type: String,
    /// Defaults to the bootstrap government account.
    pub collector_citizen_id_hash: Option<String>,
}

/// Tax service; reads amounts and parties from the transaction engine.
#[derive(Clone, Debug, Default)]
pub struct TaxOffice<T> {
    transactions: T,
}

impl<T: TransactionService> TaxOffice<T> {
    pub fn new(transactions: T) -> Self {
        Self { transactions }
    }

    /// Assess the tax recorded in a transaction's private terms.
    pub fn create(&self, ctx: &mut InvocationContext<'_>, request: CreateTax) -> ContractResult<Tax> {
        let uuid = request.tax_uuid.as_str();
        require_non_empty("taxUUID", uuid)?;
        require_non_empty("taxType", &request.tax_type)?;
        let key = CompositeKey::tax(uuid)?;
        if ctx.txn.get_shared(&key)?.is_some() {
            return Err(ContractError::conflict("CreateTax", uuid, "tax already exists"));
        }

        let transaction_uuid = request.transaction_uuid.as_str();
        let record = self.transactions.load(ctx, transaction_uuid)?;
        if record.status == TransactionStatus::Rejected {
            return Err(ContractError::conflict(
                "CreateTax",
                transaction_uuid,
                "transaction was rejected",
            ));
        }
        let terms = self.transactions.terms(ctx, transaction_uuid)?;
        if terms.tax.is_zero() {
            return Err(ContractError::consistency(
                "CreateTax",
                transaction_uuid,
                "transaction carries no tax",
            ));
        }
        if let Some(existing) = assessed(ctx, transaction_uuid, &request.tax_type)? {
            return Err(ContractError::conflict(
                "CreateTax",
                transaction_uuid,
                format!("{} tax already assessed as {existing}", request.tax_type),
            ));
        }

        let collector = match request.collector_citizen_id_hash {
            Some(hash) => hash,
            None => IdentityHasher::CITIZEN.hash_hex(&ctx.config().bootstrap.citizen_id),
        };
        let collector = AccountRef::new(collector, Organization::Government);
        users::load_user(ctx, &collector)?;

        let now = ctx.now();
        let due_time = now
            .checked_add_months(Months::new(DUE_MONTHS))
            .ok_or_else(|| ContractError::validation("due date is out of range"))?;
        let buyer = record.buyer();
        let tax = Tax {
            tax_uuid: request.tax_uuid.clone(),
            transaction_uuid: record.transaction_uuid,
            tax_type: request.tax_type,
            amount: terms.tax,
            payer_citizen_id_hash: buyer.citizen_id_hash,
            payer_organization: buyer.organization,
            collector_citizen_id_hash: collector.citizen_id_hash,
            status: TaxStatus::Unpaid,
            create_time: now,
            due_time,
            paid_time: None,
            receipt_id: None,
            verified_time: None,
        };
        ctx.txn.put_shared_json(&key, &tax)?;
        provenance::record(ctx, DocType::Tax, uuid, "createTax", Vec::new())?;
        tracing::info!(
            tax = uuid,
            transaction = %tax.transaction_uuid,
            amount = %tax.amount,
            "tax assessed"
        );
        Ok(tax)
    }

    /// Move the assessed amount from the buyer to the collector.
    pub fn pay(&self, ctx: &mut InvocationContext<'_>, uuid: &str) -> ContractResult<Tax> {
        let mut tax = self.query(ctx, uuid)?;
        if tax.status != TaxStatus::Unpaid {
            return Err(ContractError::conflict(
                "PayTax",
                uuid,
                format!("tax is already {}", tax.status),
            ));
        }
        let receipt_id = format!("{uuid}-receipt");
        users::transfer(ctx, &receipt_id, &tax.payer(), &tax.collector(), tax.amount)?;
        tax.status = TaxStatus::Paid;
        tax.paid_time = Some(ctx.now());
        tax.receipt_id = Some(receipt_id);
        self.save(ctx, &tax, "payTax")?;
        tracing::info!(tax = uuid, amount = %tax.amount, "tax paid");
        Ok(tax)
    }

    pub fn verify(&self, ctx: &mut InvocationContext<'_>, uuid: &str) -> ContractResult<Tax> {
        let mut tax = self.query(ctx, uuid)?;
        match tax.status {
            TaxStatus::Paid => {}
            TaxStatus::Unpaid => {
                return Err(ContractError::consistency(
                    "VerifyTaxPayment",
                    uuid,
                    "tax has not been paid",
                ))
            }
            TaxStatus::Verified => {
                return Err(ContractError::conflict(
                    "VerifyTaxPayment",
                    uuid,
                    "tax payment is already verified",
                ))
            }
        }
        tax.status = TaxStatus::Verified;
        tax.verified_time = Some(ctx.now());
        self.save(ctx, &tax, "verifyTaxPayment")?;
        tracing::info!(tax = uuid, "tax payment verified");
        Ok(tax)
    }

    pub fn query(&self, ctx: &mut InvocationContext<'_>, uuid: &str) -> ContractResult<Tax> {
        let key = CompositeKey::tax(uuid)?;
        ctx.txn
            .get_shared_json(&key)?
            .ok_or_else(|| ContractError::not_found("tax", uuid))
    }

    fn save(&self, ctx: &mut InvocationContext<'_>, tax: &Tax, action: &str) -> ContractResult<()> {
        let key = CompositeKey::tax(&tax.tax_uuid)?;
        ctx.txn.put_shared_json(&key, tax)?;
        provenance::record(ctx, DocType::Tax, &tax.tax_uuid, action, vec!["status".into()])
    }
}

/// Id of an earlier tax of `tax_type` on the same transaction.
fn assessed(
    ctx: &mut InvocationContext<'_>,
    transaction_uuid: &str,
    tax_type: &str,
) -> ContractResult<Option<String>> {
    for (_, bytes) in ctx.scan_all_shared(&CompositeKey::namespace(DocType::Tax))? {
        let tax: Tax = decode_json(&bytes)?;
        if tax.transaction_uuid == transaction_uuid && tax.tax_type == tax_type {
            return Ok(Some(tax.tax_uuid));
        }
    }
    Ok(None)
}
