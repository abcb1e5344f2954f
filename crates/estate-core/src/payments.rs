//! Balance transfers and escrow settlement of sale transactions.

use estate_store::decode_json;
use estate_types::{Amount, CompositeKey, DocType, Organization, PaymentType, Timestamp};
use serde::{Deserialize, Serialize};

use crate::context::InvocationContext;
use crate::error::{ContractError, ContractResult};
use crate::transactions::{TransactionRecord, TransactionService};
use crate::users::{self, require_non_empty, AccountRef};

/// A completed transfer between two accounts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(rename = "paymentUUID")]
    pub payment_uuid: String,
    #[serde(
        rename = "transactionUUID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub transaction_uuid: Option<String>,
    pub amount: Amount,
    pub payment_type: PaymentType,
    #[serde(rename = "fromCitizenIDHash")]
    pub from_citizen_id_hash: String,
    pub from_organization: Organization,
    #[serde(rename = "toCitizenIDHash")]
    pub to_citizen_id_hash: String,
    pub to_organization: Organization,
    pub create_time: Timestamp,
    /// Set on refunds: the payment whose overshoot this returns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_of: Option<String>,
}

impl Payment {
    pub fn payer(&self) -> AccountRef {
        AccountRef::new(&self.from_citizen_id_hash, self.from_organization)
    }

    pub fn receiver(&self) -> AccountRef {
        AccountRef::new(&self.to_citizen_id_hash, self.to_organization)
    }

    pub fn is_refund(&self) -> bool {
        self.refund_of.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatePayment {
    pub payment_uuid: String,
    pub amount: Amount,
    pub from: AccountRef,
    pub to: AccountRef,
    pub payment_type: PaymentType,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayForTransaction {
    pub transaction_uuid: String,
    pub payment: CreatePayment,
}

/// Outcome of a payment made against a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub payment: Payment,
    pub transaction: TransactionRecord,
    /// Sum of linked non-refund payments, this one included.
    pub total_paid: Amount,
    pub price: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund: Option<Payment>,
}

/// Payment service; settles through the transaction engine.
#[derive(Clone, Debug, Default)]
pub struct PaymentLedger<T> {
    transactions: T,
}

impl<T: TransactionService> PaymentLedger<T> {
    pub fn new(transactions: T) -> Self {
        Self { transactions }
    }

    pub fn create(
        &self,
        ctx: &mut InvocationContext<'_>,
        request: CreatePayment,
    ) -> ContractResult<Payment> {
        self.record(ctx, request, None, None)
    }

    /// Pay towards a sale. Once the linked payments reach the price the
    /// transaction completes; any overshoot goes back to the payer as a
    /// separate refund payment. All of it lands in one commit.
    pub fn pay_for_transaction(
        &self,
        ctx: &mut InvocationContext<'_>,
        request: PayForTransaction,
    ) -> ContractResult<Settlement> {
        let uuid = request.transaction_uuid.as_str();
        let record = self.transactions.load(ctx, uuid)?;
        if record.status.is_terminal() {
            return Err(ContractError::conflict(
                "PayForTransaction",
                uuid,
                format!("transaction is already {}", record.status),
            ));
        }
        if request.payment.from != record.buyer() || request.payment.to != record.seller() {
            return Err(ContractError::consistency(
                "PayForTransaction",
                uuid,
                format!(
                    "payments must go from buyer {} to seller {}",
                    record.buyer(),
                    record.seller()
                ),
            ));
        }

        let payment = self.record(ctx, request.payment, Some(uuid), None)?;
        let terms = self
            .transactions
            .link_payment(ctx, uuid, &payment.payment_uuid)?;

        let mut amounts = Vec::with_capacity(terms.payment_uuid_list.len());
        for linked in &terms.payment_uuid_list {
            let linked = load(ctx, linked)?;
            if !linked.is_refund() {
                amounts.push(linked.amount);
            }
        }
        let total_paid = Amount::checked_sum(amounts)
            .ok_or_else(|| ContractError::validation("payment total overflows"))?;

        if total_paid < terms.price {
            tracing::info!(
                transaction = uuid,
                paid = %total_paid,
                price = %terms.price,
                "partial payment recorded"
            );
            return Ok(Settlement {
                payment,
                transaction: self.transactions.load(ctx, uuid)?,
                total_paid,
                price: terms.price,
                refund: None,
            });
        }

        let transaction = self.transactions.settle(ctx, uuid)?;
        let overshoot = total_paid.checked_sub(terms.price).unwrap_or(Amount::ZERO);
        let refund = if overshoot.is_zero() {
            None
        } else {
            let refund_id = fresh_refund_id(ctx, &payment.payment_uuid)?;
            let refund = self.record(
                ctx,
                CreatePayment {
                    payment_uuid: refund_id.clone(),
                    amount: overshoot,
                    from: payment.receiver(),
                    to: payment.payer(),
                    payment_type: payment.payment_type,
                },
                Some(uuid),
                Some(payment.payment_uuid.clone()),
            )?;
            self.transactions.link_payment(ctx, uuid, &refund_id)?;
            tracing::info!(transaction = uuid, refund = %refund_id, amount = %overshoot, "overpayment refunded");
            Some(refund)
        };
        tracing::info!(transaction = uuid, paid = %total_paid, "transaction settled by escrow");
        Ok(Settlement {
            payment,
            transaction,
            total_paid,
            price: terms.price,
            refund,
        })
    }

    pub fn query(&self, ctx: &mut InvocationContext<'_>, uuid: &str) -> ContractResult<Payment> {
        load(ctx, uuid)
    }

    /// Payments made against one transaction, refunds included.
    pub fn by_transaction(
        &self,
        ctx: &mut InvocationContext<'_>,
        transaction_uuid: &str,
    ) -> ContractResult<Vec<Payment>> {
        self.transactions.load(ctx, transaction_uuid)?;
        let mut payments = ctx
            .scan_all_shared(&CompositeKey::namespace(DocType::Payment))?
            .into_iter()
            .map(|(_, bytes)| decode_json::<Payment>(&bytes))
            .filter(|p| match p {
                Ok(p) => p.transaction_uuid.as_deref() == Some(transaction_uuid),
                Err(_) => true,
            })
            .collect::<Result<Vec<_>, _>>()?;
        payments.sort_by(|a, b| {
            a.create_time
                .cmp(&b.create_time)
                .then_with(|| a.payment_uuid.cmp(&b.payment_uuid))
        });
        Ok(payments)
    }

    fn record(
        &self,
        ctx: &mut InvocationContext<'_>,
        request: CreatePayment,
        transaction_uuid: Option<&str>,
        refund_of: Option<String>,
    ) -> ContractResult<Payment> {
        require_non_empty("paymentUUID", &request.payment_uuid)?;
        let key = CompositeKey::payment(&request.payment_uuid)?;
        if ctx.txn.get_shared(&key)?.is_some() {
            return Err(ContractError::conflict(
                ctx.operation().as_str(),
                &request.payment_uuid,
                "payment already exists",
            ));
        }
        users::transfer(
            ctx,
            &request.payment_uuid,
            &request.from,
            &request.to,
            request.amount,
        )?;
        let payment = Payment {
            payment_uuid: request.payment_uuid,
            transaction_uuid: transaction_uuid.map(String::from),
            amount: request.amount,
            payment_type: request.payment_type,
            from_citizen_id_hash: request.from.citizen_id_hash,
            from_organization: request.from.organization,
            to_citizen_id_hash: request.to.citizen_id_hash,
            to_organization: request.to.organization,
            create_time: ctx.now(),
            refund_of,
        };
        store(ctx, &payment)?;
        tracing::info!(
            payment = %payment.payment_uuid,
            amount = %payment.amount,
            kind = %payment.payment_type,
            "payment recorded"
        );
        Ok(payment)
    }
}

/// `{payment}-refund`, or `{payment}-refund-{n}` with the lowest free `n`
/// when an earlier payment already took that id.
fn fresh_refund_id(ctx: &mut InvocationContext<'_>, payment_uuid: &str) -> ContractResult<String> {
    let base = format!("{payment_uuid}-refund");
    let mut candidate = base.clone();
    let mut n = 1u32;
    while ctx.txn.get_shared(&CompositeKey::payment(&candidate)?)?.is_some() {
        n += 1;
        candidate = format!("{base}-{n}");
    }
    Ok(candidate)
}

pub(crate) fn load(ctx: &mut InvocationContext<'_>, uuid: &str) -> ContractResult<Payment> {
    let key = CompositeKey::payment(uuid)?;
    ctx.txn
        .get_shared_json(&key)?
        .ok_or_else(|| ContractError::not_found("payment", uuid))
}

pub(crate) fn store(ctx: &mut InvocationContext<'_>, payment: &Payment) -> ContractResult<()> {
    let key = CompositeKey::payment(&payment.payment_uuid)?;
    ctx.txn.put_shared_json(&key, payment)?;
    Ok(())
}
