//! Sale contracts: a document hash with a small lifecycle.

use estate_types::{Collection, CompositeKey, ContractStatus, DocType, Timestamp};
use serde::{Deserialize, Serialize};

use crate::context::InvocationContext;
use crate::error::{ContractError, ContractResult};
use crate::provenance;
use crate::transactions::{TransactionRecord, TransactionTerms};
use crate::users::require_non_empty;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRecord {
    #[serde(rename = "contractUUID")]
    pub contract_uuid: String,
    pub doc_hash: String,
    pub contract_type: String,
    #[serde(rename = "creatorCitizenIDHash")]
    pub creator_citizen_id_hash: String,
    #[serde(
        rename = "transactionUUID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub transaction_uuid: Option<String>,
    pub status: ContractStatus,
    pub create_time: Timestamp,
    pub update_time: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateContract {
    pub contract_uuid: String,
    pub doc_hash: String,
    pub contract_type: String,
    pub creator_citizen_id_hash: String,
    pub transaction_uuid: Option<String>,
}

/// Content changes; empty fields are left untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateContract {
    pub contract_uuid: String,
    pub doc_hash: String,
    pub contract_type: String,
}

/// Contract service.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContractRegistry;

impl ContractRegistry {
    pub fn create(
        &self,
        ctx: &mut InvocationContext<'_>,
        request: CreateContract,
    ) -> ContractResult<ContractRecord> {
        require_non_empty("contractUUID", &request.contract_uuid)?;
        require_non_empty("docHash", &request.doc_hash)?;
        require_non_empty("contractType", &request.contract_type)?;
        let key = CompositeKey::contract(&request.contract_uuid)?;
        if ctx.txn.get_shared(&key)?.is_some() {
            return Err(ContractError::conflict(
                "CreateContract",
                &request.contract_uuid,
                "contract already exists",
            ));
        }
        let transaction_uuid = request.transaction_uuid.filter(|t| !t.trim().is_empty());
        if let Some(transaction) = &transaction_uuid {
            attach_to_transaction(ctx, transaction, &request.contract_uuid)?;
        }
        let now = ctx.now();
        let contract = ContractRecord {
            contract_uuid: request.contract_uuid,
            doc_hash: request.doc_hash,
            contract_type: request.contract_type,
            creator_citizen_id_hash: request.creator_citizen_id_hash,
            transaction_uuid,
            status: ContractStatus::Normal,
            create_time: now,
            update_time: now,
        };
        ctx.txn.put_shared_json(&key, &contract)?;
        provenance::record(
            ctx,
            DocType::Contract,
            &contract.contract_uuid,
            "createContract",
            Vec::new(),
        )?;
        tracing::info!(contract = %contract.contract_uuid, "contract created");
        Ok(contract)
    }

    pub fn query(&self, ctx: &mut InvocationContext<'_>, uuid: &str) -> ContractResult<ContractRecord> {
        let key = CompositeKey::contract(uuid)?;
        ctx.txn
            .get_shared_json(&key)?
            .ok_or_else(|| ContractError::not_found("contract", uuid))
    }

    pub fn update_status(
        &self,
        ctx: &mut InvocationContext<'_>,
        uuid: &str,
        next: ContractStatus,
    ) -> ContractResult<ContractRecord> {
        let mut contract = self.query(ctx, uuid)?;
        ensure_mutable(&contract, "UpdateContractStatus")?;
        if contract.status == next {
            return Ok(contract);
        }
        contract.status = next;
        self.save(ctx, &mut contract, "updateContractStatus", vec!["status".into()])?;
        tracing::info!(contract = uuid, status = %next, "contract status changed");
        Ok(contract)
    }

    pub fn update(
        &self,
        ctx: &mut InvocationContext<'_>,
        request: UpdateContract,
    ) -> ContractResult<ContractRecord> {
        let mut contract = self.query(ctx, &request.contract_uuid)?;
        ensure_mutable(&contract, "UpdateContract")?;
        let mut fields = Vec::new();
        if !request.doc_hash.trim().is_empty() && request.doc_hash != contract.doc_hash {
            contract.doc_hash = request.doc_hash;
            fields.push("docHash".to_string());
        }
        if !request.contract_type.trim().is_empty() && request.contract_type != contract.contract_type
        {
            contract.contract_type = request.contract_type;
            fields.push("contractType".to_string());
        }
        if !fields.is_empty() {
            self.save(ctx, &mut contract, "updateContract", fields)?;
        }
        Ok(contract)
    }

    fn save(
        &self,
        ctx: &mut InvocationContext<'_>,
        contract: &mut ContractRecord,
        action: &str,
        fields: Vec<String>,
    ) -> ContractResult<()> {
        contract.update_time = ctx.now();
        let key = CompositeKey::contract(&contract.contract_uuid)?;
        ctx.txn.put_shared_json(&key, contract)?;
        provenance::record(ctx, DocType::Contract, &contract.contract_uuid, action, fields)
    }
}

/// Point an open transaction's private terms at `contract`.
fn attach_to_transaction(
    ctx: &mut InvocationContext<'_>,
    transaction: &str,
    contract: &str,
) -> ContractResult<()> {
    let key = CompositeKey::transaction(transaction)?;
    let record: TransactionRecord = ctx
        .txn
        .get_shared_json(&key)?
        .ok_or_else(|| ContractError::not_found("transaction", transaction))?;
    if record.status.is_terminal() {
        return Err(ContractError::conflict(
            "CreateContract",
            transaction,
            format!("transaction is already {}", record.status),
        ));
    }
    let mut terms: TransactionTerms = ctx
        .txn
        .get_private_json(Collection::TransactionPrivate, &key)?
        .ok_or_else(|| ContractError::not_found("transaction terms", transaction))?;
    terms.contract_uuid = contract.to_string();
    ctx.txn
        .put_private_json(Collection::TransactionPrivate, &key, &terms)?;
    tracing::debug!(transaction, contract, "contract attached to transaction");
    Ok(())
}

fn ensure_mutable(contract: &ContractRecord, operation: &str) -> ContractResult<()> {
    match contract.status {
        ContractStatus::Frozen => Err(ContractError::conflict(
            operation,
            &contract.contract_uuid,
            "contract is frozen",
        )),
        ContractStatus::Completed => Err(ContractError::conflict(
            operation,
            &contract.contract_uuid,
            "contract is completed",
        )),
        ContractStatus::Normal => Ok(()),
    }
}
