//! Append-only trail of who changed which record, and which fields moved.

use estate_store::decode_json;
use estate_types::{CompositeKey, DocType, Organization, Timestamp};
use serde::{Deserialize, Serialize};

use crate::context::InvocationContext;
use crate::error::ContractResult;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceRecord {
    pub doc_type: DocType,
    pub entity_id: String,
    pub action: String,
    pub client_id: String,
    pub organization: Organization,
    pub tx_id: String,
    pub time: Timestamp,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modify_fields: Vec<String>,
}

/// Append a provenance entry for `action` on `(doc_type, entity_id)`.
pub fn record(
    ctx: &mut InvocationContext<'_>,
    doc_type: DocType,
    entity_id: &str,
    action: &str,
    modify_fields: Vec<String>,
) -> ContractResult<()> {
    let tx_id = ctx.tx_id();
    let key = CompositeKey::provenance(doc_type, entity_id, action, &tx_id)?;
    let entry = ProvenanceRecord {
        doc_type,
        entity_id: entity_id.to_string(),
        action: action.to_string(),
        client_id: ctx.client_id(),
        organization: ctx.organization(),
        tx_id,
        time: ctx.now(),
        modify_fields,
    };
    ctx.txn.put_shared_json(&key, &entry)?;
    Ok(())
}

/// All provenance entries for one entity, oldest first.
pub fn history(
    ctx: &mut InvocationContext<'_>,
    doc_type: DocType,
    entity_id: &str,
) -> ContractResult<Vec<ProvenanceRecord>> {
    let partial = CompositeKey::new(DocType::Provenance, [doc_type.as_str(), entity_id])?;
    let mut records = ctx
        .scan_all_shared(&partial)?
        .into_iter()
        .map(|(_, bytes)| decode_json::<ProvenanceRecord>(&bytes))
        .collect::<Result<Vec<_>, _>>()?;
    records.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.tx_id.cmp(&b.tx_id)));
    Ok(records)
}
