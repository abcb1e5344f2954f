//! Append-only audit trail, with optional status cascades into realty and
//! transactions.

use std::collections::BTreeMap;

use estate_store::decode_json;
use estate_types::{
    CompositeKey, DocType, Organization, RealtyStatus, Timestamp, TransactionStatus,
};
use serde::{Deserialize, Serialize};

use crate::context::InvocationContext;
use crate::error::{ContractError, ContractResult};
use crate::provenance::{self, ProvenanceRecord};
use crate::realty::RealtyService;
use crate::transactions::TransactionService;
use crate::users::require_non_empty;

/// One audit finding. Never updated once written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub audit_id: String,
    pub target_type: DocType,
    pub target_id: String,
    pub auditor_id: String,
    pub auditor_org_id: Organization,
    pub result: String,
    pub comments: String,
    pub audited_at: Timestamp,
    #[serde(default)]
    pub violations: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub related_documents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_status: Option<String>,
}

impl AuditRecord {
    /// Record written by the registry itself when it freezes or unfreezes a
    /// realty.
    pub(crate) fn realty_event(
        ctx: &InvocationContext<'_>,
        audit_id: String,
        cert: &str,
        result: &str,
        reason: &str,
        previous: RealtyStatus,
        current: RealtyStatus,
    ) -> Self {
        Self {
            audit_id,
            target_type: DocType::Realty,
            target_id: cert.to_string(),
            auditor_id: ctx.client_id(),
            auditor_org_id: ctx.organization(),
            result: result.to_string(),
            comments: reason.to_string(),
            audited_at: ctx.now(),
            violations: if reason.trim().is_empty() {
                Vec::new()
            } else {
                vec![reason.to_string()]
            },
            recommendations: Vec::new(),
            related_documents: Vec::new(),
            previous_status: Some(previous.to_string()),
            current_status: Some(current.to_string()),
        }
    }

    /// Whether `other` states the same finding. Timestamps, the auditor
    /// principal and the observed previous status may differ on a replay.
    fn same_finding(&self, other: &AuditRecord) -> bool {
        self.target_type == other.target_type
            && self.target_id == other.target_id
            && self.auditor_org_id == other.auditor_org_id
            && self.result == other.result
            && self.comments == other.comments
            && self.violations == other.violations
            && self.recommendations == other.recommendations
            && self.related_documents == other.related_documents
            && self.current_status == other.current_status
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditTransaction {
    pub transaction_uuid: String,
    pub result: String,
    pub comments: String,
    pub violations: Vec<String>,
    pub recommendations: Vec<String>,
    pub current_status: Option<TransactionStatus>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddAuditLog {
    /// Empty to derive one from the target and the invocation time.
    pub audit_id: String,
    pub target_type: DocType,
    pub target_id: String,
    pub result: String,
    pub comments: String,
    pub violations: Vec<String>,
    pub recommendations: Vec<String>,
    pub related_documents: Vec<String>,
    pub previous_status: String,
    pub current_status: String,
}

/// Result counts for one target type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<DocType>,
    pub total: usize,
    pub by_result: BTreeMap<String, usize>,
}

/// Audit service.
#[derive(Clone, Debug, Default)]
pub struct AuditTrail<R, T> {
    realty: R,
    transactions: T,
}

impl<R: RealtyService, T: TransactionService> AuditTrail<R, T> {
    pub fn new(realty: R, transactions: T) -> Self {
        Self {
            realty,
            transactions,
        }
    }

    pub fn audit_transaction(
        &self,
        ctx: &mut InvocationContext<'_>,
        request: AuditTransaction,
    ) -> ContractResult<AuditRecord> {
        let uuid = request.transaction_uuid.as_str();
        require_non_empty("result", &request.result)?;
        let transaction = self.transactions.load(ctx, uuid)?;
        let record = AuditRecord {
            audit_id: format!("AUDIT_{uuid}_{}", stamp(ctx.now())),
            target_type: DocType::Transaction,
            target_id: uuid.to_string(),
            auditor_id: ctx.client_id(),
            auditor_org_id: ctx.organization(),
            result: request.result,
            comments: request.comments,
            audited_at: ctx.now(),
            violations: request.violations,
            recommendations: request.recommendations,
            related_documents: Vec::new(),
            previous_status: Some(transaction.status.to_string()),
            current_status: request.current_status.map(|s| s.to_string()),
        };
        if let Some(existing) = append(ctx, record.clone())? {
            return Ok(existing);
        }
        if let Some(next) = request.current_status {
            self.transactions
                .advance(ctx, uuid, next, "auditTransaction")?;
        }
        tracing::info!(transaction = uuid, audit = %record.audit_id, result = %record.result, "transaction audited");
        Ok(record)
    }

    pub fn add_audit_log(
        &self,
        ctx: &mut InvocationContext<'_>,
        request: AddAuditLog,
    ) -> ContractResult<AuditRecord> {
        require_non_empty("targetID", &request.target_id)?;
        require_non_empty("result", &request.result)?;
        let target = request.target_id.as_str();
        let cascades = matches!(request.target_type, DocType::Realty | DocType::Transaction);
        let current_status = non_empty(request.current_status);

        if cascades && current_status.is_some()
            && !matches!(ctx.organization(), Organization::Audit | Organization::Government)
        {
            return Err(ContractError::unauthorized(
                "AddAuditLog",
                ctx.organization().as_str(),
                "only audit or government may change a status through the audit trail",
            ));
        }

        let cascade = match (request.target_type, &current_status) {
            (DocType::Realty, Some(s)) => Some(Cascade::Realty(s.parse()?)),
            (DocType::Transaction, Some(s)) => Some(Cascade::Transaction(s.parse()?)),
            _ => None,
        };
        let observed = match request.target_type {
            DocType::Realty => Some(self.realty.load(ctx, target)?.status.to_string()),
            DocType::Transaction => Some(self.transactions.load(ctx, target)?.status.to_string()),
            _ => None,
        };

        let audit_id = match non_empty(request.audit_id) {
            Some(id) => id,
            None => format!("AUDIT_{target}_{}", stamp(ctx.now())),
        };
        let record = AuditRecord {
            audit_id,
            target_type: request.target_type,
            target_id: request.target_id.clone(),
            auditor_id: ctx.client_id(),
            auditor_org_id: ctx.organization(),
            result: request.result,
            comments: request.comments,
            audited_at: ctx.now(),
            violations: request.violations,
            recommendations: request.recommendations,
            related_documents: request.related_documents,
            previous_status: non_empty(request.previous_status).or(observed),
            current_status,
        };
        if let Some(existing) = append(ctx, record.clone())? {
            return Ok(existing);
        }

        match cascade {
            Some(Cascade::Realty(next)) => {
                self.realty
                    .change_status(ctx, &request.target_id, next, "auditCascade")?;
            }
            Some(Cascade::Transaction(next)) => {
                self.transactions
                    .advance(ctx, &request.target_id, next, "auditCascade")?;
            }
            None => {}
        }
        Ok(record)
    }

    /// Audit history of one target, oldest first.
    pub fn logs(
        &self,
        ctx: &mut InvocationContext<'_>,
        target_id: &str,
        target_type: Option<DocType>,
    ) -> ContractResult<Vec<AuditRecord>> {
        require_non_empty("targetID", target_id)?;
        let partial = CompositeKey::new(DocType::Audit, [target_id])?;
        let mut records = ctx
            .scan_all_shared(&partial)?
            .into_iter()
            .map(|(_, bytes)| decode_json::<AuditRecord>(&bytes))
            .collect::<Result<Vec<_>, _>>()?;
        records.retain(|r| target_type.map_or(true, |t| r.target_type == t));
        records.sort_by(|a, b| {
            a.audited_at
                .cmp(&b.audited_at)
                .then_with(|| a.audit_id.cmp(&b.audit_id))
        });
        tracing::debug!(target = target_id, count = records.len(), "audit history read");
        Ok(records)
    }

    pub fn analyze(
        &self,
        ctx: &mut InvocationContext<'_>,
        target_type: Option<DocType>,
    ) -> ContractResult<AuditSummary> {
        let mut by_result = BTreeMap::new();
        let mut total = 0;
        for (_, bytes) in ctx.scan_all_shared(&CompositeKey::namespace(DocType::Audit))? {
            let record: AuditRecord = decode_json(&bytes)?;
            if target_type.map_or(false, |t| record.target_type != t) {
                continue;
            }
            total += 1;
            *by_result.entry(record.result).or_insert(0) += 1;
        }
        Ok(AuditSummary {
            target_type,
            total,
            by_result,
        })
    }

    pub fn provenance(
        &self,
        ctx: &mut InvocationContext<'_>,
        doc_type: DocType,
        entity_id: &str,
    ) -> ContractResult<Vec<ProvenanceRecord>> {
        require_non_empty("entityID", entity_id)?;
        provenance::history(ctx, doc_type, entity_id)
    }
}

enum Cascade {
    Realty(RealtyStatus),
    Transaction(TransactionStatus),
}

/// Write `record` unless its id is taken. Returns the stored record when the
/// same finding was already appended; a different finding under the same id
/// is a conflict.
pub(crate) fn append(
    ctx: &mut InvocationContext<'_>,
    record: AuditRecord,
) -> ContractResult<Option<AuditRecord>> {
    let key = CompositeKey::audit(&record.target_id, &record.audit_id)?;
    if let Some(existing) = ctx.txn.get_shared_json::<AuditRecord>(&key)? {
        if existing.same_finding(&record) {
            tracing::debug!(audit = %record.audit_id, "audit replay ignored");
            return Ok(Some(existing));
        }
        return Err(ContractError::conflict(
            ctx.operation().as_str(),
            &record.audit_id,
            "audit id already used for a different finding",
        ));
    }
    ctx.txn.put_shared_json(&key, &record)?;
    Ok(None)
}

/// Millisecond stamp used in derived audit ids.
pub(crate) fn stamp(at: Timestamp) -> String {
    at.format("%Y%m%d%H%M%S%3f").to_string()
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use crate::testkit::*;

    fn add_log(
        h: &Harness,
        org: estate_types::Organization,
        id: &str,
        target_type: &str,
        target: &str,
        result: &str,
        current: &str,
    ) -> crate::error::ContractResult<serde_json::Value> {
        h.call(
            org,
            "AddAuditLog",
            &[id, target_type, target, result, "checked", "[]", "[]", "[\"doc-1\"]", "", current],
        )
    }

    #[test]
    fn audit_transaction_cascades_forward() {
        let h = Harness::seeded();
        h.create_sale("T1", 100).unwrap();
        let record = h
            .call(
                AUD,
                "AuditTransaction",
                &["T1", "PASS", "ok", "[]", "[\"keep receipts\"]", "APPROVED"],
            )
            .unwrap();
        assert_eq!(record["targetType"], "TX");
        assert_eq!(record["previousStatus"], "PENDING");
        assert_eq!(record["currentStatus"], "APPROVED");
        assert_eq!(record["auditorOrgId"], "AuditMSP");
        assert!(record["auditId"].as_str().unwrap().starts_with("AUDIT_T1_"));
        assert_eq!(h.transaction("T1")["status"], "APPROVED");

        // Backwards is refused and nothing is appended.
        let err = h
            .call(AUD, "AuditTransaction", &["T1", "FAIL", "", "[]", "[]", "PENDING"])
            .unwrap_err();
        assert_eq!(err.kind(), "ConflictError");
        let logs = h.call(GOV, "GetAuditLogs", &["T1"]).unwrap();
        assert_eq!(logs.as_array().unwrap().len(), 1);
    }

    #[test]
    fn identical_audit_replay_is_a_no_op() {
        let h = Harness::seeded();
        h.create_sale("T1", 100).unwrap();
        let caller = estate_gate::CallerIdentity::of(AUD);
        let invocation = crate::request::Invocation::new(
            "AuditTransaction",
            ["T1", "PASS", "ok", "[]", "[]", "IN_PROGRESS"],
        );
        let first = h.ledger.invoke_named(&caller, &invocation).unwrap();
        assert!(first.receipt.is_some());
        let height = h.height();
        let replay = h.ledger.invoke_named(&caller, &invocation).unwrap();
        assert!(replay.receipt.is_none());
        assert_eq!(replay.result["auditId"], first.result["auditId"]);
        assert_eq!(h.height(), height);
    }

    #[test]
    fn audit_id_reuse_with_new_content_conflicts() {
        let h = Harness::seeded();
        add_log(&h, TPY, "A-1", "RE", "C1", "OK", "").unwrap();
        let height = h.height();
        let replay = add_log(&h, TPY, "A-1", "RE", "C1", "OK", "").unwrap();
        assert_eq!(replay["auditId"], "A-1");
        assert_eq!(h.height(), height);

        let err = add_log(&h, TPY, "A-1", "RE", "C1", "NOT OK", "").unwrap_err();
        assert_eq!(err.kind(), "ConflictError");
    }

    #[test]
    fn anyone_may_log_but_only_audit_or_government_cascade() {
        let h = Harness::seeded();
        h.create_sale("T1", 100).unwrap();
        let logged = add_log(&h, TPY, "", "TX", "T1", "NOTE", "").unwrap();
        assert_eq!(logged["previousStatus"], "PENDING");
        assert_eq!(logged["relatedDocuments"], serde_json::json!(["doc-1"]));

        let err = add_log(&h, INV, "A-2", "TX", "T1", "REJECT", "REJECTED").unwrap_err();
        assert_eq!(err.kind(), "AuthorizationError");
        assert_eq!(h.transaction("T1")["status"], "PENDING");

        add_log(&h, GOV, "A-3", "TX", "T1", "REJECT", "REJECTED").unwrap();
        assert_eq!(h.transaction("T1")["status"], "REJECTED");
        assert_eq!(h.realty("C1")["status"], "NORMAL");
    }

    #[test]
    fn cascade_into_realty() {
        let h = Harness::seeded();
        add_log(&h, AUD, "A-1", "RE", "C1", "SUSPICIOUS", "FROZEN").unwrap();
        assert_eq!(h.realty("C1")["status"], "FROZEN");
        let err = add_log(&h, AUD, "A-2", "RE", "C1", "CLEARED", "MORTGAGED").unwrap_err();
        assert_eq!(err.kind(), "ConflictError");
        add_log(&h, AUD, "A-3", "RE", "C1", "CLEARED", "NORMAL").unwrap();
        assert_eq!(h.realty("C1")["status"], "NORMAL");

        let err = add_log(&h, AUD, "A-4", "RE", "C1", "X", "SOLD").unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
        let err = add_log(&h, AUD, "A-5", "RE", "C404", "X", "").unwrap_err();
        assert_eq!(err.kind(), "NotFoundError");
    }

    #[test]
    fn history_and_analysis() {
        let h = Harness::seeded();
        h.create_sale("T1", 100).unwrap();
        add_log(&h, AUD, "A-1", "TX", "T1", "PASS", "").unwrap();
        add_log(&h, AUD, "A-2", "TX", "T1", "PASS", "").unwrap();
        add_log(&h, AUD, "A-3", "TX", "T1", "FAIL", "").unwrap();
        add_log(&h, AUD, "A-4", "RE", "C1", "PASS", "").unwrap();

        let history = h.call(SYS, "QueryAuditHistory", &["T1"]).unwrap();
        let ids: Vec<&str> = history
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["auditId"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["A-1", "A-2", "A-3"]);

        let summary = h.call(AUD, "AnalyzeAuditRecords", &["TX"]).unwrap();
        assert_eq!(summary["total"], 3);
        assert_eq!(summary["byResult"]["PASS"], 2);
        assert_eq!(summary["byResult"]["FAIL"], 1);
        let all = h.call(AUD, "AnalyzeAuditRecords", &[]).unwrap();
        assert_eq!(all["total"], 4);

        let err = h.call(INV, "GetAuditLogs", &["T1"]).unwrap_err();
        assert_eq!(err.kind(), "AuthorizationError");
    }

    #[test]
    fn provenance_is_per_entity() {
        let h = Harness::seeded();
        h.create_sale("T1", 100).unwrap();
        h.pay("T1", "P1", 100).unwrap();
        assert_eq!(
            h.actions("RE", "C1"),
            vec!["createRealty", "transferOwnership"]
        );
        assert_eq!(
            h.actions("TX", "T1"),
            vec!["createTransaction", "settleTransaction"]
        );
        assert!(h.actions("RE", "C10").is_empty());
    }
}
