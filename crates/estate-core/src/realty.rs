//! Realty registry: certificates, their public status and private ownership.

use estate_store::{decode_json, Page};
use estate_types::{
    Collection, CompositeKey, DocType, Organization, RealtyStatus, RealtyType, Timestamp,
};
use serde::{Deserialize, Serialize};

use crate::audit::{self, AuditRecord};
use crate::context::InvocationContext;
use crate::error::{ContractError, ContractResult};
use crate::provenance;
use crate::users::{require_non_empty, AccountRef};

/// Public half of a realty record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Realty {
    pub realty_cert_hash: String,
    pub realty_cert: String,
    pub realty_type: RealtyType,
    pub status: RealtyStatus,
    /// Status to restore when the realty is unfrozen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_before_freeze: Option<RealtyStatus>,
    pub create_time: Timestamp,
    pub last_update_time: Timestamp,
}

/// Private ownership, in `RealEstatePrivateCollection`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtyOwnership {
    #[serde(rename = "currentOwnerCitizenIDHash")]
    pub current_owner_citizen_id_hash: String,
    pub current_owner_organization: Organization,
    #[serde(rename = "previousOwnersCitizenIDHashList")]
    pub previous_owners_citizen_id_hash_list: Vec<String>,
}

impl RealtyOwnership {
    pub fn owner(&self) -> AccountRef {
        AccountRef::new(
            &self.current_owner_citizen_id_hash,
            self.current_owner_organization,
        )
    }
}

/// Realty as returned to a caller; ownership only for collection members.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtyView {
    #[serde(flatten)]
    pub realty: Realty,
    #[serde(flatten)]
    pub ownership: Option<RealtyOwnership>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateRealty {
    pub realty_cert_hash: String,
    pub realty_cert: String,
    pub realty_type: RealtyType,
    pub status: RealtyStatus,
    pub owner: AccountRef,
    pub previous_owners: Vec<String>,
}

/// Requested changes; `None` leaves a field as it is.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateRealty {
    pub realty_cert_hash: String,
    pub realty_type: Option<RealtyType>,
    pub status: Option<RealtyStatus>,
    pub owner_citizen_id_hash: Option<String>,
    pub owner_organization: Option<Organization>,
    pub previous_owners: Option<Vec<String>>,
}

/// What the transaction engine and the audit trail may do to a realty.
///
/// These calls run inside the caller's invocation and skip authorization;
/// the entry operation has already been admitted.
pub trait RealtyService: Send + Sync {
    fn load(&self, ctx: &mut InvocationContext<'_>, cert: &str) -> ContractResult<Realty>;

    fn ownership(
        &self,
        ctx: &mut InvocationContext<'_>,
        cert: &str,
    ) -> ContractResult<RealtyOwnership>;

    /// NORMAL to IN_TRANSACTION.
    fn reserve(&self, ctx: &mut InvocationContext<'_>, cert: &str, transaction: &str)
        -> ContractResult<()>;

    /// IN_TRANSACTION back to NORMAL after a rejected sale.
    fn release(&self, ctx: &mut InvocationContext<'_>, cert: &str, transaction: &str)
        -> ContractResult<()>;

    /// Hand the realty to `buyer`, appending the seller to previous owners.
    fn transfer_ownership(
        &self,
        ctx: &mut InvocationContext<'_>,
        cert: &str,
        buyer: &AccountRef,
        transaction: &str,
    ) -> ContractResult<()>;

    /// Administrative status change (freeze, unfreeze, mortgage). Returns the
    /// status before the change.
    fn change_status(
        &self,
        ctx: &mut InvocationContext<'_>,
        cert: &str,
        next: RealtyStatus,
        action: &str,
    ) -> ContractResult<RealtyStatus>;
}

/// Realty service.
#[derive(Clone, Copy, Debug, Default)]
pub struct RealtyRegistry;

impl RealtyRegistry {
    pub fn create(
        &self,
        ctx: &mut InvocationContext<'_>,
        request: CreateRealty,
    ) -> ContractResult<RealtyView> {
        require_non_empty("realtyCertHash", &request.realty_cert_hash)?;
        require_non_empty("currentOwnerCitizenIDHash", &request.owner.citizen_id_hash)?;
        if !matches!(request.status, RealtyStatus::Normal | RealtyStatus::Mortgaged) {
            return Err(ContractError::validation(format!(
                "a realty cannot be created with status {}",
                request.status
            )));
        }

        let key = CompositeKey::realty(&request.realty_cert_hash)?;
        if ctx.txn.get_shared(&key)?.is_some() {
            return Err(ContractError::conflict(
                "CreateRealty",
                &request.realty_cert_hash,
                "realty already exists",
            ));
        }

        let now = ctx.now();
        let realty = Realty {
            realty_cert_hash: request.realty_cert_hash.clone(),
            realty_cert: request.realty_cert,
            realty_type: request.realty_type,
            status: request.status,
            status_before_freeze: None,
            create_time: now,
            last_update_time: now,
        };
        let ownership = RealtyOwnership {
            current_owner_citizen_id_hash: request.owner.citizen_id_hash,
            current_owner_organization: request.owner.organization,
            previous_owners_citizen_id_hash_list: request.previous_owners,
        };
        ctx.txn.put_shared_json(&key, &realty)?;
        ctx.txn
            .put_private_json(Collection::RealEstatePrivate, &key, &ownership)?;
        provenance::record(
            ctx,
            DocType::Realty,
            &realty.realty_cert_hash,
            "createRealty",
            Vec::new(),
        )?;
        tracing::info!(realty = %realty.realty_cert_hash, status = %realty.status, "realty created");
        Ok(view(ctx, realty, Some(ownership)))
    }

    pub fn update(
        &self,
        ctx: &mut InvocationContext<'_>,
        request: UpdateRealty,
    ) -> ContractResult<RealtyView> {
        let cert = request.realty_cert_hash.as_str();
        let mut realty = self.load(ctx, cert)?;
        if realty.status == RealtyStatus::Frozen {
            return Err(ContractError::conflict("UpdateRealty", cert, "realty is frozen"));
        }
        match request.status {
            Some(RealtyStatus::Frozen) => {
                return Err(ContractError::validation(
                    "FROZEN can only be set through FreezeRealty",
                ))
            }
            Some(RealtyStatus::InTransaction) => {
                return Err(ContractError::validation(
                    "IN_TRANSACTION is managed by the transaction engine",
                ))
            }
            _ => {}
        }

        let mut ownership = self.ownership(ctx, cert)?;
        let original_status = realty.status;
        let mut fields = Vec::new();

        if let Some(realty_type) = request.realty_type.filter(|t| *t != realty.realty_type) {
            realty.realty_type = realty_type;
            fields.push("realtyType");
        }
        if let Some(status) = request.status.filter(|s| *s != realty.status) {
            realty.status = status;
            fields.push("status");
        }
        if let Some(owner) = request
            .owner_citizen_id_hash
            .filter(|h| *h != ownership.current_owner_citizen_id_hash)
        {
            ownership.current_owner_citizen_id_hash = owner;
            fields.push("currentOwnerCitizenIDHash");
        }
        if let Some(org) = request
            .owner_organization
            .filter(|o| *o != ownership.current_owner_organization)
        {
            ownership.current_owner_organization = org;
            fields.push("currentOwnerOrganization");
        }
        if let Some(previous) = request
            .previous_owners
            .filter(|p| p.len() > ownership.previous_owners_citizen_id_hash_list.len())
        {
            ownership.previous_owners_citizen_id_hash_list = previous;
            fields.push("previousOwnersCitizenIDHashList");
        }

        if fields.is_empty() {
            return Ok(view(ctx, realty, Some(ownership)));
        }
        let touches_sale = fields
            .iter()
            .any(|f| *f != "realtyType" && *f != "previousOwnersCitizenIDHashList");
        if touches_sale && original_status == RealtyStatus::InTransaction {
            return Err(ContractError::conflict(
                "UpdateRealty",
                cert,
                "realty is referenced by an open transaction",
            ));
        }

        let key = CompositeKey::realty(cert)?;
        realty.last_update_time = ctx.now();
        ctx.txn.put_shared_json(&key, &realty)?;
        if fields.iter().any(|f| f.starts_with("currentOwner") || f.starts_with("previous")) {
            ctx.txn
                .put_private_json(Collection::RealEstatePrivate, &key, &ownership)?;
        }
        let fields: Vec<String> = fields.into_iter().map(String::from).collect();
        tracing::info!(realty = cert, ?fields, "realty updated");
        provenance::record(ctx, DocType::Realty, cert, "updateRealty", fields)?;
        Ok(view(ctx, realty, Some(ownership)))
    }

    pub fn query(&self, ctx: &mut InvocationContext<'_>, cert: &str) -> ContractResult<RealtyView> {
        let realty = self.load(ctx, cert)?;
        let ownership = if ctx.txn.can_access(Collection::RealEstatePrivate) {
            Some(self.ownership(ctx, cert)?)
        } else {
            None
        };
        Ok(view(ctx, realty, ownership))
    }

    pub fn list(
        &self,
        ctx: &mut InvocationContext<'_>,
        page_size: usize,
        bookmark: &str,
    ) -> ContractResult<Page<RealtyView>> {
        let request = ctx.page_request(page_size, bookmark)?;
        let page = ctx
            .txn
            .scan_shared(&CompositeKey::namespace(DocType::Realty), &request)?
            .try_map(|(_, bytes)| decode_json::<Realty>(&bytes))?;
        let members = ctx.txn.can_access(Collection::RealEstatePrivate);
        page.try_map(|realty| {
            let ownership = if members {
                Some(self.ownership(ctx, &realty.realty_cert_hash)?)
            } else {
                None
            };
            Ok::<_, ContractError>(view(ctx, realty, ownership))
        })
    }

    /// Realties currently held by `owner`. Collection members only.
    pub fn by_owner(
        &self,
        ctx: &mut InvocationContext<'_>,
        owner: &AccountRef,
    ) -> ContractResult<Vec<RealtyView>> {
        let held = ctx.scan_all_private(
            Collection::RealEstatePrivate,
            &CompositeKey::namespace(DocType::Realty),
        )?;
        let mut out = Vec::new();
        for (key, bytes) in held {
            let ownership: RealtyOwnership = decode_json(&bytes)?;
            if ownership.owner() != *owner {
                continue;
            }
            let cert = key
                .attributes()
                .first()
                .cloned()
                .ok_or_else(|| ContractError::validation(format!("malformed realty key {key}")))?;
            let realty = self.load(ctx, &cert)?;
            out.push(view(ctx, realty, Some(ownership)));
        }
        Ok(out)
    }

    pub fn freeze(
        &self,
        ctx: &mut InvocationContext<'_>,
        cert: &str,
        reason: &str,
    ) -> ContractResult<RealtyView> {
        require_non_empty("reason", reason)?;
        let realty = self.load(ctx, cert)?;
        if realty.status == RealtyStatus::Frozen {
            return Err(ContractError::conflict("FreezeRealty", cert, "realty is already frozen"));
        }
        let previous = self.change_status(ctx, cert, RealtyStatus::Frozen, "freezeRealty")?;
        let record = AuditRecord::realty_event(
            ctx,
            format!("FREEZE_{cert}_{}", audit::stamp(ctx.now())),
            cert,
            "FROZEN",
            reason,
            previous,
            RealtyStatus::Frozen,
        );
        audit::append(ctx, record)?;
        tracing::warn!(realty = cert, %previous, reason, "realty frozen");
        self.query(ctx, cert)
    }

    pub fn unfreeze(
        &self,
        ctx: &mut InvocationContext<'_>,
        cert: &str,
        reason: &str,
    ) -> ContractResult<RealtyView> {
        let realty = self.load(ctx, cert)?;
        if realty.status != RealtyStatus::Frozen {
            return Err(ContractError::conflict("UnfreezeRealty", cert, "realty is not frozen"));
        }
        let restored = realty.status_before_freeze.unwrap_or(RealtyStatus::Normal);
        self.change_status(ctx, cert, restored, "unfreezeRealty")?;
        let record = AuditRecord::realty_event(
            ctx,
            format!("UNFREEZE_{cert}_{}", audit::stamp(ctx.now())),
            cert,
            "UNFROZEN",
            reason,
            RealtyStatus::Frozen,
            restored,
        );
        audit::append(ctx, record)?;
        tracing::info!(realty = cert, %restored, "realty unfrozen");
        self.query(ctx, cert)
    }

    fn store(&self, ctx: &mut InvocationContext<'_>, realty: &mut Realty) -> ContractResult<()> {
        realty.last_update_time = ctx.now();
        let key = CompositeKey::realty(&realty.realty_cert_hash)?;
        ctx.txn.put_shared_json(&key, realty)?;
        Ok(())
    }
}

impl RealtyService for RealtyRegistry {
    fn load(&self, ctx: &mut InvocationContext<'_>, cert: &str) -> ContractResult<Realty> {
        let key = CompositeKey::realty(cert)?;
        ctx.txn
            .get_shared_json(&key)?
            .ok_or_else(|| ContractError::not_found("realty", cert))
    }

    fn ownership(
        &self,
        ctx: &mut InvocationContext<'_>,
        cert: &str,
    ) -> ContractResult<RealtyOwnership> {
        let key = CompositeKey::realty(cert)?;
        ctx.txn
            .get_private_json(Collection::RealEstatePrivate, &key)?
            .ok_or_else(|| ContractError::not_found("realty ownership", cert))
    }

    fn reserve(
        &self,
        ctx: &mut InvocationContext<'_>,
        cert: &str,
        transaction: &str,
    ) -> ContractResult<()> {
        let operation = ctx.operation().as_str();
        let mut realty = self.load(ctx, cert)?;
        match realty.status {
            RealtyStatus::Normal => {}
            other => {
                return Err(ContractError::consistency(
                    operation,
                    cert,
                    format!("realty is {other}, not available for sale"),
                ))
            }
        }
        realty.status = RealtyStatus::InTransaction;
        self.store(ctx, &mut realty)?;
        tracing::debug!(realty = cert, transaction, "realty reserved");
        Ok(())
    }

    fn release(
        &self,
        ctx: &mut InvocationContext<'_>,
        cert: &str,
        transaction: &str,
    ) -> ContractResult<()> {
        let mut realty = self.load(ctx, cert)?;
        match (realty.status, realty.status_before_freeze) {
            (RealtyStatus::InTransaction, _) => realty.status = RealtyStatus::Normal,
            // Frozen mid-sale: unfreezing must not bring the dead sale back.
            (RealtyStatus::Frozen, Some(RealtyStatus::InTransaction)) => {
                realty.status_before_freeze = Some(RealtyStatus::Normal)
            }
            (other, _) => {
                return Err(ContractError::consistency(
                    ctx.operation().as_str(),
                    cert,
                    format!("realty is {other}, not held by transaction {transaction}"),
                ))
            }
        }
        self.store(ctx, &mut realty)?;
        provenance::record(
            ctx,
            DocType::Realty,
            cert,
            "releaseRealty",
            vec!["status".into()],
        )?;
        tracing::info!(realty = cert, transaction, "realty released");
        Ok(())
    }

    fn transfer_ownership(
        &self,
        ctx: &mut InvocationContext<'_>,
        cert: &str,
        buyer: &AccountRef,
        transaction: &str,
    ) -> ContractResult<()> {
        let operation = ctx.operation().as_str();
        let mut realty = self.load(ctx, cert)?;
        match realty.status {
            RealtyStatus::InTransaction => {}
            RealtyStatus::Frozen => {
                return Err(ContractError::conflict(operation, cert, "realty is frozen"))
            }
            other => {
                return Err(ContractError::consistency(
                    operation,
                    cert,
                    format!("realty is {other}, not held by transaction {transaction}"),
                ))
            }
        }

        let mut ownership = self.ownership(ctx, cert)?;
        let seller = std::mem::replace(
            &mut ownership.current_owner_citizen_id_hash,
            buyer.citizen_id_hash.clone(),
        );
        ownership.previous_owners_citizen_id_hash_list.push(seller);
        ownership.current_owner_organization = buyer.organization;
        realty.status = RealtyStatus::Normal;

        self.store(ctx, &mut realty)?;
        let key = CompositeKey::realty(cert)?;
        ctx.txn
            .put_private_json(Collection::RealEstatePrivate, &key, &ownership)?;
        provenance::record(
            ctx,
            DocType::Realty,
            cert,
            "transferOwnership",
            vec![
                "status".into(),
                "currentOwnerCitizenIDHash".into(),
                "currentOwnerOrganization".into(),
                "previousOwnersCitizenIDHashList".into(),
            ],
        )?;
        tracing::info!(realty = cert, transaction, buyer = %buyer, "ownership transferred");
        Ok(())
    }

    fn change_status(
        &self,
        ctx: &mut InvocationContext<'_>,
        cert: &str,
        next: RealtyStatus,
        action: &str,
    ) -> ContractResult<RealtyStatus> {
        let operation = ctx.operation().as_str();
        let mut realty = self.load(ctx, cert)?;
        let current = realty.status;
        if current == next {
            return Ok(current);
        }
        match (current, next) {
            (_, RealtyStatus::Frozen) => realty.status_before_freeze = Some(current),
            // Unfreezing may hand the realty back to an open sale.
            (RealtyStatus::Frozen, _) => {
                let restore = realty.status_before_freeze.unwrap_or(RealtyStatus::Normal);
                if next != restore {
                    return Err(ContractError::conflict(
                        operation,
                        cert,
                        format!("a frozen realty can only return to {restore}"),
                    ));
                }
                realty.status_before_freeze = None;
            }
            (_, RealtyStatus::InTransaction) => {
                return Err(ContractError::validation(
                    "IN_TRANSACTION is managed by the transaction engine",
                ))
            }
            (RealtyStatus::InTransaction, _) => {
                return Err(ContractError::conflict(
                    operation,
                    cert,
                    "realty is referenced by an open transaction",
                ))
            }
            _ => {}
        }
        realty.status = next;
        self.store(ctx, &mut realty)?;
        provenance::record(ctx, DocType::Realty, cert, action, vec!["status".into()])?;
        Ok(current)
    }
}

fn view(
    ctx: &InvocationContext<'_>,
    realty: Realty,
    ownership: Option<RealtyOwnership>,
) -> RealtyView {
    let ownership = ownership.filter(|_| ctx.txn.can_access(Collection::RealEstatePrivate));
    RealtyView { realty, ownership }
}
