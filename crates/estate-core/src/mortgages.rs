//! Bank mortgages over registered realty.
//!
//! Approval holds the realty as MORTGAGED, which keeps it out of new sales
//! until the loan is closed.

use chrono::Months;
use estate_types::{
    Amount, CompositeKey, DocType, MortgageStatus, Organization, RealtyStatus, Timestamp,
};
use serde::{Deserialize, Serialize};

use crate::context::InvocationContext;
use crate::error::{ContractError, ContractResult};
use crate::provenance;
use crate::realty::RealtyService;
use crate::users::{self, require_non_empty, AccountRef};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mortgage {
    #[serde(rename = "mortgageUUID")]
    pub mortgage_uuid: String,
    pub realty_cert_hash: String,
    #[serde(rename = "borrowerCitizenIDHash")]
    pub borrower_citizen_id_hash: String,
    pub borrower_organization: Organization,
    /// Client that recorded the loan.
    pub lender: String,
    pub loan_amount: Amount,
    pub interest_rate_bps: u32,
    pub term_months: u32,
    pub maturity_time: Timestamp,
    pub status: MortgageStatus,
    pub create_time: Timestamp,
    pub update_time: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_time: Option<Timestamp>,
}

impl Mortgage {
    pub fn borrower(&self) -> AccountRef {
        AccountRef::new(&self.borrower_citizen_id_hash, self.borrower_organization)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateMortgage {
    pub mortgage_uuid: String,
    pub realty_cert_hash: String,
    pub borrower: AccountRef,
    pub loan_amount: Amount,
    pub interest_rate_bps: u32,
    pub term_months: u32,
}

/// Mortgage service, holding realty through the registry seam.
#[derive(Clone, Debug, Default)]
pub struct MortgageBook<R> {
    realty: R,
}

impl<R: RealtyService> MortgageBook<R> {
    pub fn new(realty: R) -> Self {
        Self { realty }
    }

    pub fn create(
        &self,
        ctx: &mut InvocationContext<'_>,
        request: CreateMortgage,
    ) -> ContractResult<Mortgage> {
        let uuid = request.mortgage_uuid.as_str();
        require_non_empty("mortgageUUID", uuid)?;
        require_non_empty("realtyCertHash", &request.realty_cert_hash)?;
        if request.loan_amount.is_zero() {
            return Err(ContractError::validation("loanAmount must be positive"));
        }
        if request.term_months == 0 {
            return Err(ContractError::validation("term must be at least one month"));
        }
        let key = CompositeKey::mortgage(uuid)?;
        if ctx.txn.get_shared(&key)?.is_some() {
            return Err(ContractError::conflict(
                "CreateMortgage",
                uuid,
                "mortgage already exists",
            ));
        }
        users::load_user(ctx, &request.borrower)?;
        let cert = request.realty_cert_hash.as_str();
        self.ensure_pledgeable(ctx, cert, &request.borrower, "CreateMortgage", uuid)?;

        let now = ctx.now();
        let maturity_time = now
            .checked_add_months(Months::new(request.term_months))
            .ok_or_else(|| ContractError::validation("term is out of range"))?;
        let mortgage = Mortgage {
            mortgage_uuid: request.mortgage_uuid.clone(),
            realty_cert_hash: request.realty_cert_hash,
            borrower_citizen_id_hash: request.borrower.citizen_id_hash,
            borrower_organization: request.borrower.organization,
            lender: ctx.client_id(),
            loan_amount: request.loan_amount,
            interest_rate_bps: request.interest_rate_bps,
            term_months: request.term_months,
            maturity_time,
            status: MortgageStatus::Pending,
            create_time: now,
            update_time: now,
            approved_time: None,
            closed_time: None,
        };
        ctx.txn.put_shared_json(&key, &mortgage)?;
        provenance::record(ctx, DocType::Mortgage, uuid, "createMortgage", Vec::new())?;
        tracing::info!(
            mortgage = uuid,
            realty = %mortgage.realty_cert_hash,
            amount = %mortgage.loan_amount,
            "mortgage recorded"
        );
        Ok(mortgage)
    }

    /// PENDING -> APPROVED, taking the realty from NORMAL to MORTGAGED.
    pub fn approve(&self, ctx: &mut InvocationContext<'_>, uuid: &str) -> ContractResult<Mortgage> {
        let mut mortgage = self.query(ctx, uuid)?;
        if mortgage.status != MortgageStatus::Pending {
            return Err(ContractError::conflict(
                "ApproveMortgage",
                uuid,
                format!("mortgage is {}, only PENDING can be approved", mortgage.status),
            ));
        }
        let cert = mortgage.realty_cert_hash.clone();
        self.ensure_pledgeable(ctx, &cert, &mortgage.borrower(), "ApproveMortgage", uuid)?;
        self.realty
            .change_status(ctx, &cert, RealtyStatus::Mortgaged, "approveMortgage")?;

        let now = ctx.now();
        mortgage.status = MortgageStatus::Approved;
        mortgage.approved_time = Some(now);
        self.save(ctx, &mut mortgage, "approveMortgage")?;
        tracing::info!(mortgage = uuid, realty = %cert, "mortgage approved");
        Ok(mortgage)
    }

    /// APPROVED -> CLOSED, releasing the realty back to NORMAL.
    pub fn close(&self, ctx: &mut InvocationContext<'_>, uuid: &str) -> ContractResult<Mortgage> {
        let mut mortgage = self.query(ctx, uuid)?;
        if mortgage.status != MortgageStatus::Approved {
            return Err(ContractError::conflict(
                "CloseMortgage",
                uuid,
                format!("mortgage is {}, only APPROVED can be closed", mortgage.status),
            ));
        }
        let cert = mortgage.realty_cert_hash.clone();
        let status = self.realty.load(ctx, &cert)?.status;
        if status != RealtyStatus::Mortgaged {
            return Err(ContractError::consistency(
                "CloseMortgage",
                uuid,
                format!("realty {cert} is {status}, not MORTGAGED"),
            ));
        }
        self.realty
            .change_status(ctx, &cert, RealtyStatus::Normal, "closeMortgage")?;

        mortgage.status = MortgageStatus::Closed;
        mortgage.closed_time = Some(ctx.now());
        self.save(ctx, &mut mortgage, "closeMortgage")?;
        tracing::info!(mortgage = uuid, realty = %cert, "mortgage closed");
        Ok(mortgage)
    }

    pub fn query(&self, ctx: &mut InvocationContext<'_>, uuid: &str) -> ContractResult<Mortgage> {
        let key = CompositeKey::mortgage(uuid)?;
        ctx.txn
            .get_shared_json(&key)?
            .ok_or_else(|| ContractError::not_found("mortgage", uuid))
    }

    /// The realty must be NORMAL and owned by the borrower.
    fn ensure_pledgeable(
        &self,
        ctx: &mut InvocationContext<'_>,
        cert: &str,
        borrower: &AccountRef,
        operation: &str,
        mortgage: &str,
    ) -> ContractResult<()> {
        let status = self.realty.load(ctx, cert)?.status;
        if status != RealtyStatus::Normal {
            return Err(ContractError::consistency(
                operation,
                mortgage,
                format!("realty {cert} is {status}, not NORMAL"),
            ));
        }
        let owner = self.realty.ownership(ctx, cert)?.owner();
        if &owner != borrower {
            return Err(ContractError::consistency(
                operation,
                mortgage,
                format!("borrower {borrower} is not the recorded owner of {cert}"),
            ));
        }
        Ok(())
    }

    fn save(
        &self,
        ctx: &mut InvocationContext<'_>,
        mortgage: &mut Mortgage,
        action: &str,
    ) -> ContractResult<()> {
        mortgage.update_time = ctx.now();
        let key = CompositeKey::mortgage(&mortgage.mortgage_uuid)?;
        ctx.txn.put_shared_json(&key, mortgage)?;
        provenance::record(
            ctx,
            DocType::Mortgage,
            &mortgage.mortgage_uuid,
            action,
            vec!["status".into()],
        )
    }
}
