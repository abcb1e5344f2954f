//! Parsing flat `(function, [args])` invocations into typed requests.

use std::str::FromStr;

use estate_gate::Operation;
use estate_types::{
    Amount, ContractStatus, DocType, Organization, RealtyStatus, RealtyType, Role,
    TransactionStatus, TypeError, UserStatus,
};
use serde::{Deserialize, Serialize};

use crate::audit::{AddAuditLog, AuditTransaction};
use crate::contracts::{CreateContract, UpdateContract};
use crate::error::{ContractError, ContractResult};
use crate::mortgages::CreateMortgage;
use crate::payments::{CreatePayment, PayForTransaction};
use crate::realty::{CreateRealty, UpdateRealty};
use crate::taxes::CreateTax;
use crate::transactions::CreateTransaction;
use crate::users::{AccountRef, RegisterUser, UpdateUser};

/// A named operation with ordered string arguments, as callers submit it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub function: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<I, S>(function: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            function: function.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// Typed form of every operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    Register(RegisterUser),
    UpdateUser(UpdateUser),
    GetUser(AccountRef),
    ListUsersByOrganization(Organization),
    GetBalance(AccountRef),
    InitLedger,

    CreateRealty(CreateRealty),
    UpdateRealty(UpdateRealty),
    QueryRealty(String),
    QueryRealtyList { page_size: usize, bookmark: String },
    QueryRealtyByOwner(AccountRef),
    FreezeRealty { realty_cert_hash: String, reason: String },
    UnfreezeRealty { realty_cert_hash: String, reason: String },

    CreateTransaction(CreateTransaction),
    CheckTransaction { transaction_uuid: String, status: TransactionStatus },
    UpdateTransaction { transaction_uuid: String, status: TransactionStatus },
    CompleteTransaction(String),
    QueryTransaction(String),
    QueryTransactionList { page_size: usize, bookmark: String },

    CreatePayment(CreatePayment),
    PayForTransaction(PayForTransaction),
    QueryPayment(String),
    QueryPaymentsByTransaction(String),

    CreateContract(CreateContract),
    QueryContract(String),
    UpdateContractStatus { contract_uuid: String, status: ContractStatus },
    UpdateContract(UpdateContract),

    CreateMortgage(CreateMortgage),
    ApproveMortgage(String),
    CloseMortgage(String),
    QueryMortgage(String),

    CreateTax(CreateTax),
    PayTax(String),
    VerifyTaxPayment(String),
    QueryTax(String),

    AuditTransaction(AuditTransaction),
    AddAuditLog(AddAuditLog),
    GetAuditLogs { target_id: String, target_type: Option<DocType> },
    QueryAuditHistory { target_id: String, target_type: Option<DocType> },
    AnalyzeAuditRecords(Option<DocType>),
    QueryProvenance { doc_type: DocType, entity_id: String },
}

impl Request {
    pub fn operation(&self) -> Operation {
        match self {
            Self::Register(_) => Operation::Register,
            Self::UpdateUser(_) => Operation::UpdateUser,
            Self::GetUser(_) => Operation::GetUserByCitizenIdAndOrganization,
            Self::ListUsersByOrganization(_) => Operation::ListUsersByOrganization,
            Self::GetBalance(_) => Operation::GetBalance,
            Self::InitLedger => Operation::InitLedger,
            Self::CreateRealty(_) => Operation::CreateRealty,
            Self::UpdateRealty(_) => Operation::UpdateRealty,
            Self::QueryRealty(_) => Operation::QueryRealty,
            Self::QueryRealtyList { .. } => Operation::QueryRealtyList,
            Self::QueryRealtyByOwner(_) => Operation::QueryRealtyByOwner,
            Self::FreezeRealty { .. } => Operation::FreezeRealty,
            Self::UnfreezeRealty { .. } => Operation::UnfreezeRealty,
            Self::CreateTransaction(_) => Operation::CreateTransaction,
            Self::CheckTransaction { .. } => Operation::CheckTransaction,
            Self::UpdateTransaction { .. } => Operation::UpdateTransaction,
            Self::CompleteTransaction(_) => Operation::CompleteTransaction,
            Self::QueryTransaction(_) => Operation::QueryTransaction,
            Self::QueryTransactionList { .. } => Operation::QueryTransactionList,
            Self::CreatePayment(_) => Operation::CreatePayment,
            Self::PayForTransaction(_) => Operation::PayForTransaction,
            Self::QueryPayment(_) => Operation::QueryPayment,
            Self::QueryPaymentsByTransaction(_) => Operation::QueryPaymentsByTransaction,
            Self::CreateContract(_) => Operation::CreateContract,
            Self::QueryContract(_) => Operation::QueryContract,
            Self::UpdateContractStatus { .. } => Operation::UpdateContractStatus,
            Self::UpdateContract(_) => Operation::UpdateContract,
            Self::CreateMortgage(_) => Operation::CreateMortgage,
            Self::ApproveMortgage(_) => Operation::ApproveMortgage,
            Self::CloseMortgage(_) => Operation::CloseMortgage,
            Self::QueryMortgage(_) => Operation::QueryMortgage,
            Self::CreateTax(_) => Operation::CreateTax,
            Self::PayTax(_) => Operation::PayTax,
            Self::VerifyTaxPayment(_) => Operation::VerifyTaxPayment,
            Self::QueryTax(_) => Operation::QueryTax,
            Self::AuditTransaction(_) => Operation::AuditTransaction,
            Self::AddAuditLog(_) => Operation::AddAuditLog,
            Self::GetAuditLogs { .. } => Operation::GetAuditLogs,
            Self::QueryAuditHistory { .. } => Operation::QueryAuditHistory,
            Self::AnalyzeAuditRecords(_) => Operation::AnalyzeAuditRecords,
            Self::QueryProvenance { .. } => Operation::QueryProvenance,
        }
    }

    /// Parse a flat invocation. Wrong arity and malformed numbers, enums or
    /// JSON lists are validation errors.
    pub fn parse(invocation: &Invocation) -> ContractResult<Self> {
        let operation: Operation = invocation.function.parse().map_err(|_| {
            ContractError::validation(format!("unknown function {}", invocation.function))
        })?;
        let args = invocation.args.as_slice();
        let request = match operation {
            Operation::Register => {
                let mut a = Args::exact(operation, args, 10)?;
                let citizen_id_hash = a.text();
                let citizen_id = a.text();
                let name = a.text();
                let phone = a.text();
                let email = a.text();
                let password_hash = a.text();
                let organization: Organization = a.parse("organization")?;
                let role = a.optional::<Role>("role")?;
                let status = a.optional::<UserStatus>("status")?;
                let balance = a.optional::<Amount>("balance")?;
                Self::Register(RegisterUser {
                    citizen_id_hash,
                    citizen_id,
                    name,
                    phone,
                    email,
                    password_hash,
                    organization,
                    role: role.unwrap_or_else(|| organization.default_role()),
                    status: status.unwrap_or(UserStatus::Active),
                    balance: balance.unwrap_or(Amount::ZERO),
                })
            }
            Operation::UpdateUser => {
                let mut a = Args::exact(operation, args, 5)?;
                Self::UpdateUser(UpdateUser {
                    citizen_id_hash: a.text(),
                    organization: a.parse("organization")?,
                    phone: a.text(),
                    email: a.text(),
                    password_hash: a.text(),
                })
            }
            Operation::GetUserByCitizenIdAndOrganization => {
                Self::GetUser(Args::exact(operation, args, 2)?.account("organization")?)
            }
            Operation::ListUsersByOrganization => Self::ListUsersByOrganization(
                Args::exact(operation, args, 1)?.parse("organization")?,
            ),
            Operation::GetBalance => {
                Self::GetBalance(Args::exact(operation, args, 2)?.account("organization")?)
            }
            Operation::InitLedger => {
                Args::exact(operation, args, 0)?;
                Self::InitLedger
            }

            Operation::CreateRealty => {
                let mut a = Args::exact(operation, args, 7)?;
                Self::CreateRealty(CreateRealty {
                    realty_cert_hash: a.text(),
                    realty_cert: a.text(),
                    realty_type: a.parse("realtyType")?,
                    status: a.parse("status")?,
                    owner: a.account("currentOwnerOrganization")?,
                    previous_owners: a.list("previousOwnersCitizenIDHashList")?,
                })
            }
            Operation::UpdateRealty => {
                let mut a = Args::exact(operation, args, 6)?;
                Self::UpdateRealty(UpdateRealty {
                    realty_cert_hash: a.text(),
                    realty_type: a.optional::<RealtyType>("realtyType")?,
                    status: a.optional::<RealtyStatus>("status")?,
                    owner_citizen_id_hash: non_empty(a.text()),
                    owner_organization: a.optional::<Organization>("currentOwnerOrganization")?,
                    previous_owners: a.optional_list("previousOwnersCitizenIDHashList")?,
                })
            }
            Operation::QueryRealty => Self::QueryRealty(Args::exact(operation, args, 1)?.text()),
            Operation::QueryRealtyList => {
                let mut a = Args::between(operation, args, 0, 2)?;
                Self::QueryRealtyList {
                    page_size: a.page_size()?,
                    bookmark: a.text(),
                }
            }
            Operation::QueryRealtyByOwner => Self::QueryRealtyByOwner(
                Args::exact(operation, args, 2)?.account("currentOwnerOrganization")?,
            ),
            Operation::FreezeRealty => {
                let mut a = Args::exact(operation, args, 2)?;
                Self::FreezeRealty {
                    realty_cert_hash: a.text(),
                    reason: a.text(),
                }
            }
            Operation::UnfreezeRealty => {
                let mut a = Args::between(operation, args, 1, 2)?;
                Self::UnfreezeRealty {
                    realty_cert_hash: a.text(),
                    reason: a.text(),
                }
            }

            Operation::CreateTransaction => {
                let mut a = Args::exact(operation, args, 10)?;
                Self::CreateTransaction(CreateTransaction {
                    realty_cert_hash: a.text(),
                    transaction_uuid: a.text(),
                    seller: a.account("sellerOrganization")?,
                    buyer: a.account("buyerOrganization")?,
                    contract_uuid: a.text(),
                    payment_uuids: a.list("paymentUUIDList")?,
                    tax: a.parse("tax")?,
                    price: a.parse("price")?,
                })
            }
            Operation::CheckTransaction | Operation::UpdateTransaction => {
                let mut a = Args::exact(operation, args, 2)?;
                let transaction_uuid = a.text();
                let status = a.parse("status")?;
                if operation == Operation::CheckTransaction {
                    Self::CheckTransaction {
                        transaction_uuid,
                        status,
                    }
                } else {
                    Self::UpdateTransaction {
                        transaction_uuid,
                        status,
                    }
                }
            }
            Operation::CompleteTransaction => {
                Self::CompleteTransaction(Args::exact(operation, args, 1)?.text())
            }
            Operation::QueryTransaction => {
                Self::QueryTransaction(Args::exact(operation, args, 1)?.text())
            }
            Operation::QueryTransactionList => {
                let mut a = Args::between(operation, args, 0, 2)?;
                Self::QueryTransactionList {
                    page_size: a.page_size()?,
                    bookmark: a.text(),
                }
            }

            Operation::CreatePayment => {
                let mut a = Args::exact(operation, args, 7)?;
                Self::CreatePayment(CreatePayment {
                    payment_uuid: a.text(),
                    amount: a.parse("amount")?,
                    from: a.account("fromOrganization")?,
                    to: a.account("toOrganization")?,
                    payment_type: a.parse("paymentType")?,
                })
            }
            Operation::PayForTransaction => {
                let mut a = Args::exact(operation, args, 8)?;
                let transaction_uuid = a.text();
                let payment_uuid = a.text();
                let payment_type = a.parse("paymentType")?;
                let amount = a.parse("amount")?;
                Self::PayForTransaction(PayForTransaction {
                    transaction_uuid,
                    payment: CreatePayment {
                        payment_uuid,
                        amount,
                        from: a.account("fromOrganization")?,
                        to: a.account("toOrganization")?,
                        payment_type,
                    },
                })
            }
            Operation::QueryPayment => Self::QueryPayment(Args::exact(operation, args, 1)?.text()),
            Operation::QueryPaymentsByTransaction => {
                Self::QueryPaymentsByTransaction(Args::exact(operation, args, 1)?.text())
            }

            Operation::CreateContract => {
                let mut a = Args::between(operation, args, 4, 5)?;
                Self::CreateContract(CreateContract {
                    contract_uuid: a.text(),
                    doc_hash: a.text(),
                    contract_type: a.text(),
                    creator_citizen_id_hash: a.text(),
                    transaction_uuid: non_empty(a.text()),
                })
            }
            Operation::QueryContract => {
                Self::QueryContract(Args::exact(operation, args, 1)?.text())
            }
            Operation::UpdateContractStatus => {
                let mut a = Args::exact(operation, args, 2)?;
                Self::UpdateContractStatus {
                    contract_uuid: a.text(),
                    status: a.parse("status")?,
                }
            }
            Operation::UpdateContract => {
                let mut a = Args::exact(operation, args, 3)?;
                Self::UpdateContract(UpdateContract {
                    contract_uuid: a.text(),
                    doc_hash: a.text(),
                    contract_type: a.text(),
                })
            }

            Operation::CreateMortgage => {
                let mut a = Args::exact(operation, args, 7)?;
                Self::CreateMortgage(CreateMortgage {
                    mortgage_uuid: a.text(),
                    realty_cert_hash: a.text(),
                    borrower: a.account("borrowerOrganization")?,
                    loan_amount: a.parse("loanAmount")?,
                    interest_rate_bps: a.number("interestRateBps")?,
                    term_months: a.number("termMonths")?,
                })
            }
            Operation::ApproveMortgage => {
                Self::ApproveMortgage(Args::exact(operation, args, 1)?.text())
            }
            Operation::CloseMortgage => Self::CloseMortgage(Args::exact(operation, args, 1)?.text()),
            Operation::QueryMortgage => Self::QueryMortgage(Args::exact(operation, args, 1)?.text()),

            Operation::CreateTax => {
                let mut a = Args::between(operation, args, 3, 4)?;
                Self::CreateTax(CreateTax {
                    tax_uuid: a.text(),
                    transaction_uuid: a.text(),
                    tax_type: a.text(),
                    collector_citizen_id_hash: non_empty(a.text()),
                })
            }
            Operation::PayTax => Self::PayTax(Args::exact(operation, args, 1)?.text()),
            Operation::VerifyTaxPayment => {
                Self::VerifyTaxPayment(Args::exact(operation, args, 1)?.text())
            }
            Operation::QueryTax => Self::QueryTax(Args::exact(operation, args, 1)?.text()),

            Operation::AuditTransaction => {
                let mut a = Args::between(operation, args, 5, 6)?;
                Self::AuditTransaction(AuditTransaction {
                    transaction_uuid: a.text(),
                    result: a.text(),
                    comments: a.text(),
                    violations: a.list("violations")?,
                    recommendations: a.list("recommendations")?,
                    current_status: a.optional("currentStatus")?,
                })
            }
            Operation::AddAuditLog => {
                let mut a = Args::exact(operation, args, 10)?;
                Self::AddAuditLog(AddAuditLog {
                    audit_id: a.text(),
                    target_type: a.parse("targetType")?,
                    target_id: a.text(),
                    result: a.text(),
                    comments: a.text(),
                    violations: a.list("violations")?,
                    recommendations: a.list("recommendations")?,
                    related_documents: a.list("relatedDocuments")?,
                    previous_status: a.text(),
                    current_status: a.text(),
                })
            }
            Operation::GetAuditLogs | Operation::QueryAuditHistory => {
                let mut a = Args::between(operation, args, 1, 2)?;
                let target_id = a.text();
                let target_type = a.optional("targetType")?;
                if operation == Operation::GetAuditLogs {
                    Self::GetAuditLogs {
                        target_id,
                        target_type,
                    }
                } else {
                    Self::QueryAuditHistory {
                        target_id,
                        target_type,
                    }
                }
            }
            Operation::AnalyzeAuditRecords => Self::AnalyzeAuditRecords(
                Args::between(operation, args, 0, 1)?.optional("targetType")?,
            ),
            Operation::QueryProvenance => {
                let mut a = Args::exact(operation, args, 2)?;
                Self::QueryProvenance {
                    doc_type: a.parse("docType")?,
                    entity_id: a.text(),
                }
            }
        };
        Ok(request)
    }
}

/// Cursor over positional arguments. Missing trailing optional arguments
/// read as empty strings.
struct Args<'a> {
    args: &'a [String],
    pos: usize,
}

impl<'a> Args<'a> {
    fn exact(operation: Operation, args: &'a [String], count: usize) -> ContractResult<Self> {
        Self::between(operation, args, count, count)
    }

    fn between(
        operation: Operation,
        args: &'a [String],
        min: usize,
        max: usize,
    ) -> ContractResult<Self> {
        if args.len() < min || args.len() > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{min} to {max}")
            };
            return Err(ContractError::validation(format!(
                "{operation} expects {expected} arguments, got {}",
                args.len()
            )));
        }
        Ok(Self { args, pos: 0 })
    }

    fn text(&mut self) -> String {
        let value = self
            .args
            .get(self.pos)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        self.pos += 1;
        value
    }

    fn parse<T: FromStr<Err = TypeError>>(&mut self, name: &str) -> ContractResult<T> {
        let raw = self.text();
        raw.parse()
            .map_err(|e| ContractError::validation(format!("{name}: {e}")))
    }

    /// Empty means "not given".
    fn optional<T: FromStr<Err = TypeError>>(&mut self, name: &str) -> ContractResult<Option<T>> {
        match non_empty(self.text()) {
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|e| ContractError::validation(format!("{name}: {e}"))),
            None => Ok(None),
        }
    }

    /// `(citizenIDHash, organization)` pair.
    fn account(&mut self, org_name: &str) -> ContractResult<AccountRef> {
        let hash = self.text();
        let organization = self.parse(org_name)?;
        Ok(AccountRef::new(hash, organization))
    }

    /// A JSON array of strings. An empty argument is malformed.
    fn list(&mut self, name: &str) -> ContractResult<Vec<String>> {
        let raw = self.text();
        parse_list(name, &raw)
    }

    fn optional_list(&mut self, name: &str) -> ContractResult<Option<Vec<String>>> {
        match non_empty(self.text()) {
            Some(raw) => parse_list(name, &raw).map(Some),
            None => Ok(None),
        }
    }

    /// A plain unsigned count such as a term or a rate.
    fn number(&mut self, name: &str) -> ContractResult<u32> {
        let raw = self.text();
        raw.parse()
            .map_err(|e| ContractError::validation(format!("{name}: {e}")))
    }

    fn page_size(&mut self) -> ContractResult<usize> {
        match non_empty(self.text()) {
            Some(raw) => raw
                .parse()
                .map_err(|e| ContractError::validation(format!("pageSize: {e}"))),
            None => Ok(0),
        }
    }
}

fn parse_list(name: &str, raw: &str) -> ContractResult<Vec<String>> {
    if raw.is_empty() {
        return Err(ContractError::validation(format!(
            "{name}: expected a JSON list, got an empty argument"
        )));
    }
    serde_json::from_str(raw)
        .map_err(|e| ContractError::validation(format!("{name}: invalid JSON list: {e}")))
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(function: &str, args: &[&str]) -> ContractResult<Request> {
        Request::parse(&Invocation::new(function, args.iter().copied()))
    }

    #[test]
    fn unknown_function_is_validation_error() {
        let err = parse("DropTables", &[]).unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
        assert!(err.to_string().contains("DropTables"));
    }

    #[test]
    fn arity_is_checked() {
        let err = parse("QueryRealty", &[]).unwrap_err();
        assert!(err.to_string().contains("expects 1 arguments, got 0"));
        assert!(parse("QueryRealty", &["C1", "extra"]).is_err());
        assert!(parse("QueryRealtyList", &[]).is_ok());
        assert!(parse("QueryRealtyList", &["5", "", "x"]).is_err());
    }

    #[test]
    fn register_defaults_role_status_and_balance() {
        let req = parse(
            "Register",
            &["h1", "110", "Alice", "", "", "pw", "InvestorMSP", "", "", ""],
        )
        .unwrap();
        let Request::Register(r) = req else {
            panic!("wrong variant")
        };
        assert_eq!(r.role, Role::Investor);
        assert_eq!(r.status, UserStatus::Active);
        assert_eq!(r.balance, Amount::ZERO);
    }

    #[test]
    fn create_transaction_parses_amounts_and_list() {
        let req = parse(
            "CreateTransaction",
            &[
                "C1",
                "T1",
                "H1",
                "InvestorMSP",
                "H2",
                "InvestorMSP",
                "K1",
                "[]",
                "5",
                "100",
            ],
        )
        .unwrap();
        assert_eq!(req.operation(), Operation::CreateTransaction);
        let Request::CreateTransaction(t) = req else {
            panic!("wrong variant")
        };
        assert_eq!(t.price, Amount::new(100));
        assert_eq!(t.seller, AccountRef::new("H1", Organization::Investor));
        assert!(t.payment_uuids.is_empty());
    }

    #[test]
    fn malformed_values_name_the_argument() {
        let err = parse(
            "CreateTransaction",
            &["C1", "T1", "H1", "InvestorMSP", "H2", "InvestorMSP", "", "", "0", "100"],
        )
        .unwrap_err();
        assert!(err.to_string().contains("paymentUUIDList"));

        let err = parse("CheckTransaction", &["T1", "DONE"]).unwrap_err();
        assert!(err.to_string().contains("status"));

        let err = parse(
            "CreatePayment",
            &["P1", "-5", "H2", "InvestorMSP", "H1", "InvestorMSP", "CASH"],
        )
        .unwrap_err();
        assert!(err.to_string().contains("amount"));
    }

    #[test]
    fn update_realty_empty_fields_mean_unchanged() {
        let req = parse("UpdateRealty", &["C1", "", "MORTGAGED", "", "", ""]).unwrap();
        let Request::UpdateRealty(u) = req else {
            panic!("wrong variant")
        };
        assert_eq!(u.status, Some(RealtyStatus::Mortgaged));
        assert_eq!(u.realty_type, None);
        assert_eq!(u.owner_citizen_id_hash, None);
        assert_eq!(u.previous_owners, None);
    }

    #[test]
    fn mortgage_terms_must_be_whole_numbers() {
        let req = parse(
            "CreateMortgage",
            &["M1", "C1", "H1", "InvestorMSP", "5000", "350", "240"],
        )
        .unwrap();
        let Request::CreateMortgage(m) = req else {
            panic!("wrong variant")
        };
        assert_eq!(m.loan_amount, Amount::new(5000));
        assert_eq!(m.interest_rate_bps, 350);
        assert_eq!(m.term_months, 240);

        let err = parse(
            "CreateMortgage",
            &["M1", "C1", "H1", "InvestorMSP", "5000", "3.5", "240"],
        )
        .unwrap_err();
        assert!(err.to_string().contains("interestRateBps"));
    }

    #[test]
    fn tax_collector_is_optional() {
        let Request::CreateTax(t) = parse("CreateTax", &["X1", "T1", "DEED"]).unwrap() else {
            panic!("wrong variant")
        };
        assert_eq!(t.collector_citizen_id_hash, None);
        let Request::CreateTax(t) = parse("CreateTax", &["X1", "T1", "DEED", "G1"]).unwrap() else {
            panic!("wrong variant")
        };
        assert_eq!(t.collector_citizen_id_hash.as_deref(), Some("G1"));
    }

    #[test]
    fn audit_aliases_share_arguments() {
        let a = parse("GetAuditLogs", &["T1"]).unwrap();
        let b = parse("QueryAuditHistory", &["T1", "TX"]).unwrap();
        assert_eq!(
            a,
            Request::GetAuditLogs {
                target_id: "T1".into(),
                target_type: None
            }
        );
        assert_eq!(
            b,
            Request::QueryAuditHistory {
                target_id: "T1".into(),
                target_type: Some(DocType::Transaction)
            }
        );
    }

    #[test]
    fn every_operation_has_a_parser() {
        for op in Operation::ALL {
            let err = Request::parse(&Invocation::new(op.as_str(), ["x"; 11]));
            // Too many arguments for every operation; never "unknown function".
            let err = err.unwrap_err().to_string();
            assert!(!err.contains("unknown function"), "{op}: {err}");
        }
    }
}
