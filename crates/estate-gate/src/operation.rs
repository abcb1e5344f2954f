use std::fmt;
use std::str::FromStr;

use estate_types::{Organization, TypeError};
use serde::{Deserialize, Serialize};

/// Functional area an operation belongs to; used to scope policies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Module {
    Users,
    Realty,
    Transactions,
    Payments,
    Contracts,
    Mortgages,
    Taxes,
    Audit,
}

use estate_types::Organization::{
    Audit as AUD, Bank as BNK, Government as GOV, Investor as INV, Sysadmin as SYS,
    ThirdParty as TPY,
};

const ANY: &[Organization] = &[GOV, BNK, INV, AUD, TPY, SYS];

/// Declares the operation catalogue: wire name, module, default allow-list and
/// whether the operation only reads.
macro_rules! operations {
    (
        $( $(#[$doc:meta])* $variant:ident => $name:literal, $module:ident, $allowed:expr, $query:literal; )+
    ) => {
        /// Every named operation the contract layer exposes.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum Operation {
            $( $(#[$doc])* #[serde(rename = $name)] $variant, )+
        }

        impl Operation {
            pub const ALL: &'static [Self] = &[ $( Self::$variant ),+ ];

            /// Name callers invoke the operation by.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $name, )+
                }
            }

            pub fn module(&self) -> Module {
                match self {
                    $( Self::$variant => Module::$module, )+
                }
            }

            /// Organizations allowed to invoke the operation.
            pub fn allowed_organizations(&self) -> &'static [Organization] {
                match self {
                    $( Self::$variant => $allowed, )+
                }
            }

            /// Returns `true` if the operation never writes state.
            pub fn is_query(&self) -> bool {
                match self {
                    $( Self::$variant => $query, )+
                }
            }
        }

        impl FromStr for Operation {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $( $name => Ok(Self::$variant), )+
                    other => Err(TypeError::UnknownVariant {
                        kind: "operation",
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

operations! {
    // Users
    Register => "Register", Users, ANY, false;
    UpdateUser => "UpdateUser", Users, ANY, false;
    GetUserByCitizenIdAndOrganization => "GetUserByCitizenIDAndOrganization", Users, ANY, true;
    ListUsersByOrganization => "ListUsersByOrganization", Users, ANY, true;
    /// Further restricted to the user's own organization, banks and government.
    GetBalance => "GetBalance", Users, ANY, true;
    /// Seeds the bootstrap user.
    InitLedger => "InitLedger", Users, &[GOV], false;

    // Realty
    CreateRealty => "CreateRealty", Realty, &[GOV], false;
    UpdateRealty => "UpdateRealty", Realty, &[GOV, INV], false;
    QueryRealty => "QueryRealty", Realty, ANY, true;
    QueryRealtyList => "QueryRealtyList", Realty, ANY, true;
    QueryRealtyByOwner => "QueryRealtyByOwner", Realty, &[GOV, BNK, INV, AUD], true;
    FreezeRealty => "FreezeRealty", Realty, &[GOV, AUD], false;
    UnfreezeRealty => "UnfreezeRealty", Realty, &[GOV], false;

    // Transactions
    CreateTransaction => "CreateTransaction", Transactions, &[INV, GOV], false;
    CheckTransaction => "CheckTransaction", Transactions, &[INV, GOV], false;
    UpdateTransaction => "UpdateTransaction", Transactions, &[INV, GOV], false;
    CompleteTransaction => "CompleteTransaction", Transactions, &[INV, GOV], false;
    QueryTransaction => "QueryTransaction", Transactions, &[INV, GOV, AUD], true;
    QueryTransactionList => "QueryTransactionList", Transactions, &[INV, GOV, AUD], true;

    // Payments
    CreatePayment => "CreatePayment", Payments, &[BNK, INV], false;
    PayForTransaction => "PayForTransaction", Payments, &[BNK, INV], false;
    QueryPayment => "QueryPayment", Payments, &[BNK, INV, GOV, AUD], true;
    QueryPaymentsByTransaction => "QueryPaymentsByTransaction", Payments, &[BNK, INV, GOV, AUD], true;

    // Contracts
    CreateContract => "CreateContract", Contracts, &[INV, GOV], false;
    QueryContract => "QueryContract", Contracts, &[INV, GOV, AUD], true;
    UpdateContractStatus => "UpdateContractStatus", Contracts, &[INV, GOV, AUD], false;
    UpdateContract => "UpdateContract", Contracts, &[INV, GOV, AUD], false;

    // Mortgages
    CreateMortgage => "CreateMortgage", Mortgages, &[BNK], false;
    /// Puts the realty under MORTGAGED.
    ApproveMortgage => "ApproveMortgage", Mortgages, &[BNK], false;
    CloseMortgage => "CloseMortgage", Mortgages, &[BNK, GOV], false;
    QueryMortgage => "QueryMortgage", Mortgages, &[BNK, GOV, INV, AUD], true;

    // Taxes
    CreateTax => "CreateTax", Taxes, &[GOV], false;
    PayTax => "PayTax", Taxes, &[INV, BNK], false;
    VerifyTaxPayment => "VerifyTaxPayment", Taxes, &[GOV, AUD], false;
    QueryTax => "QueryTax", Taxes, &[GOV, BNK, INV, AUD], true;

    // Audit
    AuditTransaction => "AuditTransaction", Audit, &[AUD, GOV], false;
    /// Appending is open; cascading a status is checked by the audit service.
    AddAuditLog => "AddAuditLog", Audit, ANY, false;
    GetAuditLogs => "GetAuditLogs", Audit, &[AUD, GOV, SYS], true;
    QueryAuditHistory => "QueryAuditHistory", Audit, &[AUD, GOV, SYS], true;
    AnalyzeAuditRecords => "AnalyzeAuditRecords", Audit, &[AUD, GOV, SYS], true;
    QueryProvenance => "QueryProvenance", Audit, &[AUD, GOV, SYS], true;
}

impl Operation {
    pub fn allows(&self, organization: Organization) -> bool {
        self.allowed_organizations().contains(&organization)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_roundtrip() {
        for op in Operation::ALL {
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), *op);
        }
    }

    #[test]
    fn wire_name_keeps_id_capitalization() {
        assert_eq!(
            "GetUserByCitizenIDAndOrganization".parse::<Operation>().unwrap(),
            Operation::GetUserByCitizenIdAndOrganization
        );
        assert!("getuser".parse::<Operation>().is_err());
    }

    #[test]
    fn allow_lists_match_access_table() {
        assert_eq!(Operation::CreateRealty.allowed_organizations(), &[GOV]);
        assert!(Operation::PayForTransaction.allows(BNK));
        assert!(!Operation::PayForTransaction.allows(GOV));
        assert!(Operation::UpdateContractStatus.allows(AUD));
        assert!(!Operation::CreateContract.allows(AUD));
        assert!(Operation::GetAuditLogs.allows(SYS));
        assert!(!Operation::GetAuditLogs.allows(INV));
        assert_eq!(Operation::ApproveMortgage.allowed_organizations(), &[BNK]);
        assert!(Operation::CloseMortgage.allows(GOV));
        assert!(!Operation::CreateTax.allows(INV));
        assert!(Operation::VerifyTaxPayment.allows(AUD));
    }

    #[test]
    fn queries_are_flagged() {
        assert!(Operation::QueryRealty.is_query());
        assert!(!Operation::PayForTransaction.is_query());
        assert_eq!(Operation::QueryPayment.module(), Module::Payments);
        assert!(Operation::QueryTax.is_query());
        assert!(!Operation::PayTax.is_query());
        assert_eq!(Operation::CloseMortgage.module(), Module::Mortgages);
    }
}
