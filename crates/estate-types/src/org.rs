wire_enum! {
    /// Membership service provider identity of a participating organization.
    ///
    /// This is the only input to authorization decisions. It is supplied by
    /// the hosting platform per invocation and never read from payloads.
    pub enum Organization as "organization" {
        /// Land registry; owns realty registration.
        Government => "GovernmentMSP",
        Bank => "BankMSP",
        /// Investment and agency firms acting for buyers and sellers.
        Investor => "InvestorMSP",
        Audit => "AuditMSP",
        ThirdParty => "ThirdpartyMSP",
        /// Platform operators; read access to audit trails.
        Sysadmin => "SysadminMSP",
    }
}

impl Organization {
    /// The role a user registered under this organization holds by default.
    pub fn default_role(&self) -> Role {
        match self {
            Self::Government => Role::Government,
            Self::Bank => Role::Bank,
            Self::Investor => Role::Investor,
            Self::Audit => Role::Auditor,
            Self::ThirdParty => Role::ThirdParty,
            Self::Sysadmin => Role::Sysadmin,
        }
    }
}

wire_enum! {
    /// Role of a registered user inside their organization.
    pub enum Role as "role" {
        Government => "GOVERNMENT",
        Bank => "BANK",
        Investor => "INVESTOR",
        ThirdParty => "THIRD_PARTY",
        Auditor => "AUDITOR",
        Sysadmin => "SYSADMIN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn organization_wire_names() {
        assert_eq!(Organization::Government.as_str(), "GovernmentMSP");
        assert_eq!(
            "ThirdpartyMSP".parse::<Organization>().unwrap(),
            Organization::ThirdParty
        );
        assert_eq!(Organization::ALL.len(), 6);
    }

    #[test]
    fn unknown_organization_is_rejected() {
        let err = "EvilMSP".parse::<Organization>().unwrap_err();
        assert_eq!(
            err,
            crate::TypeError::UnknownVariant {
                kind: "organization",
                value: "EvilMSP".into()
            }
        );
    }

    #[test]
    fn default_roles() {
        assert_eq!(Organization::Audit.default_role(), Role::Auditor);
        assert_eq!(Organization::Bank.default_role(), Role::Bank);
    }

    #[test]
    fn serde_uses_wire_name() {
        let json = serde_json::to_string(&Organization::Investor).unwrap();
        assert_eq!(json, "\"InvestorMSP\"");
        let role: Role = serde_json::from_str("\"THIRD_PARTY\"").unwrap();
        assert_eq!(role, Role::ThirdParty);
    }
}
