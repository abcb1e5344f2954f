wire_enum! {
    /// Whether a registered user may take part in operations.
    pub enum UserStatus as "user status" {
        Active => "ACTIVE",
        Disabled => "DISABLED",
    }
}

wire_enum! {
    /// Kind of property recorded on a realty certificate.
    pub enum RealtyType as "realty type" {
        House => "HOUSE",
        Shop => "SHOP",
        Office => "OFFICE",
        Industrial => "INDUSTRIAL",
        Other => "OTHER",
    }
}

wire_enum! {
    /// Public status of a realty record.
    pub enum RealtyStatus as "realty status" {
        Normal => "NORMAL",
        /// Referenced by an open sale transaction.
        InTransaction => "IN_TRANSACTION",
        Mortgaged => "MORTGAGED",
        /// Rejects every owner-mutating write until unfrozen.
        Frozen => "FROZEN",
    }
}

impl RealtyStatus {
    /// Returns `true` if a new sale transaction may reference this realty.
    pub fn is_available_for_sale(&self) -> bool {
        matches!(self, Self::Normal)
    }
}

wire_enum! {
    /// Sale transaction lifecycle.
    ///
    /// ```text
    /// PENDING -> IN_PROGRESS -> APPROVED -> COMPLETED
    ///    |            |            |
    ///    +------------+------------+----> REJECTED
    /// ```
    ///
    /// PENDING may also jump straight to APPROVED, and IN_PROGRESS straight
    /// to COMPLETED. Nothing ever moves backwards.
    pub enum TransactionStatus as "transaction status" {
        Pending => "PENDING",
        InProgress => "IN_PROGRESS",
        Approved => "APPROVED",
        Rejected => "REJECTED",
        Completed => "COMPLETED",
    }
}

impl TransactionStatus {
    /// Position in the forward order. Terminal states share the top rank.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::InProgress => 1,
            Self::Approved => 2,
            Self::Rejected | Self::Completed => 3,
        }
    }

    /// Returns `true` for COMPLETED and REJECTED.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }

    /// Returns `true` if the transaction has been accepted for settlement.
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::InProgress | Self::Approved)
    }

    /// Whether moving from `self` to `next` is a legal forward step.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Pending => false,
            Self::Rejected => true,
            Self::Completed => self.is_approved(),
            _ => next.rank() > self.rank(),
        }
    }
}

wire_enum! {
    /// Settlement instrument of a payment.
    pub enum PaymentType as "payment type" {
        Cash => "CASH",
        Loan => "LOAN",
        Transfer => "TRANSFER",
    }
}

wire_enum! {
    /// Contract lifecycle status.
    pub enum ContractStatus as "contract status" {
        Normal => "NORMAL",
        /// No further status changes are accepted.
        Frozen => "FROZEN",
        Completed => "COMPLETED",
    }
}

wire_enum! {
    /// Mortgage lifecycle: PENDING -> APPROVED -> CLOSED.
    pub enum MortgageStatus as "mortgage status" {
        Pending => "PENDING",
        /// The realty is held as MORTGAGED while the loan is open.
        Approved => "APPROVED",
        Closed => "CLOSED",
    }
}

wire_enum! {
    /// Tax lifecycle: UNPAID -> PAID -> VERIFIED.
    pub enum TaxStatus as "tax status" {
        Unpaid => "UNPAID",
        Paid => "PAID",
        Verified => "VERIFIED",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // -----------------------------------------------------------------------
    // Transaction state machine
    // -----------------------------------------------------------------------

    #[test]
    fn pending_transitions() {
        let s = TransactionStatus::Pending;
        assert!(s.can_transition_to(TransactionStatus::InProgress));
        assert!(s.can_transition_to(TransactionStatus::Approved));
        assert!(s.can_transition_to(TransactionStatus::Rejected));
        assert!(!s.can_transition_to(TransactionStatus::Completed));
        assert!(!s.can_transition_to(TransactionStatus::Pending));
    }

    #[test]
    fn approved_can_complete_or_reject() {
        for s in [TransactionStatus::InProgress, TransactionStatus::Approved] {
            assert!(s.can_transition_to(TransactionStatus::Completed));
            assert!(s.can_transition_to(TransactionStatus::Rejected));
        }
        assert!(!TransactionStatus::Approved.can_transition_to(TransactionStatus::InProgress));
    }

    #[test]
    fn terminal_states_are_final() {
        for s in [TransactionStatus::Completed, TransactionStatus::Rejected] {
            assert!(s.is_terminal());
            for next in TransactionStatus::ALL {
                assert!(!s.can_transition_to(*next));
            }
        }
    }

    proptest! {
        #[test]
        fn transitions_never_regress(from in 0usize..5, to in 0usize..5) {
            let from = TransactionStatus::ALL[from];
            let to = TransactionStatus::ALL[to];
            if from.can_transition_to(to) {
                prop_assert!(to.rank() > from.rank());
            }
        }
    }

    // -----------------------------------------------------------------------
    // Wire format
    // -----------------------------------------------------------------------

    #[test]
    fn parse_and_display_roundtrip() {
        for status in RealtyStatus::ALL {
            assert_eq!(status.to_string().parse::<RealtyStatus>().unwrap(), *status);
        }
        assert_eq!(" CASH ".parse::<PaymentType>().unwrap(), PaymentType::Cash);
    }

    #[test]
    fn unknown_status_is_an_error() {
        assert!("IN_SALE".parse::<RealtyStatus>().is_err());
        assert!("".parse::<ContractStatus>().is_err());
        assert_eq!("CLOSED".parse::<MortgageStatus>().unwrap(), MortgageStatus::Closed);
        assert!("OVERDUE".parse::<TaxStatus>().is_err());
    }

    #[test]
    fn only_normal_realty_is_for_sale() {
        assert!(RealtyStatus::Normal.is_available_for_sale());
        assert!(!RealtyStatus::Frozen.is_available_for_sale());
        assert!(!RealtyStatus::InTransaction.is_available_for_sale());
    }
}
