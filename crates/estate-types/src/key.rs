use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::org::Organization;

/// Separator between the components of an encoded composite key.
const SEPARATOR: char = '\u{0}';

wire_enum! {
    /// Record namespace; the first component of every composite key.
    pub enum DocType as "doc type" {
        User => "US",
        Realty => "RE",
        Transaction => "TX",
        Payment => "PT",
        Contract => "CT",
        Mortgage => "MG",
        Tax => "TA",
        Audit => "AD",
        /// Append-only provenance entries for other documents.
        Provenance => "PV",
    }
}

wire_enum! {
    /// Named private partition. Only member organizations may read or write it.
    pub enum Collection as "collection" {
        UserData => "UserDataCollection",
        RealEstatePrivate => "RealEstatePrivateCollection",
        TransactionPrivate => "TransactionPrivateCollection",
    }
}

impl Collection {
    /// Organizations replicated into this partition unless overridden.
    pub fn default_members(&self) -> &'static [Organization] {
        use Organization::*;
        match self {
            Self::UserData => &[Government, Bank, Investor, Audit, ThirdParty, Sysadmin],
            Self::RealEstatePrivate => &[Government, Bank, Investor, Audit],
            Self::TransactionPrivate => &[Government, Bank, Investor, Audit],
        }
    }
}

// ---------------------------------------------------------------------------
// CompositeKey
// ---------------------------------------------------------------------------

/// Typed storage key of the form `(DocType, [attribute, ...])`.
///
/// The encoded form is `\0<doctype>\0<attr1>\0<attr2>\0...`. Every component
/// is terminated by the separator, so the encoding of a partial key (a prefix
/// of the attribute list) is a string prefix of every full key it covers.
/// Range scans rely on this.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompositeKey {
    doc_type: DocType,
    attributes: Vec<String>,
}

impl CompositeKey {
    /// Build a key, rejecting empty attributes and attributes that contain the
    /// separator.
    pub fn new<I, S>(doc_type: DocType, attributes: I) -> Result<Self, TypeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let attributes: Vec<String> = attributes.into_iter().map(Into::into).collect();
        for (i, attr) in attributes.iter().enumerate() {
            if attr.is_empty() {
                return Err(TypeError::InvalidKey(format!(
                    "{doc_type} attribute {i} is empty"
                )));
            }
            if attr.contains(SEPARATOR) {
                return Err(TypeError::InvalidKey(format!(
                    "{doc_type} attribute {i} contains the key separator"
                )));
            }
        }
        Ok(Self {
            doc_type,
            attributes,
        })
    }

    /// A key with no attributes, covering the whole namespace.
    pub fn namespace(doc_type: DocType) -> Self {
        Self {
            doc_type,
            attributes: Vec::new(),
        }
    }

    pub fn user(citizen_id_hash: &str, organization: Organization) -> Result<Self, TypeError> {
        Self::new(DocType::User, [citizen_id_hash, organization.as_str()])
    }

    pub fn realty(realty_cert_hash: &str) -> Result<Self, TypeError> {
        Self::new(DocType::Realty, [realty_cert_hash])
    }

    pub fn transaction(transaction_uuid: &str) -> Result<Self, TypeError> {
        Self::new(DocType::Transaction, [transaction_uuid])
    }

    pub fn payment(payment_uuid: &str) -> Result<Self, TypeError> {
        Self::new(DocType::Payment, [payment_uuid])
    }

    pub fn contract(contract_uuid: &str) -> Result<Self, TypeError> {
        Self::new(DocType::Contract, [contract_uuid])
    }

    pub fn mortgage(mortgage_uuid: &str) -> Result<Self, TypeError> {
        Self::new(DocType::Mortgage, [mortgage_uuid])
    }

    pub fn tax(tax_uuid: &str) -> Result<Self, TypeError> {
        Self::new(DocType::Tax, [tax_uuid])
    }

    /// Audit entries are keyed by target first so history scans per target.
    pub fn audit(target_id: &str, audit_id: &str) -> Result<Self, TypeError> {
        Self::new(DocType::Audit, [target_id, audit_id])
    }

    /// Provenance entry for `action` on `(doc_type, entity_id)` made by
    /// invocation `tx_id`.
    pub fn provenance(
        doc_type: DocType,
        entity_id: &str,
        action: &str,
        tx_id: &str,
    ) -> Result<Self, TypeError> {
        Self::new(
            DocType::Provenance,
            [doc_type.as_str(), entity_id, action, tx_id],
        )
    }

    pub fn doc_type(&self) -> DocType {
        self.doc_type
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Encode to the flat string stored by the ledger.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(
            2 + self.doc_type.as_str().len()
                + self.attributes.iter().map(|a| a.len() + 1).sum::<usize>(),
        );
        out.push(SEPARATOR);
        out.push_str(self.doc_type.as_str());
        out.push(SEPARATOR);
        for attr in &self.attributes {
            out.push_str(attr);
            out.push(SEPARATOR);
        }
        out
    }

    /// Parse an encoded key back into its components.
    pub fn decode(encoded: &str) -> Result<Self, TypeError> {
        let body = encoded
            .strip_prefix(SEPARATOR)
            .and_then(|s| s.strip_suffix(SEPARATOR))
            .ok_or_else(|| TypeError::InvalidKey("missing key separators".into()))?;
        let mut parts = body.split(SEPARATOR);
        let doc_type: DocType = parts
            .next()
            .ok_or_else(|| TypeError::InvalidKey("missing doc type".into()))?
            .parse()?;
        Self::new(doc_type, parts)
    }

    /// Returns `true` if `self`, read as a partial key, covers `other`.
    pub fn is_prefix_of(&self, other: &CompositeKey) -> bool {
        self.doc_type == other.doc_type && other.attributes.starts_with(&self.attributes)
    }
}

impl fmt::Debug for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompositeKey({self})")
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.doc_type, self.attributes.join(","))
    }
}
