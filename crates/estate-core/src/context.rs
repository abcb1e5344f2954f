use estate_gate::{CallerIdentity, Operation};
use estate_store::{Bookmark, Page, PageRequest, StoreTransaction, WriteSet};
use estate_types::{Collection, CompositeKey, Organization, Timestamp};

use crate::config::LedgerConfig;
use crate::error::ContractResult;

/// Everything one invocation may touch.
///
/// Services receive the context explicitly; there is no global state. The
/// timestamp is read once so every document written by the invocation
/// carries the same instant.
pub struct InvocationContext<'a> {
    pub(crate) txn: StoreTransaction<'a>,
    caller: CallerIdentity,
    organization: Organization,
    operation: Operation,
    now: Timestamp,
    config: &'a LedgerConfig,
}

impl<'a> InvocationContext<'a> {
    pub fn new(
        txn: StoreTransaction<'a>,
        caller: CallerIdentity,
        operation: Operation,
        now: Timestamp,
        config: &'a LedgerConfig,
    ) -> Self {
        Self {
            organization: txn.organization(),
            txn,
            caller,
            operation,
            now,
            config,
        }
    }

    pub fn organization(&self) -> Organization {
        self.organization
    }

    /// The operation the caller invoked. Cascades keep reporting the entry
    /// operation.
    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn caller(&self) -> &CallerIdentity {
        &self.caller
    }

    pub fn client_id(&self) -> String {
        self.caller.client_id()
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    pub fn tx_id(&self) -> String {
        self.txn.tx_id().to_string()
    }

    pub fn config(&self) -> &LedgerConfig {
        self.config
    }

    /// Build a page request from caller arguments.
    pub fn page_request(&self, page_size: usize, bookmark: &str) -> ContractResult<PageRequest> {
        let size = self.config.page_size(page_size);
        Ok(match Bookmark::parse(bookmark)? {
            Some(b) => PageRequest::after(size, b),
            None => PageRequest::first(size),
        })
    }

    /// Every shared record under `partial`, fetched page by page.
    pub fn scan_all_shared(
        &mut self,
        partial: &CompositeKey,
    ) -> ContractResult<Vec<(CompositeKey, Vec<u8>)>> {
        self.scan_all(None, partial)
    }

    /// Every record under `partial` in a private collection.
    pub fn scan_all_private(
        &mut self,
        collection: Collection,
        partial: &CompositeKey,
    ) -> ContractResult<Vec<(CompositeKey, Vec<u8>)>> {
        self.scan_all(Some(collection), partial)
    }

    fn scan_all(
        &mut self,
        collection: Option<Collection>,
        partial: &CompositeKey,
    ) -> ContractResult<Vec<(CompositeKey, Vec<u8>)>> {
        let size = self.config.max_page_size;
        let mut request = PageRequest::first(size);
        let mut out = Vec::new();
        loop {
            let page: Page<_> = match collection {
                Some(c) => self.txn.scan_private(c, partial, &request)?,
                None => self.txn.scan_shared(partial, &request)?,
            };
            out.extend(page.records);
            match page.bookmark {
                Some(b) => request = PageRequest::after(size, b),
                None => return Ok(out),
            }
        }
    }

    pub fn into_write_set(self) -> WriteSet {
        self.txn.into_write_set(self.operation.as_str())
    }
}
