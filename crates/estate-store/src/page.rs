use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Opaque continuation token for a paginated scan.
///
/// The token is the hex encoding of the last key returned. A scan resumed
/// from a bookmark starts strictly after that key, so ordering is a function
/// of key layout rather than insertion time.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bookmark(String);

impl Bookmark {
    pub(crate) fn after_key(key: &str) -> Self {
        Self(hex::encode(key.as_bytes()))
    }

    /// Parse a caller-supplied token. Empty strings mean "from the start".
    pub fn parse(token: &str) -> StoreResult<Option<Self>> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(None);
        }
        let bookmark = Self(token.to_string());
        bookmark.resume_key()?;
        Ok(Some(bookmark))
    }

    /// The encoded key the next page must start after.
    pub(crate) fn resume_key(&self) -> StoreResult<String> {
        let bytes =
            hex::decode(&self.0).map_err(|e| StoreError::InvalidBookmark(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| StoreError::InvalidBookmark(e.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Bookmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bookmark({})", self.0)
    }
}

impl fmt::Display for Bookmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Page size and resume point of a scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page_size: usize,
    pub bookmark: Option<Bookmark>,
}

impl PageRequest {
    pub fn first(page_size: usize) -> Self {
        Self {
            page_size,
            bookmark: None,
        }
    }

    pub fn after(page_size: usize, bookmark: Bookmark) -> Self {
        Self {
            page_size,
            bookmark: Some(bookmark),
        }
    }
}

/// One page of scan results.
///
/// `bookmark` is present only when more records may follow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub records: Vec<T>,
    pub fetched_records_count: usize,
    pub bookmark: Option<Bookmark>,
}

impl<T> Page<T> {
    pub fn new(records: Vec<T>, bookmark: Option<Bookmark>) -> Self {
        Self {
            fetched_records_count: records.len(),
            records,
            bookmark,
        }
    }

    pub fn is_last(&self) -> bool {
        self.bookmark.is_none()
    }

    /// Convert every record, short-circuiting on the first error.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        let records = self.records.into_iter().map(f).collect::<Result<Vec<_>, E>>()?;
        Ok(Page::new(records, self.bookmark))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bookmark_roundtrip() {
        let b = Bookmark::after_key("\u{0}RE\u{0}C1\u{0}");
        let parsed = Bookmark::parse(b.as_str()).unwrap().unwrap();
        assert_eq!(parsed.resume_key().unwrap(), "\u{0}RE\u{0}C1\u{0}");
    }

    #[test]
    fn empty_bookmark_means_start() {
        assert!(Bookmark::parse("").unwrap().is_none());
        assert!(Bookmark::parse("   ").unwrap().is_none());
    }

    #[test]
    fn garbage_bookmark_is_rejected() {
        assert!(matches!(
            Bookmark::parse("not-hex"),
            Err(StoreError::InvalidBookmark(_))
        ));
        // Valid hex but not UTF-8.
        assert!(Bookmark::parse("ff").is_err());
    }

    #[test]
    fn try_map_keeps_bookmark() {
        let page = Page::new(vec![1, 2, 3], Some(Bookmark::after_key("k")));
        let mapped: Page<String> = page.try_map(|n| Ok::<_, ()>(n.to_string())).unwrap();
        assert_eq!(mapped.records, vec!["1", "2", "3"]);
        assert_eq!(mapped.fetched_records_count, 3);
        assert!(!mapped.is_last());
    }
}
