//! Sorted variable registry with GETNEXT/GETBULK traversal.

use crate::error::{ConfigErrorKind, Error, Result};
use crate::oid::Oid;

use super::VariableControl;

/// The variables of one scope, kept in OID order.
///
/// Built once and read-only afterwards. Ordering is numeric arc by arc, so
/// `1.3.6.1.2` < `1.3.6.1.2.1` < `1.3.6.1.10`.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Vec<VariableControl>,
}

impl Registry {
    /// Sort `entries` by OID. Fails if an OID appears twice or would not
    /// survive BER encoding.
    pub fn new(mut entries: Vec<VariableControl>) -> Result<Self> {
        for entry in &entries {
            entry.oid().check_encodable()?;
        }
        entries.sort_by(|a, b| a.oid().cmp(b.oid()));
        if let Some(pair) = entries.windows(2).find(|w| w[0].oid() == w[1].oid()) {
            return Err(Error::config(ConfigErrorKind::DuplicateOid(
                pair[0].oid().clone(),
            )));
        }
        Ok(Self { entries })
    }

    /// Exact match index, or the insertion point for `oid`.
    pub fn lookup(&self, oid: &Oid) -> std::result::Result<usize, usize> {
        self.entries.binary_search_by(|c| c.oid().cmp(oid))
    }

    pub fn get(&self, oid: &Oid) -> Option<&VariableControl> {
        self.lookup(oid).ok().map(|idx| &self.entries[idx])
    }

    pub fn entry(&self, index: usize) -> Option<&VariableControl> {
        self.entries.get(index)
    }

    /// Index of the first walkable variable after `oid`.
    pub fn next(&self, oid: &Oid) -> Option<usize> {
        let start = match self.lookup(oid) {
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        };
        self.walkable_from(start)
    }

    /// Index of the first walkable variable after the one at `index`.
    pub fn next_after(&self, index: usize) -> Option<usize> {
        self.walkable_from(index + 1)
    }

    /// Up to `count` walkable variables after `oid`, in order.
    pub fn bulk_next(&self, oid: &Oid, count: usize) -> Vec<usize> {
        let mut found = Vec::with_capacity(count.min(self.entries.len()));
        let mut cursor = self.next(oid);
        while let Some(idx) = cursor {
            if found.len() == count {
                break;
            }
            found.push(idx);
            cursor = self.next_after(idx);
        }
        found
    }

    fn walkable_from(&self, start: usize) -> Option<usize> {
        self.entries
            .get(start..)?
            .iter()
            .position(VariableControl::is_walkable)
            .map(|offset| start + offset)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All variables in OID order.
    pub fn iter(&self) -> impl Iterator<Item = &VariableControl> {
        self.entries.iter()
    }
}
