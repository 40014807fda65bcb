//! Group metadata record: the trailing JSON object of a deck

use serde::{Deserialize, Serialize};

/// A user-named set of cells, surfaces, and/or transforms, carried as
/// trailing JSON metadata (§3).
///
/// Absent fields are omitted from the serialised JSON rather than written
/// as `null`, matching the source's dict-with-optional-keys representation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Cell ids in this group
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell: Option<Vec<i64>>,
    /// Surface ids in this group
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surf: Option<Vec<i64>>,
    /// Transform ids in this group
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trans: Option<Vec<i64>>,
    /// Free-text annotation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Group {
    /// `true` if every list field is absent or empty.
    pub fn is_empty(&self) -> bool {
        self.cell.as_ref().map_or(true, |v| v.is_empty())
            && self.surf.as_ref().map_or(true, |v| v.is_empty())
            && self.trans.as_ref().map_or(true, |v| v.is_empty())
    }

    /// The set of sub-keys present (ignoring `comment`), used by Insert's
    /// group-merge rule (§4.8 step 6) to decide whether two same-named
    /// groups are concatenation-compatible.
    pub fn key_set(&self) -> (bool, bool, bool) {
        (self.cell.is_some(), self.surf.is_some(), self.trans.is_some())
    }

    /// Removes ids not present in the corresponding retained set, as used
    /// by Extract (§4.9) to filter the groups map down to surviving ids.
    /// Returns `true` if anything survives.
    pub fn retain(
        &mut self,
        cells: &std::collections::HashSet<u32>,
        surfaces: &std::collections::HashSet<u32>,
        transforms: &std::collections::HashSet<u32>,
    ) -> bool {
        if let Some(list) = &mut self.cell {
            list.retain(|id| cells.contains(&(*id as u32)));
        }
        if let Some(list) = &mut self.surf {
            list.retain(|id| surfaces.contains(&(*id as u32)));
        }
        if let Some(list) = &mut self.trans {
            list.retain(|id| transforms.contains(&(*id as u32)));
        }
        let survives = !self.is_empty();
        if !survives {
            self.comment = None;
        }
        survives
    }
}
