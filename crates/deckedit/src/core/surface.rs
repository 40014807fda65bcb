//! Surface card representation

/// A single surface card.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    /// Surface number
    pub id: u32,
    /// Leading `*` qualifier: reflecting surface
    pub reflecting: bool,
    /// Leading `+` qualifier: white-boundary surface
    pub white_boundary: bool,
    /// Transformation slot: `0` = none, positive = transform card number,
    /// negative = periodic-surface pairing (never rewritten by renumbering
    /// or transform allocation, §4.3).
    pub transform: i64,
    /// Surface type token, lower-cased (`"so"`, `"px"`, `"c/z"`, ...)
    pub surf_type: String,
    /// Remaining numeric parameter list, verbatim text
    pub params: String,
    /// Trailing end-of-card comment (`$ ...`), not including the `$`
    pub comment: Option<String>,
}

impl Surface {
    /// `true` if this surface's transform slot is a periodic pairing and
    /// must never be rewritten.
    pub fn is_periodic(&self) -> bool {
        self.transform < 0
    }

    /// `true` if this surface carries no transform at all.
    pub fn has_transform(&self) -> bool {
        self.transform > 0
    }
}
