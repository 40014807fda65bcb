//! Cell card representation

/// A single cell card.
///
/// The source tool represents `like N but` cells with the same scanning
/// logic as ordinary cells and special-cases a sentinel material of `-1`
/// throughout. Here the two forms are tagged variants instead (§9 Design
/// Notes: "Tagged variants for cell forms").
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Cell number
    pub id: u32,
    /// Cell body: either a plain geometry cell or a `like...but` clone
    pub body: CellBody,
    /// Trailing end-of-card comment (`$ ...`), not including the `$`
    pub comment: Option<String>,
}

/// The two syntactic forms a cell card can take.
#[derive(Debug, Clone, PartialEq)]
pub enum CellBody {
    /// An ordinary cell: material, density, geometry expression, keywords
    Plain {
        /// Material number, 0 for void
        material: i64,
        /// Density, absolute value in g/cc (negative) or atoms/barn-cm
        /// (positive) as written on the card; `None` for void cells
        density: Option<f64>,
        /// Boolean geometry expression over surface numbers and cell
        /// complements, exactly as tokenised (e.g. `"-1 2 -3"`)
        geometry: String,
        /// Cell numbers referenced via `#N` or inside `#(...)` groups
        cell_refs: Vec<u32>,
        /// Surface numbers referenced in the geometry expression
        surface_refs: Vec<u32>,
        /// Trailing keyword block, verbatim (e.g. `"imp:n=1 imp:p=1"`)
        trailing: String,
    },
    /// A `like N but <modifiers>` clone of cell `N`
    Like {
        /// The cell number being cloned
        parent: u32,
        /// The `but <modifiers>` text following `like N`, verbatim
        overrides: String,
    },
}

impl Cell {
    /// `true` if this is the world (final, usually-void, zero-importance) cell
    pub fn is_void(&self) -> bool {
        matches!(
            self.body,
            CellBody::Plain {
                material: 0,
                ..
            }
        )
    }

    /// Surface numbers referenced by this cell, empty for `like...but` cells
    /// since their geometry is inherited from the parent at emit time.
    pub fn surface_refs(&self) -> &[u32] {
        match &self.body {
            CellBody::Plain { surface_refs, .. } => surface_refs,
            CellBody::Like { .. } => &[],
        }
    }

    /// Cell numbers referenced via `#N` complement tokens
    pub fn cell_refs(&self) -> &[u32] {
        match &self.body {
            CellBody::Plain { cell_refs, .. } => cell_refs,
            CellBody::Like { .. } => &[],
        }
    }

    /// The `like N` target, if this is a clone cell
    pub fn like_target(&self) -> Option<u32> {
        match &self.body {
            CellBody::Like { parent, .. } => Some(*parent),
            CellBody::Plain { .. } => None,
        }
    }

    /// Material number, or `-1` for a `like...but` cell (matches the source
    /// tool's sentinel for "material is inherited, not present on this card").
    pub fn material(&self) -> i64 {
        match &self.body {
            CellBody::Plain { material, .. } => *material,
            CellBody::Like { .. } => -1,
        }
    }

    /// Reads the bare-integer form of a `trcl=` or `fill=` reference, if any.
    ///
    /// Returns `None` for constant (parenthesised) forms, lattice `fill=`
    /// forms, or cells with no such keyword.
    pub fn numeric_transform_ref(&self, keyword: &str) -> Option<u32> {
        let trailing = match &self.body {
            CellBody::Plain { trailing, .. } => trailing,
            CellBody::Like { .. } => return None,
        };
        crate::parse::geometry::extract_numeric_keyword_value(trailing, keyword)
    }
}
