//! Material card representation

use super::PARTICLE_TAGS;

/// Which of the four material-card kinds a [`Material`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MaterialKind {
    /// `m<N>` composition card
    M,
    /// `mpn<N>` photon-production card
    Mpn,
    /// `mx<N>:<part>` substitution card, for a specific particle tag
    Mx(MxParticle),
    /// `mt<N>` thermal scattering law card
    Mt,
}

/// Particle tag recognised on an `mx<N>:<part>` card, in the source tool's
/// fixed order (see [`PARTICLE_TAGS`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MxParticle(pub u8);

impl MxParticle {
    /// Parses a single-character particle tag, case-insensitive.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.to_ascii_lowercase();
        PARTICLE_TAGS
            .iter()
            .position(|t| *t == tag)
            .map(|i| MxParticle(i as u8))
    }

    /// The particle tag string, e.g. `"n"`, `"p"`.
    pub fn tag(&self) -> &'static str {
        PARTICLE_TAGS[self.0 as usize]
    }
}

/// A single material-family card: `m<N>`, `mpn<N>`, `mx<N>:<part>`, or
/// `mt<N>`.
///
/// The body is kept opaque beyond the leading identifier token, matching
/// §1's "treats material... bodies as opaque token sequences except where
/// their first token is an identifier".
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Material id (the `<N>` in `m<N>`)
    pub id: u32,
    /// Which card kind this is
    pub kind: MaterialKind,
    /// Card body text following the identifier token, verbatim (including
    /// any inline comments)
    pub body: String,
    /// Comment lines immediately preceding the card, verbatim, preserved so
    /// that [`crate::ops::material_merge`] and card concatenation can carry
    /// them forward (§4.10).
    pub leading_comment: Option<String>,
}

impl Material {
    /// Card-type prefix token for this kind, e.g. `"m"`, `"mpn"`, `"mx"`, `"mt"`.
    pub fn kind_prefix(&self) -> String {
        match self.kind {
            MaterialKind::M => "m".to_string(),
            MaterialKind::Mpn => "mpn".to_string(),
            MaterialKind::Mx(p) => format!("mx{}", p.tag()),
            MaterialKind::Mt => "mt".to_string(),
        }
    }

    /// Whitespace-normalised, comment-stripped body used to compare two
    /// material cards for structural equality (§4.10 step 1).
    pub fn normalized_body(&self) -> String {
        let without_comment = self.body.split('$').next().unwrap_or("");
        without_comment.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}
