//! Result and Error types for ntools-deckedit

/// Type alias for `Result<T, deckedit::Error>`
pub type Result<T> = core::result::Result<T, Error>;

/// The error type for the `ntools-deckedit` crate
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Failed input/output stream
    #[error("failed input/output stream")]
    IOError(#[from] std::io::Error),

    /// Group metadata block could not be parsed as JSON
    #[error("failed to parse group metadata as json")]
    GroupJsonError(#[from] serde_json::Error),

    /// A card could not be parsed into its expected fields
    #[error("malformed input: {detail}")]
    MalformedInput {
        /// Human readable description of what failed to parse and why
        detail: String,
    },

    /// An enumerated option argument was outside its recognised set
    #[error("unknown option '{value}' for {option}, falling back to default")]
    UnknownOption {
        /// Name of the option argument, e.g. "location" or "mode"
        option: &'static str,
        /// The value that was rejected
        value: String,
    },

    /// A referenced group, subgroup, or material id does not exist
    #[error("missing reference: {detail}")]
    MissingReference {
        /// Human readable description of what was being looked up
        detail: String,
    },

    /// More than 9999 transform cards would be required
    #[error("transform id space exhausted beyond 9999")]
    TransformIdExhaustion,

    /// ResolveTRCL failed to converge within its iteration cap
    #[error("resolve_trcl did not converge after {iterations} iterations")]
    ConvergenceFailure {
        /// Number of iterations attempted before giving up
        iterations: u32,
    },

    /// A cell-subset closure produced no cells
    #[error("extract closed to an empty cell set")]
    EmptyResult,
}
