use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the planning core.
///
/// Neighborhood proposals recover locally from the trajectory-level variants
/// (`FlightTimeExceeded`, `FrozenPrefixViolation`, `IndexOutOfRange`,
/// `NoProjection`); codec and cancellation errors surface to the caller.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("malformed raster")]
    MalformedRaster,
    #[error("raster decompression failed: {0:?}")]
    Decompression(std::io::ErrorKind),
    #[error("trajectory would exceed its maximum flight time")]
    FlightTimeExceeded,
    #[error("segment index {index} lies in the frozen prefix (first modifiable is {first_modifiable})")]
    FrozenPrefixViolation { index: usize, first_modifiable: usize },
    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("no firefront projection for the segment")]
    NoProjection,
    #[error("raster patch was already applied")]
    PatchAlreadyApplied,
    #[error("search cancelled")]
    Cancelled,
}
