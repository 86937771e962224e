use crate::remote::FeedError;

/// Conversion from a raw wire payload into the typed shape the rest of the
/// system consumes. Normalization happens here, at the boundary, so nothing
/// downstream ever sees the feed's duck-typed rows.
pub trait RemoteResponse<T> {
    fn to_change(&self) -> Result<T, FeedError>;
}
