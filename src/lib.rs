/// DCabs - a peer-to-peer ride hailing escrow ledger
///
/// This is the root crate that provides workspace-level documentation.
/// The implementation lives in `dcabs-core`: the driver registry, trip
/// lifecycle engine, escrow vault, rating ledger and async service front end.

/// Returns the version of the package.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
