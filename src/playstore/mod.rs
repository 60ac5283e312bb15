// Google Play Store: review acquisition.
//
// client.rs speaks the store's batchexecute RPC; reviews.rs pages through it
// and applies the trailing time window.

pub mod client;
pub mod reviews;
