pub mod client;

pub use client::{minor_units, StripeProcessor};
