//! `shopfront-cart`: in-memory shopping cart with merge-by-key semantics.

pub mod ledger;

pub use ledger::{CartItem, CartLedger};
