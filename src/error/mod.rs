pub mod global;

pub use global::{StoreError, StoreResult};
