/// Configuration loading: encoding thresholds and their defaults.
pub mod config;
/// Built-in data structures (Dict, IntSet, ListPack, QuickList, SDS)
/// and the collection facades on top of them.
pub mod database;
/// Common error types for storage operations.
pub mod error;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// config
pub use config::Settings;
/// Data types and encoding facades.
pub use database::{
    ConvTrigger, Dict, Direction, End, EntryValue, IntSet, ListEncoding, ListIter, ListObject,
    ListPack, QuickList, Sds, SetEncoding, SetIter, SetObject, Value,
};
/// Operation errors and result types.
pub use error::{StoreError, StoreResult};
