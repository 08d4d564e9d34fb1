pub mod dict;
pub mod intset;
pub mod limits;
pub mod list_object;
pub mod listpack;
pub mod quicklist;
pub mod sds;
pub mod set_object;
pub mod types;

pub use dict::*;
pub use intset::*;
pub use list_object::*;
pub use listpack::*;
pub use quicklist::*;
pub use sds::*;
pub use set_object::*;
pub use types::*;
