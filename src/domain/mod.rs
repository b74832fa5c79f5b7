mod account;
mod period;
mod transaction;

pub use account::*;
pub use period::*;
pub use transaction::*;
