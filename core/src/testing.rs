pub mod builder;
pub mod comparator;
pub mod executor;
pub mod result;
pub mod score;
pub mod testcase;

pub use builder::*;
pub use comparator::*;
pub use executor::*;
pub use result::*;
pub use score::*;
pub use testcase::*;
