pub mod drain;
pub mod fan_out;
pub mod merge_n;
pub mod merge_two;
pub mod split_n;
pub mod split_two;

pub use drain::Drain;
pub use fan_out::FanOut;
pub use merge_n::MergeN;
pub use merge_two::MergeTwo;
pub use split_n::SplitN;
pub use split_two::SplitTwo;
