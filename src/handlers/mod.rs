pub mod health;
pub mod pageviews;

pub use health::*;
pub use pageviews::*;
