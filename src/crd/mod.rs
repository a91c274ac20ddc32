mod search_customization;
mod search_operator;

pub use search_customization::*;
pub use search_operator::*;
