pub mod listing;
pub mod recommendation;
