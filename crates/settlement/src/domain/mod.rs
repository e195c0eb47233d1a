pub mod auction;
pub mod eth;
pub mod lifecycle;
pub mod season;
pub mod settlement;
pub mod swap;
