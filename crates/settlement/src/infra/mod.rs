pub mod aggregator;
pub mod api;
pub mod blockchain;
pub mod cli;
pub mod config;
pub mod observe;
pub mod persistence;
pub mod prices;
pub mod queue;
pub mod reconciliation;
pub mod tokens;

pub use self::{
    api::Api,
    blockchain::Ethereum,
    config::Config,
    queue::Queue,
};
