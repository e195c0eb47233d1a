mod auctions;
mod healthz;
mod metrics;
mod season;
mod settlements;

pub(super) use {
    auctions::end_auction,
    healthz::healthz,
    metrics::metrics,
    season::rollover,
    settlements::{settle, settlement},
};
