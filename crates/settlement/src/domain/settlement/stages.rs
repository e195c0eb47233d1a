use {
    super::{
        Status,
        shares::Bucket,
        stage::{Context, Error, Stage},
    },
    crate::domain::eth::U256,
};

/// Swaps the proceeds into the settlement currency.
pub struct SwapProceeds;

#[async_trait::async_trait]
impl Stage for SwapProceeds {
    fn name(&self) -> &str {
        "swap-proceeds"
    }

    async fn is_complete(&self, ctx: &Context<'_>) -> Result<bool, Error> {
        let token = ctx.record.proceeds_token;
        if token == ctx.config.settlement_currency {
            return Ok(true);
        }
        // A previous run already swapped everything.
        Ok(ctx.tokens.balance(token).await?.is_zero())
    }

    async fn execute(&self, ctx: &mut Context<'_>) -> Result<(), Error> {
        let token = ctx.record.proceeds_token;
        let balance = ctx.tokens.balance(token).await?;
        if balance.is_zero() {
            return Err(Error::NoFunds(token));
        }
        let swap = ctx
            .swapper
            .swap(token, ctx.config.settlement_currency, balance)
            .await?;
        ctx.record.swap_tx = Some(swap.receipt.hash);
        ctx.record.status = Status::Swapped;
        Ok(())
    }
}

/// Computes the distribution of the settlement currency balance.
pub struct Split;

#[async_trait::async_trait]
impl Stage for Split {
    fn name(&self) -> &str {
        "split"
    }

    async fn is_complete(&self, ctx: &Context<'_>) -> Result<bool, Error> {
        Ok(ctx.record.distribution.is_some())
    }

    async fn execute(&self, ctx: &mut Context<'_>) -> Result<(), Error> {
        let currency = ctx.config.settlement_currency;
        let total = ctx.tokens.balance(currency).await?;
        if total.is_zero() {
            return Err(Error::NoFunds(currency));
        }
        let distribution = ctx.config.scheme.split(total)?;
        ctx.record.total_proceeds = total;
        ctx.record.distribution = Some(distribution);
        ctx.record.status = Status::Split;
        Ok(())
    }
}

fn share(ctx: &Context<'_>, bucket: Bucket) -> U256 {
    ctx.record
        .distribution
        .as_ref()
        .map(|distribution| distribution.amount(bucket))
        .unwrap_or_default()
}

/// Transfers one share to its destination wallet.
pub struct Transfer {
    bucket: Bucket,
    name: String,
}

impl Transfer {
    pub fn new(bucket: Bucket) -> Self {
        Self {
            bucket,
            name: format!("transfer-{bucket}"),
        }
    }
}

#[async_trait::async_trait]
impl Stage for Transfer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn precondition(&self, ctx: &Context<'_>) -> Result<(), Error> {
        match ctx.config.destinations.get(self.bucket) {
            Some(_) => Ok(()),
            None => Err(Error::MissingDestination(self.bucket)),
        }
    }

    async fn is_complete(&self, ctx: &Context<'_>) -> Result<bool, Error> {
        Ok(ctx.record.transfers.contains_key(&self.bucket) || share(ctx, self.bucket).is_zero())
    }

    async fn execute(&self, ctx: &mut Context<'_>) -> Result<(), Error> {
        let to = ctx
            .config
            .destinations
            .get(self.bucket)
            .ok_or(Error::MissingDestination(self.bucket))?;
        let receipt = ctx
            .tokens
            .transfer(ctx.config.settlement_currency, to, share(ctx, self.bucket))
            .await?;
        ctx.record.transfers.insert(self.bucket, receipt.hash);
        if all_transferred(ctx) {
            ctx.record.status = Status::Distributed;
        }
        Ok(())
    }
}

/// Whether every share that is transferred rather than bought back is sent.
fn all_transferred(ctx: &Context<'_>) -> bool {
    ctx.record.distribution.as_ref().is_some_and(|distribution| {
        distribution
            .shares()
            .iter()
            .filter(|share| share.bucket != Bucket::Buyback && !share.amount.is_zero())
            .all(|share| ctx.record.transfers.contains_key(&share.bucket))
    })
}

/// Buys the target token with the buyback share.
pub struct Buyback;

#[async_trait::async_trait]
impl Stage for Buyback {
    fn name(&self) -> &str {
        "buyback"
    }

    async fn is_complete(&self, ctx: &Context<'_>) -> Result<bool, Error> {
        Ok(ctx.record.buyback_tx.is_some() || share(ctx, Bucket::Buyback).is_zero())
    }

    async fn execute(&self, ctx: &mut Context<'_>) -> Result<(), Error> {
        let currency = ctx.config.settlement_currency;
        // Never spend more than what is actually left.
        let amount = share(ctx, Bucket::Buyback).min(ctx.tokens.balance(currency).await?);
        if amount.is_zero() {
            return Err(Error::NoFunds(currency));
        }
        let swap = ctx
            .swapper
            .swap(currency, ctx.config.target_token, amount)
            .await?;
        ctx.record.buyback_tx = Some(swap.receipt.hash);
        ctx.record.status = Status::BoughtBack;
        Ok(())
    }
}

/// Burns the operator's whole target token balance.
pub struct Burn;

#[async_trait::async_trait]
impl Stage for Burn {
    fn name(&self) -> &str {
        "burn"
    }

    async fn is_complete(&self, ctx: &Context<'_>) -> Result<bool, Error> {
        Ok(ctx.record.burn_tx.is_some())
    }

    async fn execute(&self, ctx: &mut Context<'_>) -> Result<(), Error> {
        let token = ctx.config.target_token;
        let balance = ctx.tokens.balance(token).await?;
        ctx.record.burn_amount = balance;
        if balance.is_zero() {
            return Ok(());
        }
        let receipt = ctx.tokens.burn(token, balance, ctx.config.burn).await?;
        ctx.record.burn_tx = Some(receipt.hash);
        Ok(())
    }
}
