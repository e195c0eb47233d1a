use {
    crate::domain::{
        season::rollover,
        settlement::{self, stage},
    },
    axum::http::StatusCode,
    serde::Serialize,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum Kind {
    Unauthorized,
    InvalidRequest,
    AuctionInFlight,
    QueueUnavailable,
    NotFound,
    NoFundsToSettle,
    QuoteUnavailable,
    TransactionFailure,
    ConfigurationError,
    InvalidAmount,
    PartialDistributionFailure,
    SeasonStoreFailure,
    Internal,
}

impl Kind {
    pub fn status(self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::AuctionInFlight => StatusCode::CONFLICT,
            Self::QueueUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound => StatusCode::NOT_FOUND,
            // Nothing went wrong, there just was nothing to do.
            Self::NoFundsToSettle | Self::PartialDistributionFailure => StatusCode::OK,
            Self::QuoteUnavailable | Self::TransactionFailure => StatusCode::BAD_GATEWAY,
            Self::ConfigurationError
            | Self::InvalidAmount
            | Self::SeasonStoreFailure
            | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<&settlement::Error> for Kind {
    fn from(err: &settlement::Error) -> Self {
        match err.source {
            stage::Error::NoFunds(_) => Self::NoFundsToSettle,
            stage::Error::QuoteUnavailable(_) => Self::QuoteUnavailable,
            stage::Error::Transaction(_) => Self::TransactionFailure,
            stage::Error::MissingDestination(_) => Self::ConfigurationError,
            stage::Error::Overflow(_) => Self::InvalidAmount,
        }
    }
}

impl From<&rollover::Error> for Kind {
    fn from(err: &rollover::Error) -> Self {
        match err {
            rollover::Error::Store(_) => Self::SeasonStoreFailure,
            rollover::Error::Calendar(_) => Self::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::domain::{eth::TokenAddress, eth::Address, settlement::Bucket},
    };

    #[test]
    fn settlement_errors_keep_their_kind() {
        let error = |source| settlement::Error {
            stage: "split".to_owned(),
            source,
        };

        let no_funds = error(stage::Error::NoFunds(TokenAddress(Address::ZERO)));
        assert_eq!(Kind::from(&no_funds), Kind::NoFundsToSettle);
        assert_eq!(Kind::from(&no_funds).status(), StatusCode::OK);
        assert_eq!(
            serde_json::to_value(Kind::from(&no_funds)).unwrap(),
            no_funds.kind()
        );

        let missing = error(stage::Error::MissingDestination(Bucket::Dev));
        assert_eq!(Kind::from(&missing), Kind::ConfigurationError);
        assert_eq!(
            Kind::from(&missing).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            serde_json::to_value(Kind::from(&missing)).unwrap(),
            missing.kind()
        );
    }
}
