use axum::extract::{FromRequest, Request};
use axum::Json;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError};

use super::error::ApiError;
use crate::domain::value_objects::MAX_MONEY;

/// JSON body that must parse and pass its `validator` rules. Either failure
/// is a 400 "Dados inválidos".
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            tracing::debug!(%rejection, "unreadable request body");
            ApiError::invalid_data()
        })?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// A monetary amount that fits the money columns.
pub(crate) fn money(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO || *value > MAX_MONEY {
        return Err(ValidationError::new("money"));
    }
    Ok(())
}

/// Markup percentage: no lower than -100% and within `NUMERIC(7, 2)`.
pub(crate) fn margin(value: &Decimal) -> Result<(), ValidationError> {
    if *value < -Decimal::ONE_HUNDRED || *value > Decimal::new(9_999_999, 2) {
        return Err(ValidationError::new("margin"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_bounds() {
        assert!(money(&Decimal::ZERO).is_ok());
        assert!(money(&MAX_MONEY).is_ok());
        assert!(money(&(MAX_MONEY + Decimal::new(1, 2))).is_err());
        assert!(money(&Decimal::new(-1, 2)).is_err());
    }

    #[test]
    fn test_margin_bounds() {
        assert!(margin(&Decimal::new(35, 0)).is_ok());
        assert!(margin(&-Decimal::ONE_HUNDRED).is_ok());
        assert!(margin(&Decimal::new(-101, 0)).is_err());
        assert!(margin(&Decimal::new(100_000, 0)).is_err());
    }
}
