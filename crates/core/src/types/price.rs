//! Type-safe price representation using decimal arithmetic.
//!
//! Prices never go through floating point: catalog prices, the price frozen on
//! an order line, and order totals are all [`Decimal`] values.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The amount is below zero.
    #[error("price cannot be negative")]
    Negative,
    /// The amount does not fit the catalog's price column.
    #[error("price cannot exceed {max}")]
    TooLarge {
        /// Largest accepted price.
        max: Decimal,
    },
    /// The amount has more than two decimal places.
    #[error("price must have at most {max} decimal places")]
    TooPrecise {
        /// Maximum number of decimal places.
        max: u32,
    },
}

/// A non-negative unit price in the store currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Maximum number of fractional digits (cents).
    pub const MAX_SCALE: u32 = 2;

    /// Zero price.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Largest storable price, 9 999 999 999.99 (`NUMERIC(12, 2)`).
    pub const MAX: Self = Self(Decimal::from_parts(3_567_587_327, 232, 0, false, 2));

    /// Create a price, validating sign and precision.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] for amounts below zero,
    /// [`PriceError::TooLarge`] above [`Price::MAX`] and
    /// [`PriceError::TooPrecise`] for sub-cent amounts.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }
        if amount > Self::MAX.0 {
            return Err(PriceError::TooLarge { max: Self::MAX.0 });
        }
        let normalized = amount.normalize();
        if normalized.scale() > Self::MAX_SCALE {
            return Err(PriceError::TooPrecise {
                max: Self::MAX_SCALE,
            });
        }
        Ok(Self(amount))
    }

    /// Build a price from an integer number of cents.
    #[must_use]
    pub fn from_cents(cents: u32) -> Self {
        Self(Decimal::new(i64::from(cents), Self::MAX_SCALE))
    }

    /// The decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Price of `quantity` units, or `None` on decimal overflow.
    #[must_use]
    pub fn times(self, quantity: u32) -> Option<Decimal> {
        self.0.checked_mul(Decimal::from(quantity))
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl core::fmt::Display for Price {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Price {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Price {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(amount)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Price {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn rejects_negative() {
        assert_eq!(Price::new(Decimal::new(-1, 2)), Err(PriceError::Negative));
    }

    #[test]
    fn rejects_sub_cent_amounts() {
        assert!(matches!(
            Price::new(Decimal::new(1999, 3)),
            Err(PriceError::TooPrecise { .. })
        ));
        // Trailing zeros do not count as precision.
        assert!(Price::new(Decimal::new(19_990, 3)).is_ok());
    }

    #[test]
    fn times_multiplies_exactly() {
        let price = Price::from_cents(1999);
        assert_eq!(price.times(3), Some(Decimal::new(5997, 2)));
        assert_eq!(price.times(0), Some(Decimal::ZERO));
        assert!(Price::MAX.times(u32::MAX).is_some());
    }

    #[test]
    fn upper_bound_matches_column() {
        assert_eq!(Price::MAX.to_string(), "9999999999.99");
        assert!(Price::new(Price::MAX.amount()).is_ok());
        assert!(matches!(
            Price::new(Decimal::new(1_000_000_000_000, 2)),
            Err(PriceError::TooLarge { .. })
        ));
        assert!(matches!(
            Price::new(Decimal::MAX),
            Err(PriceError::TooLarge { .. })
        ));
        assert!(serde_json::from_str::<Price>("\"10000000000.00\"").is_err());
    }

    #[test]
    fn displays_two_places() {
        assert_eq!(Price::from_cents(500).to_string(), "5.00");
    }

    #[test]
    fn deserializes_from_string() {
        let price: Price = serde_json::from_str("\"12.50\"").unwrap();
        assert_eq!(price, Price::from_cents(1250));
        assert!(serde_json::from_str::<Price>("\"-3.00\"").is_err());
    }
}
