//! Shipping address value object.

use serde::{Deserialize, Serialize};

/// Errors returned by [`ShippingAddress::validate`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// A required field is blank.
    #[error("shipping address field `{0}` is required")]
    MissingField(&'static str),
    /// A field exceeds its maximum length.
    #[error("shipping address field `{field}` must be at most {max} characters")]
    TooLong {
        /// Offending field.
        field: &'static str,
        /// Maximum allowed length.
        max: usize,
    },
}

/// Where an order is delivered. Copied onto the order at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl ShippingAddress {
    const MAX_FIELD_LENGTH: usize = 200;

    /// Check that every field is present and reasonably sized.
    ///
    /// # Errors
    ///
    /// Returns the first [`AddressError`] found.
    pub fn validate(&self) -> Result<(), AddressError> {
        for (field, value) in [
            ("street", &self.street),
            ("city", &self.city),
            ("postalCode", &self.postal_code),
            ("country", &self.country),
        ] {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(AddressError::MissingField(field));
            }
            if trimmed.chars().count() > Self::MAX_FIELD_LENGTH {
                return Err(AddressError::TooLong {
                    field,
                    max: Self::MAX_FIELD_LENGTH,
                });
            }
        }
        Ok(())
    }
}
