//! Identifiers: order numbers and cart ids.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A customer-facing order number.
///
/// Order numbers start at 1 and only ever increase. A number is assigned to
/// exactly one persisted order; numbers abandoned by a failed insert leave
/// gaps but are never handed out twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(i64);

impl OrderNumber {
    /// The number given to the very first order.
    pub const FIRST: Self = Self(1);

    /// Create an order number from its raw value.
    #[must_use]
    pub const fn new(number: i64) -> Self {
        Self(number)
    }

    /// Get the underlying i64 value.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    /// The number following the highest one already persisted.
    ///
    /// `None` (an empty store) yields [`OrderNumber::FIRST`].
    #[must_use]
    pub fn after(highest: Option<Self>) -> Self {
        highest.map_or(Self::FIRST, |n| Self(n.0.saturating_add(1)))
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for OrderNumber {
    fn from(number: i64) -> Self {
        Self(number)
    }
}

impl From<OrderNumber> for i64 {
    fn from(number: OrderNumber) -> Self {
        number.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for OrderNumber {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for OrderNumber {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let number = <i64 as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(number))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for OrderNumber {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i64 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

/// Errors that can occur when parsing a [`CartId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartIdError {
    /// The input string is empty.
    #[error("cart id cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("cart id must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains whitespace or control characters.
    #[error("cart id contains invalid characters")]
    InvalidCharacter,
}

/// Opaque identifier correlating a shopper session with its cached cart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartId(String);

impl CartId {
    /// Maximum length of a cart id.
    pub const MAX_LENGTH: usize = 128;

    /// Parse a cart id submitted by the browser.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, longer than
    /// [`CartId::MAX_LENGTH`], or contains whitespace/control characters.
    pub fn parse(s: &str) -> Result<Self, CartIdError> {
        if s.is_empty() {
            return Err(CartIdError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(CartIdError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(CartIdError::InvalidCharacter);
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the cart id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
