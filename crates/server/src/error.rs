//! Unified error handling with Sentry integration.
//!
//! Finalization failures are reported to the storefront as a reason code,
//! never as an internal error string. Failures caused by the service or its
//! collaborators are captured to Sentry before responding.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use order_processor_core::{CartId, FormError, PricingError};

use crate::routes::order::OrderResponse;
use crate::services::allocator::AllocationError;
use crate::services::resolver::ResolveError;

/// Reason code reported to the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    CartNotFound,
    CantConvertCart,
    InvalidForm,
    EmptyCart,
    CartUnavailable,
    OrderNotSaved,
}

impl FailureReason {
    /// Wire code of the reason.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::CartNotFound => "cart_not_found",
            Self::CantConvertCart => "cant_convert_cart",
            Self::InvalidForm => "invalid_form",
            Self::EmptyCart => "empty_cart",
            Self::CartUnavailable => "cart_unavailable",
            Self::OrderNotSaved => "order_not_saved",
        }
    }

    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::CartNotFound => StatusCode::NOT_FOUND,
            Self::CantConvertCart | Self::EmptyCart => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidForm => StatusCode::BAD_REQUEST,
            Self::CartUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::OrderNotSaved => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Errors that abort a finalization.
#[derive(Debug, Error)]
pub enum FinalizeError {
    /// The posted form failed validation.
    #[error("invalid order form: {0}")]
    InvalidForm(#[from] FormError),

    /// The cart could not be loaded.
    #[error(transparent)]
    Cart(#[from] ResolveError),

    /// The cart could not be priced.
    #[error("cart {cart_id} cannot be priced: {source}")]
    Pricing {
        cart_id: CartId,
        #[source]
        source: PricingError,
    },

    /// The cart resolved to no orderable line.
    #[error("cart {0} has nothing to order")]
    EmptyCart(CartId),

    /// No order was stored.
    #[error("order not saved: {0}")]
    NotSaved(#[from] AllocationError),
}

impl FinalizeError {
    #[must_use]
    pub const fn reason(&self) -> FailureReason {
        match self {
            Self::InvalidForm(_) => FailureReason::InvalidForm,
            Self::Cart(ResolveError::NotFound(_)) => FailureReason::CartNotFound,
            Self::Cart(ResolveError::Decode { .. }) | Self::Pricing { .. } => {
                FailureReason::CantConvertCart
            }
            Self::Cart(ResolveError::Unavailable(_)) => FailureReason::CartUnavailable,
            Self::EmptyCart(_) => FailureReason::EmptyCart,
            Self::NotSaved(_) => FailureReason::OrderNotSaved,
        }
    }

    /// Whether the failure lies with the service rather than the request.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Cart(ResolveError::Decode { .. } | ResolveError::Unavailable(_))
                | Self::Pricing { .. }
                | Self::NotSaved(_)
        )
    }
}

impl IntoResponse for FinalizeError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Order finalization failed"
            );
        } else {
            tracing::info!(error = %self, "Order rejected");
        }

        let reason = self.reason();
        (reason.status(), Json(OrderResponse::error(reason))).into_response()
    }
}

/// Add a breadcrumb for a pipeline step.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of steps
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("order", "Cart resolved", Some(&[("cart_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn cart_id() -> CartId {
        CartId::parse("cart-1").unwrap()
    }

    #[test]
    fn test_reason_codes() {
        let cases = [
            (FinalizeError::InvalidForm(FormError::MissingField("BillingName")), "invalid_form"),
            (FinalizeError::Cart(ResolveError::NotFound(cart_id())), "cart_not_found"),
            (
                FinalizeError::Cart(ResolveError::Decode {
                    cart_id: cart_id(),
                    source: serde_json::from_str::<u8>("x").unwrap_err(),
                }),
                "cant_convert_cart",
            ),
            (
                FinalizeError::Cart(ResolveError::Unavailable("down".to_owned())),
                "cart_unavailable",
            ),
            (
                FinalizeError::Pricing {
                    cart_id: cart_id(),
                    source: PricingError::Overflow("A/1/professional".to_owned()),
                },
                "cant_convert_cart",
            ),
            (FinalizeError::EmptyCart(cart_id()), "empty_cart"),
            (
                FinalizeError::NotSaved(AllocationError::TimedOut(Duration::from_secs(5))),
                "order_not_saved",
            ),
        ];

        for (err, code) in cases {
            assert_eq!(err.reason().code(), code);
        }
    }

    #[test]
    fn test_status_codes() {
        fn get_status(err: FinalizeError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(FinalizeError::Cart(ResolveError::NotFound(cart_id()))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(FinalizeError::EmptyCart(cart_id())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(FinalizeError::NotSaved(AllocationError::Exhausted { attempts: 5 })),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_only_service_failures_are_server_errors() {
        assert!(!FinalizeError::EmptyCart(cart_id()).is_server_error());
        assert!(!FinalizeError::Cart(ResolveError::NotFound(cart_id())).is_server_error());
        assert!(FinalizeError::Cart(ResolveError::Unavailable("down".to_owned())).is_server_error());
    }
}
