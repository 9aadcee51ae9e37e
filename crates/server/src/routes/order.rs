//! Order finalization endpoint.
//!
//! The storefront checkout posts the order form here as
//! `application/x-www-form-urlencoded` and reads back a small JSON document:
//!
//! ```text
//! {"result":"success","orderNumber":17}
//! {"result":"error","details":"cart_not_found"}
//! ```

use axum::{
    Form, Json,
    extract::{State, rejection::FormRejection},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use order_processor_core::{OrderFormInput, OrderNumber};

use crate::error::FailureReason;
use crate::middleware::ClientIp;
use crate::state::AppState;

/// Response body of `POST /order/process`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum OrderResponse {
    Success {
        #[serde(rename = "orderNumber")]
        order_number: OrderNumber,
    },
    Error {
        details: String,
    },
}

impl OrderResponse {
    #[must_use]
    pub fn error(reason: FailureReason) -> Self {
        Self::Error {
            details: reason.code().to_owned(),
        }
    }
}

/// Finalize the posted order.
#[instrument(skip_all, fields(client_ip = %client_ip.0))]
pub async fn process(
    State(state): State<AppState>,
    client_ip: ClientIp,
    form: Result<Form<OrderFormInput>, FormRejection>,
) -> Response {
    let Form(input) = match form {
        Ok(form) => form,
        Err(rejection) => {
            tracing::info!(error = %rejection, "Unreadable order form");
            let reason = FailureReason::InvalidForm;
            return (reason.status(), Json(OrderResponse::error(reason))).into_response();
        }
    };

    match state.pipeline().finalize(input, client_ip.0).await {
        Ok(finalized) => Json(OrderResponse::Success {
            order_number: finalized.order.number(),
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}
