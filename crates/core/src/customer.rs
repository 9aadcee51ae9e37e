//! Checkout form input and validation.
//!
//! The storefront posts a flat form with the field names below. The raw input
//! is collected into [`OrderFormInput`] and validated once into a
//! [`CustomerForm`]; everything downstream works with the validated value.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CartId, CartIdError, Email, EmailError};

/// Errors produced while validating checkout form input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormError {
    /// A required field is missing or blank.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The billing email is not a valid address.
    #[error("invalid billing email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// The cart id is malformed.
    #[error("invalid cart id: {0}")]
    InvalidCartId(#[from] CartIdError),
}

/// Raw checkout form as posted by the storefront.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct OrderFormInput {
    pub billing_title: String,
    pub billing_name: String,
    pub billing_email: String,
    pub billing_phone: String,
    pub billing_organization: String,
    pub billing_street: String,
    pub billing_street2: String,
    pub billing_zip: String,
    pub billing_city: String,

    pub shipping_title: String,
    pub shipping_name: String,
    pub shipping_organization: String,
    pub shipping_street: String,
    pub shipping_street2: String,
    pub shipping_zip: String,
    pub shipping_city: String,

    pub options_payment_method: String,
    pub options_shipping_method: String,
    pub options_signup: String,
    pub options_reference: String,
    pub options_use_billing_for_shipping: String,
    #[serde(rename = "OptionsCartID")]
    pub options_cart_id: String,
}

/// Validated customer data stored in the `Customer` section of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomerForm {
    pub billing_title: String,
    pub billing_name: String,
    pub billing_email: Email,
    pub billing_phone: String,
    pub billing_organization: String,
    pub billing_street: String,
    pub billing_street2: String,
    pub billing_zip: String,
    pub billing_city: String,

    pub shipping_title: String,
    pub shipping_name: String,
    pub shipping_organization: String,
    pub shipping_street: String,
    pub shipping_street2: String,
    pub shipping_zip: String,
    pub shipping_city: String,

    pub options_payment_method: String,
    pub options_shipping_method: String,
    pub options_signup: String,
    pub options_reference: String,
    pub options_use_billing_for_shipping: bool,
    #[serde(rename = "OptionsCartID")]
    pub options_cart_id: CartId,

    pub shipping_method_display: String,
    pub payment_method_display: String,
}

/// Interpret a checkbox-style form value.
///
/// Accepts the spellings browsers and the storefront script send; anything
/// else (including an absent field) is `false`.
#[must_use]
pub fn parse_form_bool(value: &str) -> bool {
    matches!(
        value.trim(),
        "1" | "t" | "T" | "true" | "TRUE" | "True" | "on" | "yes"
    )
}

/// Display name of a shipping method code.
#[must_use]
pub fn shipping_method_display(code: &str) -> Option<&'static str> {
    match code {
        "dhl-standard" => Some("DHL Standard"),
        _ => None,
    }
}

/// Display name of a payment method code.
#[must_use]
pub fn payment_method_display(code: &str) -> Option<&'static str> {
    match code {
        "invoice" => Some("Rechnung"),
        _ => None,
    }
}

fn required(value: String, field: &'static str) -> Result<String, FormError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FormError::MissingField(field));
    }
    Ok(trimmed.to_owned())
}

fn optional(value: String) -> String {
    value.trim().to_owned()
}

impl OrderFormInput {
    /// Validate the posted form.
    ///
    /// Billing name, email, street, zip and city, both method codes and the
    /// cart id are required. Shipping name, street, zip and city are required
    /// unless the billing address is used for shipping.
    ///
    /// # Errors
    ///
    /// Returns the first [`FormError`] encountered.
    pub fn validate(self) -> Result<CustomerForm, FormError> {
        let use_billing_for_shipping = parse_form_bool(&self.options_use_billing_for_shipping);

        let options_cart_id = CartId::parse(self.options_cart_id.trim()).map_err(|e| match e {
            CartIdError::Empty => FormError::MissingField("OptionsCartID"),
            other => FormError::InvalidCartId(other),
        })?;

        if self.billing_email.trim().is_empty() {
            return Err(FormError::MissingField("BillingEmail"));
        }
        let billing_email = Email::parse(&self.billing_email)?;

        let shipping_field = |value: String, field: &'static str| {
            if use_billing_for_shipping {
                Ok(optional(value))
            } else {
                required(value, field)
            }
        };

        let options_payment_method =
            required(self.options_payment_method, "OptionsPaymentMethod")?;
        let options_shipping_method =
            required(self.options_shipping_method, "OptionsShippingMethod")?;

        Ok(CustomerForm {
            billing_title: optional(self.billing_title),
            billing_name: required(self.billing_name, "BillingName")?,
            billing_email,
            billing_phone: optional(self.billing_phone),
            billing_organization: optional(self.billing_organization),
            billing_street: required(self.billing_street, "BillingStreet")?,
            billing_street2: optional(self.billing_street2),
            billing_zip: required(self.billing_zip, "BillingZip")?,
            billing_city: required(self.billing_city, "BillingCity")?,

            shipping_title: optional(self.shipping_title),
            shipping_name: shipping_field(self.shipping_name, "ShippingName")?,
            shipping_organization: optional(self.shipping_organization),
            shipping_street: shipping_field(self.shipping_street, "ShippingStreet")?,
            shipping_street2: optional(self.shipping_street2),
            shipping_zip: shipping_field(self.shipping_zip, "ShippingZip")?,
            shipping_city: shipping_field(self.shipping_city, "ShippingCity")?,

            shipping_method_display: shipping_method_display(&options_shipping_method)
                .map_or_else(|| options_shipping_method.clone(), str::to_owned),
            payment_method_display: payment_method_display(&options_payment_method)
                .map_or_else(|| options_payment_method.clone(), str::to_owned),
            options_payment_method,
            options_shipping_method,
            options_signup: optional(self.options_signup),
            options_reference: optional(self.options_reference),
            options_use_billing_for_shipping: use_billing_for_shipping,
            options_cart_id,
        })
    }
}

impl CustomerForm {
    /// Opening line of the customer's thank-you email.
    #[must_use]
    pub fn salutation(&self) -> &'static str {
        match self.billing_title.as_str() {
            "Herr" => "Sehr geehrter Herr",
            "Frau" => "Sehr geehrte Frau",
            _ => "Guten Tag",
        }
    }
}
