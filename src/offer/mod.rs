//! Offer domain module
//!
//! Contains the offer models, the calculation fan-out across banks and the
//! borrower and bank facing offer operations.

mod calculation;
mod model;
mod service;

pub use calculation::{OfferCalculationService, OfferSettings};
pub use model::*;
pub use service::OfferService;

use rust_decimal::Decimal;

use crate::amortization::{self, AmortizationInput, AmortizationResult};
use crate::application::Application;
use crate::error::{DomainError, DomainResult};

/// Run the amortization engine over an application's principal and term
pub(crate) fn price_application(
    application: &Application,
    base_apr: Decimal,
    apr_adjustment_range: Decimal,
    origination_fee_percent: Decimal,
    insurance_percent: Decimal,
) -> DomainResult<AmortizationResult> {
    let term_months = u32::try_from(application.term_months)
        .map_err(|_| DomainError::validation("term_months", "must be greater than zero"))?;

    amortization::calculate(&AmortizationInput {
        principal: application.principal,
        term_months,
        base_apr,
        apr_adjustment_range,
        origination_fee_percent,
        insurance_percent,
    })
}
