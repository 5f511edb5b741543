//! Offer calculation fan-out across banks

mod common;

use rust_decimal_macros::dec;
use uuid::Uuid;

use common::{terms, Harness};
use loan_broker_server::application::ApplicationStatus;
use loan_broker_server::audit::AuditAction;
use loan_broker_server::error::DomainError;
use loan_broker_server::offer::{BankCalculationOutcome, OfferStatus};
use loan_broker_server::rate_card::{Currency, LoanType};

#[tokio::test]
async fn test_calculates_one_offer_per_bank_with_card() {
    let h = Harness::new();
    let alpha = h.add_bank("Alpha").await;
    let beta = h.add_bank("Beta").await;
    let gamma = h.add_bank("Gamma").await;
    h.rate_cards
        .upsert(alpha, LoanType::Personal, Currency::Eur, terms(dec!(7.9)))
        .await
        .unwrap();
    h.rate_cards
        .upsert(beta, LoanType::Personal, Currency::Eur, terms(dec!(6.9)))
        .await
        .unwrap();
    // Wrong market for the application
    h.rate_cards
        .upsert(gamma, LoanType::Mortgage, Currency::Eur, terms(dec!(3.9)))
        .await
        .unwrap();

    let app = h.add_application(ApplicationStatus::Submitted).await;
    let response = h.calculation.calculate_offers(app.id).await.unwrap();

    assert_eq!(response.application_id, app.id);
    assert_eq!(response.offer_ids.len(), 2);
    assert_eq!(response.outcomes.len(), 3);

    let skipped: Vec<Uuid> = response
        .outcomes
        .iter()
        .filter(|o| matches!(o, BankCalculationOutcome::Skipped { .. }))
        .map(|o| o.bank_id())
        .collect();
    assert_eq!(skipped, vec![gamma]);

    let offers = h.offers.list_for_application(app.id).await.unwrap();
    let alpha_offer = offers.iter().find(|o| o.bank_id == alpha).unwrap();
    assert_eq!(alpha_offer.status, OfferStatus::Calculated);
    assert_eq!(alpha_offer.apr, dec!(7.9));
    assert_eq!(alpha_offer.monthly_payment, dec!(312.90));
    assert_eq!(alpha_offer.total_cost, dec!(1264.40));
    assert_eq!(alpha_offer.origination_fee, dec!(200.00));
    assert_eq!(alpha_offer.insurance_cost, dec!(25.00));
    assert_eq!(alpha_offer.validity_period_days, 1);
    assert!(alpha_offer.expires_at > alpha_offer.created_at);

    assert_eq!(h.audit.count(AuditAction::OfferCalculated), 2);
}

#[tokio::test]
async fn test_outcomes_are_ordered_by_bank() {
    let h = Harness::new();
    for name in ["A", "B", "C", "D", "E"] {
        let bank = h.add_bank(name).await;
        h.rate_cards
            .upsert(bank, LoanType::Personal, Currency::Eur, terms(dec!(7.5)))
            .await
            .unwrap();
    }
    let app = h.add_application(ApplicationStatus::Submitted).await;

    let response = h.calculation.calculate_offers(app.id).await.unwrap();
    let ids: Vec<Uuid> = response.outcomes.iter().map(|o| o.bank_id()).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
    assert_eq!(response.offer_ids.len(), 5);
}

#[tokio::test]
async fn test_recalculation_skips_banks_with_live_offers() {
    let h = Harness::new();
    let bank = h.add_bank("Alpha").await;
    h.rate_cards
        .upsert(bank, LoanType::Personal, Currency::Eur, terms(dec!(7.9)))
        .await
        .unwrap();
    let app = h.add_application(ApplicationStatus::Submitted).await;

    h.calculation.calculate_offers(app.id).await.unwrap();
    let second = h.calculation.calculate_offers(app.id).await.unwrap();

    assert!(second.offer_ids.is_empty());
    assert!(matches!(
        second.outcomes.as_slice(),
        [BankCalculationOutcome::Skipped { .. }]
    ));
    assert_eq!(h.offers.list_for_application(app.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_long_term_application_gets_adjusted_apr() {
    let h = Harness::new();
    let bank = h.add_bank("Alpha").await;
    h.rate_cards
        .upsert(bank, LoanType::Personal, Currency::Eur, terms(dec!(7.9)))
        .await
        .unwrap();

    let app = common::application(ApplicationStatus::Submitted, dec!(10000), 121);
    h.store.insert_application(app.clone()).await;

    let response = h.calculation.calculate_offers(app.id).await.unwrap();
    let offer = h.offer(response.offer_ids[0]).await;
    assert_eq!(offer.apr, dec!(8.9));
    assert_eq!(offer.monthly_payment, dec!(125.49));
}

#[tokio::test]
async fn test_terminal_application_is_refused() {
    let h = Harness::new();
    let app = h.add_application(ApplicationStatus::Completed).await;

    let err = h.calculation.calculate_offers(app.id).await.unwrap_err();
    assert!(matches!(err, DomainError::Validation { ref field, .. } if field == "status"));
}

#[tokio::test]
async fn test_unknown_application_is_not_found() {
    let h = Harness::new();
    let err = h
        .calculation
        .calculate_offers(Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound { entity: "Application", .. }));
}
