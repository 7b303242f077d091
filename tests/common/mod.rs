//! Shared fixtures for integration tests

#![allow(dead_code)]

use chrono::Utc;
use cohort::adapters::database::CohortDistributionStore;
use cohort::adapters::memory::InMemoryStore;
use cohort::core::ingestion::ValidationRequest;
use cohort::domain::{
    CohortDistributionRecord, Demographics, NhsNumber, Participant, RecordType,
};
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;

/// `count` distinct NHS numbers with valid check digits
pub fn nhs_numbers(count: usize) -> Vec<String> {
    (0u64..)
        .map(|n| 943_476_000 + n * 7)
        .filter_map(|base| {
            let digits: Vec<u64> = base.to_string().bytes().map(|b| u64::from(b - b'0')).collect();
            let sum: u64 = digits
                .iter()
                .zip((2..=10).rev())
                .map(|(d, w)| d * w)
                .sum();
            match 11 - (sum % 11) {
                10 => None,
                11 => Some(format!("{}0", base)),
                check => Some(format!("{}{}", base, check)),
            }
        })
        .take(count)
        .collect()
}

/// Subject keys that always fail the check digit
pub fn invalid_nhs_numbers(count: usize) -> Vec<String> {
    (0..count).map(|n| format!("123456789{}", n % 10)).collect()
}

/// A new participant that passes every rule
pub fn clean_participant(nhs_number: &str) -> Participant {
    let given: String = FirstName().fake();
    let family: String = LastName().fake();

    Participant::builder()
        .nhs_number(nhs_number)
        .record_type(RecordType::Add)
        .screening_name("Breast Screening")
        .demographics(Demographics {
            primary_care_provider: Some("A81001".to_string()),
            given_name: Some(given),
            family_name: Some(family),
            date_of_birth: Some("19700101".to_string()),
            gender: Some(2),
            address_line1: Some("1 High Street".to_string()),
            postcode: Some("LS1 4AP".to_string()),
            ..Demographics::default()
        })
        .build()
        .expect("participant builds")
}

pub fn request(participant: Participant) -> ValidationRequest {
    ValidationRequest::new(participant, Some("BSS_20250101.json".to_string()))
}

/// Commit `count` clean records directly, bypassing validation
pub async fn seed_records(store: &InMemoryStore, count: usize) -> Vec<CohortDistributionRecord> {
    let mut committed = Vec::with_capacity(count);
    for nhs_number in nhs_numbers(count) {
        let participant = clean_participant(&nhs_number);
        let record = CohortDistributionRecord::from_participant(
            &participant,
            NhsNumber::new(&nhs_number).expect("valid NHS number"),
            false,
            Utc::now(),
        );
        committed.push(store.insert_record(record).await.expect("insert"));
    }
    committed
}
