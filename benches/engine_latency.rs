use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal::Decimal;
use std::sync::Arc;

use dedupr::dedup::Deduplicator;
use dedupr::domain::{
    CreditAttributes, CustomerId, CustomerProfile, IncomingOffer, IncomingRecord, Offer, OfferId,
    ProductType, RawIdentity,
};
use dedupr::engine::{Engine, LockPool};
use dedupr::matching::{CandidatePool, MatchResolver};
use dedupr::normalize::normalize;
use dedupr::observability::EngineMetrics;
use dedupr::rulebook::parse_rule_book;
use dedupr::rules::{RuleEvaluator, RuleRegistry};
use dedupr::store::{MemoryLiveBook, MemoryStore};

const RULE_BOOK: &str = r#"
rule_book_version: "bench"
rule_sets:
  - product_type: PREAPPROVED
    rules:
      - id: MIN_SCORE
        type: min_credit_score
        threshold: 700
      - id: MAX_LOANS
        type: max_existing_loans
        threshold: 3
      - id: MIN_AGE
        type: min_age
        threshold: 21
      - id: CAP
        type: max_offer_amount
        threshold: 1500000
      - id: EMPLOYMENT
        type: allowed_employment_types
        values: [SALARIED, SELF_EMPLOYED]
"#;

fn raw_identity(i: u32) -> RawIdentity {
    RawIdentity {
        mobile_number: Some(format!("+91 9{:09}", i)),
        pan_number: Some(format!("abcde{:04}f", i % 10_000)),
        email_id: Some(format!(" User{}@Example.com ", i)),
        first_name: Some("  asha ".to_string()),
        last_name: Some("Rao".to_string()),
        date_of_birth: chrono::NaiveDate::from_ymd_opt(1988, 4, 12),
        ..Default::default()
    }
}

fn create_test_record(i: u32) -> IncomingRecord {
    IncomingRecord {
        record_id: format!("R{}", i),
        source_system: "OFFER_MGMT".to_string(),
        identity: raw_identity(i),
        credit: CreditAttributes {
            credit_score: Some(760),
            monthly_income: Some(Decimal::new(90_000, 0)),
            existing_loan_count: Some(1),
            residence_type: Some("OWNED".to_string()),
            employment_type: Some("SALARIED".to_string()),
        },
        offers: vec![IncomingOffer {
            offer_id: None,
            campaign_id: "CMP".to_string(),
            product_type: ProductType::Preapproved,
            offer_amount: Decimal::new(200_000, 0),
            tenure_months: 36,
            interest_rate: Decimal::new(1150, 2),
        }],
        received_at: Utc::now(),
    }
}

fn registry() -> RuleRegistry {
    let book = parse_rule_book(RULE_BOOK).unwrap();
    RuleRegistry::from_rule_book(&book).unwrap()
}

fn bench_normalize(c: &mut Criterion) {
    let raw = raw_identity(42);

    c.bench_function("normalize_identity", |b| b.iter(|| normalize(black_box(&raw))));
}

fn bench_resolver(c: &mut Criterion) {
    let resolver = MatchResolver::default();

    let profiles: Vec<CustomerProfile> = (0..50)
        .map(|i| {
            CustomerProfile::from_identity(
                CustomerId::new(format!("C{}", i)),
                &normalize(&raw_identity(i)),
            )
        })
        .collect();
    let incoming = normalize(&raw_identity(25));
    let pool = CandidatePool::new(&[], &profiles);

    c.bench_function("resolve_against_50_profiles", |b| {
        b.iter(|| resolver.resolve(black_box(&incoming), black_box(&pool)))
    });
}

fn bench_deduplicate(c: &mut Criterion) {
    let deduplicator = Deduplicator::default();
    let customer = CustomerId::new("C1");

    let existing: Vec<Offer> = (0..20)
        .map(|i| {
            let mut offer = Offer::new(
                OfferId::new(format!("E{}", i)),
                format!("CMP{}", i % 5),
                if i % 2 == 0 {
                    ProductType::Preapproved
                } else {
                    ProductType::TopUp
                },
                "CDP".to_string(),
                Decimal::new(100_000 + i as i64 * 10_000, 0),
                24,
                Decimal::new(1200, 2),
            );
            offer.customer_id = Some(customer.clone());
            offer.mark_retained(
                dedupr::domain::DedupStatus::Kept,
                dedupr::domain::DedupReason::FirstOfferOfKind,
            );
            offer
        })
        .collect();

    let incoming = Offer::new(
        OfferId::new("NEW"),
        "CMP2",
        ProductType::Preapproved,
        "OFFER_MGMT".to_string(),
        Decimal::new(120_500, 0),
        24,
        Decimal::new(1200, 2),
    );

    c.bench_function("deduplicate_against_20_offers", |b| {
        b.iter(|| {
            deduplicator.deduplicate(
                black_box(&customer),
                black_box(incoming.clone()),
                black_box(&existing),
                None,
            )
        })
    });
}

fn bench_rule_evaluation(c: &mut Criterion) {
    let evaluator = RuleEvaluator::new(registry());
    let profile = CustomerProfile::from_identity(CustomerId::new("C1"), &normalize(&raw_identity(1)));
    let record = create_test_record(1);
    let offers = record.to_offers();
    let fact = dedupr::domain::EligibilityFact::compose(
        &profile,
        &offers[0],
        &record.credit,
        true,
        Utc::now().date_naive(),
    );

    c.bench_function("evaluate_five_rules", |b| {
        b.iter(|| evaluator.evaluate(black_box(&fact)))
    });
}

fn bench_lock_pool(c: &mut Criterion) {
    let pool = LockPool::new();

    for i in 0..1000 {
        pool.lock_for(&format!("pan:ABCDE{:04}F", i));
    }

    c.bench_function("lock_pool_existing_key", |b| {
        let mut i = 0u32;
        b.iter(|| {
            let key = format!("pan:ABCDE{:04}F", i % 1000);
            i = i.wrapping_add(1);
            pool.lock_for(black_box(&key))
        })
    });
}

fn bench_full_pipeline(c: &mut Criterion) {
    let engine = Engine::new(
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryLiveBook::empty()),
        Arc::new(RuleEvaluator::new(registry())),
        Arc::new(EngineMetrics::new()),
    );

    // Pre-populate so most records match an existing profile
    for i in 0..1000 {
        let _ = engine.process(&create_test_record(i));
    }

    c.bench_function("engine_process_record", |b| {
        let mut i = 0u32;
        b.iter(|| {
            let record = create_test_record(i % 2000);
            i = i.wrapping_add(1);
            engine.process(black_box(&record))
        })
    });
}

criterion_group!(
    benches,
    bench_normalize,
    bench_resolver,
    bench_deduplicate,
    bench_rule_evaluation,
    bench_lock_pool,
    bench_full_pipeline,
);

criterion_main!(benches);
