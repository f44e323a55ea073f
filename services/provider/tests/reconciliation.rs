//! Integration tests for the reconciliation flow.
//!
//! These tests drive resources through the lifecycle against the in-memory
//! remote, whose writes only show after a number of reads:
//! 1. The write is accepted
//! 2. The poller waits for it to become visible
//! 3. The state reported back only covers what this tool declared
//!
//! Time is paused, so poll intervals cost nothing.

use std::sync::Arc;
use std::time::Duration;

use gandi_provider::client::MockGandi;
use gandi_provider::client::{Contact, Contacts};
use gandi_provider::resources::{
    AttachmentSpec, DomainSpec, InstanceSpec, NameserversSpec, RecordSpec, RecordState,
};
use gandi_provider::{DeleteOutcome, Lifecycle, Phase, Provider, ProviderError};
use gandi_reconcile::{canonical_eq, sets_equal_unordered};
use proptest::prelude::*;

const ZONE: &str = "example.com";

fn provider(lag: u32) -> (Arc<MockGandi>, Provider) {
    let mock = Arc::new(MockGandi::with_visibility_lag(lag));
    let provider = Provider::with_client(mock.clone(), Lifecycle::new(Duration::from_secs(2)));
    (mock, provider)
}

fn record(name: &str, rtype: &str, values: &[&str], mutable: bool) -> RecordSpec {
    RecordSpec {
        zone: ZONE.to_string(),
        name: name.to_string(),
        rtype: rtype.to_string(),
        ttl: 300,
        values: values.iter().map(|v| v.to_string()).collect(),
        mutable,
    }
}

#[tokio::test(start_paused = true)]
async fn test_create_record_converges_after_one_miss() {
    let (mock, p) = provider(1);

    let state = p
        .lifecycle
        .create(&p.records, &record("www", "A", &["192.168.0.1"], false))
        .await
        .unwrap();

    assert_eq!(state.values, vec!["192.168.0.1"]);
    // One read missed the write, the next one saw it.
    assert_eq!(mock.calls("get_record"), 2);
    assert_eq!(p.lifecycle.phase("example.com/www/A").await, Some(Phase::Present));
}

#[tokio::test(start_paused = true)]
async fn test_mutable_merge_keeps_external_value() {
    let (mock, p) = provider(0);
    let spec = record("@", "TXT", &["terraform-1"], true);

    let state = p.lifecycle.create(&p.records, &spec).await.unwrap();
    mock.external_set_record_values(ZONE, "@", "TXT", &["\"terraform-1\"", "\"manual-1\""]);

    // Re-applying the same declaration leaves the external value alone.
    let state = p.lifecycle.update(&p.records, &state, &spec).await.unwrap();
    let remote = mock.record_values(ZONE, "@", "TXT").unwrap();
    assert!(sets_equal_unordered(&remote, &["terraform-1", "manual-1"]));
    assert_eq!(state.values, vec!["terraform-1"]);

    let read = p.lifecycle.read(&p.records, &state).await.unwrap().unwrap();
    assert_eq!(read.values, vec!["terraform-1"]);
}

#[tokio::test(start_paused = true)]
async fn test_first_apply_joins_existing_rrset() {
    let (mock, p) = provider(2);
    mock.external_set_record_values(ZONE, "@", "TXT", &["\"manual-1\""]);

    let state = p
        .lifecycle
        .create(&p.records, &record("@", "TXT", &["terraform-1"], true))
        .await
        .unwrap();

    assert_eq!(state.values, vec!["terraform-1"]);
    let remote = mock.record_values(ZONE, "@", "TXT").unwrap();
    assert!(sets_equal_unordered(&remote, &["manual-1", "terraform-1"]));
    assert_eq!(mock.calls("create_record"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_read_of_externally_deleted_record_is_absent() {
    let (mock, p) = provider(0);
    let state = p
        .lifecycle
        .create(&p.records, &record("www", "A", &["192.168.0.1"], false))
        .await
        .unwrap();

    mock.external_delete_record(ZONE, "www", "A");
    assert!(p.lifecycle.read(&p.records, &state).await.unwrap().is_none());
    assert_eq!(p.lifecycle.phase("example.com/www/A").await, Some(Phase::Absent));

    // Absent resources can be created again.
    p.lifecycle
        .create(&p.records, &record("www", "A", &["192.168.0.1"], false))
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_during_check_keeps_waiting() {
    let (mock, p) = provider(0);
    mock.inject_read_failures(1, 503);

    let started = tokio::time::Instant::now();
    let state = p
        .lifecycle
        .create(&p.records, &record("www", "A", &["192.168.0.1"], false))
        .await
        .unwrap();

    assert_eq!(state.values, vec!["192.168.0.1"]);
    // The 503 cost one poll interval, then the next read saw the record.
    assert_eq!(mock.calls("get_record"), 2);
    assert_eq!(started.elapsed(), Duration::from_secs(2));
    assert_eq!(p.lifecycle.phase("example.com/www/A").await, Some(Phase::Present));
}

#[tokio::test(start_paused = true)]
async fn test_forbidden_during_check_leaves_unconfirmed() {
    let (mock, p) = provider(0);
    let spec = record("www", "A", &["192.168.0.1"], false);
    mock.inject_read_failures(1, 403);

    let started = tokio::time::Instant::now();
    let err = p.lifecycle.create(&p.records, &spec).await.unwrap_err();
    assert!(matches!(err, ProviderError::Remote(ref e) if e.status() == Some(403)));
    assert!(!err.is_retryable());
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(mock.calls("get_record"), 1);
    assert_eq!(p.lifecycle.phase("example.com/www/A").await, Some(Phase::Unconfirmed));

    // The write landed; importing and reading it confirms the record.
    let state = RecordState::imported(spec.id(), false);
    let read = p.lifecycle.read(&p.records, &state).await.unwrap();
    assert!(read.is_some());
    assert_eq!(p.lifecycle.phase("example.com/www/A").await, Some(Phase::Present));
}

#[tokio::test(start_paused = true)]
async fn test_rejected_write_is_not_unconfirmed() {
    let (mock, p) = provider(0);
    mock.inject_write_failures(1, 400);

    let err = p
        .lifecycle
        .create(&p.records, &record("www", "A", &["192.168.0.1"], false))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Remote(_)));
    assert!(!err.is_retryable());
    assert_eq!(p.lifecycle.phase("example.com/www/A").await, Some(Phase::Absent));
}

#[tokio::test(start_paused = true)]
async fn test_same_resource_is_created_once() {
    let (mock, p) = provider(2);
    let spec = record("www", "A", &["192.168.0.1"], false);

    let (first, second) = tokio::join!(
        p.lifecycle.create(&p.records, &spec),
        p.lifecycle.create(&p.records, &spec),
    );

    // The second create waits for the first, then finds the record present.
    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(ProviderError::InvalidTransition { phase: Phase::Present, .. }))));
    assert_eq!(mock.calls("create_record"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_different_resources_proceed_concurrently() {
    let (mock, p) = provider(3);

    let started = tokio::time::Instant::now();
    let www_record = record("www", "A", &["192.168.0.1"], false);
    let mail_record = record("mail", "A", &["192.168.0.2"], false);
    let (www, mail) = tokio::join!(
        p.lifecycle.create(&p.records, &www_record),
        p.lifecycle.create(&p.records, &mail_record),
    );
    www.unwrap();
    mail.unwrap();

    // Reads age every pending write, so both show within one record's wait.
    assert!(started.elapsed() < Duration::from_secs(8));
    assert_eq!(mock.calls("create_record"), 2);
    assert_eq!(p.lifecycle.locks().len(), 2);
    assert!(!p.lifecycle.locks().is_busy("example.com/www/A"));
}

#[tokio::test(start_paused = true)]
async fn test_delete_outcomes_per_kind() {
    let (mock, p) = provider(1);
    mock.seed_domain(ZONE);
    let lc = &p.lifecycle;

    let plain = lc
        .create(&p.records, &record("www", "A", &["192.168.0.1"], false))
        .await
        .unwrap();
    assert_eq!(lc.delete(&p.records, &plain).await.unwrap(), DeleteOutcome::Removed);

    let shared = lc
        .create(&p.records, &record("@", "TXT", &["terraform-1"], true))
        .await
        .unwrap();
    mock.external_set_record_values(ZONE, "@", "TXT", &["\"terraform-1\"", "\"manual-1\""]);
    assert_eq!(
        lc.delete(&p.records, &shared).await.unwrap(),
        DeleteOutcome::PartiallyReleased
    );

    let ns = lc
        .create(
            &p.nameservers,
            &NameserversSpec {
                domain: ZONE.to_string(),
                nameservers: vec!["a.ns.example.net".to_string()],
            },
        )
        .await
        .unwrap();
    assert_eq!(lc.delete(&p.nameservers, &ns).await.unwrap(), DeleteOutcome::Reverted);

    let attachment = lc
        .create(
            &p.attachments,
            &AttachmentSpec {
                domain: ZONE.to_string(),
                zone: "zone-1".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(
        lc.delete(&p.attachments, &attachment).await.unwrap(),
        DeleteOutcome::Forgotten
    );

    let domain = lc
        .create(
            &p.domains,
            &DomainSpec {
                fqdn: "example.org".to_string(),
                nameservers: None,
                autorenew: false,
                contacts: Contacts {
                    owner: Some(Contact {
                        country: "FR".to_string(),
                        family_name: "Doe".to_string(),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            },
        )
        .await
        .unwrap();
    assert_eq!(lc.delete(&p.domains, &domain).await.unwrap(), DeleteOutcome::Forgotten);

    let instance = lc
        .create(
            &p.instances,
            &InstanceSpec {
                name: "site".to_string(),
                size: "s+".to_string(),
                location: "FR".to_string(),
                database: "mysql".to_string(),
                language: "php".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(lc.delete(&p.instances, &instance).await.unwrap(), DeleteOutcome::Removed);
    assert!(!mock.has_instance(&instance.id));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_first_apply_never_drops_external_values(
        external in prop::collection::hash_set("[a-z]{1,8}", 0..5),
        declared in prop::collection::hash_set("[a-z]{1,8}", 1..4),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();

        runtime.block_on(async {
            let (mock, p) = provider(1);
            let quoted: Vec<String> = external.iter().map(|v| format!("\"{v}\"")).collect();
            if !quoted.is_empty() {
                let quoted: Vec<&str> = quoted.iter().map(String::as_str).collect();
                mock.external_set_record_values(ZONE, "@", "TXT", &quoted);
            }

            let declared: Vec<&str> = declared.iter().map(String::as_str).collect();
            let state = p
                .lifecycle
                .create(&p.records, &record("@", "TXT", &declared, true))
                .await
                .unwrap();

            let remote = mock.record_values(ZONE, "@", "TXT").unwrap();
            let listed = |value: &str| remote.iter().any(|r| canonical_eq(r, value));
            for value in &external {
                prop_assert!(listed(value.as_str()), "external value {} was dropped", value);
            }
            for value in &declared {
                prop_assert!(listed(*value), "declared value {} is missing", value);
            }
            prop_assert_eq!(state.values.len(), declared.len());
            Ok(())
        })?;
    }
}
