//! Integration tests for follow list reconciliation.
//!
//! These tests drive `ContactManager::refresh_contacts` end to end over an
//! in-memory store, with fake relays standing in for the network.

mod helpers;

use std::collections::BTreeSet;

use helpers::{fast_config, new_pubkey, Harness};
use nostrmail_core::contacts::{Contact, ContactsError};
use nostrmail_core::reconcile::PassStatus;
use tempfile::TempDir;

fn set(pubkeys: &[&String]) -> BTreeSet<String> {
    pubkeys.iter().map(|pk| (*pk).clone()).collect()
}

/// Owner follows `public` publicly and knows `private` privately.
async fn seed(h: &Harness, public: &[&String], private: &[&String]) {
    for pk in public.iter().chain(private) {
        h.manager.observe_sender(pk, "").unwrap();
    }
    for pk in public {
        h.manager
            .toggle_contact_privacy(&h.owner, pk, true)
            .await
            .unwrap();
    }
    for pk in private {
        h.manager
            .toggle_contact_privacy(&h.owner, pk, false)
            .await
            .unwrap();
    }
}

// ============================================================================
// Diff application
// ============================================================================

#[tokio::test]
async fn refresh_adds_promotes_and_demotes() {
    let h = Harness::new(fast_config());
    let (a, b, c, d, e, f) = (
        new_pubkey(),
        new_pubkey(),
        new_pubkey(),
        new_pubkey(),
        new_pubkey(),
        new_pubkey(),
    );
    // A public, B public, C private locally; remote follows A, C, D, E, F
    seed(&h, &[&a, &b], &[&c]).await;
    h.follows.set_list(&[a.clone(), c.clone(), d.clone(), e.clone(), f.clone()]);

    let summary = h.manager.refresh_contacts(&h.owner).await;

    assert_eq!(summary.status, PassStatus::Completed);
    assert_eq!(summary.added, 3);
    assert_eq!(summary.to_private, 1);
    assert_eq!(summary.to_public, 1);
    assert_eq!(summary.unchanged, 1);
    assert!(summary.failures.is_empty());
    assert_eq!(
        summary.message(),
        "Added 3 contacts, 1 converted to private, 1 converted to public"
    );

    assert_eq!(h.public_set(), set(&[&a, &c, &d, &e, &f]));
    let demoted = h.manager.get_contact(&h.owner, &b).unwrap().unwrap();
    assert!(!demoted.is_public);

    let added = h.manager.get_contact(&h.owner, &d).unwrap().unwrap();
    assert!(added.contact.has_placeholder_name());
}

#[tokio::test]
async fn summary_message_for_adds_and_demotion() {
    let h = Harness::new(fast_config());
    let (keep, drop) = (new_pubkey(), new_pubkey());
    seed(&h, &[&keep, &drop], &[]).await;

    let new = [new_pubkey(), new_pubkey(), new_pubkey()];
    let mut remote = new.to_vec();
    remote.push(keep.clone());
    h.follows.set_list(&remote);

    let summary = h.manager.refresh_contacts(&h.owner).await;
    assert_eq!(summary.message(), "Added 3 contacts, 1 converted to private");
}

#[tokio::test]
async fn second_refresh_is_a_noop() {
    let h = Harness::new(fast_config());
    let follows = [new_pubkey(), new_pubkey()];
    h.follows.set_list(&follows);

    let first = h.manager.refresh_contacts(&h.owner).await;
    assert_eq!(first.added, 2);
    let published = h.publisher.published().len();

    let second = h.manager.refresh_contacts(&h.owner).await;
    assert_eq!(second.status, PassStatus::Completed);
    assert!(!second.has_changes());
    assert_eq!(second.unchanged, 2);
    assert_eq!(second.message(), "Contacts are up to date");
    assert_eq!(h.publisher.published().len(), published);
}

#[tokio::test]
async fn existing_private_contact_keeps_its_data_when_followed() {
    let h = Harness::new(fast_config());
    let pk = new_pubkey();
    h.manager
        .save_contact(&h.owner, Contact::new(pk.clone(), "Carol", 0), false)
        .await
        .unwrap();

    h.follows.set_list(std::slice::from_ref(&pk));
    let summary = h.manager.refresh_contacts(&h.owner).await;

    assert_eq!(summary.to_public, 1);
    assert_eq!(summary.added, 0);
    let entry = h.manager.get_contact(&h.owner, &pk).unwrap().unwrap();
    assert!(entry.is_public);
    assert_eq!(entry.contact.display_name, "Carol");
}

#[tokio::test]
async fn relationships_are_per_owner() {
    let h = Harness::new(fast_config());
    let shared = new_pubkey();
    h.follows.set_list(std::slice::from_ref(&shared));
    h.manager.refresh_contacts(&h.owner).await;

    let other_owner = new_pubkey();
    let entry = h.manager.get_contact(&other_owner, &shared).unwrap().unwrap();
    assert!(!entry.is_public);
}

// ============================================================================
// Empty vs missing lists
// ============================================================================

#[tokio::test]
async fn empty_published_list_demotes_everyone() {
    let h = Harness::new(fast_config());
    let (a, b) = (new_pubkey(), new_pubkey());
    seed(&h, &[&a, &b], &[]).await;
    h.follows.set_list(&[]);

    let summary = h.manager.refresh_contacts(&h.owner).await;

    assert_eq!(summary.to_private, 2);
    assert!(h.public_set().is_empty());
    // Contacts survive as private entries
    assert_eq!(h.manager.get_all_contacts(&h.owner).unwrap().len(), 2);
}

#[tokio::test]
async fn missing_list_keeps_public_contacts() {
    let h = Harness::new(fast_config());
    let (a, b) = (new_pubkey(), new_pubkey());
    seed(&h, &[&a, &b], &[]).await;
    h.follows.set_missing();

    let summary = h.manager.refresh_contacts(&h.owner).await;

    assert_eq!(summary.status, PassStatus::Completed);
    assert_eq!(summary.to_private, 0);
    assert_eq!(h.public_set(), set(&[&a, &b]));
}

#[tokio::test]
async fn missing_list_demotes_when_configured() {
    let h = Harness::new(fast_config().with_demote_on_missing_list(true));
    let a = new_pubkey();
    seed(&h, &[&a], &[]).await;
    h.follows.set_missing();

    let summary = h.manager.refresh_contacts(&h.owner).await;
    assert_eq!(summary.to_private, 1);
    assert!(h.public_set().is_empty());
}

// ============================================================================
// Failures and supersession
// ============================================================================

#[tokio::test]
async fn unreachable_relays_abort_without_writes() {
    let h = Harness::new(fast_config());
    let a = new_pubkey();
    seed(&h, &[&a], &[]).await;
    h.follows.set_offline(true);

    let summary = h.manager.refresh_contacts(&h.owner).await;

    assert_eq!(summary.status, PassStatus::Aborted);
    assert!(matches!(
        summary.failures.as_slice(),
        [ContactsError::NetworkUnavailable(_)]
    ));
    assert!(summary.message().starts_with("Could not refresh contacts:"));
    assert_eq!(h.public_set(), set(&[&a]));
}

#[tokio::test]
async fn invalid_owner_aborts() {
    let h = Harness::new(fast_config());
    let summary = h.manager.refresh_contacts("not-a-key").await;

    assert_eq!(summary.status, PassStatus::Aborted);
    assert_eq!(h.follows.calls(), 0);
}

#[tokio::test]
async fn newer_refresh_supersedes_older_one() {
    let h = Harness::new(fast_config());
    let old_follow = new_pubkey();
    let new_follow = new_pubkey();

    h.follows.set_list(std::slice::from_ref(&old_follow));
    let gate = h.follows.hold_next();
    let first = h.manager.refresh_contacts(&h.owner);

    let second = async {
        h.follows.set_list(std::slice::from_ref(&new_follow));
        let summary = h.manager.refresh_contacts(&h.owner).await;
        gate.notify_one();
        summary
    };

    let (first, second) = tokio::join!(first, second);

    assert_eq!(first.status, PassStatus::Superseded);
    assert_eq!(first.message(), "Refresh replaced by a newer one");
    assert_eq!(second.status, PassStatus::Completed);
    // Only the newer pass wrote anything
    assert_eq!(h.public_set(), set(&[&new_follow]));
    assert!(h
        .manager
        .get_contact(&h.owner, &old_follow)
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn failed_row_write_is_reported_and_others_applied() {
    let dir = TempDir::new().unwrap();
    let h = Harness::on_disk(dir.path(), fast_config());
    let (broken, healthy) = (new_pubkey(), new_pubkey());
    seed(&h, &[&broken, &healthy], &[]).await;

    // A second connection makes one relationship row unwritable
    let conn = rusqlite::Connection::open(dir.path().join("contacts.db")).unwrap();
    conn.execute_batch(&format!(
        "CREATE TRIGGER reject_row BEFORE UPDATE ON user_contacts
         WHEN OLD.contact_pubkey = '{broken}'
         BEGIN SELECT RAISE(ABORT, 'disk full'); END;"
    ))
    .unwrap();
    drop(conn);

    h.follows.set_list(&[]);
    let summary = h.manager.refresh_contacts(&h.owner).await;

    assert_eq!(summary.status, PassStatus::Completed);
    assert_eq!(summary.to_private, 1);
    match summary.failures.as_slice() {
        [ContactsError::PartialPersistenceFailure { pubkey, reason }] => {
            assert_eq!(pubkey, &broken);
            assert!(reason.contains("disk full"));
        }
        other => panic!("expected one row failure, got {other:?}"),
    }
    assert!(summary.message().contains("1 failed to save"));

    let demoted = h.manager.get_contact(&h.owner, &healthy).unwrap().unwrap();
    assert!(!demoted.is_public);
    let kept = h.manager.get_contact(&h.owner, &broken).unwrap().unwrap();
    assert!(kept.is_public);
}

// ============================================================================
// Enrichment
// ============================================================================

#[tokio::test]
async fn new_follows_are_enriched() {
    let h = Harness::new(fast_config());
    let pk = new_pubkey();
    h.profiles.set_profile(
        &pk,
        r#"{"name":"alice","display_name":"Alice","about":"hi","nip05":"alice@example.com"}"#,
    );
    h.follows.set_list(std::slice::from_ref(&pk));

    let summary = h.manager.refresh_contacts(&h.owner).await;
    assert_eq!(summary.enriched, 1);

    let contact = h.manager.get_contact(&h.owner, &pk).unwrap().unwrap().contact;
    assert_eq!(contact.display_name, "Alice");
    assert_eq!(contact.about.as_deref(), Some("hi"));
    assert_eq!(contact.email.as_deref(), Some("alice@example.com"));
    assert!(contact.profile_synced_at.is_some());
}

#[tokio::test]
async fn profile_with_both_display_name_spellings_is_applied() {
    let h = Harness::new(fast_config());
    let pk = new_pubkey();
    h.profiles.set_profile(
        &pk,
        r#"{"name":"frank","display_name":"Frank","displayName":"Frank","about":"x"}"#,
    );
    h.follows.set_list(std::slice::from_ref(&pk));

    let summary = h.manager.refresh_contacts(&h.owner).await;
    assert_eq!(summary.enriched, 1);

    let contact = h.manager.get_contact(&h.owner, &pk).unwrap().unwrap().contact;
    assert_eq!(contact.display_name, "Frank");
    assert!(!contact.has_placeholder_name());
}

#[tokio::test]
async fn enrichment_is_chunked() {
    let h = Harness::new(fast_config().with_max_profiles_per_request(2));
    let follows: Vec<String> = (0..5).map(|_| new_pubkey()).collect();
    h.follows.set_list(&follows);

    h.manager.refresh_contacts(&h.owner).await;

    let requests = h.profiles.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|chunk| chunk.len() <= 2));
    let requested: BTreeSet<String> = requests.into_iter().flatten().collect();
    assert_eq!(requested, follows.iter().cloned().collect());
}

#[tokio::test]
async fn failed_enrichment_resumes_on_next_refresh() {
    let h = Harness::new(fast_config());
    let pk = new_pubkey();
    h.profiles.set_profile(&pk, r#"{"name":"Dave"}"#);
    h.follows.set_list(std::slice::from_ref(&pk));

    h.profiles.set_offline(true);
    let first = h.manager.refresh_contacts(&h.owner).await;
    assert_eq!(first.added, 1);
    assert_eq!(first.enriched, 0);
    let contact = h.manager.get_contact(&h.owner, &pk).unwrap().unwrap().contact;
    assert!(contact.profile_synced_at.is_none());

    h.profiles.set_offline(false);
    let second = h.manager.refresh_contacts(&h.owner).await;
    assert!(!second.has_changes());
    assert_eq!(second.enriched, 1);

    let contact = h.manager.get_contact(&h.owner, &pk).unwrap().unwrap().contact;
    assert_eq!(contact.display_name, "Dave");
    assert!(contact.profile_synced_at.is_some());

    // Synced contacts are not requested again
    let third = h.manager.refresh_contacts(&h.owner).await;
    assert_eq!(third.enriched, 0);
    assert_eq!(h.profiles.requests().len(), 2);
}

// ============================================================================
// Publishing
// ============================================================================

#[tokio::test]
async fn refresh_publishes_sorted_public_set_after_change() {
    let h = Harness::new(fast_config());
    let follows = [new_pubkey(), new_pubkey(), new_pubkey()];
    h.follows.set_list(&follows);

    let summary = h.manager.refresh_contacts(&h.owner).await;
    assert!(summary.publish.is_published());

    let mut expected = follows.to_vec();
    expected.sort();
    assert_eq!(h.publisher.last(), Some(expected));
}

#[tokio::test]
async fn failed_publish_keeps_local_changes() {
    let h = Harness::new(fast_config());
    h.publisher.set_failing(true);
    let pk = new_pubkey();
    h.follows.set_list(std::slice::from_ref(&pk));

    let summary = h.manager.refresh_contacts(&h.owner).await;

    assert_eq!(summary.status, PassStatus::Completed);
    assert!(summary.publish.is_pending());
    assert!(summary
        .message()
        .ends_with("(saved locally, not yet published)"));
    assert_eq!(h.public_set(), set(&[&pk]));

    h.publisher.set_failing(false);
    let outcome = h.manager.resync_follow_list(&h.owner).await.unwrap();
    assert!(outcome.is_published());
    assert_eq!(h.publisher.last(), Some(vec![pk]));
}
