//! Entity-level reconciliation against a real schema

use chrono::{TimeZone, Utc};
use hedwig_common::db::{facility, jcmt, people, proposal, review};
use hedwig_common::db::init_memory_database;
use hedwig_common::types::{
    Affiliation, GenericRoles, GroupMember, GroupType, JcmtRequest, ProposalCategory,
    ReviewInput, ReviewerRole, Target,
};
use hedwig_common::{Error, ResultCollection};
use sqlx::SqlitePool;

struct Fixture {
    db: SqlitePool,
    facility_id: i64,
    queue_id: i64,
    call_id: i64,
}

async fn fixture() -> Fixture {
    let db = init_memory_database().await.unwrap();

    let facility_id = facility::ensure_facility(&db, "test_tel").await.unwrap();
    let queue_id = facility::add_queue(&db, facility_id, "Queue1", "Q1").await.unwrap();
    let semester_id = facility::add_semester(
        &db,
        facility_id,
        "Semester1",
        "S1",
        Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap(),
    )
    .await
    .unwrap();
    let call_id = facility::add_call(
        &db,
        semester_id,
        queue_id,
        Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap(),
    )
    .await
    .unwrap();

    Fixture {
        db,
        facility_id,
        queue_id,
        call_id,
    }
}

fn affiliations(queue_id: i64, names: &[&str]) -> ResultCollection<Affiliation> {
    ResultCollection::from_values(names.iter().map(|name| Affiliation {
        id: None,
        queue_id,
        name: name.to_string(),
        hidden: false,
    }))
}

async fn affiliation_names(f: &Fixture) -> Vec<String> {
    facility::search_affiliation(&f.db, f.queue_id, None, true)
        .await
        .unwrap()
        .values()
        .map(|a| a.name.clone())
        .collect()
}

fn rename(records: &mut ResultCollection<Affiliation>, id: i64, name: &str) {
    records.get_mut(id).unwrap().name = name.to_string();
}

#[tokio::test]
async fn test_sync_affiliation_delete_then_rename() {
    let f = fixture().await;

    let records = affiliations(f.queue_id, &["Aff A", "Aff B", "Aff C", "Aff D", "Aff E", "Aff F"]);
    let n = facility::sync_queue_affiliation(&f.db, f.queue_id, &records).await.unwrap();
    assert_eq!(n.as_tuple(), (6, 0, 0));

    let mut records = facility::search_affiliation(&f.db, f.queue_id, None, true).await.unwrap();
    let id: Vec<i64> = records.keys().collect();

    // Rename to a name which another record still holds.
    rename(&mut records, id[0], "Aff F");
    let err = facility::sync_queue_affiliation(&f.db, f.queue_id, &records).await.unwrap_err();
    assert!(matches!(err, Error::User(_)));
    assert!(err.to_string().contains("duplicate values"));

    // Deleting the holder in the same sync makes it work.
    records.remove(id[5]);
    let n = facility::sync_queue_affiliation(&f.db, f.queue_id, &records).await.unwrap();
    assert_eq!(n.as_tuple(), (0, 1, 1));
    assert_eq!(
        affiliation_names(&f).await,
        vec!["Aff F", "Aff B", "Aff C", "Aff D", "Aff E"]
    );

    // Rename one record to another's old name while that one is renamed too.
    rename(&mut records, id[1], "Aff E");
    rename(&mut records, id[4], "Aff EE");
    let n = facility::sync_queue_affiliation(&f.db, f.queue_id, &records).await.unwrap();
    assert_eq!(n.as_tuple(), (0, 2, 0));
    assert_eq!(
        affiliation_names(&f).await,
        vec!["Aff F", "Aff E", "Aff C", "Aff D", "Aff EE"]
    );
}

#[tokio::test]
async fn test_sync_affiliation_circular() {
    let f = fixture().await;

    let records = affiliations(f.queue_id, &["Aff A", "Aff B", "Aff C", "Aff D", "Aff E"]);
    let n = facility::sync_queue_affiliation(&f.db, f.queue_id, &records).await.unwrap();
    assert_eq!(n.as_tuple(), (5, 0, 0));

    let mut records = facility::search_affiliation(&f.db, f.queue_id, None, true).await.unwrap();
    let id: Vec<i64> = records.keys().collect();

    rename(&mut records, id[1], "Aff C");
    rename(&mut records, id[2], "Aff D");
    rename(&mut records, id[3], "Aff B");

    let err = facility::sync_queue_affiliation(&f.db, f.queue_id, &records).await.unwrap_err();
    assert!(err.to_string().contains("Circular update"));

    // The failed sync left the stored names alone.
    assert_eq!(
        affiliation_names(&f).await,
        vec!["Aff A", "Aff B", "Aff C", "Aff D", "Aff E"]
    );
}

#[tokio::test]
async fn test_sync_affiliation_missing_queue() {
    let f = fixture().await;

    let records = affiliations(f.queue_id, &["Aff A"]);
    let err = facility::sync_queue_affiliation(&f.db, f.queue_id + 100, &records)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Consistency(_)));
    assert!(err.to_string().contains("queue does not exist"));
}

async fn proposal_with_members(f: &Fixture) -> (i64, i64, i64) {
    let proposal_id = proposal::add_proposal(&f.db, f.call_id, "A proposal").await.unwrap();
    let affiliation_id = {
        facility::sync_queue_affiliation(&f.db, f.queue_id, &affiliations(f.queue_id, &["Aff"]))
            .await
            .unwrap();
        facility::search_affiliation(&f.db, f.queue_id, None, true)
            .await
            .unwrap()
            .keys()
            .next()
            .unwrap()
    };

    let alice = people::add_person(&f.db, "Alice", true, None, false).await.unwrap();
    let bob = people::add_person(&f.db, "Bob", true, None, false).await.unwrap();

    proposal::add_member(&f.db, proposal_id, alice, affiliation_id, true, true, false)
        .await
        .unwrap();
    proposal::add_member(&f.db, proposal_id, bob, affiliation_id, false, false, false)
        .await
        .unwrap();

    (proposal_id, alice, bob)
}

#[tokio::test]
async fn test_sync_member_roles() {
    let f = fixture().await;
    let (proposal_id, alice, bob) = proposal_with_members(&f).await;

    let mut members = proposal::search_member(&f.db, proposal_id).await.unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members.get_pi().unwrap().person_name.as_deref(), Some("Alice"));

    // Hand the PI role to Bob and make him an editor.
    for member in members.values_mut() {
        member.pi = member.person_id == bob;
        member.editor = true;
    }
    let n = proposal::sync_proposal_member(&f.db, proposal_id, &members, Some(alice))
        .await
        .unwrap();
    assert_eq!(n.as_tuple(), (0, 2, 0));

    let stored = proposal::search_member(&f.db, proposal_id).await.unwrap();
    assert_eq!(stored.get_pi().unwrap().person_id, bob);

    // Alice may not remove her own editor rights.
    let mut members = stored.clone();
    for member in members.values_mut() {
        member.editor = member.person_id == bob;
    }
    let err = proposal::sync_proposal_member(&f.db, proposal_id, &members, Some(alice))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "You can not remove yourself as an editor.");

    // New members can not be added through sync.
    let mut members = stored.clone();
    let mut extra = members.get_person(bob).unwrap().clone();
    extra.id = None;
    extra.pi = false;
    members.insert(-1, extra);
    let err = proposal::sync_proposal_member(&f.db, proposal_id, &members, None)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "New entries can not be added here.");
}

#[tokio::test]
async fn test_sync_member_students_and_institutions() {
    let f = fixture().await;
    let (proposal_id, _alice, bob) = proposal_with_members(&f).await;
    let institution_id = people::add_institution(&f.db, "University", "", "", "GB")
        .await
        .unwrap();

    let mut members = proposal::search_member(&f.db, proposal_id).await.unwrap();
    for member in members.values_mut() {
        member.student = member.person_id == bob;
        member.institution_id = Some(institution_id);
    }

    let n = proposal::sync_proposal_member_student(&f.db, proposal_id, &members)
        .await
        .unwrap();
    assert_eq!(n.as_tuple(), (0, 1, 0));

    let n = proposal::sync_proposal_member_institution(&f.db, proposal_id, &members)
        .await
        .unwrap();
    assert_eq!(n.as_tuple(), (0, 2, 0));

    let stored = proposal::search_member(&f.db, proposal_id).await.unwrap();
    assert_eq!(stored.get_students().len(), 1);
    assert!(stored.values().all(|m| m.institution_id == Some(institution_id)));

    // Neither operation may remove members.
    let first = members.keys().next().unwrap();
    members.remove(first);
    let err = proposal::sync_proposal_member_student(&f.db, proposal_id, &members)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Entries can not be deleted here.");
}

#[tokio::test]
async fn test_sync_targets_assigns_sort_order() {
    let f = fixture().await;
    let proposal_id = proposal::add_proposal(&f.db, f.call_id, "Targets").await.unwrap();

    let target = |name: &str, time: Option<f64>| Target {
        id: None,
        proposal_id,
        sort_order: None,
        name: name.to_string(),
        system: Some(1),
        x: Some(1.5),
        y: Some(-0.5),
        time,
        priority: None,
    };

    let records = ResultCollection::from_values([target("M31", Some(1.0)), target("M33", Some(2.5))]);
    let n = proposal::sync_proposal_target(&f.db, proposal_id, &records).await.unwrap();
    assert_eq!(n.as_tuple(), (2, 0, 0));

    let stored = proposal::search_target(&f.db, proposal_id).await.unwrap();
    let orders: Vec<_> = stored.values().map(|t| t.sort_order).collect();
    assert_eq!(orders, vec![Some(1), Some(2)]);
    assert_eq!(stored.total_time(), 3.5);

    // Resubmitting the stored targets changes nothing.
    let n = proposal::sync_proposal_target(&f.db, proposal_id, &stored).await.unwrap();
    assert_eq!(n.as_tuple(), (0, 0, 0));
}

#[tokio::test]
async fn test_sync_proposal_category_unique() {
    let f = fixture().await;
    let proposal_id = proposal::add_proposal(&f.db, f.call_id, "Categories").await.unwrap();

    let categories = ResultCollection::from_values(["Stars", "Planets"].map(|name| {
        hedwig_common::types::Category {
            id: None,
            facility_id: f.facility_id,
            name: name.to_string(),
            hidden: false,
        }
    }));
    facility::sync_facility_category(&f.db, f.facility_id, &categories).await.unwrap();
    let category_ids: Vec<i64> = facility::search_category(&f.db, f.facility_id, None)
        .await
        .unwrap()
        .keys()
        .collect();

    let selection = |ids: &[i64]| {
        ResultCollection::from_values(ids.iter().map(|id| ProposalCategory {
            id: None,
            proposal_id,
            category_id: *id,
            category_name: None,
        }))
    };

    let n = proposal::sync_proposal_category(&f.db, proposal_id, &selection(&category_ids))
        .await
        .unwrap();
    assert_eq!(n.as_tuple(), (2, 0, 0));

    let stored = proposal::search_proposal_category(&f.db, proposal_id).await.unwrap();
    let names: Vec<_> = stored.values().filter_map(|c| c.category_name.clone()).collect();
    assert_eq!(names, vec!["Planets", "Stars"]);

    let err = proposal::sync_proposal_category(
        &f.db,
        proposal_id,
        &selection(&[category_ids[0], category_ids[0]]),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("duplicate values"));
}

#[tokio::test]
async fn test_sync_group_member_only_removes() {
    let f = fixture().await;
    let alice = people::add_person(&f.db, "Alice", false, None, false).await.unwrap();
    let bob = people::add_person(&f.db, "Bob", false, None, false).await.unwrap();

    review::add_group_member(&f.db, f.queue_id, GroupType::Committee, alice).await.unwrap();
    review::add_group_member(&f.db, f.queue_id, GroupType::Committee, bob).await.unwrap();
    review::add_group_member(&f.db, f.queue_id, GroupType::Technical, alice).await.unwrap();

    let mut committee = review::search_group_member(&f.db, f.queue_id, Some(GroupType::Committee))
        .await
        .unwrap();
    assert_eq!(committee.len(), 2);

    let bob_key = committee.iter().find(|(_, m)| m.person_id == bob).map(|(k, _)| k).unwrap();
    committee.remove(bob_key);

    let n = review::sync_group_member(&f.db, f.queue_id, GroupType::Committee, &committee)
        .await
        .unwrap();
    assert_eq!(n.as_tuple(), (0, 0, 1));

    // The technical group is a separate partition.
    let all = review::search_group_member(&f.db, f.queue_id, None).await.unwrap();
    assert_eq!(all.values_by_group_type(GroupType::Committee).len(), 1);
    assert_eq!(all.values_by_group_type(GroupType::Technical).len(), 1);

    committee.insert(
        -1,
        GroupMember {
            id: None,
            queue_id: f.queue_id,
            group_type: GroupType::Committee,
            person_id: bob,
            person_name: None,
        },
    );
    let err = review::sync_group_member(&f.db, f.queue_id, GroupType::Committee, &committee)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "New entries can not be added here.");
}

#[tokio::test]
async fn test_sync_jcmt_request_reorders_unique_pairs() {
    let f = fixture().await;
    let proposal_id = proposal::add_proposal(&f.db, f.call_id, "JCMT").await.unwrap();

    let request = |weather: i64, time: f64| JcmtRequest {
        id: None,
        proposal_id,
        instrument: 2,
        weather,
        time,
    };

    let records = ResultCollection::from_values([request(1, 4.0), request(2, 2.0)]);
    let n = jcmt::sync_jcmt_proposal_request(&f.db, proposal_id, &records).await.unwrap();
    assert_eq!(n.as_tuple(), (2, 0, 0));

    // Move band 2 time to band 3 and band 1 time to band 2.
    let mut stored = jcmt::search_jcmt_request(&f.db, proposal_id).await.unwrap();
    for record in stored.values_mut() {
        record.weather += 1;
    }
    let n = jcmt::sync_jcmt_proposal_request(&f.db, proposal_id, &stored).await.unwrap();
    assert_eq!(n.as_tuple(), (0, 2, 0));

    let stored = jcmt::search_jcmt_request(&f.db, proposal_id).await.unwrap();
    let table = stored.to_table();
    assert_eq!(table.table[&2][&2], 4.0);
    assert_eq!(table.table[&2][&3], 2.0);

    // Allocations are kept separately from requests.
    assert!(jcmt::search_jcmt_allocation(&f.db, proposal_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_overall_rating_from_stored_reviews() {
    let f = fixture().await;
    let proposal_id = proposal::add_proposal(&f.db, f.call_id, "Rated").await.unwrap();
    let alice = people::add_person(&f.db, "Alice", false, None, false).await.unwrap();
    let bob = people::add_person(&f.db, "Bob", false, None, false).await.unwrap();

    let primary = review::add_reviewer(&f.db, &GenericRoles, proposal_id, alice, ReviewerRole::CommitteePrimary)
        .await
        .unwrap();
    let other = review::add_reviewer(&f.db, &GenericRoles, proposal_id, bob, ReviewerRole::CommitteeOther)
        .await
        .unwrap();

    // A second primary reviewer is not allowed.
    let err = review::add_reviewer(&f.db, &GenericRoles, proposal_id, bob, ReviewerRole::CommitteePrimary)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::User(_)));

    let reviewers = review::search_reviewer(&f.db, proposal_id).await.unwrap();
    assert_eq!(reviewers.overall_rating(&GenericRoles, true), None);

    review::set_review(
        &f.db,
        &GenericRoles,
        primary,
        &ReviewInput {
            text: Some("Good".to_string()),
            assessment: None,
            rating: Some(80),
            weight: Some(100),
        },
        false,
    )
    .await
    .unwrap();

    let err = review::set_review(
        &f.db,
        &GenericRoles,
        other,
        &ReviewInput {
            text: Some("Not wanted".to_string()),
            assessment: None,
            rating: Some(50),
            weight: Some(50),
        },
        false,
    )
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "The text should not be specified.");

    review::set_review(
        &f.db,
        &GenericRoles,
        other,
        &ReviewInput {
            text: None,
            assessment: None,
            rating: Some(50),
            weight: Some(50),
        },
        false,
    )
    .await
    .unwrap();

    let reviewers = review::search_reviewer(&f.db, proposal_id).await.unwrap();
    assert!(reviewers.values().all(|r| r.review_present));

    // (80 * 1.0 + 50 * 0.5) / 1.5
    let rating = reviewers.overall_rating(&GenericRoles, false).unwrap();
    assert!((rating - 70.0).abs() < 1e-9);

    let by_call = review::search_reviewer_by_call(&f.db, f.call_id).await.unwrap();
    assert_eq!(by_call.len(), 2);
}

#[tokio::test]
async fn test_review_insert_and_update_must_match_stored_state() {
    let f = fixture().await;
    let proposal_id = proposal::add_proposal(&f.db, f.call_id, "Reviewed").await.unwrap();
    let alice = people::add_person(&f.db, "Alice", false, None, false).await.unwrap();
    let reviewer = review::add_reviewer(&f.db, &GenericRoles, proposal_id, alice, ReviewerRole::CommitteeOther)
        .await
        .unwrap();

    let input = |rating| ReviewInput {
        text: None,
        assessment: None,
        rating: Some(rating),
        weight: Some(100),
    };

    // Nothing stored yet, so there is nothing to update.
    let err = review::set_review(&f.db, &GenericRoles, reviewer, &input(10), true)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Consistency(_)));
    assert_eq!(
        err.to_string(),
        format!("Consistency error: review does not exist for reviewer {}", reviewer)
    );

    review::set_review(&f.db, &GenericRoles, reviewer, &input(10), false)
        .await
        .unwrap();

    // A second insert must not silently replace the first review.
    let err = review::set_review(&f.db, &GenericRoles, reviewer, &input(90), false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Consistency(_)));
    assert!(err.to_string().contains("review already exists for reviewer"));

    let reviewers = review::search_reviewer(&f.db, proposal_id).await.unwrap();
    assert_eq!(reviewers.get_single().unwrap().review_rating, Some(10));

    review::set_review(&f.db, &GenericRoles, reviewer, &input(90), true)
        .await
        .unwrap();

    let reviewers = review::search_reviewer(&f.db, proposal_id).await.unwrap();
    assert_eq!(reviewers.get_single().unwrap().review_rating, Some(90));
}
