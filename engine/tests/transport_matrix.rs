//! Runner behaviour per transport against the in-memory backend.
//!
//! Every test builds scenarios the way suite authors do and runs them through
//! the default registry, so staging, the transport call and the post-state
//! check are all exercised.

use std::time::Duration;

use engine::io::fixture::RecordFixture;
use engine::test_support::InMemoryBackend;
use engine::{
    AssertionFailure, Check, Credential, Mode, Operation, Outcome, RecordState, RequestVariant,
    Scenario, TargetRecord, Transport, given,
};

fn assertion(err: &anyhow::Error) -> &AssertionFailure {
    err.downcast_ref::<AssertionFailure>()
        .unwrap_or_else(|| panic!("expected assertion failure, got: {err:#}"))
}

#[test]
fn web_api_modify_with_marker_adds_marker_in_old_mode() {
    let backend = InMemoryBackend::new();
    let context = backend.context();
    let scenario = given(Mode::Old, RecordState::ExistsWithoutMarker)
        .when_with(Transport::WebApi, Operation::Modify, RequestVariant::WithMarker)
        .then_with(Outcome::Success, RecordState::ExistsWithMarker);

    scenario.run(&context).expect("run");

    assert!(backend.calls().contains(&"web_api PUT".to_string()));
    let stored = backend.stored().expect("record stored");
    assert!(stored.contains("changed: conformance@example.net 20130101"));
    assert_eq!(backend.record_state(), RecordState::ExistsWithMarker);
}

#[test]
fn web_api_modify_with_marker_drops_marker_in_new_mode() {
    let backend = InMemoryBackend::new();
    let context = backend.context();
    given(Mode::New, RecordState::ExistsWithoutMarker)
        .when_with(Transport::WebApi, Operation::Modify, RequestVariant::WithMarker)
        .then_with(Outcome::Success, RecordState::ExistsWithoutMarker)
        .run(&context)
        .expect("run");
    assert_eq!(backend.mode(), Mode::New);
    assert_eq!(backend.record_state(), RecordState::ExistsWithoutMarker);
}

#[test]
fn wrong_post_state_is_an_assertion_failure_naming_the_scenario() {
    let backend = InMemoryBackend::new();
    let context = backend.context();
    let scenario = given(Mode::New, RecordState::ExistsWithoutMarker)
        .when_with(Transport::WebApi, Operation::Modify, RequestVariant::WithMarker)
        .then_with(Outcome::Success, RecordState::ExistsWithMarker);

    let err = scenario.run(&context).expect_err("should fail");
    let failure = assertion(&err);
    assert_eq!(failure.check, Check::PostState);
    assert_eq!(failure.observed, "OBJ_EXISTS_NO_CHANGED__");
    assert!(err.to_string().starts_with(&scenario.to_string()));
}

#[test]
fn web_api_create_on_absent_record() {
    let backend = InMemoryBackend::new();
    let context = backend.context();
    given(Mode::Old, RecordState::Absent)
        .when_with(Transport::WebApi, Operation::Create, RequestVariant::WithMarker)
        .then_with(Outcome::Success, RecordState::ExistsWithMarker)
        .run(&context)
        .expect("run");
    assert!(backend.calls().contains(&"web_api POST".to_string()));
}

#[test]
fn web_api_create_on_existing_record_fails_and_keeps_state() {
    let backend = InMemoryBackend::new();
    let context = backend.context();
    given(Mode::Old, RecordState::ExistsWithMarker)
        .when_with(Transport::WebApi, Operation::Create, RequestVariant::WithoutMarker)
        .then(Outcome::Failure)
        .run(&context)
        .expect("run");
    assert_eq!(backend.record_state(), RecordState::ExistsWithMarker);
}

#[test]
fn web_api_delete_removes_record() {
    let backend = InMemoryBackend::new();
    let context = backend.context();
    given(Mode::New, RecordState::ExistsWithMarker)
        .when(Transport::WebApi, Operation::Delete)
        .then_with(Outcome::Success, RecordState::Absent)
        .run(&context)
        .expect("run");
    assert_eq!(backend.stored(), None);
}

#[test]
fn web_api_reads_succeed_only_when_record_exists() {
    let backend = InMemoryBackend::new();
    let context = backend.context();
    for operation in [Operation::Search, Operation::Fetch] {
        given(Mode::Old, RecordState::ExistsWithMarker)
            .when(Transport::WebApi, operation)
            .then(Outcome::Success)
            .run(&context)
            .expect("read existing");
        given(Mode::Old, RecordState::Absent)
            .when(Transport::WebApi, operation)
            .then(Outcome::Failure)
            .run(&context)
            .expect("read absent");
    }
}

#[test]
fn web_api_metadata_and_unsupported_event() {
    let backend = InMemoryBackend::new();
    let context = backend.context();
    given(Mode::New, RecordState::Absent)
        .when(Transport::WebApi, Operation::MetadataFetch)
        .then(Outcome::Success)
        .run(&context)
        .expect("metadata");
    given(Mode::New, RecordState::Absent)
        .when(Transport::WebApi, Operation::EventNotify)
        .then(Outcome::Failure)
        .run(&context)
        .expect("event");
}

#[test]
fn session_queries_record_and_template() {
    let backend = InMemoryBackend::new();
    let context = backend.context();
    given(Mode::Old, RecordState::ExistsWithoutMarker)
        .when(Transport::InteractiveSession, Operation::Fetch)
        .then(Outcome::Success)
        .run(&context)
        .expect("fetch");
    given(Mode::Old, RecordState::ExistsWithoutMarker)
        .when(Transport::InteractiveSession, Operation::MetadataFetch)
        .then(Outcome::Success)
        .run(&context)
        .expect("template");
    let calls = backend.calls();
    assert!(calls.contains(&"session -r -B -T person CT1-TEST".to_string()));
    assert!(calls.contains(&"session -t person".to_string()));
}

#[test]
fn session_search_on_absent_record_fails() {
    let backend = InMemoryBackend::new();
    let context = backend.context();
    given(Mode::Old, RecordState::Absent)
        .when(Transport::InteractiveSession, Operation::Search)
        .then(Outcome::Failure)
        .run(&context)
        .expect("run");
}

#[test]
fn session_cannot_create() {
    let backend = InMemoryBackend::new();
    let context = backend.context();
    let declared_success = given(Mode::Old, RecordState::Absent)
        .when_with(
            Transport::InteractiveSession,
            Operation::Create,
            RequestVariant::WithMarker,
        )
        .then_with(Outcome::Success, RecordState::ExistsWithMarker);
    let err = declared_success.run(&context).expect_err("should fail");
    let failure = assertion(&err);
    assert_eq!(failure.check, Check::Outcome);
    assert_eq!(failure.observed, "FAILED");
    assert_eq!(backend.record_state(), RecordState::Absent);
}

#[test]
fn batch_modify_without_marker_removes_it() {
    let backend = InMemoryBackend::new();
    let context = backend.context();
    given(Mode::Old, RecordState::ExistsWithMarker)
        .when_with(
            Transport::SyncBatch,
            Operation::Modify,
            RequestVariant::WithoutMarker,
        )
        .then_with(Outcome::Success, RecordState::ExistsWithoutMarker)
        .run(&context)
        .expect("run");
    assert!(backend.calls().contains(&"batch submit".to_string()));
}

#[test]
fn batch_identical_modify_counts_as_success() {
    let backend = InMemoryBackend::new();
    let context = backend.context();
    given(Mode::Old, RecordState::ExistsWithoutMarker)
        .when(Transport::SyncBatch, Operation::Modify)
        .then(Outcome::Success)
        .run(&context)
        .expect("run");
}

#[test]
fn batch_delete_removes_record() {
    let backend = InMemoryBackend::new();
    let context = backend.context();
    given(Mode::Old, RecordState::ExistsWithMarker)
        .when(Transport::SyncBatch, Operation::Delete)
        .then_with(Outcome::Success, RecordState::Absent)
        .run(&context)
        .expect("run");
}

#[test]
fn batch_with_wrong_password_is_rejected() {
    let backend = InMemoryBackend::new();
    let mut settings = backend.settings();
    settings.credentials = vec![Credential::password("wrong")];
    let context = backend.context_with(settings);
    given(Mode::Old, RecordState::Absent)
        .when_with(Transport::SyncBatch, Operation::Create, RequestVariant::WithoutMarker)
        .then(Outcome::Failure)
        .run(&context)
        .expect("run");
    assert_eq!(backend.record_state(), RecordState::Absent);
}

#[test]
fn mail_waits_for_late_acknowledgement() {
    let backend = InMemoryBackend::new();
    backend.delay_acknowledgements(3);
    let context = backend.context();
    given(Mode::Old, RecordState::Absent)
        .when_with(
            Transport::AsyncSubmission,
            Operation::Create,
            RequestVariant::WithMarker,
        )
        .then_with(Outcome::Success, RecordState::ExistsWithMarker)
        .run(&context)
        .expect("run");
}

#[test]
fn mail_without_acknowledgement_is_an_error_not_a_failure() {
    let backend = InMemoryBackend::new();
    backend.drop_acknowledgements();
    let mut settings = backend.settings();
    settings.timeout = std::time::Duration::from_millis(50);
    let context = backend.context_with(settings);
    let err = given(Mode::Old, RecordState::Absent)
        .when(Transport::AsyncSubmission, Operation::Create)
        .then(Outcome::Success)
        .run(&context)
        .expect_err("should error");
    assert!(err.downcast_ref::<AssertionFailure>().is_none());
    assert!(err.to_string().contains("no acknowledgement"));
}

#[test]
fn stream_announces_staged_record() {
    let backend = InMemoryBackend::new();
    let context = backend.context();
    given(Mode::Old, RecordState::ExistsWithMarker)
        .when(Transport::ReplicationStream, Operation::EventNotify)
        .then(Outcome::Success)
        .run(&context)
        .expect("run");
    assert_eq!(backend.serial(), 1);
}

#[test]
fn stream_has_nothing_to_announce_for_absent_record() {
    let backend = InMemoryBackend::new();
    let context = backend.context();
    given(Mode::Old, RecordState::Absent)
        .when(Transport::ReplicationStream, Operation::EventNotify)
        .then(Outcome::Failure)
        .run(&context)
        .expect("never existed");

    given(Mode::Old, RecordState::ExistsWithoutMarker)
        .when(Transport::ReplicationStream, Operation::EventNotify)
        .then(Outcome::Success)
        .run(&context)
        .expect("created");

    given(Mode::Old, RecordState::Absent)
        .when(Transport::ReplicationStream, Operation::EventNotify)
        .then(Outcome::Failure)
        .run(&context)
        .expect("deleted");
}

#[test]
fn stream_verdict_does_not_depend_on_earlier_runs() {
    let backend = InMemoryBackend::new();
    let context = backend.context();
    let announced = given(Mode::Old, RecordState::ExistsWithMarker)
        .when(Transport::ReplicationStream, Operation::EventNotify)
        .then(Outcome::Success);
    let withdrawn = given(Mode::New, RecordState::Absent)
        .when(Transport::ReplicationStream, Operation::EventNotify)
        .then(Outcome::Failure);

    for round in 0..2 {
        announced
            .run(&context)
            .unwrap_or_else(|err| panic!("announced, round {round}: {err:#}"));
        withdrawn
            .run(&context)
            .unwrap_or_else(|err| panic!("withdrawn, round {round}: {err:#}"));
        withdrawn
            .run(&context)
            .unwrap_or_else(|err| panic!("withdrawn again, round {round}: {err:#}"));
    }
    announced.run(&context).expect("announced again");
    announced.run(&context).expect("announced twice in a row");
}

#[test]
fn web_api_can_drop_marker_staged_before_new_mode() {
    let backend = InMemoryBackend::new();
    let context = backend.context();
    given(Mode::New, RecordState::ExistsWithMarker)
        .when_with(Transport::WebApi, Operation::Modify, RequestVariant::WithoutMarker)
        .then_with(Outcome::Success, RecordState::ExistsWithoutMarker)
        .run(&context)
        .expect("run");
    assert_eq!(backend.mode(), Mode::New);
    assert_eq!(backend.record_state(), RecordState::ExistsWithoutMarker);
}

#[test]
fn new_mode_fixture_cannot_write_the_marker() {
    let backend = InMemoryBackend::new();
    backend
        .apply_mode(Mode::New, Duration::from_secs(1))
        .expect("switch");
    let err = backend
        .stage(
            &TargetRecord::default(),
            RecordState::ExistsWithMarker,
            Duration::from_secs(1),
        )
        .expect_err("marker is dropped in new mode");
    assert!(err.to_string().contains("could not stage OBJ_EXISTS_WITH_CHANGED"));
}

#[test]
fn stream_offers_no_mutations() {
    let backend = InMemoryBackend::new();
    let context = backend.context();
    for operation in [Operation::Create, Operation::Modify, Operation::Delete] {
        Scenario::given(Mode::New, RecordState::ExistsWithoutMarker)
            .when(Transport::ReplicationStream, operation)
            .then(Outcome::Failure)
            .run(&context)
            .expect("run");
    }
}

#[test]
fn unavailable_transport_surfaces_as_error() {
    let backend = InMemoryBackend::new();
    backend.break_transport(Transport::WebApi);
    let context = backend.context();
    let err = given(Mode::Old, RecordState::ExistsWithoutMarker)
        .when(Transport::WebApi, Operation::Fetch)
        .then(Outcome::Success)
        .run(&context)
        .expect_err("should error");
    assert!(err.downcast_ref::<AssertionFailure>().is_none());
    assert_eq!(err.to_string(), "web_api unavailable");
}
