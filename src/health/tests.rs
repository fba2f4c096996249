//! Unit tests for status normalisation and presentation.

use super::*;
use rstest::rstest;
use serde_json::{Value, json};

#[rstest]
#[case(Some("Healthy"), NormalizedStatus::Known(ServiceStatus::Healthy))]
#[case(Some("  CIRCUIT_OPEN "), NormalizedStatus::Known(ServiceStatus::CircuitOpen))]
#[case(Some("Exploded"), NormalizedStatus::Unrecognized("exploded".to_owned()))]
#[case(Some(""), NormalizedStatus::Unknown)]
#[case(Some("UNKNOWN"), NormalizedStatus::Unknown)]
#[case(None, NormalizedStatus::Unknown)]
fn service_statuses_normalise(
    #[case] raw: Option<&str>,
    #[case] expected: NormalizedStatus<ServiceStatus>,
) {
    assert_eq!(normalize_status::<ServiceStatus>(raw), expected);
}

#[rstest]
fn vocabularies_are_not_conflated() {
    assert!(normalize_status::<LifecycleStatus>(Some("warning")).is(LifecycleStatus::Warning));
    assert_eq!(
        normalize_status::<ServiceStatus>(Some("warning")),
        NormalizedStatus::Unrecognized("warning".to_owned())
    );
    assert_eq!(
        normalize_status::<LifecycleStatus>(Some("circuit_open")).known(),
        None
    );
    assert!(normalize_status::<LifecycleStatus>(Some("healthy")).is(LifecycleStatus::Healthy));
    assert!(normalize_status::<ServiceStatus>(Some("healthy")).is(ServiceStatus::Healthy));
}

#[rstest]
#[case(Some("circuit_open"), false)]
#[case(Some("half_open"), false)]
#[case(Some("disconnected"), false)]
#[case(Some("init"), false)]
#[case(Some("STARTUP"), false)]
#[case(Some("ready"), true)]
#[case(Some("healthy"), true)]
#[case(Some("degraded"), true)]
#[case(Some("something_new"), true)]
#[case(Some(""), true)]
#[case(None, true)]
fn availability_excludes_only_the_unusable_states(
    #[case] raw: Option<&str>,
    #[case] available: bool,
) {
    assert_eq!(is_service_available(raw), available);
}

#[rstest]
fn lifecycle_usability_is_separate() {
    let usable: Vec<_> = LifecycleStatus::ALL
        .into_iter()
        .filter(|status| status.is_usable())
        .collect();
    assert_eq!(usable, vec![LifecycleStatus::Healthy, LifecycleStatus::Warning]);
}

#[rstest]
fn known_statuses_carry_css_hooks() {
    let meta = status_meta::<ServiceStatus>(Some("Circuit_Open"));
    assert_eq!(meta.text, "Circuit open");
    assert_eq!(meta.tone, StatusTone::Danger);
    assert_eq!(meta.class_name, "is-circuit_open");
    assert_eq!(meta.badge_class, "status-circuit_open");
}

#[rstest]
#[case(Some("exploded"), "exploded")]
#[case(None, "Unknown")]
fn unknown_statuses_fall_back_to_generic_presentation(
    #[case] raw: Option<&str>,
    #[case] text: &str,
) {
    let meta = status_meta::<LifecycleStatus>(raw);
    assert_eq!(meta.text, text);
    assert_eq!(meta.tone, StatusTone::Muted);
    assert_eq!(meta.class_name, "is-unknown");
}

#[rstest]
fn every_status_round_trips_through_its_key() {
    for status in ServiceStatus::ALL {
        assert_eq!(ServiceStatus::try_from(status.as_str()), Ok(status));
    }
    for status in LifecycleStatus::ALL {
        assert_eq!(LifecycleStatus::try_from(status.as_str()), Ok(status));
    }
    assert_eq!(
        ServiceStatus::try_from("bogus"),
        Err(ParseStatusError("bogus".to_owned()))
    );
}

#[rstest]
fn normalised_statuses_serialise_as_keys() {
    let status: NormalizedStatus<ServiceStatus> =
        serde_json::from_value(json!("Degraded")).expect("status should deserialise");
    assert!(status.is(ServiceStatus::Degraded));
    assert_eq!(
        serde_json::to_value(&status).expect("status should serialise"),
        json!("degraded")
    );

    let absent: NormalizedStatus<ServiceStatus> =
        serde_json::from_value(Value::Null).expect("null should deserialise");
    assert_eq!(absent, NormalizedStatus::Unknown);
    assert_eq!(absent.to_string(), UNKNOWN_STATUS);
}
