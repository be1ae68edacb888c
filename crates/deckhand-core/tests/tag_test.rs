use deckhand_core::tag::{self, BUILD_NUMBER_VAR, JOB_NAME_VAR};
use deckhand_core::{Phase, PhaseTag, TagMatcher};

// ── CI build tag ──

#[test]
fn build_tag_from_ci_environment() {
    temp_env::with_vars(
        [(JOB_NAME_VAR, Some("ci/job")), (BUILD_NUMBER_VAR, Some("42"))],
        || {
            assert_eq!(tag::build_tag_from_env(), "ci_job-42");
        },
    );
}

#[test]
fn build_tag_without_ci_environment_is_latest() {
    temp_env::with_vars_unset([JOB_NAME_VAR, BUILD_NUMBER_VAR], || {
        assert_eq!(tag::build_tag_from_env(), "latest");
    });
}

#[test]
fn build_tag_with_only_job_name_is_latest() {
    temp_env::with_vars(
        [(JOB_NAME_VAR, Some("ci/job")), (BUILD_NUMBER_VAR, None)],
        || {
            assert_eq!(tag::build_tag_from_env(), "latest");
        },
    );
}

// ── Latest build selection ──

#[test]
fn latest_build_for_prod_only_considers_stage_passes() {
    let tags = [
        "2405010000",
        "stage-pass-2401010000",
        "stage-fail-2406010000",
        "stage-pass-2403010000",
        "prod-deploy-2407010000",
    ];
    let matcher = TagMatcher::latest_build("prod").unwrap();

    let latest = tag::latest(tags.iter().copied().filter(|t| matcher.is_match(t)));

    assert_eq!(latest, Some("stage-pass-2403010000"));
}

#[test]
fn latest_build_for_stage_considers_bare_timestamps() {
    let tags = ["2401010000", "stage-pass-2409010000", "2402010000", "latest"];
    let matcher = TagMatcher::latest_build("stage").unwrap();

    let latest = tag::latest(tags.iter().copied().filter(|t| matcher.is_match(t)));

    assert_eq!(latest, Some("2402010000"));
}

#[test]
fn latest_uses_string_order() {
    assert_eq!(tag::latest(["20", "3", "100"]), Some("3"));
}

// ── Property-based tests ──

mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn env() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{0,11}".prop_filter("no trailing hyphen", |s| !s.ends_with('-'))
    }

    fn timestamp() -> impl Strategy<Value = String> {
        "[0-9]{10}"
    }

    fn phase() -> impl Strategy<Value = Phase> {
        prop_oneof![Just(Phase::Pass), Just(Phase::Fail), Just(Phase::Deploy)]
    }

    proptest! {
        #[test]
        fn phase_tag_parses_back(env in env(), ts in timestamp(), phase in phase()) {
            let derived = tag::derive_tag(&env, Some(&ts), Some(phase));
            let parsed: PhaseTag = derived.parse().unwrap();
            prop_assert_eq!(parsed, PhaseTag::new(env.clone(), phase, ts));
            prop_assert!(TagMatcher::for_phase(&env, phase).unwrap().is_match(&derived));
        }

        #[test]
        fn derive_tag_is_injective_in_timestamp(
            env in env(),
            a in timestamp(),
            b in timestamp(),
            phase in phase(),
        ) {
            prop_assume!(a != b);
            prop_assert_ne!(
                tag::derive_tag(&env, Some(&a), Some(phase)),
                tag::derive_tag(&env, Some(&b), Some(phase))
            );
        }

        #[test]
        fn phase_tag_matches_no_other_phase(env in env(), ts in timestamp(), phase in phase()) {
            let derived = tag::derive_tag(&env, Some(&ts), Some(phase));
            for other in Phase::ALL.into_iter().filter(|p| *p != phase) {
                prop_assert!(!TagMatcher::for_phase(&env, other).unwrap().is_match(&derived));
            }
        }

        #[test]
        fn latest_is_max_of_fixed_width_timestamps(stamps in proptest::collection::vec(timestamp(), 1..20)) {
            let expected = stamps.iter().max().cloned();
            prop_assert_eq!(tag::latest(stamps), expected);
        }
    }
}
