//! Many scenarios sharing one session and one request template at the same time.

use std::collections::HashSet;

use convergent::{verify, StatusCode};
use futures::future::join_all;

use super::Scenario;
use crate::common::{poll_permission, PricingType, UpdateExternalUserPricing};

const USERS: usize = 16;

/// Purpose: descriptors derived concurrently from one template never interfere.
/// Flow: spawn one task per user, each deriving its own update and polling its own
/// permission.
/// Expected Behavior: every user converges to its own trial state and the shared
/// template keeps no body.
#[tokio::test(start_paused = true)]
async fn test_parallel_trials_from_shared_template() {
    let scenario = Scenario::new();

    let tasks = (0..USERS).map(|i| {
        let session = scenario.session.clone();
        let template = scenario.pricing.clone();
        let user = scenario.backend.provision_external(PricingType::Basic);
        let enable_trial = i % 2 == 0;

        tokio::spawn(async move {
            let request = template
                .with_body_field("userId", &user.id)?
                .with_body_field("pricingTypeId", &PricingType::Basic.id())?
                .with_body_field("enableTrial", &enable_trial)?;
            let response = session.send(&request).await?;

            let permission = poll_permission(&session, &user, |p| {
                p.is_trial_enabled == enable_trial
            })
            .await?
            .require("trial state converged")?;
            anyhow::Ok((user.id, enable_trial, response.status(), permission))
        })
    });

    let mut seen = HashSet::new();
    for joined in join_all(tasks).await {
        let (user_id, enable_trial, status, permission) = joined.unwrap().unwrap();
        assert!(seen.insert(user_id), "user {user_id} reported twice");

        if enable_trial {
            verify(status).labeled("trial granted").is(StatusCode::CREATED).unwrap();
            assert!(permission.trial_expiration_date_time.is_some());
        } else {
            // Same tier without a trial is a duplicate update.
            verify(status).labeled("duplicate tier").is(StatusCode::BAD_REQUEST).unwrap();
            assert!(!permission.is_trial_enabled);
        }
    }

    assert_eq!(seen.len(), USERS);
    assert!(scenario.pricing.body().is_none());
}

/// Purpose: the typed payload and field-by-field derivation build the same request.
#[test]
fn test_field_derivation_matches_typed_payload() {
    let scenario = Scenario::new();
    let user = scenario.backend.provision_external(PricingType::Pro);

    let typed = scenario
        .pricing
        .with_json(&UpdateExternalUserPricing {
            user_id: user.id,
            pricing_type_id: PricingType::Free.id(),
            enable_trial: true,
            trial_end_date: None,
        })
        .unwrap();
    let by_field = scenario
        .pricing
        .with_body_field("userId", &user.id)
        .unwrap()
        .with_body_field("pricingTypeId", &PricingType::Free.id())
        .unwrap()
        .with_body_field("enableTrial", &true)
        .unwrap();

    assert_eq!(typed.body(), by_field.body());
    assert_eq!(typed.target(), by_field.target());
    assert_eq!(typed.authorization(), by_field.authorization());
}
