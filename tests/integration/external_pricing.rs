//! External-user pricing scenarios.
//!
//! Each test provisions its own user, sends admin pricing updates derived from one
//! template, and polls the user's permission endpoint until the write propagates.

use chrono::Utc;
use convergent::{verify, PollOutcome, StatusCode};

use super::Scenario;
use crate::common::{
    get_permission, poll_config, poll_permission, PricingType, UpdateExternalUserPricing,
};

const TRIAL_ADDED: &str =
    "Successfully added trial subscription for user on Subscriptions API. Status code: 201";
const TRIAL_DELETED: &str =
    "Successfully deleted trial subscription for user on Subscriptions API. Status code: 200";
const TRIAL_UPDATED: &str = "Successfully updated trial subscription expiration date for user on Subscriptions API. Status code: 200";
const INTERNAL_USER_REJECTED: &str = "Invalid user passed for external user pricing type updates. Only external users are supported";

/// Purpose: a user without a trial is granted one.
/// Flow: downgrade to Free without trial, wait for it, then enable the trial.
/// Expected Behavior: 201 with the trial message, and the trial becomes visible with a
/// two week expiration.
#[tokio::test(start_paused = true)]
async fn test_give_new_trial() -> anyhow::Result<()> {
    let scenario = Scenario::new();
    let user = scenario.backend.provision_external(PricingType::Basic);

    let disabled = scenario
        .session
        .send(&scenario.update(&user, PricingType::Free, false))
        .await?;
    verify(disabled.status()).labeled("disable trial status").is(StatusCode::OK)?;

    poll_permission(&scenario.session, &user, |p| {
        !p.is_trial_enabled && p.pricing_type_id == PricingType::Free.id()
    })
    .await?
    .require("trial disabled before the test")?;

    let response = scenario
        .session
        .send(&scenario.update(&user, PricingType::Free, true))
        .await?;
    verify(response.status()).labeled("give trial status").is(StatusCode::CREATED)?;
    verify(response.text()).labeled("give trial message").is(TRIAL_ADDED)?;

    let result = poll_permission(&scenario.session, &user, |p| p.is_trial_enabled).await?;
    assert!(result.attempts() > 1, "trial must not be visible immediately");

    let permission = result.require("trial enabled")?;
    verify(permission.pricing_type_name.as_str())
        .labeled("pricing type")
        .is("Free")?;
    verify(permission.trial_expiration_date_time)
        .labeled("trial expiration")
        .is_some()?
        .is_within(Utc::now() + chrono::Duration::days(14), chrono::Duration::hours(1))?;
    Ok(())
}

/// Purpose: an active trial is removed.
/// Flow: enable a trial on a Basic user, wait, then send the same tier without trial.
/// Expected Behavior: 200 with the deletion message, and the expiration disappears.
#[tokio::test(start_paused = true)]
async fn test_disable_trial() -> anyhow::Result<()> {
    let scenario = Scenario::new();
    let user = scenario.backend.provision_external(PricingType::Basic);

    let enabled = scenario
        .session
        .send(&scenario.update(&user, PricingType::Basic, true))
        .await?;
    verify(enabled.status()).is(StatusCode::CREATED)?;
    poll_permission(&scenario.session, &user, |p| p.is_trial_enabled)
        .await?
        .require("trial enabled before the test")?;

    let response = scenario
        .session
        .send(&scenario.update(&user, PricingType::Basic, false))
        .await?;
    verify(response.status()).labeled("disable trial status").is(StatusCode::OK)?;
    verify(response.text()).labeled("disable trial message").is(TRIAL_DELETED)?;

    let result = poll_permission(&scenario.session, &user, |p| !p.is_trial_enabled).await?;
    result
        .verify("trial expiration cleared")
        .satisfies("no expiration", |p| p.trial_expiration_date_time.is_none())?;
    result.require("trial disabled")?;
    Ok(())
}

/// Purpose: internal accounts cannot be managed through the external pricing API.
/// Expected Behavior: 400 with the rejection message and no visible change.
#[tokio::test(start_paused = true)]
async fn test_internal_user_rejected() -> anyhow::Result<()> {
    let scenario = Scenario::new();
    let user = scenario.backend.provision_internal();

    let response = scenario
        .session
        .send(&scenario.update(&user, PricingType::Free, true))
        .await?;
    verify(response.status())
        .labeled("internal user status")
        .is(StatusCode::BAD_REQUEST)?;
    verify(response.text())
        .labeled("internal user message")
        .succinctly()
        .contains(INTERNAL_USER_REJECTED)?;

    let permission = get_permission(&scenario.session, &user).await?;
    verify(permission.pricing_type_name).is("Pro")?;
    verify(permission.is_trial_enabled).labeled("trial untouched").is_false()?;
    Ok(())
}

/// Purpose: resending the current pricing type is refused, and a trial change sent
/// while a previous write is still propagating eventually goes through.
/// Flow: set Free, wait, resend Free, enable a trial, then keep resending an
/// expiration update until the backend accepts it.
/// Expected Behavior: 400 on the duplicate, 409 until the trial write lands, then 200
/// and the new expiration becomes visible.
#[tokio::test(start_paused = true)]
async fn test_send_existing_pricing_type() -> anyhow::Result<()> {
    let scenario = Scenario::new();
    let user = scenario.backend.provision_external(PricingType::Pro);
    let free = scenario.update(&user, PricingType::Free, false);

    let first = scenario.session.send(&free).await?;
    verify(first.status()).labeled("first free update").is(StatusCode::OK)?;
    poll_permission(&scenario.session, &user, |p| {
        p.pricing_type_id == PricingType::Free.id()
    })
    .await?
    .require("pricing type is Free")?;

    let repeated = scenario.session.send(&free).await?;
    verify(repeated.status())
        .labeled("repeated free update")
        .is(StatusCode::BAD_REQUEST)?;
    verify(repeated.text())
        .contains("Could not add free subscription for user on Subscriptions API")?;

    let trial = scenario.session.send(&scenario.update(&user, PricingType::Free, true)).await?;
    verify(trial.status()).labeled("trial update").is(StatusCode::CREATED)?;

    let end = Utc::now() + chrono::Duration::days(30);
    let extend = scenario.pricing.with_json(&UpdateExternalUserPricing {
        user_id: user.id,
        pricing_type_id: PricingType::Free.id(),
        enable_trial: true,
        trial_end_date: Some(end),
    })?;

    // The trial write is still in flight, so the first sends are refused.
    let resent = scenario
        .session
        .poll_response(&extend, poll_config(1, 10), |r| r.status() == StatusCode::OK)
        .await?;
    assert!(resent.attempts() >= 2);
    resent.verify("resend until accepted").satisfies("conflict cleared", |r| {
        r.text() == TRIAL_UPDATED
    })?;

    let permission = poll_permission(&scenario.session, &user, |p| {
        p.trial_expiration_date_time == Some(end)
    })
    .await?
    .require("expiration updated")?;
    verify(permission.is_trial_enabled).is_true()?;
    Ok(())
}

/// Purpose: a write that never propagates within the budget is reported as a give-up
/// carrying the last observed state, not as an error.
#[tokio::test(start_paused = true)]
async fn test_poll_gives_up_on_unreachable_state() -> anyhow::Result<()> {
    let scenario = Scenario::new();
    let user = scenario.backend.provision_external(PricingType::Basic);

    let result = convergent::Poller::new(
        || get_permission(&scenario.session, &user),
        |p: &crate::common::PricingFeature| p.pricing_type_id == PricingType::Pro.id(),
    )
    .with_config(poll_config(2, 5))
    .result()
    .await?;

    assert!(result.timed_out());
    assert_eq!(result.attempts(), 3);

    let failure = result
        .clone()
        .require("upgraded to Pro")
        .expect_err("state never converges");
    assert_eq!(failure.attempts, Some(3));
    assert!(failure.to_string().contains("upgraded to Pro"));

    match result.into_outcome() {
        PollOutcome::TimedOut(last) => verify(last.pricing_type_name).is("Basic")?,
        PollOutcome::Satisfied(_) => panic!("Basic user cannot become Pro without a write"),
    };
    Ok(())
}
