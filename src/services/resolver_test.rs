use super::*;
use crate::provider::Profile;
use crate::provider::memory::{MemoryIdentityProvider, MemoryProfileStore};
use crate::storage::MemoryStorage;

const APP: &str = "https://app.seisan.example/";

struct Fixture {
    provider: Arc<MemoryIdentityProvider>,
    store: Arc<MemoryProfileStore>,
    location: Arc<Location>,
    resolver: SessionResolver,
}

fn fixture_with(url: &str, policy: RefreshPolicy) -> Fixture {
    let provider = Arc::new(MemoryIdentityProvider::new());
    let store = Arc::new(MemoryProfileStore::new());
    let location = Arc::new(Location::parse(url).unwrap());
    let gate = ProfileGate::new(store.clone(), Arc::new(MemoryStorage::new()));
    let resolver = SessionResolver::new(provider.clone(), gate, location.clone(), policy);
    Fixture { provider, store, location, resolver }
}

fn fixture(url: &str) -> Fixture {
    fixture_with(url, RefreshPolicy::RerunGate)
}

fn complete_profile(f: &Fixture, user_id: uuid::Uuid) {
    f.store.insert(Profile { id: user_id, onboarding_completed: Some(true), ..Profile::default() });
}

#[tokio::test]
async fn provider_error_goes_to_login_without_network() {
    let f = fixture("https://app.seisan.example/?error=access_denied&error_description=Expired");
    assert_eq!(f.resolver.resolve().await, Resolution::LOGIN);
    assert_eq!(f.provider.network_calls(), 0);
    assert_eq!(f.store.calls(), 0);
    assert_eq!(f.location.href().as_str(), APP);
}

#[tokio::test]
async fn provider_error_wins_over_ambient_session() {
    let f = fixture("https://app.seisan.example/?error=access_denied");
    let user = f.provider.add_user("done@seisan.example", "password1", true);
    f.provider.start_session(user.id);
    complete_profile(&f, user.id);

    assert_eq!(f.resolver.resolve().await, Resolution::LOGIN);
    assert_eq!(f.provider.network_calls(), 0);
    assert_eq!(f.store.calls(), 0);
}

#[tokio::test]
async fn hash_error_code_goes_to_login() {
    let f = fixture("https://app.seisan.example/#error_code=otp_expired&error_description=Link+expired");
    assert_eq!(f.resolver.resolve().await, Resolution::LOGIN);
    assert_eq!(f.provider.network_calls(), 0);
    assert!(f.location.artifact().is_none());
}

#[tokio::test]
async fn code_for_new_user_lands_on_onboarding_and_is_stripped() {
    let f = fixture("https://app.seisan.example/?code=abc123");
    let user = f.provider.add_user("new@seisan.example", "password1", true);
    f.provider.insert_code("abc123", user.id);

    assert_eq!(f.resolver.resolve().await, Resolution::View(ViewState::Onboarding));
    assert!(!f.location.href().as_str().contains("code="));
    assert_eq!(f.provider.exchange_calls(), 1);
}

#[tokio::test]
async fn code_for_unverified_user_goes_to_login() {
    let f = fixture("https://app.seisan.example/?code=abc123");
    let user = f.provider.add_user("new@seisan.example", "password1", false);
    f.provider.insert_code("abc123", user.id);

    assert_eq!(f.resolver.resolve().await, Resolution::LOGIN);
    assert!(f.location.artifact().is_none());
}

#[tokio::test]
async fn rejected_code_goes_to_login_and_is_stripped() {
    let f = fixture("https://app.seisan.example/?code=stale&keep=1");
    assert_eq!(f.resolver.resolve().await, Resolution::LOGIN);
    assert_eq!(f.location.href().as_str(), "https://app.seisan.example/?keep=1");
}

#[tokio::test]
async fn code_is_exchanged_at_most_once() {
    let f = fixture("https://app.seisan.example/?code=abc123");
    let user = f.provider.add_user("done@seisan.example", "password1", true);
    f.provider.insert_code("abc123", user.id);
    complete_profile(&f, user.id);

    let first = f.resolver.resolve().await;
    let second = f.resolver.resolve().await;
    assert_eq!(first, Resolution::Dashboard);
    assert_eq!(second, Resolution::Dashboard);
    assert_eq!(f.provider.exchange_calls(), 1);
}

#[tokio::test]
async fn verified_complete_ambient_session_is_dashboard() {
    let f = fixture(APP);
    let user = f.provider.add_user("done@seisan.example", "password1", true);
    f.provider.start_session(user.id);
    complete_profile(&f, user.id);

    assert_eq!(f.resolver.resolve().await, Resolution::Dashboard);
}

#[tokio::test]
async fn verified_ambient_session_without_profile_is_onboarding() {
    let f = fixture(APP);
    let user = f.provider.add_user("new@seisan.example", "password1", true);
    f.provider.start_session(user.id);

    assert_eq!(f.resolver.resolve().await, Resolution::View(ViewState::Onboarding));
}

#[tokio::test]
async fn unverified_ambient_session_is_login() {
    let f = fixture(APP);
    let user = f.provider.add_user("new@seisan.example", "password1", false);
    f.provider.start_session(user.id);
    complete_profile(&f, user.id);

    assert_eq!(f.resolver.resolve().await, Resolution::LOGIN);
    assert_eq!(f.store.calls(), 0);
}

#[tokio::test]
async fn no_session_is_login() {
    let f = fixture(APP);
    assert_eq!(f.resolver.resolve().await, Resolution::LOGIN);
}

#[tokio::test]
async fn offline_provider_is_login() {
    let f = fixture(APP);
    let user = f.provider.add_user("done@seisan.example", "password1", true);
    f.provider.start_session(user.id);
    f.provider.set_offline(true);

    assert_eq!(f.resolver.resolve().await, Resolution::LOGIN);
}

#[tokio::test]
async fn profile_store_failure_is_onboarding() {
    let f = fixture(APP);
    let user = f.provider.add_user("done@seisan.example", "password1", true);
    f.provider.start_session(user.id);
    complete_profile(&f, user.id);
    f.store.set_failing(true);

    assert_eq!(f.resolver.resolve().await, Resolution::View(ViewState::Onboarding));
}

#[tokio::test]
async fn signup_tokens_in_hash_show_email_confirmed_once() {
    let f = fixture(APP);
    let user = f.provider.add_user("new@seisan.example", "password1", true);
    let (at, rt) = f.provider.issue_token_pair(user.id);
    let url = format!("{APP}#/email-confirmed?access_token={at}&refresh_token={rt}&type=signup&expires_in=3600");
    f.location.replace_state(url::Url::parse(&url).unwrap());

    assert_eq!(f.resolver.resolve().await, Resolution::View(ViewState::EmailConfirmed));
    assert_eq!(f.location.href().as_str(), "https://app.seisan.example/#/email-confirmed");

    // The session is installed; a second pass goes through the gate.
    assert_eq!(f.resolver.resolve().await, Resolution::View(ViewState::Onboarding));
}

#[tokio::test]
async fn signup_tokens_after_hash_route_show_email_confirmed() {
    let f = fixture(APP);
    let user = f.provider.add_user("new@seisan.example", "password1", true);
    let (at, rt) = f.provider.issue_token_pair(user.id);
    let url = format!("{APP}#/email-confirmed#access_token={at}&refresh_token={rt}&type=signup");
    f.location.replace_state(url::Url::parse(&url).unwrap());

    assert_eq!(f.resolver.resolve().await, Resolution::View(ViewState::EmailConfirmed));
    assert_eq!(f.location.href().as_str(), "https://app.seisan.example/#/email-confirmed");
}

#[tokio::test]
async fn non_signup_tokens_go_through_gate() {
    let f = fixture(APP);
    let user = f.provider.add_user("done@seisan.example", "password1", true);
    complete_profile(&f, user.id);
    let (at, rt) = f.provider.issue_token_pair(user.id);
    let url = format!("{APP}#access_token={at}&refresh_token={rt}&type=magiclink");
    f.location.replace_state(url::Url::parse(&url).unwrap());

    assert_eq!(f.resolver.resolve().await, Resolution::Dashboard);
    assert!(f.location.artifact().is_none());
}

#[tokio::test]
async fn rejected_tokens_go_to_login() {
    let f = fixture("https://app.seisan.example/#access_token=forged&refresh_token=forged&type=signup");
    assert_eq!(f.resolver.resolve().await, Resolution::LOGIN);
    assert!(f.location.artifact().is_none());
}

#[tokio::test]
async fn unverified_tokens_go_to_login() {
    let f = fixture(APP);
    let user = f.provider.add_user("new@seisan.example", "password1", false);
    let (at, rt) = f.provider.issue_token_pair(user.id);
    let url = format!("{APP}#access_token={at}&refresh_token={rt}&type=signup");
    f.location.replace_state(url::Url::parse(&url).unwrap());

    assert_eq!(f.resolver.resolve().await, Resolution::LOGIN);
}

#[tokio::test]
async fn query_code_wins_over_hash_tokens() {
    let f = fixture(APP);
    let user = f.provider.add_user("new@seisan.example", "password1", true);
    f.provider.insert_code("abc123", user.id);
    let url = format!("{APP}?code=abc123#access_token=a&refresh_token=b&type=signup");
    f.location.replace_state(url::Url::parse(&url).unwrap());

    assert_eq!(f.resolver.resolve().await, Resolution::View(ViewState::Onboarding));
    assert_eq!(f.provider.exchange_calls(), 1);
    assert!(f.location.artifact().is_none());
}

#[tokio::test]
async fn signed_out_event_is_login_without_network() {
    let f = fixture(APP);
    let next = f.resolver.resolve_event(&AuthEvent::SignedOut).await;
    assert_eq!(next, Some(Resolution::LOGIN));
    assert_eq!(f.provider.network_calls(), 0);
}

#[tokio::test]
async fn signed_in_event_reruns_resolution() {
    let f = fixture(APP);
    let user = f.provider.add_user("done@seisan.example", "password1", true);
    let session = f.provider.start_session(user.id).unwrap();
    complete_profile(&f, user.id);

    let next = f.resolver.resolve_event(&AuthEvent::SignedIn(session)).await;
    assert_eq!(next, Some(Resolution::Dashboard));
}

#[tokio::test]
async fn token_refresh_follows_policy() {
    let rerun = fixture(APP);
    let user = rerun.provider.add_user("new@seisan.example", "password1", true);
    let session = rerun.provider.start_session(user.id).unwrap();
    let event = AuthEvent::TokenRefreshed(session);
    assert_eq!(
        rerun.resolver.resolve_event(&event).await,
        Some(Resolution::View(ViewState::Onboarding))
    );

    let keep = fixture_with(APP, RefreshPolicy::KeepCurrent);
    assert_eq!(keep.resolver.resolve_event(&event).await, None);
    assert_eq!(keep.provider.network_calls(), 0);
}
