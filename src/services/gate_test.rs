use super::*;
use crate::provider::memory::{MemoryIdentityProvider, MemoryProfileStore};
use crate::storage::{MemoryStorage, load_json};

struct Fixture {
    store: Arc<MemoryProfileStore>,
    storage: Arc<MemoryStorage>,
    gate: ProfileGate,
    session: Session,
}

fn fixture() -> Fixture {
    let provider = MemoryIdentityProvider::new();
    let user = provider.add_user("a@b.test", "pw", true);
    let session = provider.start_session(user.id).unwrap();
    let store = Arc::new(MemoryProfileStore::new());
    let storage = Arc::new(MemoryStorage::new());
    let gate = ProfileGate::new(store.clone(), storage.clone());
    Fixture { store, storage, gate, session }
}

fn profile(f: &Fixture, completed: Option<bool>) -> Profile {
    Profile { id: f.session.user.id, onboarding_completed: completed, ..Profile::default() }
}

#[test]
fn decide_requires_explicit_true() {
    let mut p = Profile::default();
    assert_eq!(decide(None), GateOutcome::Onboarding);
    assert_eq!(decide(Some(&p)), GateOutcome::Onboarding);
    p.onboarding_completed = Some(false);
    assert_eq!(decide(Some(&p)), GateOutcome::Onboarding);
    p.onboarding_completed = Some(true);
    assert_eq!(decide(Some(&p)), GateOutcome::Dashboard);
}

#[test]
fn outcome_maps_to_resolution() {
    assert_eq!(Resolution::from(GateOutcome::Dashboard), Resolution::Dashboard);
    assert_eq!(Resolution::from(GateOutcome::Onboarding), Resolution::View(ViewState::Onboarding));
}

#[tokio::test]
async fn missing_row_is_onboarding() {
    let f = fixture();
    assert_eq!(f.gate.gate(&f.session).await, GateOutcome::Onboarding);
}

#[tokio::test]
async fn null_flag_is_onboarding() {
    let f = fixture();
    f.store.insert(profile(&f, None));
    assert_eq!(f.gate.gate(&f.session).await, GateOutcome::Onboarding);
}

#[tokio::test]
async fn completed_row_is_dashboard_and_cached() {
    let f = fixture();
    f.store.insert(profile(&f, Some(true)));
    assert_eq!(f.gate.gate(&f.session).await, GateOutcome::Dashboard);

    let cached: Profile = load_json(f.storage.as_ref(), CACHED_PROFILE_KEY).unwrap();
    assert_eq!(cached.id, f.session.user.id);
}

#[tokio::test]
async fn fetch_failure_fails_toward_onboarding() {
    let f = fixture();
    f.store.insert(profile(&f, Some(true)));
    f.store.set_failing(true);
    assert_eq!(f.gate.gate(&f.session).await, GateOutcome::Onboarding);
}

#[tokio::test]
async fn missing_row_clears_stale_cache() {
    let f = fixture();
    f.storage.set_item(CACHED_PROFILE_KEY, "{}");
    f.gate.gate(&f.session).await;
    assert_eq!(f.storage.get_item(CACHED_PROFILE_KEY), None);
}
