use crate::{endpoints, ApiClient, ApiError, SessionStore, UserProfile};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

/// Somewhere to get the current user's profile from.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn fetch_profile(&self) -> Result<UserProfile, ApiError>;
}

#[async_trait]
impl ProfileSource for ApiClient {
    async fn fetch_profile(&self) -> Result<UserProfile, ApiError> {
        endpoints::get_profile(self).await
    }
}

/// What happened when we tried to fill in a missing profile.
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// There was no token, or we already had the user.
    NotNeeded,
    /// Another fetch is already running.
    AlreadyRunning,
    /// The profile was fetched and stored.
    Applied,
    /// The token changed while we were fetching, so the profile belongs to
    /// someone else and was thrown away.
    Discarded,
    /// The fetch failed. The session was left alone.
    Failed(ApiError),
}

/// Repairs sessions which have a token but no user profile (e.g. restored
/// from an older snapshot, or the app quit halfway through logging in).
///
/// This is best-effort. A failure only means pages go without the user's
/// details until the next attempt.
#[derive(Debug)]
pub struct Reconciler<P> {
    source: P,
    in_flight: AtomicBool,
}

impl<P: ProfileSource> Reconciler<P> {
    pub fn new(source: P) -> Self {
        Reconciler {
            source,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn source(&self) -> &P { &self.source }

    /// Is there a token without a profile?
    pub fn is_needed(session: &SessionStore) -> bool {
        let view = session.view();
        view.has_token && !view.has_user
    }

    pub async fn reconcile(&self, session: &SessionStore) -> ReconcileOutcome {
        if !Self::is_needed(session) {
            return ReconcileOutcome::NotNeeded;
        }
        let token = match session.token() {
            Some(token) => token,
            None => return ReconcileOutcome::NotNeeded,
        };

        let _in_flight = match InFlight::acquire(&self.in_flight) {
            Some(guard) => guard,
            None => {
                log::debug!("A profile fetch is already in flight");
                return ReconcileOutcome::AlreadyRunning;
            },
        };

        log::debug!("Found a token without a user, fetching the profile");

        let profile = match self.source.fetch_profile().await {
            Ok(profile) => profile,
            Err(e) => {
                log::warn!("Unable to fetch the user's profile: {}", e);
                return ReconcileOutcome::Failed(e);
            },
        };

        let name = profile.display_name();
        if session.set_user_if_token(&token, profile) {
            ReconcileOutcome::Applied
        } else {
            log::debug!(
                "The token changed while fetching the profile, discarding {}",
                name
            );
            ReconcileOutcome::Discarded
        }
    }
}

/// Clears the in-flight flag when dropped, even if the fetch is cancelled.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(InFlight(flag))
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) { self.0.store(false, Ordering::SeqCst); }
}
