//! Deciding whether the session may visit a [`Route`].

use crate::{
    reconcile::{ProfileSource, ReconcileOutcome, Reconciler},
    routes::{Access, Route},
    SessionStore,
};

/// The result of running a [`Guard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    /// The session hasn't been restored yet, so no decision can be made.
    PendingHydration,
    /// Render the guarded page.
    Allow,
    /// Send the visitor somewhere else.
    Deny { redirect: Route },
}

impl GuardState {
    pub fn is_decided(&self) -> bool { *self != GuardState::PendingHydration }
}

/// Something which decides whether a page may be shown.
pub trait Guard {
    fn evaluate(&self, session: &SessionStore) -> GuardState;
}

/// Only lets in visitors who aren't logged in.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct GuestGuard;

impl Guard for GuestGuard {
    fn evaluate(&self, session: &SessionStore) -> GuardState {
        let view = session.view();
        if !view.has_hydrated {
            return GuardState::PendingHydration;
        }

        if view.is_authenticated() || view.has_token {
            GuardState::Deny {
                redirect: Route::LANDING,
            }
        } else {
            GuardState::Allow
        }
    }
}

/// Only lets in visitors holding a token.
///
/// A token is enough. The profile may still be missing, which
/// [`ProtectedGuard::enter()`] tries to repair.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct ProtectedGuard;

impl ProtectedGuard {
    /// Evaluate the guard and, if we're allowed in, fill in a missing
    /// profile.
    ///
    /// The reconciliation outcome is `None` when the guard didn't allow
    /// entry. It never changes the decision.
    pub async fn enter<P: ProfileSource>(
        &self,
        session: &SessionStore,
        reconciler: &Reconciler<P>,
    ) -> (GuardState, Option<ReconcileOutcome>) {
        let state = self.evaluate(session);

        if state == GuardState::Allow {
            let outcome = reconciler.reconcile(session).await;
            (state, Some(outcome))
        } else {
            (state, None)
        }
    }
}

impl Guard for ProtectedGuard {
    fn evaluate(&self, session: &SessionStore) -> GuardState {
        let view = session.view();
        if !view.has_hydrated {
            return GuardState::PendingHydration;
        }

        if view.is_authenticated() || view.has_token {
            GuardState::Allow
        } else {
            GuardState::Deny {
                redirect: Route::LOGIN,
            }
        }
    }
}

/// Where a navigation ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Still waiting for the session to be restored.
    Pending,
    Render(Route),
    Redirect(Route),
}

/// Routes a path through the right guard.
#[derive(Debug)]
pub struct Navigator<P> {
    session: SessionStore,
    reconciler: Reconciler<P>,
}

impl<P: ProfileSource> Navigator<P> {
    pub fn new(session: SessionStore, profiles: P) -> Self {
        Navigator {
            session,
            reconciler: Reconciler::new(profiles),
        }
    }

    pub fn session(&self) -> &SessionStore { &self.session }

    pub fn reconciler(&self) -> &Reconciler<P> { &self.reconciler }

    /// Decide where `route` leads without any side effects.
    pub fn decide(&self, route: &Route) -> Navigation {
        let state = match route.access() {
            Access::Guest => GuestGuard.evaluate(&self.session),
            Access::Protected => ProtectedGuard.evaluate(&self.session),
            Access::Public => GuardState::Allow,
        };

        resolve(route, state)
    }

    /// Navigate to `path`, repairing a missing profile when entering a
    /// protected page.
    pub async fn navigate(&self, path: &str) -> Navigation {
        let route = Route::parse(path);
        log::debug!("Navigating to {}", route);

        let state = match route.access() {
            Access::Protected => {
                let (state, outcome) =
                    ProtectedGuard.enter(&self.session, &self.reconciler).await;
                if let Some(outcome) = outcome {
                    log::debug!("Profile reconciliation: {:?}", outcome);
                }
                state
            },
            _ => return self.decide(&route),
        };

        resolve(&route, state)
    }

    /// Like [`Navigator::navigate()`], but waits for the session to be
    /// restored instead of returning [`Navigation::Pending`].
    pub async fn navigate_when_hydrated(&self, path: &str) -> Navigation {
        let mut changes = self.session.subscribe();

        while !self.session.has_hydrated() {
            if changes.changed().await.is_err() {
                break;
            }
        }

        self.navigate(path).await
    }
}

fn resolve(route: &Route, state: GuardState) -> Navigation {
    match state {
        GuardState::PendingHydration => Navigation::Pending,
        GuardState::Deny { redirect } => Navigation::Redirect(redirect),
        GuardState::Allow => match route.redirects_to() {
            Some(target) => Navigation::Redirect(target),
            None => Navigation::Render(route.clone()),
        },
    }
}
