use crate::{
    storage::{Snapshot, Storage},
    UserProfile,
};
use std::{
    fmt::{self, Debug, Formatter},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tokio::sync::watch;

/// The running client's authentication state.
///
/// There is exactly one of these per running application. It is a cheap
/// handle, so clone it and hand it to whatever needs to read or change the
/// session (guards, the [`ApiClient`](crate::ApiClient), the login flow).
///
/// Every action which touches the token or the user writes the new
/// [`Snapshot`] to the backing [`Storage`]. Actions never fail: a storage
/// error is logged and otherwise ignored because the server is the real
/// source of truth for credentials.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
    storage: Box<dyn Storage>,
    changes: watch::Sender<SessionView>,
}

#[derive(Default)]
struct State {
    token: Option<String>,
    user: Option<UserProfile>,
    has_hydrated: bool,
}

impl State {
    fn view(&self) -> SessionView {
        SessionView {
            has_token: self.token.is_some(),
            has_user: self.user.is_some(),
            has_hydrated: self.has_hydrated,
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            token: self.token.clone(),
            user: self.user.clone(),
        }
    }

    fn rehydrate_auth(&self) -> bool {
        let view = self.view();
        log::debug!(
            "Rehydrated session (token: {}, user: {}, authenticated: {})",
            view.has_token,
            view.has_user,
            view.is_authenticated(),
        );
        view.is_authenticated()
    }
}

/// A secret-free summary of the session, broadcast whenever it changes.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct SessionView {
    pub has_token: bool,
    pub has_user: bool,
    pub has_hydrated: bool,
}

impl SessionView {
    /// Only a token paired with a profile counts as being logged in.
    pub fn is_authenticated(&self) -> bool { self.has_token && self.has_user }
}

impl SessionStore {
    /// Create an empty, un-hydrated session.
    ///
    /// Nothing is read from `storage` until the session is
    /// [rehydrated](crate::rehydrate).
    pub fn new<S>(storage: S) -> Self
    where
        S: Storage + 'static,
    {
        let (changes, _) = watch::channel(SessionView::default());

        SessionStore {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                storage: Box::new(storage),
                changes,
            }),
        }
    }

    /// Create a session and immediately restore it from `storage`.
    pub fn restore<S>(storage: S) -> Self
    where
        S: Storage + 'static,
    {
        let store = SessionStore::new(storage);
        crate::rehydrate(&store);
        store
    }

    pub fn token(&self) -> Option<String> { self.lock().token.clone() }

    pub fn user(&self) -> Option<UserProfile> { self.lock().user.clone() }

    pub fn has_token(&self) -> bool { self.lock().token.is_some() }

    pub fn has_user(&self) -> bool { self.lock().user.is_some() }

    /// Do we have both a token and the profile it belongs to?
    pub fn is_authenticated(&self) -> bool { self.view().is_authenticated() }

    /// Has the persisted session been loaded yet?
    pub fn has_hydrated(&self) -> bool { self.lock().has_hydrated }

    pub fn view(&self) -> SessionView { self.lock().view() }

    pub fn snapshot(&self) -> Snapshot { self.lock().snapshot() }

    /// Get notified every time the session changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.inner.changes.subscribe()
    }

    /// Remember a freshly issued token.
    ///
    /// This doesn't fetch the matching profile, so the session isn't
    /// authenticated until [`SessionStore::set_user()`] is called too. Blank
    /// tokens are treated as no token at all.
    pub fn set_token(&self, token: Option<String>) {
        let token = token.filter(|t| !t.trim().is_empty());
        log::debug!("Setting the token (present: {})", token.is_some());

        self.mutate(|state| state.token = token);
    }

    /// Remember the profile for the current token.
    ///
    /// The user is stored even when there is no token, but that alone never
    /// makes the session authenticated.
    pub fn set_user(&self, user: Option<UserProfile>) {
        match user {
            Some(ref u) => {
                log::debug!("Setting the user to {}", u.display_name())
            },
            None => log::debug!("Clearing the user"),
        }

        self.mutate(|state| state.user = user);
    }

    /// Store `user`, but only if `token` is still the session's token.
    ///
    /// The comparison and the update happen under the same lock, so a
    /// concurrent logout or login can't slip in between. Returns `false` when
    /// the profile was dropped.
    pub fn set_user_if_token(&self, token: &str, user: UserProfile) -> bool {
        let applied = self.mutate_if(|state| {
            if state.token.as_deref() == Some(token) {
                state.user = Some(user);
                true
            } else {
                false
            }
        });

        if !applied {
            log::debug!("The token changed, not storing the profile");
        }

        applied
    }

    /// Forget the token and the user, both here and in durable storage.
    pub fn logout(&self) {
        log::info!("Logging out");
        self.mutate(|state| {
            state.token = None;
            state.user = None;
        });
    }

    /// Re-derive the authentication status from whatever was just restored.
    ///
    /// The status is never cached, so this only reports it. Calling it any
    /// number of times gives the same answer until the session changes.
    pub fn rehydrate_auth(&self) -> bool { self.lock().rehydrate_auth() }

    /// Flip the one-way "we've loaded from storage" latch.
    pub fn set_has_hydrated(&self) {
        let view = {
            let mut state = self.lock();
            if state.has_hydrated {
                return;
            }
            state.has_hydrated = true;
            state.view()
        };

        self.inner.changes.send_replace(view);
    }

    /// Alias of [`SessionStore::set_token()`] for the login flow.
    pub fn on_login(&self, token: impl Into<String>) {
        self.set_token(Some(token.into()));
    }

    /// Alias of [`SessionStore::set_user()`] for the login flow.
    pub fn on_profile_loaded(&self, user: UserProfile) {
        self.set_user(Some(user));
    }

    /// Alias of [`SessionStore::logout()`].
    pub fn on_logout(&self) { self.logout(); }

    /// Read the persisted snapshot without touching the session.
    pub(crate) fn load_persisted(&self) -> Option<Snapshot> {
        match self.inner.storage.load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("Unable to load the saved session: {}", e);
                None
            },
        }
    }

    /// Install a restored snapshot, re-derive the authentication status and
    /// flip the hydration latch, all under one lock. The snapshot came from
    /// storage, so it isn't written back.
    ///
    /// Returns `false` (and leaves the session alone) if the session had
    /// already been hydrated.
    pub(crate) fn hydrate(&self, snapshot: Option<Snapshot>) -> bool {
        let view = {
            let mut state = self.lock();
            if state.has_hydrated {
                return false;
            }

            if let Some(snapshot) = snapshot {
                state.token = snapshot.token.filter(|t| !t.trim().is_empty());
                state.user = snapshot.user;
            }
            state.rehydrate_auth();
            state.has_hydrated = true;

            let view = state.view();
            self.inner.changes.send_replace(view);
            view
        };

        log::debug!(
            "Hydration complete (authenticated: {})",
            view.is_authenticated()
        );
        true
    }

    fn mutate<F>(&self, change: F)
    where
        F: FnOnce(&mut State),
    {
        self.mutate_if(|state| {
            change(state);
            true
        });
    }

    /// Apply `change`, then persist and broadcast the result if it reported
    /// that something changed.
    ///
    /// The lock is held while saving so storage always ends up with the
    /// last state, not whichever writer finished last.
    fn mutate_if<F>(&self, change: F) -> bool
    where
        F: FnOnce(&mut State) -> bool,
    {
        let mut state = self.lock();
        if !change(&mut state) {
            return false;
        }

        if let Err(e) = self.inner.storage.save(&state.snapshot()) {
            log::warn!("Unable to save the session: {}", e);
        }

        self.inner.changes.send_replace(state.view());
        true
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Debug for SessionStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let state = self.lock();

        f.debug_struct("SessionStore")
            .field("token", &state.token.as_ref().map(|_| "<redacted>"))
            .field("user", &state.user)
            .field("has_hydrated", &state.has_hydrated)
            .finish()
    }
}
