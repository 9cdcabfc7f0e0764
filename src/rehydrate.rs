use crate::SessionStore;

/// Restore the session from durable storage at start up.
///
/// The restored credentials are installed and the authentication status
/// re-derived *before* the hydration latch flips, so nothing that waits on
/// [`SessionStore::has_hydrated()`] can make a decision based on the default
/// (logged out) state.
///
/// A failed or empty load leaves the session empty but still hydrated. Only
/// the first call does anything.
pub fn rehydrate(store: &SessionStore) {
    if store.has_hydrated() {
        log::debug!("The session was already rehydrated");
        return;
    }

    let snapshot = store.load_persisted();
    if snapshot.is_none() {
        log::debug!("Nothing to restore, starting with an empty session");
    }

    // someone else may have finished hydrating while we were loading
    if !store.hydrate(snapshot) {
        log::debug!("The session was already rehydrated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        storage::{MemoryStorage, Snapshot},
        UserProfile,
    };

    #[test]
    fn fresh_process_without_storage() {
        let store = SessionStore::new(MemoryStorage::new());

        rehydrate(&store);

        assert!(store.has_hydrated());
        assert!(!store.is_authenticated());
    }

    #[test]
    fn restore_a_complete_session() {
        let storage = MemoryStorage::with_snapshot(Snapshot {
            token: Some(String::from("abc")),
            user: Some(UserProfile::new("U1", "Alice")),
        });

        let store = SessionStore::restore(storage);

        assert!(store.has_hydrated());
        assert!(store.is_authenticated());
    }

    #[test]
    fn a_token_alone_is_not_authenticated() {
        let storage = MemoryStorage::with_snapshot(Snapshot {
            token: Some(String::from("abc")),
            user: None,
        });

        let store = SessionStore::restore(storage);

        assert!(store.has_hydrated());
        assert!(store.has_token());
        assert!(!store.is_authenticated());
    }

    #[test]
    fn hydration_is_only_announced_after_the_credentials() {
        let storage = MemoryStorage::with_snapshot(Snapshot {
            token: Some(String::from("abc")),
            user: Some(UserProfile::new("U1", "Alice")),
        });
        let store = SessionStore::new(storage);
        let changes = store.subscribe();

        rehydrate(&store);

        let view = *changes.borrow();
        assert!(view.has_hydrated);
        assert!(view.is_authenticated());
    }

    #[test]
    fn rehydrating_twice_does_not_clobber_newer_state() {
        let storage = MemoryStorage::with_snapshot(Snapshot {
            token: Some(String::from("old")),
            user: None,
        });
        let store = SessionStore::restore(storage);
        store.logout();

        rehydrate(&store);

        assert!(!store.has_token());
    }

    #[test]
    fn racing_rehydrations_do_not_undo_a_logout() {
        for _ in 0..500 {
            let storage = MemoryStorage::with_snapshot(Snapshot {
                token: Some(String::from("abc")),
                user: Some(UserProfile::new("U1", "Alice")),
            });
            let store = SessionStore::new(storage);

            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let store = store.clone();
                    std::thread::spawn(move || {
                        rehydrate(&store);
                        if store.is_authenticated() {
                            store.logout();
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            assert!(store.has_hydrated());
            assert!(!store.has_token());
        }
    }
}
