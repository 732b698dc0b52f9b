//! Presentation adapters.
//!
//! Screens observe repository results through [`StateCell`]s: a cell is set
//! to `Loading` before the repository sequence is subscribed, every emitted
//! state is forwarded as-is, and `reset` returns a cell to `Idle` so forms
//! can tell "never attempted" apart from "in progress". The per-resource
//! presenters own one cell per screen concern and map one-to-one onto the
//! repository operations.

use std::sync::Arc;

use tokio::sync::watch;

use crate::auth::{AuthRepository, AuthSession, Credentials, Registration};
use crate::entrepreneur::{Entrepreneur, EntrepreneurRepository, NewEntrepreneur};
use crate::municipality::{Municipality, MunicipalityRepository, NewMunicipality};
use crate::state::{ResourceState, ResourceStream};

/// Observable holder for the state of one logical fetch or mutation.
pub struct StateCell<T> {
    tx: watch::Sender<ResourceState<T>>,
}

impl<T: Clone + Send + Sync + 'static> StateCell<T> {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ResourceState::Idle);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<ResourceState<T>> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> ResourceState<T> {
        self.tx.borrow().clone()
    }

    pub fn set_loading(&self) {
        self.tx.send_replace(ResourceState::Loading);
    }

    /// Back to the neutral marker, distinct from `Loading`.
    pub fn reset(&self) {
        self.tx.send_replace(ResourceState::Idle);
    }

    /// Mark `Loading`, then forward every state the stream emits.
    pub fn track(&self, mut stream: ResourceStream<T>) {
        self.set_loading();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            while let Some(state) = stream.recv().await {
                tx.send_replace(state);
            }
        });
    }
}

impl<T: Clone + Send + Sync + 'static> Default for StateCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Adapter behind the municipality screens.
pub struct MunicipalityPresenter {
    repository: Arc<MunicipalityRepository>,
    pub list: StateCell<Vec<Municipality>>,
    pub detail: StateCell<Municipality>,
    pub save: StateCell<Municipality>,
    pub remove: StateCell<bool>,
}

impl MunicipalityPresenter {
    pub fn new(repository: Arc<MunicipalityRepository>) -> Self {
        Self {
            repository,
            list: StateCell::new(),
            detail: StateCell::new(),
            save: StateCell::new(),
            remove: StateCell::new(),
        }
    }

    pub fn load_all(&self) {
        self.list.track(self.repository.get_all());
    }

    pub fn load_by_department(&self, department: &str) {
        self.list.track(self.repository.get_by_department(department));
    }

    pub fn load_by_id(&self, id: i64) {
        self.detail.track(self.repository.get_by_id(id));
    }

    pub fn load_mine(&self) {
        self.detail.track(self.repository.get_mine());
    }

    pub fn create(&self, request: NewMunicipality) {
        self.save.track(self.repository.create(request));
    }

    pub fn update(&self, id: i64, request: NewMunicipality) {
        self.save.track(self.repository.update(id, request));
    }

    pub fn delete(&self, id: i64) {
        self.remove.track(self.repository.delete(id));
    }

    /// Clears the terminal create/update/delete markers when a form opens.
    pub fn reset_form_states(&self) {
        self.save.reset();
        self.remove.reset();
    }
}

/// Adapter behind the entrepreneur screens.
pub struct EntrepreneurPresenter {
    repository: Arc<EntrepreneurRepository>,
    pub list: StateCell<Vec<Entrepreneur>>,
    pub detail: StateCell<Entrepreneur>,
    pub save: StateCell<Entrepreneur>,
    pub remove: StateCell<bool>,
}

impl EntrepreneurPresenter {
    pub fn new(repository: Arc<EntrepreneurRepository>) -> Self {
        Self {
            repository,
            list: StateCell::new(),
            detail: StateCell::new(),
            save: StateCell::new(),
            remove: StateCell::new(),
        }
    }

    pub fn load_all(&self) {
        self.list.track(self.repository.get_all());
    }

    pub fn load_by_municipality(&self, municipality_id: i64) {
        self.list
            .track(self.repository.get_by_municipality(municipality_id));
    }

    pub fn load_by_category(&self, category: &str) {
        self.list.track(self.repository.get_by_category(category));
    }

    pub fn load_by_id(&self, id: i64) {
        self.detail.track(self.repository.get_by_id(id));
    }

    pub fn load_mine(&self) {
        self.detail.track(self.repository.get_mine());
    }

    pub fn create(&self, request: NewEntrepreneur) {
        self.save.track(self.repository.create(request));
    }

    pub fn update(&self, id: i64, request: NewEntrepreneur) {
        self.save.track(self.repository.update(id, request));
    }

    pub fn delete(&self, id: i64) {
        self.remove.track(self.repository.delete(id));
    }

    pub fn reset_form_states(&self) {
        self.save.reset();
        self.remove.reset();
    }
}

/// Adapter behind the login/register screens.
pub struct AuthPresenter {
    repository: Arc<AuthRepository>,
    pub session: StateCell<AuthSession>,
}

impl AuthPresenter {
    pub fn new(repository: Arc<AuthRepository>) -> Self {
        Self {
            repository,
            session: StateCell::new(),
        }
    }

    pub fn login(&self, credentials: Credentials) {
        self.session.track(self.repository.login(credentials));
    }

    pub fn register(&self, registration: Registration) {
        self.session.track(self.repository.register(registration));
    }

    pub fn reset(&self) {
        self.session.reset();
    }

    pub async fn logout(&self) -> crate::errors::Result<()> {
        self.reset();
        self.repository.logout().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn track_sets_loading_then_forwards_each_state() {
        let cell: StateCell<i32> = StateCell::new();
        let mut observed = cell.subscribe();
        let (tx, stream) = ResourceStream::channel();

        cell.track(stream);
        assert!(cell.current().is_loading());

        tx.emit(ResourceState::Success(7)).await;
        observed.changed().await.unwrap();
        // Skip intermediate markers the watch may have coalesced past.
        while !observed.borrow().is_success() {
            observed.changed().await.unwrap();
        }
        assert_eq!(observed.borrow().data(), Some(&7));
    }

    #[tokio::test]
    async fn reset_is_distinct_from_loading() {
        let cell: StateCell<i32> = StateCell::new();
        cell.set_loading();
        assert!(cell.current().is_loading());

        cell.reset();
        assert!(cell.current().is_idle());
        assert!(!cell.current().is_loading());
    }
}
