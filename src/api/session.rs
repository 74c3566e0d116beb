//! Signed-in session: credential, current user, and the nation store

use crate::api::client::{ApiClient, User};
use crate::api::credentials::CredentialStore;
use crate::core::config::ClientConfig;
use crate::core::error::{Result, SandboxError};
use crate::core::types::{StateId, TurnTarget, UserId};
use crate::snapshot::nation::Nation;
use crate::snapshot::series::SnapshotSeries;
use crate::turn::client::{PendingTurn, TurnOutcome, TurnStreamClient};
use crate::turn::event::TurnEvent;
use crate::turn::handler::{Redirect, SeriesUpdater, TurnHandler};
use crate::turn::request::TurnRequest;

/// The nations loaded for this session
///
/// Replaced wholesale on refresh, cleared on logout. A completed turn only
/// touches the played nation's series.
#[derive(Debug, Clone, Default)]
pub struct NationStore {
    nations: Vec<Nation>,
}

impl NationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, nations: Vec<Nation>) {
        self.nations = nations;
    }

    pub fn clear(&mut self) {
        self.nations.clear();
    }

    /// Add a freshly founded nation, or swap the stored copy for it
    pub fn upsert(&mut self, nation: Nation) {
        match self.nations.iter_mut().find(|n| n.id == nation.id) {
            Some(existing) => *existing = nation,
            None => self.nations.push(nation),
        }
    }

    pub fn get(&self, id: StateId) -> Option<&Nation> {
        self.nations.iter().find(|n| n.id == id)
    }

    pub fn get_mut(&mut self, id: StateId) -> Option<&mut Nation> {
        self.nations.iter_mut().find(|n| n.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Nation> {
        self.nations.iter()
    }

    pub fn as_slice(&self) -> &[Nation] {
        &self.nations
    }

    pub fn owned_by(&self, user: UserId) -> impl Iterator<Item = &Nation> {
        self.nations.iter().filter(move |n| n.is_owned_by(user))
    }

    pub fn len(&self) -> usize {
        self.nations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nations.is_empty()
    }
}

/// What a finished turn left for the user to see
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub outcome: TurnOutcome,
    /// Delta report of the new snapshot
    pub report: Option<String>,
    pub notices: Vec<String>,
    pub redirect: Option<Redirect>,
}

/// Forwards each event to `inner`, then to an observer
struct Observed<'o, H> {
    inner: H,
    observer: &'o mut dyn FnMut(&TurnEvent),
}

impl<H: TurnHandler> TurnHandler for Observed<'_, H> {
    fn on_event(&mut self, event: &TurnEvent) {
        self.inner.on_event(event);
        (self.observer)(event);
    }
}

pub struct Session {
    config: ClientConfig,
    api: ApiClient,
    credentials: CredentialStore,
    turns: TurnStreamClient,
    nations: NationStore,
    user: Option<User>,
}

impl Session {
    /// Open a session with the stored credential and fetch the current user
    pub async fn start(config: ClientConfig) -> Result<Self> {
        let credentials = CredentialStore::load(config.credentials_path.clone())?;
        let token = credentials.token()?.to_string();
        let api = ApiClient::from_config(&config, Some(token))?;
        let mut session = Self {
            config,
            api,
            credentials,
            turns: TurnStreamClient::new(),
            nations: NationStore::new(),
            user: None,
        };

        let user = session.api.current_user().await;
        let user = session.guard(user)?;
        tracing::info!("Signed in as user {}", user.id.0);
        session.user = Some(user);
        Ok(session)
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn nations(&self) -> &NationStore {
        &self.nations
    }

    pub fn turns(&self) -> &TurnStreamClient {
        &self.turns
    }

    /// Refetch the caller's nations and replace the store
    pub async fn refresh(&mut self) -> Result<&NationStore> {
        let nations = self.api.nations().await;
        let nations = self.guard(nations)?;
        tracing::debug!("Loaded {} nations", nations.len());
        self.nations.replace(nations);
        Ok(&self.nations)
    }

    /// Load a nation's full history into the store
    pub async fn load_history(&mut self, id: StateId) -> Result<&Nation> {
        let snapshots = self.api.snapshots(id).await;
        let snapshots = self.guard(snapshots)?;
        if self.nations.get(id).is_none() {
            let nation = self.api.nation(id).await;
            let nation = self.guard(nation)?;
            self.nations.upsert(nation);
        }
        let nation = self.nations.get_mut(id).ok_or_else(|| unknown_nation(id))?;
        nation.series.replace(snapshots);
        Ok(nation)
    }

    pub fn logout(&mut self) -> Result<()> {
        self.nations.clear();
        self.user = None;
        self.credentials.invalidate()
    }

    /// Claim the in-flight slot for `request`
    pub fn begin_turn(&self, request: TurnRequest) -> Result<PendingTurn> {
        if let TurnTarget::Nation(id) = request.target() {
            if self.nations.get(id).is_none() {
                return Err(unknown_nation(id));
            }
        }
        self.turns.start(request)
    }

    /// Stream a claimed turn to its end and apply it to the store
    ///
    /// `observer` sees every event after the store has been updated.
    pub async fn run_turn(&mut self, pending: PendingTurn, observer: &mut dyn FnMut(&TurnEvent)) -> Result<TurnReport> {
        let mut scratch = SnapshotSeries::new();
        let series = match pending.target() {
            TurnTarget::Nation(id) => &mut self.nations.get_mut(id).ok_or_else(|| unknown_nation(id))?.series,
            TurnTarget::Creation => &mut scratch,
        };

        let mut handler = Observed {
            inner: SeriesUpdater::new(series, &self.config),
            observer,
        };
        let outcome = pending.run(&self.api, &mut handler).await;
        let updater = handler.inner;
        let result = outcome.map(|outcome| TurnReport {
            outcome,
            report: updater.report,
            notices: updater.notices,
            redirect: updater.redirect,
        });
        let report = self.guard(result)?;

        if let Some(id) = report.outcome.created_state() {
            let nation = self.api.nation(id).await;
            match self.guard(nation) {
                Ok(nation) => self.nations.upsert(nation),
                Err(e) if e.is_auth() => return Err(e),
                Err(e) => tracing::warn!("Founded nation {} but could not load it: {}", id, e),
            }
        }
        Ok(report)
    }

    /// Invalidate the stored credential when the server rejected it
    fn guard<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_auth() {
                tracing::warn!("Credential rejected: {}", e);
                self.nations.clear();
                self.user = None;
                if let Err(io) = self.credentials.invalidate() {
                    tracing::warn!("Could not clear credential: {}", io);
                }
            }
        }
        result
    }
}

fn unknown_nation(id: StateId) -> SandboxError {
    SandboxError::InvalidRequest(format!("state {} is not loaded", id))
}
