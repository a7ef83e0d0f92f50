//! Shared application state.

use std::sync::Arc;

use sqlx::mysql::MySqlPool;

use normgate_core::auth::RevokedTokens;
use normgate_core::store::{ConversationStore, FileStore, ResultStore, TaskStore, UserStore};
use normgate_core::{ScenarioRegistry, Settings, StandardTypeRegistry, Storage};
use normgate_upstream::UpstreamClient;

use crate::graph::GraphClient;

/// Everything a handler or background worker needs, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Resolved settings.
    pub settings: Arc<Settings>,
    /// Storage roots.
    pub storage: Arc<Storage>,
    /// Scenario registry for the proxy surface.
    pub scenarios: Arc<ScenarioRegistry>,
    /// Standard-type registry for the processing surface.
    pub standards: Arc<StandardTypeRegistry>,
    /// User repository.
    pub users: UserStore,
    /// Task repository.
    pub tasks: TaskStore,
    /// Task-file repository.
    pub files: FileStore,
    /// Task-result repository.
    pub results: ResultStore,
    /// Conversation audit repository.
    pub conversations: ConversationStore,
    /// Upstream HTTP client profiles.
    pub upstream: UpstreamClient,
    /// Revoked-token set.
    pub revoked: Arc<RevokedTokens>,
    /// Graph database client.
    pub graph: Arc<GraphClient>,
    /// Raw pool, for health probes.
    pub pool: MySqlPool,
}

impl AppState {
    /// Assemble the state over an existing pool.
    pub fn new(
        settings: Settings,
        storage: Storage,
        pool: MySqlPool,
        upstream: UpstreamClient,
    ) -> Self {
        let scenarios = Arc::new(ScenarioRegistry::from_env());
        let standards = Arc::new(StandardTypeRegistry::from_env(
            &settings.dify_file_upload_url,
        ));
        let graph = Arc::new(GraphClient::new(settings.neo4j.clone()));
        Self {
            settings: Arc::new(settings),
            storage: Arc::new(storage),
            scenarios,
            standards,
            users: UserStore::new(pool.clone()),
            tasks: TaskStore::new(pool.clone()),
            files: FileStore::new(pool.clone()),
            results: ResultStore::new(pool.clone()),
            conversations: ConversationStore::new(pool.clone()),
            upstream,
            revoked: Arc::new(RevokedTokens::new()),
            graph,
            pool,
        }
    }
}
