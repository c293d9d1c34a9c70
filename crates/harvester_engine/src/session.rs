//! Run-scoped session registry shared by every feed harvest.
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use engine_logging::{engine_debug, engine_error};
use tokio::sync::Mutex;

use crate::{AuthError, AuthProvider, SessionContext, SessionScope};

const GLOBAL_SCOPE: &str = "*";

#[derive(Debug, Clone)]
enum ScopeState {
    Valid(SessionContext),
    Invalid,
}

/// Caches one session per scope for the length of a run.
///
/// `ensure_valid` hits the [`AuthProvider`] at most once per scope. After
/// `invalidate`, every later call for that scope fails fast.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    provider: Arc<dyn AuthProvider>,
    scope: SessionScope,
    sessions: Mutex<HashMap<String, ScopeState>>,
}

impl SessionRegistry {
    pub fn new(provider: Arc<dyn AuthProvider>, scope: SessionScope) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                provider,
                scope,
                sessions: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn scope_key(&self, source_key: &str) -> String {
        match self.inner.scope {
            SessionScope::Global => GLOBAL_SCOPE.to_string(),
            SessionScope::PerFeed => source_key.to_string(),
        }
    }

    pub async fn ensure_valid(&self, source_key: &str) -> Result<SessionLease, AuthError> {
        let scope = self.scope_key(source_key);
        // Held across the provider call so concurrent feeds sharing a scope
        // acquire it once.
        let mut sessions = self.inner.sessions.lock().await;
        match sessions.get(&scope) {
            Some(ScopeState::Valid(context)) => {
                return Ok(self.lease(context.clone(), scope, source_key));
            }
            Some(ScopeState::Invalid) => return Err(AuthError::SessionInvalid(scope)),
            None => {}
        }

        engine_debug!("SessionAcquire scope={} source_key={}", scope, source_key);
        match self.inner.provider.ensure_valid(source_key).await {
            Ok(context) if context.known_invalid => {
                sessions.insert(scope.clone(), ScopeState::Invalid);
                Err(AuthError::SessionInvalid(scope))
            }
            Ok(context) => {
                sessions.insert(scope.clone(), ScopeState::Valid(context.clone()));
                Ok(self.lease(context, scope, source_key))
            }
            Err(err) => {
                if matches!(err, AuthError::SessionInvalid(_)) {
                    sessions.insert(scope.clone(), ScopeState::Invalid);
                }
                Err(err)
            }
        }
    }

    /// Marks the scope invalid for the rest of the run. Returns `true` for the
    /// call that performed the transition; only that call reaches the provider.
    pub async fn invalidate(&self, source_key: &str) -> bool {
        let scope = self.scope_key(source_key);
        let first = {
            let mut sessions = self.inner.sessions.lock().await;
            let previous = sessions.insert(scope.clone(), ScopeState::Invalid);
            !matches!(previous, Some(ScopeState::Invalid))
        };
        if first {
            engine_error!("SessionInvalidated scope={} source_key={}", scope, source_key);
            self.inner.provider.invalidate(source_key).await;
        }
        first
    }

    pub async fn is_valid(&self, source_key: &str) -> bool {
        let scope = self.scope_key(source_key);
        let sessions = self.inner.sessions.lock().await;
        matches!(sessions.get(&scope), Some(ScopeState::Valid(_)))
    }

    fn lease(&self, context: SessionContext, scope: String, source_key: &str) -> SessionLease {
        SessionLease {
            context,
            scope,
            source_key: source_key.to_string(),
            registry: self.clone(),
        }
    }
}

/// A session handed to one feed harvest, tied back to its registry scope.
#[derive(Clone)]
pub struct SessionLease {
    context: SessionContext,
    scope: String,
    source_key: String,
    registry: SessionRegistry,
}

impl SessionLease {
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// False once any feed sharing this scope has invalidated it.
    pub async fn is_valid(&self) -> bool {
        self.registry.is_valid(&self.source_key).await
    }

    pub async fn invalidate(&self) -> bool {
        self.registry.invalidate(&self.source_key).await
    }
}

impl std::fmt::Debug for SessionLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLease")
            .field("scope", &self.scope)
            .field("source_key", &self.source_key)
            .field("context", &self.context)
            .finish()
    }
}

/// Hands out one fixed credential. Re-authentication is left to the operator.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    context: Option<SessionContext>,
}

impl StaticCredentials {
    pub fn new(context: SessionContext) -> Self {
        Self {
            context: Some(context),
        }
    }

    pub fn missing() -> Self {
        Self { context: None }
    }
}

#[async_trait]
impl AuthProvider for StaticCredentials {
    async fn ensure_valid(&self, source_key: &str) -> Result<SessionContext, AuthError> {
        match &self.context {
            Some(context) if !context.token.is_empty() => Ok(context.clone()),
            _ => Err(AuthError::MissingCredentials(source_key.to_string())),
        }
    }

    async fn invalidate(&self, _source_key: &str) {}
}
