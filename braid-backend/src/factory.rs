//! Backend construction, dispatching on a provider name.

use crate::echo::EchoBackend;
use crate::script::ScriptedBackend;
use braid_core::backend::Backend;
use braid_core::error::BackendError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

/// Configuration handed to [`create_backend`].
///
/// Unset fields fall back to the environment: `PROVIDER` and `MODEL` for
/// the factory defaults, and the provider-specific key variables
/// (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`) for credentials. Credentials
/// are carried opaquely — the factory never inspects them.
#[derive(Debug, Clone, Default)]
pub struct BackendConfig {
    /// Provider name the factory dispatches on.
    pub provider: Option<String>,
    /// Default model for the constructed backend.
    pub model: Option<String>,
    /// Credential forwarded to the provider.
    pub api_key: Option<String>,
    /// Provider-specific extras, passed through opaquely.
    pub extra: Value,
}

impl BackendConfig {
    /// A config naming only the provider.
    pub fn provider(name: impl Into<String>) -> Self {
        Self {
            provider: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Constructor for an externally registered provider.
pub type ProviderFactory =
    Arc<dyn Fn(&BackendConfig) -> Result<Arc<dyn Backend>, BackendError> + Send + Sync>;

fn providers() -> &'static RwLock<HashMap<String, ProviderFactory>> {
    static PROVIDERS: OnceLock<RwLock<HashMap<String, ProviderFactory>>> = OnceLock::new();
    PROVIDERS.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register a provider constructor under a name.
///
/// Provider SDK crates call this at startup so [`create_backend`] can
/// dispatch to them; last registration under a name wins.
pub fn register_provider(name: impl Into<String>, factory: ProviderFactory) {
    providers()
        .write()
        .expect("provider registry poisoned")
        .insert(name.into(), factory);
}

/// Clear registered providers. Test hook.
pub fn reset_providers() {
    providers()
        .write()
        .expect("provider registry poisoned")
        .clear();
}

fn env_key_for(provider: &str) -> Option<String> {
    let var = match provider {
        "openai" => "OPENAI_API_KEY",
        "anthropic" => "ANTHROPIC_API_KEY",
        _ => return None,
    };
    std::env::var(var).ok()
}

/// Build a backend from config, dispatching on the provider name.
///
/// Resolution order for the name: `config.provider`, then the `PROVIDER`
/// environment variable. Built-ins are `echo` and `scripted`; anything
/// else must have been registered via [`register_provider`], otherwise
/// the call fails with [`BackendError::Unsupported`].
pub fn create_backend(config: &BackendConfig) -> Result<Arc<dyn Backend>, BackendError> {
    let provider = config
        .provider
        .clone()
        .or_else(|| std::env::var("PROVIDER").ok())
        .ok_or_else(|| BackendError::Unsupported("no provider configured".into()))?;

    let mut resolved = config.clone();
    resolved.provider = Some(provider.clone());
    if resolved.model.is_none() {
        resolved.model = std::env::var("MODEL").ok();
    }
    if resolved.api_key.is_none() {
        resolved.api_key = env_key_for(&provider);
    }

    if let Some(factory) = providers()
        .read()
        .expect("provider registry poisoned")
        .get(&provider)
        .cloned()
    {
        return factory(&resolved);
    }

    match provider.as_str() {
        "echo" => {
            let model = resolved.model.unwrap_or_else(|| "echo-1".into());
            Ok(Arc::new(EchoBackend::new(model)))
        }
        "scripted" => Ok(Arc::new(ScriptedBackend::new())),
        other => Err(BackendError::Unsupported(format!(
            "unknown provider: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use braid_core::backend::GenerateRequest;

    #[tokio::test]
    async fn builds_echo_backend() {
        let backend = create_backend(&BackendConfig::provider("echo")).unwrap();
        let generation = backend.generate(GenerateRequest::new("hi")).await.unwrap();
        assert_eq!(generation.text, "hi");
    }

    #[test]
    fn unknown_provider_is_unsupported() {
        let err = create_backend(&BackendConfig::provider("frontier-9000")).unwrap_err();
        assert!(matches!(err, BackendError::Unsupported(_)));
    }

    #[test]
    fn missing_provider_is_unsupported() {
        // Only meaningful when PROVIDER is not set in the environment.
        if std::env::var("PROVIDER").is_err() {
            let err = create_backend(&BackendConfig::default()).unwrap_err();
            assert!(matches!(err, BackendError::Unsupported(_)));
        }
    }

    #[test]
    fn registered_provider_takes_precedence() {
        register_provider(
            "custom-test-provider",
            Arc::new(|config| {
                assert_eq!(config.provider.as_deref(), Some("custom-test-provider"));
                Ok(Arc::new(EchoBackend::new("custom-model")) as Arc<dyn Backend>)
            }),
        );
        let backend = create_backend(&BackendConfig::provider("custom-test-provider")).unwrap();
        assert_eq!(backend.name(), "echo");
        reset_providers();
    }
}
