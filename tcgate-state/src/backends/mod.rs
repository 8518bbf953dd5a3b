//! Backend implementations for state storage

mod local;

pub use local::LocalBackend;

use crate::backend::{BackendConfig, BackendError, BackendResult, StateBackend};

/// Create a backend from configuration
pub async fn create_backend(config: &BackendConfig) -> BackendResult<Box<dyn StateBackend>> {
    match config.backend_type.as_str() {
        "local" | "" => {
            let backend = LocalBackend::from_config(config)?;
            backend.init().await?;
            Ok(Box::new(backend))
        }
        other => Err(BackendError::unsupported_backend(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unsupported_backend_is_rejected() {
        let config = BackendConfig {
            backend_type: "s3".to_string(),
            ..Default::default()
        };

        match create_backend(&config).await {
            Err(BackendError::UnsupportedBackend(name)) => assert_eq!(name, "s3"),
            Err(e) => panic!("Expected UnsupportedBackend error, got {}", e),
            Ok(_) => panic!("Expected UnsupportedBackend error"),
        }
    }

    #[tokio::test]
    async fn local_backend_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BackendConfig::local();
        config.attributes.insert(
            "path".to_string(),
            tcgate_core::resource::Value::String(
                dir.path().join("s.json").to_string_lossy().into_owned(),
            ),
        );

        let backend = create_backend(&config).await.unwrap();
        assert!(backend.read_state().await.unwrap().is_none());
    }
}
