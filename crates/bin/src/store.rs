//! Credential store construction.

use std::sync::Arc;

use glimpse::{
    config::{StoreLocation, redact_uri},
    store::{CredentialStore, InMemoryCredentialStore, SqlxCredentialStore},
};

/// Open the credential store named by `location`.
pub async fn create_credential_store(
    location: &StoreLocation,
) -> Result<Arc<dyn CredentialStore>, Box<dyn std::error::Error>> {
    match location {
        StoreLocation::Memory => {
            tracing::warn!("Using ephemeral in-memory credential store; identities are lost on exit");
            Ok(Arc::new(InMemoryCredentialStore::new()))
        }
        StoreLocation::JsonFile(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            let store = InMemoryCredentialStore::load_from_file(path).await?;
            tracing::info!(
                "Using in-memory credential store with persistence at {} ({} identities)",
                path.display(),
                store.count().await?
            );
            Ok(Arc::new(store))
        }
        StoreLocation::Sqlite(url) => {
            tracing::info!("Using SQLite credential store at {url}");
            Ok(Arc::new(SqlxCredentialStore::connect_sqlite(url).await?))
        }
        StoreLocation::Postgres(url) => {
            let display_url = redact_uri(url);
            tracing::info!("Connecting to PostgreSQL credential store at {display_url}");
            match SqlxCredentialStore::connect_postgres(url).await {
                Ok(store) => {
                    tracing::info!("Connected to PostgreSQL successfully");
                    Ok(Arc::new(store))
                }
                Err(e) => {
                    Err(format!("Failed to connect to PostgreSQL at {display_url}: {e}").into())
                }
            }
        }
    }
}

/// Save a JSON-backed store; other stores persist on their own.
pub async fn persist_on_shutdown(store: &dyn CredentialStore, location: &StoreLocation) {
    let StoreLocation::JsonFile(path) = location else {
        return;
    };
    let Some(in_memory) = store.as_any().downcast_ref::<InMemoryCredentialStore>() else {
        return;
    };
    match in_memory.save_to_file(path).await {
        Ok(()) => {
            tracing::info!("Credential store saved to {}", path.display());
            println!("\nCredential store saved successfully");
        }
        Err(e) => {
            tracing::error!("Failed to save credential store: {e:?}");
            eprintln!("Failed to save credential store: {e:?}");
        }
    }
}
