//! Unit tests for the provider registry

use lightning_backup::storage::{
    ConnectionError, ProviderConfig, ProviderRegistry, RegistryError, StorageProvider,
};
use test_utils::{MockProvider, ResultAssertions, TestContext};

fn memory_provider(
    _config: &ProviderConfig,
) -> Result<Box<dyn StorageProvider>, ConnectionError> {
    Ok(Box::new(MockProvider::new()))
}

#[test]
fn test_unknown_scheme_error_lists_every_provider() {
    let registry = ProviderRegistry::with_builtin_providers();
    let result = registry.create_from_connection_string(
        "s3://bucket.example.com/backups",
        &ProviderConfig::default(),
    );

    result.assert_err_contains("Unknown provider 's3'. Available: azure, dropbox, file");
}

#[test]
fn test_custom_provider_is_listed_with_builtins() {
    let mut registry = ProviderRegistry::with_builtin_providers();
    registry.register("memory", memory_provider).assert_ok();

    assert_eq!(
        registry.provider_names(),
        vec!["azure", "dropbox", "file", "memory"]
    );
    assert!(registry.contains("MEMORY"));
}

#[test]
fn test_builtin_names_cannot_be_replaced() {
    let mut registry = ProviderRegistry::with_builtin_providers();
    let result = registry.register("file", memory_provider);
    assert!(matches!(result, Err(RegistryError::DuplicateProvider(_))));

    // The original constructor is still in place
    let ctx = TestContext::new();
    let provider = registry
        .create_from_connection_string(&ctx.file_connection_string(), &ProviderConfig::default())
        .assert_ok();
    assert_eq!(provider.name(), "file");
}

#[test]
fn test_file_scheme_builds_local_provider() {
    let ctx = TestContext::new();
    let registry = ProviderRegistry::with_builtin_providers();

    let provider = registry
        .create_from_connection_string(&ctx.file_connection_string(), &ProviderConfig::default())
        .assert_ok();

    provider.upload(b"abc", "/lightning-backups/n/x.backup").assert_ok();
    assert!(ctx.file_exists("remote/lightning-backups/n/x.backup"));
}

#[test]
fn test_explicit_provider_still_validates_connection() {
    let registry = ProviderRegistry::with_builtin_providers();
    let config = ProviderConfig {
        connection_string: Some("azure://acct.blob.core.windows.net/container".to_string()),
        ..ProviderConfig::default()
    };

    // Forcing the file provider onto an azure connection string is refused by the constructor
    assert!(matches!(
        registry.create("file", &config),
        Err(RegistryError::Connection(ConnectionError::WrongScheme { .. }))
    ));
    assert!(registry.create("azure", &config).is_ok());
}

#[test]
fn test_dropbox_needs_a_token() {
    let registry = ProviderRegistry::with_builtin_providers();

    let missing = registry.create_from_connection_string("dropbox://dropbox.com", &ProviderConfig::default());
    missing.assert_err_contains("DROPBOX_ACCESS_TOKEN");

    let config = ProviderConfig {
        access_token: Some("sl.real-token".to_string()),
        ..ProviderConfig::default()
    };
    let provider = registry
        .create_from_connection_string("dropbox://dropbox.com", &config)
        .assert_ok();
    assert_eq!(provider.name(), "dropbox");
}
