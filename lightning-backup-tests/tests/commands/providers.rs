//! Tests for the 'providers' command

use lightning_backup::storage::ProviderRegistry;

#[test]
fn test_builtin_providers_sorted() {
    let registry = ProviderRegistry::with_builtin_providers();
    assert_eq!(registry.provider_names(), vec!["azure", "dropbox", "file"]);
}

#[test]
fn test_lookup_is_case_insensitive() {
    let registry = ProviderRegistry::with_builtin_providers();
    assert!(registry.contains("Dropbox"));
    assert!(registry.contains("AZURE"));
    assert!(!registry.contains("s3"));
}
