use std::sync::Arc;

use codesmith::config::Config;
use codesmith::dispatch::registry::Registry;
use codesmith::error::CodesmithError;

fn config_with_keys(keys: &[&str]) -> Config {
    let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
    Config::from_lookup(move |var| keys.contains(&var.to_string()).then(|| "sk-test".to_string()))
}

#[test]
fn same_name_returns_same_instance() {
    let registry = Registry::from_config(&config_with_keys(&["ANTHROPIC_API_KEY"])).unwrap();

    let first = registry.get_provider(Some("anthropic")).unwrap();
    let second = registry.get_provider(Some("anthropic")).unwrap();

    assert!(Arc::ptr_eq(&first, &second), "adapter should be cached");
    assert_eq!(registry.cached_count(), 1);
    assert_eq!(first.name(), "anthropic");
    assert_eq!(first.default_model(), "claude-sonnet-4-20250514");
}

#[test]
fn unknown_provider_is_configuration_error() {
    let registry = Registry::from_config(&config_with_keys(&["OPENAI_API_KEY"])).unwrap();

    match registry.get_provider(Some("nonexistent")) {
        Err(CodesmithError::Configuration(msg)) => {
            assert_eq!(msg, "Provider 'nonexistent' not found in configuration");
        }
        Err(other) => panic!("expected Configuration, got {other:?}"),
        Ok(_) => panic!("expected an error"),
    }
}

#[test]
fn empty_key_is_configuration_error() {
    let registry = Registry::from_config(&config_with_keys(&[])).unwrap();

    match registry.get_provider(Some("openai")) {
        Err(CodesmithError::Configuration(msg)) => {
            assert_eq!(msg, "API key not configured for provider 'openai'");
        }
        Err(other) => panic!("expected Configuration, got {other:?}"),
        Ok(_) => panic!("expected an error"),
    }
    // Failures are not cached
    assert_eq!(registry.cached_count(), 0);
}

#[test]
fn whitespace_key_counts_as_missing() {
    let config = Config::from_lookup(|var| (var == "OPENAI_API_KEY").then(|| "   ".to_string()));
    let registry = Registry::from_config(&config).unwrap();
    assert!(registry.get_provider(Some("openai")).is_err());
    assert!(registry.available_providers().is_empty());
}

#[test]
fn missing_or_blank_name_uses_default_provider() {
    let config = Config::from_lookup(|var| match var {
        "OPENAI_API_KEY" => Some("sk-test".to_string()),
        "CODESMITH_DEFAULT_PROVIDER" => Some("openai".to_string()),
        _ => None,
    });
    let registry = Registry::from_config(&config).unwrap();

    let by_default = registry.get_provider(None).unwrap();
    let by_blank = registry.get_provider(Some("")).unwrap();
    let by_name = registry.get_provider(Some("openai")).unwrap();

    assert_eq!(by_default.name(), "openai");
    assert!(Arc::ptr_eq(&by_default, &by_blank));
    assert!(Arc::ptr_eq(&by_default, &by_name));
}

#[test]
fn available_providers_lists_only_keyed_ones() {
    let registry =
        Registry::from_config(&config_with_keys(&["OPENROUTER_API_KEY", "OPENAI_API_KEY"]))
            .unwrap();

    let names: Vec<String> = registry.available_providers().into_iter().collect();
    assert_eq!(names, vec!["openai", "openrouter"]);
    // Listing does not build adapters
    assert_eq!(registry.cached_count(), 0);
}

#[test]
fn provider_models_reflect_configuration() {
    let registry = Registry::from_config(&config_with_keys(&[])).unwrap();

    assert_eq!(
        registry.provider_models("openai"),
        vec!["gpt-4-turbo-preview", "gpt-4", "gpt-3.5-turbo"]
    );
    assert!(
        registry
            .provider_models("openrouter")
            .contains(&"meta-llama/llama-3.1-70b-instruct".to_string())
    );
    assert!(registry.provider_models("nonexistent").is_empty());
}

#[test]
fn custom_provider_from_toml_is_resolvable() {
    let mut config = config_with_keys(&[]);
    config
        .apply_toml(
            r#"
            [providers.local]
            api_key = "sk-local"
            base_url = "http://127.0.0.1:11434/v1"
            default_model = "llama3"
            "#,
        )
        .unwrap();
    let registry = Registry::from_config(&config).unwrap();

    let provider = registry.get_provider(Some("local")).unwrap();
    assert_eq!(provider.name(), "local");
    assert_eq!(provider.model_for(None), "llama3");
    assert_eq!(provider.model_for(Some("llama3.1")), "llama3.1");
    assert!(registry.available_providers().contains("local"));
}

#[test]
fn concurrent_lookups_share_one_instance() {
    let registry =
        Arc::new(Registry::from_config(&config_with_keys(&["OPENROUTER_API_KEY"])).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            std::thread::spawn(move || registry.get_provider(Some("openrouter")).unwrap())
        })
        .collect();
    let providers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for p in &providers[1..] {
        assert!(Arc::ptr_eq(&providers[0], p));
    }
    assert_eq!(registry.cached_count(), 1);
}
