use fragcache_core::{CacheError, KeyError, Profile, Result, validate_key};

mod common;

#[test]
fn test_validation_workflow() {
    fn key_for(post_id: u32, lang: &str) -> Result<String> {
        let key = validate_key(&format!("post {post_id}|{lang}"))?;
        Ok(key.to_string())
    }

    // Valid case
    assert_eq!(key_for(7, "en").unwrap(), "post 7|en");

    // Invalid case
    let result = key_for(7, "en/US");
    match result {
        Err(CacheError::InvalidKey(KeyError::InvalidChars { found })) => assert_eq!(found, '/'),
        other => panic!("Expected InvalidChars error, got {other:?}"),
    }
}

#[test]
fn test_every_generated_key_is_valid() {
    for key in common::sample_keys(500) {
        assert!(validate_key(&key).is_ok(), "{key:?} should be valid");
    }
}

#[test]
fn test_profile_configuration_workflow() {
    let profile = Profile::builder("Woo")
        .events_csv("woocommerce_update_product, woocommerce_delete_product")
        .ttl(std::time::Duration::from_secs(30 * 86_400))
        .logging(true)
        .build()
        .expect("valid profile");

    assert!(profile.listens_to("woocommerce_delete_product"));
    assert!(!profile.listens_to("save_post"));
    assert_eq!(profile.ttl().as_secs(), 2_592_000);

    let restricted = profile.with_global_switches(true, false);
    assert!(!restricted.is_logging_enabled());
}

#[test]
fn test_error_propagation_with_question_mark() {
    fn step1() -> Result<Profile> {
        Profile::builder("").build()
    }

    fn step2() -> Result<String> {
        let profile = step1()?;
        Ok(profile.name().to_string())
    }

    let error = step2().unwrap_err();
    assert!(matches!(error, CacheError::InvalidProfile { .. }));
    assert!(error.is_usage_error());
}
