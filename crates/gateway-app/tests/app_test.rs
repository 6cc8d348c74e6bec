use gateway_app::{AppConfig, AppState, SecretBox};
use gateway_core::{FeatureFlags, GatewayError, ResolveOptions};
use gateway_providers::ProviderEndpoints;
use std::path::PathBuf;

const KEY: &str = "app-test-key";

async fn write_gateways(content: String) -> PathBuf {
    let path = std::env::temp_dir().join(format!("app-gateways-{}.toml", uuid::Uuid::new_v4()));
    tokio::fs::write(&path, content).await.unwrap();
    path
}

fn state(path: PathBuf, flags: FeatureFlags) -> AppState {
    AppState::new(AppConfig {
        flags,
        kingdomfunding_private_key: Some("kf_process_key".to_string()),
        encryption_key: Some(KEY.to_string()),
        gateways_file: path,
        endpoints: ProviderEndpoints::with_base("http://127.0.0.1:9"),
    })
    .unwrap()
}

#[tokio::test]
async fn test_resolves_and_decrypts_from_file() {
    let secret_box = SecretBox::new(KEY).unwrap();
    let content = format!(
        r#"
[[gateways]]
id = "gw_sandbox"
churchId = "church_1"
provider = "stripe"
publicKey = "pk_test"
privateKey = "{sandbox_key}"
webhookKey = "{webhook_key}"
environment = "sandbox"

[[gateways]]
id = "gw_live"
churchId = "church_1"
provider = "stripe"
publicKey = "pk_live"
privateKey = "{live_key}"
environment = "production"
"#,
        sandbox_key = secret_box.seal("sk_test_1").unwrap(),
        webhook_key = secret_box.seal("whsec_1").unwrap(),
        live_key = secret_box.seal("sk_live_1").unwrap(),
    );
    let path = write_gateways(content).await;
    let state = state(path.clone(), FeatureFlags::default());

    let gateway = state
        .service
        .gateway_for_church("church_1", &ResolveOptions::provider("stripe"))
        .await
        .unwrap();
    assert_eq!(gateway.id, "gw_live");
    assert_eq!(state.service.config_for(&gateway).private_key, "sk_live_1");

    let options =
        ResolveOptions::provider("stripe").with_environment_preference(["sandbox", "production"]);
    let gateway = state
        .service
        .gateway_for_church("church_1", &options)
        .await
        .unwrap();
    let config = state.service.config_for(&gateway);
    assert_eq!(gateway.id, "gw_sandbox");
    assert_eq!(config.private_key, "sk_test_1");
    assert_eq!(config.webhook_key, "whsec_1");
    assert!(config.is_sandbox());

    tokio::fs::remove_file(&path).await.unwrap();
}

#[tokio::test]
async fn test_unregistered_provider_is_lookup_error() {
    let content = r#"
[[gateways]]
id = "gw_kf"
churchId = "church_2"
provider = "kingdomfunding"
publicKey = "kf_public"
"#
    .to_string();
    let path = write_gateways(content).await;

    let disabled = state(path.clone(), FeatureFlags::default());
    let gateway = disabled
        .service
        .gateway_for_church("church_2", &ResolveOptions::new())
        .await
        .unwrap();
    let err = disabled
        .service
        .calculate_fees(&gateway, 1000, "church_2", None)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::ProviderLookup { .. }));

    let enabled = state(
        path.clone(),
        FeatureFlags {
            enable_kingdomfunding: true,
            ..FeatureFlags::default()
        },
    );
    let fee = enabled
        .service
        .calculate_fees(&gateway, 1000, "church_2", None)
        .await
        .unwrap();
    assert_eq!(fee, 0);
    assert_eq!(
        enabled.service.config_for(&gateway).private_key,
        "kf_process_key"
    );

    tokio::fs::remove_file(&path).await.unwrap();
}

#[tokio::test]
async fn test_church_without_gateways() {
    let state = state(
        PathBuf::from("/nonexistent/gateways.toml"),
        FeatureFlags::default(),
    );
    let err = state
        .service
        .gateway_for_church("church_9", &ResolveOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "No payment gateway configured for church church_9.");
}
