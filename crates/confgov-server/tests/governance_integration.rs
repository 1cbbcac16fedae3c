//! End-to-end tests of the governance operations over the in-memory
//! collaborators.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use confgov_auth::{InMemoryPolicyEngine, PolicyEngine, PolicyTuple};
use confgov_cache::{CacheRefreshService, ConfigCache, RefreshConfig};
use confgov_core::{
    CONFIGURATION_RESOURCE, ConfigEntry, ConfigFilter, ConfigInput, GovernanceError,
    GovernanceResult, Page, PageRequest,
};
use confgov_expr::Value;
use confgov_server::{AppConfig, GovernanceService, ListConfigurationRequest, ServerBuilder};
use confgov_storage::{ConfigStore, InMemoryConfigStore};
use tokio_test::{assert_err, assert_ok};

// =============================================================================
// Test Fixtures
// =============================================================================

/// Store wrapper counting listing calls.
struct CountingStore {
    inner: InMemoryConfigStore,
    list_calls: AtomicUsize,
}

impl CountingStore {
    fn new() -> Self {
        Self {
            inner: InMemoryConfigStore::new(),
            list_calls: AtomicUsize::new(0),
        }
    }

    fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigStore for CountingStore {
    async fn get_by_key(&self, key: &str) -> GovernanceResult<Option<ConfigEntry>> {
        self.inner.get_by_key(key).await
    }

    async fn list_all(&self) -> GovernanceResult<Vec<ConfigEntry>> {
        self.inner.list_all().await
    }

    async fn upsert(&self, input: &ConfigInput) -> GovernanceResult<ConfigEntry> {
        self.inner.upsert(input).await
    }

    async fn delete_by_key(&self, key: &str) -> GovernanceResult<u64> {
        self.inner.delete_by_key(key).await
    }

    async fn list_by_filter(
        &self,
        filter: &ConfigFilter,
        page: PageRequest,
    ) -> GovernanceResult<Page<ConfigEntry>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list_by_filter(filter, page).await
    }
}

struct Fixture {
    service: GovernanceService,
    store: Arc<CountingStore>,
    engine: Arc<InMemoryPolicyEngine>,
}

fn roles(names: &[&str]) -> Vec<String> {
    names.iter().map(ToString::to_string).collect()
}

fn rule(role: &str, group: &str, operation: &str) -> PolicyTuple {
    PolicyTuple::new(role, CONFIGURATION_RESOURCE, group, operation)
}

async fn fixture() -> Fixture {
    let store = Arc::new(CountingStore::new());
    for input in [
        ConfigInput::new("enable_feature_x", "true", "Feature X", "features"),
        ConfigInput::new("min_user_level", "50", "Minimum user level", "users"),
        ConfigInput::new("admin_email", "admin@example.com", "Admin email", "users"),
        ConfigInput::new("allowed_user_ids", "[100, 201, 305]", "Allowed users", "users"),
        ConfigInput::new(
            "feature_flags",
            r#"{"beta": true, "max_items": 25, "theme": "dark"}"#,
            "Feature flags",
            "features",
        ),
        ConfigInput::new("db_password", "hunter2", "Database password", "secrets"),
    ] {
        store.upsert(&input).await.unwrap();
    }

    let engine = Arc::new(InMemoryPolicyEngine::with_policies([
        rule("viewer", "users", "read"),
        rule("viewer", "features", "read"),
        rule("operator", "features", "read"),
        rule("operator", "features", "write"),
        rule("auditor", "secrets", "read"),
    ]));

    let refresher = Arc::new(CacheRefreshService::new(
        Arc::new(ConfigCache::new()),
        store.clone(),
        RefreshConfig::default(),
    ));
    refresher.refresh_now().await.unwrap();

    Fixture {
        service: GovernanceService::new(store.clone(), engine.clone(), refresher),
        store,
        engine,
    }
}

// =============================================================================
// Get / CreateOrUpdate / Delete
// =============================================================================

#[tokio::test]
async fn get_is_granted_if_any_role_matches() {
    let f = fixture().await;

    let entry = assert_ok!(
        f.service
            .get_configuration(&roles(&["nobody", "auditor"]), "db_password")
            .await
    );
    assert_eq!(entry.value, "hunter2");
    assert_eq!(entry.group, "secrets");

    let err = assert_err!(
        f.service
            .get_configuration(&roles(&["viewer"]), "db_password")
            .await
    );
    assert!(err.is_forbidden());

    let err = assert_err!(f.service.get_configuration(&[], "db_password").await);
    assert!(err.is_forbidden());
}

#[tokio::test]
async fn get_of_unknown_key_is_not_found() {
    let f = fixture().await;
    let err = assert_err!(
        f.service
            .get_configuration(&roles(&["viewer"]), "no_such_key")
            .await
    );
    assert!(err.is_not_found());
}

#[tokio::test]
async fn create_update_and_delete_write_through() {
    let f = fixture().await;
    let operator = roles(&["operator"]);

    let created = assert_ok!(
        f.service
            .create_or_update_configuration(
                &operator,
                ConfigInput::new("max_widgets", "10", "Widget limit", "features")
                    .with_description("Upper bound for widgets per page"),
            )
            .await
    );
    assert_eq!(created.description.as_deref(), Some("Upper bound for widgets per page"));
    assert_eq!(
        f.service.cache().get("max_widgets").as_deref(),
        Some("features<>10")
    );

    let updated = assert_ok!(
        f.service
            .create_or_update_configuration(
                &operator,
                ConfigInput::new("max_widgets", "20", "Widget limit", "features"),
            )
            .await
    );
    assert_eq!(updated.id, created.id);
    assert_eq!(
        f.service.cache().get("max_widgets").as_deref(),
        Some("features<>20")
    );

    assert_ok!(f.service.delete_configuration(&operator, "max_widgets").await);
    assert!(f.service.cache().get("max_widgets").is_none());
    assert!(f.store.get_by_key("max_widgets").await.unwrap().is_none());

    let err = assert_err!(f.service.delete_configuration(&operator, "max_widgets").await);
    assert!(err.is_not_found());
}

#[tokio::test]
async fn writes_refresh_the_whole_cache() {
    let f = fixture().await;
    let before = f.service.refresher().stats().successful_refreshes;

    // A store row written behind the engine's back.
    f.store
        .upsert(&ConfigInput::new("out_of_band", "1", "Out of band", "features"))
        .await
        .unwrap();
    assert!(f.service.cache().get("out_of_band").is_none());

    f.service
        .create_or_update_configuration(
            &roles(&["operator"]),
            ConfigInput::new("enable_feature_x", "false", "Feature X", "features"),
        )
        .await
        .unwrap();

    assert_eq!(f.service.refresher().stats().successful_refreshes, before + 1);
    assert_eq!(
        f.service.cache().get("out_of_band").as_deref(),
        Some("features<>1")
    );
}

#[tokio::test]
async fn denied_writes_do_not_mutate() {
    let f = fixture().await;

    let err = assert_err!(
        f.service
            .create_or_update_configuration(
                &roles(&["viewer"]),
                ConfigInput::new("min_user_level", "10", "Minimum user level", "users"),
            )
            .await
    );
    assert!(err.is_forbidden());

    let err = assert_err!(
        f.service
            .delete_configuration(&roles(&["viewer"]), "min_user_level")
            .await
    );
    assert!(err.is_forbidden());

    assert_eq!(
        f.store.get_by_key("min_user_level").await.unwrap().unwrap().value,
        "50"
    );
    assert_eq!(
        f.service.cache().get("min_user_level").as_deref(),
        Some("users<>50")
    );
}

#[tokio::test]
async fn missing_fields_are_rejected() {
    let f = fixture().await;
    let err = assert_err!(
        f.service
            .create_or_update_configuration(
                &roles(&["operator"]),
                ConfigInput::new("k", "", "Name", "features"),
            )
            .await
    );
    assert!(matches!(err, GovernanceError::Validation { .. }));
}

#[tokio::test]
async fn separator_in_value_is_stored_but_unreadable_from_cache() {
    let f = fixture().await;
    let f = Fixture {
        service: f.service.with_refresh_after_write(false),
        ..f
    };

    assert_ok!(
        f.service
            .create_or_update_configuration(
                &roles(&["operator"]),
                ConfigInput::new("arrow", "a<>b", "Arrow", "features"),
            )
            .await
    );
    assert_eq!(f.store.get_by_key("arrow").await.unwrap().unwrap().value, "a<>b");

    let err = assert_err!(
        f.service
            .get_configuration(&roles(&["operator"]), "arrow")
            .await
    );
    assert!(matches!(err, GovernanceError::Format { .. }));
}

// =============================================================================
// List
// =============================================================================

#[tokio::test]
async fn list_is_restricted_to_readable_groups() {
    let f = fixture().await;

    let page = assert_ok!(
        f.service
            .list_configuration(&roles(&["viewer"]), ListConfigurationRequest::default())
            .await
    );
    assert_eq!(page.total, 5);
    assert!(page.items.iter().all(|e| e.group != "secrets"));
    // Newest first.
    assert_eq!(page.items[0].key, "feature_flags");

    let page = assert_ok!(
        f.service
            .list_configuration(
                &roles(&["viewer"]),
                ListConfigurationRequest::default()
                    .with_group("users")
                    .with_key("user")
                    .with_page(PageRequest::new(1, 1)),
            )
            .await
    );
    assert_eq!(page.total, 2);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.page_size, 1);
}

#[tokio::test]
async fn list_of_unreadable_group_is_forbidden() {
    let f = fixture().await;
    let err = assert_err!(
        f.service
            .list_configuration(
                &roles(&["viewer"]),
                ListConfigurationRequest::default().with_group("secrets"),
            )
            .await
    );
    assert_eq!(
        err,
        GovernanceError::forbidden("common.configuration.forbidden")
    );
    assert_eq!(f.store.list_calls(), 0);
}

#[tokio::test]
async fn list_without_roles_skips_the_store() {
    let f = fixture().await;
    let page = assert_ok!(
        f.service
            .list_configuration(
                &[],
                ListConfigurationRequest::default().with_page(PageRequest::new(3, 50)),
            )
            .await
    );
    assert!(page.items.is_empty());
    assert_eq!(page.total, 0);
    assert_eq!(page.page_number, 3);
    assert_eq!(page.page_size, 50);
    assert_eq!(f.store.list_calls(), 0);
}

// =============================================================================
// Validate / Evaluate
// =============================================================================

#[tokio::test]
async fn validate_evaluates_rules_against_cached_values() {
    let f = fixture().await;
    let viewer = roles(&["viewer"]);

    let cases = [
        ("min_user_level", "int(value) > 20", true),
        ("min_user_level", "int(value) < 40", false),
        ("feature_flags", r#"value.theme == "dark""#, true),
        ("feature_flags", "value.max_items > 20", true),
        ("allowed_user_ids", "201 in value", true),
        ("allowed_user_ids", "999 in value", false),
        ("admin_email", r#"value.startsWith("admin")"#, true),
    ];
    for (key, expr, expected) in cases {
        let outcome = f.service.validate_configuration(&viewer, key, expr).await;
        assert_eq!(outcome.is_valid, expected, "{key}: {expr}");
        assert_eq!(outcome.message, "common.success");
    }
}

#[tokio::test]
async fn validate_never_fails_hard() {
    let f = fixture().await;
    let viewer = roles(&["viewer"]);

    let outcome = f.service.validate_configuration(&viewer, "no_such_key", "value == 1").await;
    assert!(!outcome.is_valid);
    assert_eq!(outcome.message, "common.configuration.notFound");

    let outcome = f.service.validate_configuration(&viewer, "db_password", "true").await;
    assert!(!outcome.is_valid);
    assert_eq!(outcome.message, "common.forbidden");

    let outcome = f
        .service
        .validate_configuration(&viewer, "min_user_level", "int(value) + 10")
        .await;
    assert!(!outcome.is_valid);
    assert!(outcome.message.contains("did not return bool"));

    let outcome = f
        .service
        .validate_configuration(&viewer, "min_user_level", "value >")
        .await;
    assert!(!outcome.is_valid);
    assert!(outcome.message.starts_with("Compilation error"));

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["is_valid"], false);
}

#[tokio::test]
async fn evaluate_returns_values_and_propagates_errors() {
    let f = fixture().await;
    let viewer = roles(&["viewer"]);

    let value = assert_ok!(
        f.service
            .evaluate_configuration(&viewer, "feature_flags", "value.max_items * 2")
            .await
    );
    assert_eq!(value, Value::Float(50.0));
    match assert_ok!(
        f.service
            .evaluate_configuration(&viewer, "allowed_user_ids", "value.filter(id, id > 150)")
            .await
    ) {
        Value::List(items) => assert_eq!(
            items.as_slice(),
            [Value::Float(201.0), Value::Float(305.0)].as_slice()
        ),
        other => panic!("unexpected result: {other:?}"),
    }

    let err = assert_err!(
        f.service
            .evaluate_configuration(&viewer, "db_password", "value")
            .await
    );
    assert!(err.is_forbidden());

    let err = assert_err!(
        f.service
            .evaluate_configuration(&viewer, "feature_flags", "value.missing")
            .await
    );
    assert!(matches!(err, GovernanceError::Evaluation { .. }));
}

#[tokio::test]
async fn refresh_removes_keys_deleted_from_the_store() {
    let f = fixture().await;
    f.service.cache().set_all(
        [("a", "g<>1"), ("b", "g<>2")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    );
    f.store.upsert(&ConfigInput::new("a", "1", "A", "g")).await.unwrap();

    f.service.refresher().refresh_now().await.unwrap();

    assert_eq!(f.service.cache().get("a").as_deref(), Some("g<>1"));
    assert!(f.service.cache().get("b").is_none());
}

// =============================================================================
// Role grants
// =============================================================================

#[tokio::test]
async fn assigning_grants_replaces_the_role_rules() {
    let f = fixture().await;

    let accepted = assert_ok!(
        f.service
            .assign_configuration_groups(
                "operator",
                &roles(&["users:read", "broken", "users:delete", "users:read", "secrets:write"]),
            )
            .await
    );
    assert_eq!(accepted, vec!["users:read".to_string(), "secrets:write".to_string()]);

    let groups = assert_ok!(f.service.get_configuration_groups(Some("operator")).await);
    assert_eq!(groups, vec!["secrets:write".to_string(), "users:read".to_string()]);

    // The old features grants are gone, other roles untouched.
    let err = assert_err!(
        f.service
            .get_configuration(&roles(&["operator"]), "enable_feature_x")
            .await
    );
    assert!(err.is_forbidden());
    assert_eq!(
        f.engine
            .get_filtered_policy(0, &["viewer", CONFIGURATION_RESOURCE])
            .await
            .unwrap()
            .len(),
        2
    );

    let err = assert_err!(
        f.service
            .assign_configuration_groups("operator", &roles(&["nonsense", ":read"]))
            .await
    );
    assert!(matches!(err, GovernanceError::Validation { .. }));
}

#[tokio::test]
async fn configuration_groups_without_role_lists_store_groups() {
    let f = fixture().await;
    let groups = assert_ok!(f.service.get_configuration_groups(None).await);
    assert_eq!(groups, roles(&["features", "secrets", "users"]));
}

// =============================================================================
// Server wiring
// =============================================================================

#[tokio::test]
async fn server_builder_seeds_collaborators() {
    let cfg: AppConfig = toml::from_str(
        r#"
[permissions]
public_group_prefix = "public."

[[seed.configurations]]
key = "banner"
value = "Welcome"
name = "Banner"
group = "public.ui"

[[seed.policies]]
role = "admin"
group = "public.ui"
operation = "write"
"#,
    )
    .unwrap();

    let server = ServerBuilder::new().with_config(cfg).build().await.unwrap();
    let service = server.service();
    service.refresher().refresh_now().await.unwrap();

    let entry = assert_ok!(service.get_configuration(&[], "banner").await);
    assert_eq!(entry.value, "Welcome");

    let err = assert_err!(service.delete_configuration(&[], "banner").await);
    assert!(err.is_forbidden());
    assert_ok!(service.delete_configuration(&roles(&["admin"]), "banner").await);
}
