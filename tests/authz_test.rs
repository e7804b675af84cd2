mod helpers;

use helpers::{seed_group, seed_user, GrantBuilder, PermissionBuilder, TestDb};
use prbac::authz::errors::AuthzError;
use prbac::authz::mutator::GrantOutcome;
use prbac::authz::predicate::Predicate;
use prbac::authz::types::{params, ActionSpec, AuthorizationRequest, ParameterValues, SubjectRef};
use prbac::authz::Authorizer;
use prbac::entities;
use prbac::settings;
use prbac::storage;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

fn authz_settings() -> settings::Authz {
    settings::Authz::default()
}

async fn module_fixture(test_db: &TestDb) -> Authorizer<sea_orm::DatabaseConnection> {
    let db = test_db.connection();
    PermissionBuilder::new("can_view:module")
        .scope("module")
        .parameter("module_id")
        .create(db)
        .await;
    seed_user(db, "u").await;
    Authorizer::new(db.clone(), authz_settings())
}

// ============================================================================
// Point checks
// ============================================================================

#[tokio::test]
async fn test_parametrized_grant_matches_only_its_values() {
    let test_db = TestDb::new().await;
    let authz = module_fixture(&test_db).await;
    let u = SubjectRef::user("u");

    authz
        .grant(&u, "can_view:module", params([("module_id", 1)]))
        .await
        .expect("Grant failed");

    assert!(authz
        .has_permission(&u, "can_view:module", &params([("module_id", 1)]))
        .await
        .unwrap());
    assert!(!authz
        .has_permission(&u, "can_view:module", &params([("module_id", 2)]))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_blanket_grant_matches_any_values() {
    let test_db = TestDb::new().await;
    let authz = module_fixture(&test_db).await;
    let u = SubjectRef::user("u");

    authz
        .grant(&u, "can_view:module", ParameterValues::new())
        .await
        .expect("Grant failed");

    for module_id in [1, 2, 999] {
        assert!(authz
            .has_permission(&u, "can_view:module", &params([("module_id", module_id)]))
            .await
            .unwrap());
    }
}

#[tokio::test]
async fn test_value_kinds_are_not_coerced() {
    let test_db = TestDb::new().await;
    let authz = module_fixture(&test_db).await;
    let u = SubjectRef::user("u");

    authz
        .grant(&u, "can_view:module", params([("module_id", 1)]))
        .await
        .expect("Grant failed");

    assert!(!authz
        .has_permission(&u, "can_view:module", &params([("module_id", "1")]))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_group_grant_is_inherited() {
    let test_db = TestDb::new().await;
    let authz = module_fixture(&test_db).await;
    let db = test_db.connection();
    seed_group(db, "g", &["u"]).await;

    authz
        .grant(&SubjectRef::group("g"), "can_view:module", params([("module_id", 1)]))
        .await
        .expect("Grant failed");

    let u = SubjectRef::user("u");
    assert!(authz
        .has_permission(&u, "can_view:module", &params([("module_id", 1)]))
        .await
        .unwrap());

    // Leaving the group takes the access away
    storage::remove_user_from_group(db, "g", "u")
        .await
        .expect("Failed to remove member");
    assert!(!authz
        .has_permission(&u, "can_view:module", &params([("module_id", 1)]))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_undefined_permission_is_an_error() {
    let test_db = TestDb::new().await;
    let authz = module_fixture(&test_db).await;
    let u = SubjectRef::user("u");

    let err = authz
        .has_permission(&u, "can_fly", &ParameterValues::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthzError::PermissionUndefined(code) if code == "can_fly"));

    let err = authz
        .grant(&u, "can_fly", ParameterValues::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthzError::PermissionUndefined(_)));
}

#[tokio::test]
async fn test_unknown_subject() {
    let test_db = TestDb::new().await;
    let authz = module_fixture(&test_db).await;
    let ghost = SubjectRef::user("ghost");

    let err = authz
        .has_permission(&ghost, "can_view:module", &params([("module_id", 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthzError::SubjectNotFound(_)));

    let err = authz
        .grant(&ghost, "can_view:module", params([("module_id", 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthzError::SubjectNotFound(_)));
}

#[tokio::test]
async fn test_has_any() {
    let test_db = TestDb::new().await;
    let authz = module_fixture(&test_db).await;
    let u = SubjectRef::user("u");

    authz
        .grant(&u, "can_view:module", params([("module_id", 3)]))
        .await
        .expect("Grant failed");

    let miss = AuthorizationRequest::new("can_view:module", params([("module_id", 1)]));
    let hit = AuthorizationRequest::new("can_view:module", params([("module_id", 3)]));

    assert!(authz.has_any(&u, &[miss.clone(), hit]).await.unwrap());
    assert!(!authz.has_any(&u, &[miss]).await.unwrap());
    assert!(!authz.has_any(&u, &[]).await.unwrap());
}

// ============================================================================
// Grant and revoke
// ============================================================================

#[tokio::test]
async fn test_grant_is_idempotent() {
    let test_db = TestDb::new().await;
    let authz = module_fixture(&test_db).await;
    let u = SubjectRef::user("u");

    let first = authz
        .grant(&u, "can_view:module", params([("module_id", 1)]))
        .await
        .expect("Grant failed");
    let second = authz
        .grant(&u, "can_view:module", params([("module_id", 1)]))
        .await
        .expect("Grant failed");

    assert_eq!(first, GrantOutcome::Created);
    assert_eq!(second, GrantOutcome::AlreadyImplied);

    let rows = entities::UserGrant::find()
        .filter(entities::user_grant::Column::UserId.eq("u"))
        .count(test_db.connection())
        .await
        .expect("Count failed");
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn test_grant_implied_by_blanket_is_noop() {
    let test_db = TestDb::new().await;
    let authz = module_fixture(&test_db).await;
    let u = SubjectRef::user("u");

    authz
        .grant(&u, "can_view:module", ParameterValues::new())
        .await
        .expect("Grant failed");
    let outcome = authz
        .grant(&u, "can_view:module", params([("module_id", 5)]))
        .await
        .expect("Grant failed");

    assert_eq!(outcome, GrantOutcome::AlreadyImplied);
    let grants = storage::list_grants(test_db.connection(), &u)
        .await
        .expect("Query failed");
    assert_eq!(grants.len(), 1);
    assert!(grants[0].is_blanket());
}

#[tokio::test]
async fn test_grant_rejects_undeclared_parameter() {
    let test_db = TestDb::new().await;
    let db = test_db.connection();
    PermissionBuilder::new("can_view").create(db).await;
    seed_user(db, "u").await;
    let authz = Authorizer::new(db.clone(), authz_settings());

    let err = authz
        .grant(&SubjectRef::user("u"), "can_view", params([("model_id", 1)]))
        .await
        .unwrap_err();

    match err {
        AuthzError::ParameterMismatch {
            code,
            declared,
            supplied,
        } => {
            assert_eq!(code, "can_view");
            assert!(declared.is_empty());
            assert_eq!(supplied, vec!["model_id".to_string()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_revoke_after_grant_removes_access() {
    let test_db = TestDb::new().await;
    let authz = module_fixture(&test_db).await;
    let u = SubjectRef::user("u");
    let values = params([("module_id", 1)]);

    authz
        .grant(&u, "can_view:module", values.clone())
        .await
        .expect("Grant failed");
    authz
        .revoke(&u, "can_view:module", values.clone())
        .await
        .expect("Revoke failed");

    assert!(!authz
        .has_permission(&u, "can_view:module", &values)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_revoke_inherited_access_is_refused() {
    let test_db = TestDb::new().await;
    let authz = module_fixture(&test_db).await;
    seed_group(test_db.connection(), "g", &["u"]).await;
    let u = SubjectRef::user("u");
    let values = params([("module_id", 1)]);

    authz
        .grant(&SubjectRef::group("g"), "can_view:module", values.clone())
        .await
        .expect("Grant failed");

    assert!(authz
        .has_permission(&u, "can_view:module", &values)
        .await
        .unwrap());

    let err = authz
        .revoke(&u, "can_view:module", values.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthzError::PermissionNotRevocable { .. }));

    // Access is untouched
    assert!(authz
        .has_permission(&u, "can_view:module", &values)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_revoke_narrower_than_blanket_is_refused() {
    let test_db = TestDb::new().await;
    let authz = module_fixture(&test_db).await;
    let u = SubjectRef::user("u");

    authz
        .grant(&u, "can_view:module", ParameterValues::new())
        .await
        .expect("Grant failed");

    let err = authz
        .revoke(&u, "can_view:module", params([("module_id", 7)]))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthzError::PermissionNotRevocable { .. }));

    // The blanket grant itself can be revoked
    authz
        .revoke(&u, "can_view:module", ParameterValues::new())
        .await
        .expect("Revoke failed");
    assert!(!authz
        .has_permission(&u, "can_view:module", &params([("module_id", 7)]))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_revoke_without_grant() {
    let test_db = TestDb::new().await;
    let authz = module_fixture(&test_db).await;

    let err = authz
        .revoke(&SubjectRef::user("u"), "can_view:module", params([("module_id", 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthzError::GrantNotFound { .. }));
}

#[tokio::test]
async fn test_revoke_leaves_other_values_alone() {
    let test_db = TestDb::new().await;
    let authz = module_fixture(&test_db).await;
    let u = SubjectRef::user("u");

    for module_id in [1, 2] {
        authz
            .grant(&u, "can_view:module", params([("module_id", module_id)]))
            .await
            .expect("Grant failed");
    }
    authz
        .revoke(&u, "can_view:module", params([("module_id", 1)]))
        .await
        .expect("Revoke failed");

    assert!(!authz
        .has_permission(&u, "can_view:module", &params([("module_id", 1)]))
        .await
        .unwrap());
    assert!(authz
        .has_permission(&u, "can_view:module", &params([("module_id", 2)]))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_revoke_direct_grant_shadowed_by_group_grant_is_refused() {
    let test_db = TestDb::new().await;
    let authz = module_fixture(&test_db).await;
    seed_group(test_db.connection(), "g", &["u"]).await;
    let u = SubjectRef::user("u");
    let values = params([("module_id", 1)]);

    authz
        .grant(&u, "can_view:module", values.clone())
        .await
        .expect("Grant failed");
    authz
        .grant(&SubjectRef::group("g"), "can_view:module", values.clone())
        .await
        .expect("Grant failed");

    let err = authz
        .revoke(&u, "can_view:module", values.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthzError::PermissionNotRevocable { .. }));

    // Nothing was deleted
    let grants = storage::list_grants(test_db.connection(), &u)
        .await
        .expect("Query failed");
    assert_eq!(grants.len(), 1);
    assert!(authz
        .has_permission(&u, "can_view:module", &values)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_revoke_direct_grant_shadowed_by_later_blanket_is_refused() {
    let test_db = TestDb::new().await;
    let authz = module_fixture(&test_db).await;
    let u = SubjectRef::user("u");
    let values = params([("module_id", 1)]);

    authz
        .grant(&u, "can_view:module", values.clone())
        .await
        .expect("Grant failed");
    let outcome = authz
        .grant(&u, "can_view:module", ParameterValues::new())
        .await
        .expect("Grant failed");
    assert_eq!(outcome, GrantOutcome::Created);

    let err = authz
        .revoke(&u, "can_view:module", values.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthzError::PermissionNotRevocable { .. }));

    let grants = storage::list_grants(test_db.connection(), &u)
        .await
        .expect("Query failed");
    assert_eq!(grants.len(), 2);

    // Once the blanket grant is gone the narrow one can be revoked
    authz
        .revoke(&u, "can_view:module", ParameterValues::new())
        .await
        .expect("Revoke failed");
    authz
        .revoke(&u, "can_view:module", values.clone())
        .await
        .expect("Revoke failed");
    assert!(!authz
        .has_permission(&u, "can_view:module", &values)
        .await
        .unwrap());
}

// ============================================================================
// Sessions
// ============================================================================

#[tokio::test]
async fn test_session_memoizes_grants() {
    let test_db = TestDb::new().await;
    let authz = module_fixture(&test_db).await;
    let u = SubjectRef::user("u");
    let request = AuthorizationRequest::new("can_view:module", params([("module_id", 1)]));

    let mut session = authz.session(u.clone());
    assert!(!session.has_permission(&request).await.unwrap());

    // A grant made elsewhere is invisible until the session is invalidated
    authz
        .grant(&u, "can_view:module", params([("module_id", 1)]))
        .await
        .expect("Grant failed");
    assert!(!session.has_permission(&request).await.unwrap());

    session.invalidate();
    assert!(session.has_permission(&request).await.unwrap());
}

#[tokio::test]
async fn test_session_memoizes_catalog_lookups() {
    let test_db = TestDb::new().await;
    let authz = module_fixture(&test_db).await;
    let u = SubjectRef::user("u");
    let request = AuthorizationRequest::new("can_view:module", params([("module_id", 1)]));

    authz
        .grant(&u, "can_view:module", params([("module_id", 1)]))
        .await
        .expect("Grant failed");

    let mut session = authz.session(u);
    assert!(session.has_permission(&request).await.unwrap());

    entities::Permission::delete_many()
        .filter(entities::permission::Column::Code.eq("can_view:module"))
        .exec(test_db.connection())
        .await
        .expect("Delete failed");

    // The code is not looked up again within the session
    assert!(session.has_permission(&request).await.unwrap());

    session.invalidate();
    let err = session.has_permission(&request).await.unwrap_err();
    assert!(matches!(err, AuthzError::PermissionUndefined(_)));
}

#[tokio::test]
async fn test_session_uses_index_at_threshold() {
    let test_db = TestDb::new().await;
    let db = test_db.connection();
    let permission = PermissionBuilder::new("can_view:module")
        .parameter("module_id")
        .create(db)
        .await;
    seed_user(db, "u").await;
    GrantBuilder::new(SubjectRef::user("u"), &permission)
        .value("module_id", 1)
        .create(db)
        .await;
    GrantBuilder::new(SubjectRef::user("u"), &permission)
        .create(db)
        .await;

    let indexed = Authorizer::new(
        db.clone(),
        settings::Authz {
            fingerprint_threshold: 0,
        },
    );
    let scanned = Authorizer::new(
        db.clone(),
        settings::Authz {
            fingerprint_threshold: usize::MAX,
        },
    );

    let indexed_session = indexed.session(SubjectRef::user("u"));
    let scanned_session = scanned.session(SubjectRef::user("u"));
    assert!(indexed_session.is_indexed().await.unwrap());
    assert!(!scanned_session.is_indexed().await.unwrap());

    for module_id in [1, 2, 42] {
        let request = AuthorizationRequest::new("can_view:module", params([("module_id", module_id)]));
        assert!(indexed_session.has_permission(&request).await.unwrap());
        assert!(scanned_session.has_permission(&request).await.unwrap());
    }
}

// ============================================================================
// Predicates against the database
// ============================================================================

async fn users_fixture(test_db: &TestDb) -> Authorizer<sea_orm::DatabaseConnection> {
    let db = test_db.connection();
    PermissionBuilder::new("can_view_with_param:users")
        .scope("users")
        .parameter("active")
        .create(db)
        .await;
    PermissionBuilder::new("can_view:users")
        .scope("users")
        .create(db)
        .await;

    for id in ["viewer", "alice", "bob", "carol"] {
        seed_user(db, id).await;
    }
    storage::set_user_active(db, "carol", false)
        .await
        .expect("Failed to deactivate user");

    Authorizer::new(db.clone(), authz_settings())
}

fn user_specs() -> Vec<ActionSpec> {
    vec![
        ActionSpec::new("can_view_with_param:users").with_lookup("active", "is_active"),
        ActionSpec::new("can_view:users"),
    ]
}

#[tokio::test]
async fn test_predicate_filters_query() {
    let test_db = TestDb::new().await;
    let authz = users_fixture(&test_db).await;
    let viewer = SubjectRef::user("viewer");

    authz
        .grant(&viewer, "can_view_with_param:users", params([("active", false)]))
        .await
        .expect("Grant failed");

    let predicate = authz
        .compile_predicate(&viewer, &user_specs())
        .await
        .expect("Compile failed");

    let visible = predicate
        .apply(entities::User::find())
        .all(test_db.connection())
        .await
        .expect("Query failed");
    let ids: Vec<String> = visible.into_iter().map(|u| u.id).collect();
    assert_eq!(ids, vec!["carol".to_string()]);
}

#[tokio::test]
async fn test_predicate_keeps_existing_filter() {
    let test_db = TestDb::new().await;
    let authz = users_fixture(&test_db).await;
    let viewer = SubjectRef::user("viewer");

    authz
        .grant(&viewer, "can_view_with_param:users", params([("active", true)]))
        .await
        .expect("Grant failed");

    let predicate = authz
        .compile_predicate(&viewer, &user_specs())
        .await
        .expect("Compile failed");

    let query = entities::User::find().filter(entities::user::Column::Username.ne("viewer"));
    let count = predicate
        .apply(query)
        .count(test_db.connection())
        .await
        .expect("Query failed");

    // alice and bob; carol is inactive and viewer is filtered by the caller
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_predicate_blanket_absorbs() {
    let test_db = TestDb::new().await;
    let authz = users_fixture(&test_db).await;
    let viewer = SubjectRef::user("viewer");

    authz
        .grant(&viewer, "can_view_with_param:users", params([("active", true)]))
        .await
        .expect("Grant failed");
    authz
        .grant(&viewer, "can_view:users", ParameterValues::new())
        .await
        .expect("Grant failed");

    let predicate = authz
        .compile_predicate(&viewer, &user_specs())
        .await
        .expect("Compile failed");
    assert_eq!(predicate, Predicate::Everything);

    let count = predicate
        .apply(entities::User::find())
        .count(test_db.connection())
        .await
        .expect("Query failed");
    assert_eq!(count, 4);
}

#[tokio::test]
async fn test_predicate_without_grants_matches_nothing() {
    let test_db = TestDb::new().await;
    let authz = users_fixture(&test_db).await;

    let predicate = authz
        .compile_predicate(&SubjectRef::user("viewer"), &user_specs())
        .await
        .expect("Compile failed");
    assert!(predicate.is_nothing());

    let count = predicate
        .apply(entities::User::find())
        .count(test_db.connection())
        .await
        .expect("Query failed");
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_predicate_includes_group_grants() {
    let test_db = TestDb::new().await;
    let authz = users_fixture(&test_db).await;
    seed_group(test_db.connection(), "auditors", &["viewer"]).await;

    authz
        .grant(
            &SubjectRef::group("auditors"),
            "can_view_with_param:users",
            params([("active", false)]),
        )
        .await
        .expect("Grant failed");

    let predicate = authz
        .compile_predicate(&SubjectRef::user("viewer"), &user_specs())
        .await
        .expect("Compile failed");

    let count = predicate
        .apply(entities::User::find())
        .count(test_db.connection())
        .await
        .expect("Query failed");
    assert_eq!(count, 1);
}
