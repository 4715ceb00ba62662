//! Service-level tests for the directory, role-assignment, and dashboard
//! services against a seeded throwaway database.

use chrono::Utc;
use roster::config::Config;
use roster::db::{StatusFilter, UserFilter};
use roster::services::{CreateUser, ServiceError, UpdateUser};
use roster::state::SharedState;

async fn test_state() -> SharedState {
    let id = uuid::Uuid::new_v4();
    let mut config = Config::default();
    config.general.database_url = format!(
        "sqlite:{}",
        std::env::temp_dir().join(format!("roster-svc-test-{id}.db")).display()
    );
    config.general.storage_path = std::env::temp_dir()
        .join(format!("roster-svc-storage-{id}"))
        .display()
        .to_string();

    SharedState::new(config).await.expect("failed to init state")
}

fn create_input(account: &str, email: &str) -> CreateUser {
    CreateUser {
        name: format!("User {account}"),
        account: account.to_string(),
        email: email.to_string(),
        password: "password123".to_string(),
        roles: Vec::new(),
        email_verified: false,
    }
}

#[tokio::test]
async fn passwords_are_stored_hashed() {
    let state = test_state().await;

    state
        .directory
        .create(create_input("carol", "carol@example.com"), Utc::now())
        .await
        .expect("create failed");

    let stored = state
        .store
        .get_user_by_account("carol")
        .await
        .unwrap()
        .expect("user missing");

    assert_ne!(stored.password_hash, "password123");
    assert!(stored.password_hash.starts_with("$argon2"));
}

#[tokio::test]
async fn duplicate_account_and_email_rejected() {
    let state = test_state().await;

    state
        .directory
        .create(create_input("dave", "dave@example.com"), Utc::now())
        .await
        .expect("first create failed");

    let err = state
        .directory
        .create(create_input("dave", "other@example.com"), Utc::now())
        .await
        .expect_err("duplicate account accepted");
    match err {
        ServiceError::Validation(errors) => assert!(errors.errors.contains_key("account")),
        other => panic!("expected validation error, got {other:?}"),
    }

    let err = state
        .directory
        .create(create_input("dave2", "dave@example.com"), Utc::now())
        .await
        .expect_err("duplicate email accepted");
    match err {
        ServiceError::Validation(errors) => assert!(errors.errors.contains_key("email")),
        other => panic!("expected validation error, got {other:?}"),
    }

    // Only one row persists for the account.
    let (page, total) = {
        let filter = UserFilter {
            search: Some("dave@example.com".to_string()),
            status: None,
        };
        let result = state.directory.list(&filter, 1, 15).await.unwrap();
        (result.users, result.total)
    };
    assert_eq!(total, 1);
    assert_eq!(page[0].user.account, "dave");
}

#[tokio::test]
async fn role_sync_is_idempotent_and_empty_clears() {
    let state = test_state().await;

    let detail = state
        .directory
        .create(create_input("erin", "erin@example.com"), Utc::now())
        .await
        .unwrap();
    let user_id = detail.user.id;

    let admin = vec!["admin".to_string()];
    state.roles.sync(user_id, &admin).await.unwrap();
    state.roles.sync(user_id, &admin).await.unwrap();

    let detail = state.directory.get(user_id).await.unwrap();
    assert_eq!(detail.roles.len(), 1);
    assert_eq!(detail.roles[0].name, "admin");

    state.roles.sync(user_id, &[]).await.unwrap();
    let detail = state.directory.get(user_id).await.unwrap();
    assert!(detail.roles.is_empty());
}

#[tokio::test]
async fn assign_is_additive_and_rejects_unknown_roles() {
    let state = test_state().await;

    let detail = state
        .directory
        .create(create_input("frank", "frank@example.com"), Utc::now())
        .await
        .unwrap();
    let user_id = detail.user.id;

    state
        .roles
        .assign(user_id, &["admin".to_string()])
        .await
        .unwrap();
    // Re-assigning the same role does not duplicate the link.
    state
        .roles
        .assign(user_id, &["admin".to_string()])
        .await
        .unwrap();

    let detail = state.directory.get(user_id).await.unwrap();
    assert_eq!(detail.roles.len(), 1);

    let err = state
        .roles
        .assign(user_id, &["ghost".to_string()])
        .await
        .expect_err("unknown role accepted");
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[tokio::test]
async fn dashboard_total_matches_unfiltered_list() {
    let state = test_state().await;

    for i in 0..20 {
        state
            .directory
            .create(
                create_input(&format!("user{i}"), &format!("user{i}@example.com")),
                Utc::now(),
            )
            .await
            .unwrap();
    }

    let stats = state.dashboard.user_stats(Utc::now()).await.unwrap();
    let page = state
        .directory
        .list(&UserFilter::default(), 1, 15)
        .await
        .unwrap();

    // Total is page-independent.
    assert_eq!(stats.total, page.total);
    assert_eq!(page.users.len(), 15);

    let last_page = state
        .directory
        .list(&UserFilter::default(), 2, 15)
        .await
        .unwrap();
    assert_eq!(last_page.total, stats.total);
}

#[tokio::test]
async fn status_filters_partition_users() {
    let state = test_state().await;

    // Seeded users are verified; add three unverified ones.
    for i in 0..3 {
        state
            .directory
            .create(
                create_input(&format!("pending{i}"), &format!("pending{i}@example.com")),
                Utc::now(),
            )
            .await
            .unwrap();
    }

    let active_filter = UserFilter {
        search: None,
        status: Some(StatusFilter::Active),
    };
    let inactive_filter = UserFilter {
        search: None,
        status: Some(StatusFilter::Inactive),
    };

    let all = state.directory.list(&UserFilter::default(), 1, 50).await.unwrap();
    let active = state.directory.list(&active_filter, 1, 50).await.unwrap();
    let inactive = state.directory.list(&inactive_filter, 1, 50).await.unwrap();

    assert_eq!(active.total + inactive.total, all.total);
    assert!(active
        .users
        .iter()
        .all(|u| u.user.email_verified_at.is_some()));
    assert!(inactive
        .users
        .iter()
        .all(|u| u.user.email_verified_at.is_none()));

    let active_ids: Vec<i32> = active.users.iter().map(|u| u.user.id).collect();
    assert!(inactive.users.iter().all(|u| !active_ids.contains(&u.user.id)));
}

#[tokio::test]
async fn role_counts_track_assignment_and_no_role_bucket() {
    let state = test_state().await;

    let baseline = state.roles.roles_with_user_counts().await.unwrap();
    let baseline_no_role = baseline
        .iter()
        .find(|m| m.name == "no_role")
        .map_or(0, |m| m.count);

    // User A gets the admin role, B gets none.
    let a = CreateUser {
        roles: vec!["admin".to_string()],
        ..create_input("grace", "grace@example.com")
    };
    state.directory.create(a, Utc::now()).await.unwrap();
    state
        .directory
        .create(create_input("heidi", "heidi@example.com"), Utc::now())
        .await
        .unwrap();

    let counts = state.roles.roles_with_user_counts().await.unwrap();
    let admin = counts.iter().find(|m| m.name == "admin").unwrap();
    // Seeded admin plus grace.
    assert_eq!(admin.count, 2);
    assert_eq!(admin.display_name, "Administrator");

    let no_role = counts.iter().find(|m| m.name == "no_role").unwrap();
    assert_eq!(no_role.count, baseline_no_role + 1);
    assert_eq!(no_role.display_name, "No role");
}

#[tokio::test]
async fn delete_removes_role_links_from_counts() {
    let state = test_state().await;

    let detail = state
        .directory
        .create(
            CreateUser {
                roles: vec!["admin".to_string()],
                ..create_input("ivan", "ivan@example.com")
            },
            Utc::now(),
        )
        .await
        .unwrap();

    let counts = state.roles.roles_with_user_counts().await.unwrap();
    assert_eq!(counts.iter().find(|m| m.name == "admin").unwrap().count, 2);

    state.directory.delete(detail.user.id).await.unwrap();

    let counts = state.roles.roles_with_user_counts().await.unwrap();
    assert_eq!(counts.iter().find(|m| m.name == "admin").unwrap().count, 1);

    let err = state.directory.get(detail.user.id).await.expect_err("user survived delete");
    assert!(matches!(err, ServiceError::NotFound { .. }));
}

#[tokio::test]
async fn update_without_roles_field_keeps_assignments() {
    let state = test_state().await;

    let detail = state
        .directory
        .create(
            CreateUser {
                roles: vec!["admin".to_string()],
                ..create_input("judy", "judy@example.com")
            },
            Utc::now(),
        )
        .await
        .unwrap();

    let input = UpdateUser {
        name: "Judy Renamed".to_string(),
        account: "judy".to_string(),
        email: "judy@example.com".to_string(),
        email_verified: false,
        roles: None,
        avatar: None,
    };

    let updated = state
        .directory
        .update(detail.user.id, input, Utc::now())
        .await
        .unwrap();

    assert_eq!(updated.user.name, "Judy Renamed");
    assert_eq!(updated.roles.len(), 1);

    // An explicit empty set clears.
    let input = UpdateUser {
        name: "Judy Renamed".to_string(),
        account: "judy".to_string(),
        email: "judy@example.com".to_string(),
        email_verified: false,
        roles: Some(Vec::new()),
        avatar: None,
    };
    let updated = state
        .directory
        .update(detail.user.id, input, Utc::now())
        .await
        .unwrap();
    assert!(updated.roles.is_empty());
}

#[tokio::test]
async fn verified_flag_controls_verification_timestamp() {
    let state = test_state().await;

    let now = Utc::now();
    let detail = state
        .directory
        .create(
            CreateUser {
                email_verified: true,
                ..create_input("kate", "kate@example.com")
            },
            now,
        )
        .await
        .unwrap();
    assert_eq!(detail.user.email_verified_at.as_deref(), Some(now.to_rfc3339().as_str()));

    // Update without the flag resets verification.
    let input = UpdateUser {
        name: "Kate".to_string(),
        account: "kate".to_string(),
        email: "kate@example.com".to_string(),
        email_verified: false,
        roles: None,
        avatar: None,
    };
    let updated = state
        .directory
        .update(detail.user.id, input, Utc::now())
        .await
        .unwrap();
    assert!(updated.user.email_verified_at.is_none());
}
