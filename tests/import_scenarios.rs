mod common;

use common::{fast_settings, FakeDirectory};
use groupsync::graph::directory::Relation;
use groupsync::migration::import::{converge_relations, create_groups, ImportSettings, Phase};
use groupsync::migration::model::{Edge, GroupRecord, MemberType};
use std::time::Duration;

fn group(name: &str, nickname: &str) -> GroupRecord {
    GroupRecord {
        display_name: name.into(),
        description: format!("{} (migrated)", name),
        source_object_id: format!("src-{}", name),
        mail_nickname: nickname.into(),
        security_enabled: true,
        mail_enabled: false,
        group_types: Vec::new(),
        created_date_time: "2024-05-01T10:00:00Z".into(),
        directory_sync_enabled: false,
        on_premises_security_identifier: None,
        visibility: None,
    }
}

fn user_edge(group: &str, name: &str) -> Edge {
    Edge {
        group_name: group.into(),
        group_source_object_id: format!("src-{}", group),
        member_type: MemberType::User,
        display_name: name.into(),
        principal_name: Some(format!("{}@contoso.com", name.to_lowercase())),
        mail_nickname: Some(name.to_lowercase()),
        source_object_id: format!("src-{}", name),
    }
}

fn group_edge(group: &str, name: &str) -> Edge {
    Edge {
        group_name: group.into(),
        group_source_object_id: format!("src-{}", group),
        member_type: MemberType::Group,
        display_name: name.into(),
        principal_name: None,
        mail_nickname: None,
        source_object_id: format!("src-{}", name),
    }
}

/// Destination with Alice, Bob and Carol but no groups
fn destination() -> FakeDirectory {
    let dir = FakeDirectory::new();
    dir.add_user("Alice", "alice@contoso.us", "alice");
    dir.add_user("Bob", "bob@contoso.us", "bob");
    dir.add_user("Carol", "carol@contoso.us", "carol");
    dir
}

#[tokio::test]
async fn test_finance_team_full_import() {
    let dir = destination();
    let settings = fast_settings();
    let groups = vec![group("Finance-Team", "finance")];
    let owners = vec![user_edge("Finance-Team", "Carol")];
    let members = vec![
        user_edge("Finance-Team", "Alice"),
        user_edge("Finance-Team", "Bob"),
    ];

    let created = create_groups(&dir, &groups, &settings).await;
    let owners_added = converge_relations(&dir, Relation::Owner, &owners, &groups, &settings).await;
    let members_added =
        converge_relations(&dir, Relation::Member, &members, &groups, &settings).await;

    assert_eq!((created.succeeded, created.errors), (1, 0));
    assert_eq!((owners_added.succeeded, owners_added.errors), (1, 0));
    assert_eq!((members_added.succeeded, members_added.errors), (2, 0));
    assert_eq!(members_added.phase, Phase::AddMembers);

    let request = &dir.created()[0];
    assert_eq!(request.display_name, "Finance-Team");
    assert_eq!(request.mail_nickname.as_deref(), Some("finance"));
    assert!(request.security_enabled && !request.mail_enabled);

    assert_eq!(dir.related_names("Finance-Team", Relation::Owner), vec!["Carol"]);
    assert_eq!(
        dir.related_names("Finance-Team", Relation::Member),
        vec!["Alice", "Bob"]
    );
}

#[tokio::test]
async fn test_existing_group_is_skipped_and_still_converged() {
    let dir = destination();
    dir.add_group("Finance-Team", "finance");
    let settings = fast_settings();
    let groups = vec![group("Finance-Team", "finance")];

    let created = create_groups(&dir, &groups, &settings).await;
    assert_eq!((created.succeeded, created.skipped), (0, 1));
    assert!(dir.created().is_empty());

    let members = vec![user_edge("Finance-Team", "Alice")];
    let result = converge_relations(&dir, Relation::Member, &members, &groups, &settings).await;
    assert_eq!(result.succeeded, 1);
    assert_eq!(dir.related_names("Finance-Team", Relation::Member), vec!["Alice"]);
}

#[tokio::test]
async fn test_unknown_user_counts_error_and_continues() {
    let dir = destination();
    dir.add_group("Finance-Team", "finance");
    let members = vec![
        user_edge("Finance-Team", "Alice"),
        user_edge("Finance-Team", "Unknown-User"),
        user_edge("Finance-Team", "Bob"),
    ];

    let result =
        converge_relations(&dir, Relation::Member, &members, &[], &fast_settings()).await;

    assert_eq!(result.succeeded, 2);
    assert_eq!(result.errors, 1);
    assert!(!result.aborted);
    assert_eq!(
        dir.related_names("Finance-Team", Relation::Member),
        vec!["Alice", "Bob"]
    );
}

#[tokio::test]
async fn test_preview_makes_no_mutations() {
    let dir = destination();
    dir.add_group("Ops", "ops");
    let settings = ImportSettings {
        preview_only: true,
        ..fast_settings()
    };
    let groups = vec![group("Finance-Team", "finance"), group("Ops", "ops")];
    let members = vec![user_edge("Ops", "Alice"), user_edge("Ops", "Bob")];

    let created = create_groups(&dir, &groups, &settings).await;
    let converged = converge_relations(&dir, Relation::Member, &members, &groups, &settings).await;

    assert_eq!(dir.mutation_count(), 0);
    // Ops exists and is skipped; Finance-Team would be created
    assert_eq!((created.previewed, created.skipped, created.succeeded), (1, 1, 0));
    assert_eq!((converged.previewed, converged.succeeded), (2, 0));
}

#[tokio::test]
async fn test_create_groups_rerun_creates_nothing() {
    let dir = destination();
    let settings = fast_settings();
    let groups = vec![group("Finance-Team", "finance"), group("HR", "")];

    let first = create_groups(&dir, &groups, &settings).await;
    let second = create_groups(&dir, &groups, &settings).await;

    assert_eq!(first.succeeded, 2);
    assert_eq!((second.succeeded, second.skipped), (0, 2));
    assert_eq!(dir.created().len(), 2);
    // Empty nickname is left for the directory to generate
    assert_eq!(dir.created()[1].mail_nickname, None);
}

#[tokio::test]
async fn test_padded_suffix_rerun_finds_created_group() {
    let dir = destination();
    let settings = ImportSettings {
        suffix: " ".into(),
        ..fast_settings()
    };
    let groups = vec![group(" Ops", "")];

    let first = create_groups(&dir, &groups, &settings).await;
    let second = create_groups(&dir, &groups, &settings).await;

    assert_eq!(first.succeeded, 1);
    assert_eq!((second.succeeded, second.skipped), (0, 1));
    assert_eq!(dir.created().len(), 1);
    assert_eq!(dir.created()[0].display_name, "Ops");
}

#[tokio::test]
async fn test_existing_relations_are_not_re_added() {
    let dir = destination();
    let settings = fast_settings();
    let groups = vec![group("Finance-Team", "finance")];
    let members = vec![
        user_edge("Finance-Team", "Alice"),
        user_edge("Finance-Team", "Bob"),
        // Same principal listed twice in one export
        user_edge("Finance-Team", "Alice"),
    ];

    create_groups(&dir, &groups, &settings).await;
    let first = converge_relations(&dir, Relation::Member, &members, &groups, &settings).await;
    let adds_after_first = dir.added().len();
    let second = converge_relations(&dir, Relation::Member, &members, &groups, &settings).await;

    assert_eq!((first.succeeded, first.skipped, first.errors), (2, 1, 0));
    assert_eq!((second.succeeded, second.skipped, second.errors), (0, 3, 0));
    assert_eq!(dir.added().len(), adds_after_first);
    // One relation read per group per run
    assert_eq!(dir.relation_reads(), 2);
}

#[tokio::test]
async fn test_failed_create_stops_phase_without_continue_on_error() {
    let dir = destination();
    dir.fail_create_of("Beta");
    let groups = vec![group("Alpha", "alpha"), group("Beta", "beta"), group("Gamma", "gamma")];

    let strict = ImportSettings {
        continue_on_error: false,
        ..fast_settings()
    };
    let result = create_groups(&dir, &groups, &strict).await;
    assert_eq!((result.succeeded, result.errors), (1, 1));
    assert!(result.aborted);
    assert!(dir.group_id("Gamma").is_none());

    let lenient = fast_settings();
    let result = create_groups(&dir, &groups, &lenient).await;
    // Alpha now exists, Beta fails again, Gamma is created
    assert_eq!((result.skipped, result.errors, result.succeeded), (1, 1, 1));
    assert!(!result.aborted);
}

#[tokio::test]
async fn test_failed_add_stops_phase_without_continue_on_error() {
    let dir = destination();
    dir.add_group("Ops", "ops");
    dir.add_group("Finance-Team", "finance");
    let bob = dir.add_user("Bobby", "bobby@contoso.us", "bobby");
    dir.fail_add_of(&bob);

    let members = vec![
        user_edge("Ops", "Alice"),
        user_edge("Ops", "Bobby"),
        user_edge("Finance-Team", "Carol"),
    ];
    let strict = ImportSettings {
        continue_on_error: false,
        ..fast_settings()
    };

    let result = converge_relations(&dir, Relation::Member, &members, &[], &strict).await;
    assert_eq!((result.succeeded, result.errors), (1, 1));
    assert!(result.aborted);
    assert!(dir.related_names("Finance-Team", Relation::Member).is_empty());
}

#[tokio::test]
async fn test_missing_target_group_skips_its_bucket() {
    let dir = destination();
    dir.add_group("Ops", "ops");
    let owners = vec![
        user_edge("Legacy", "Alice"),
        user_edge("Legacy", "Bob"),
        user_edge("Ops", "Carol"),
    ];

    let result = converge_relations(&dir, Relation::Owner, &owners, &[], &fast_settings()).await;

    assert_eq!(result.errors, 1);
    assert_eq!(result.succeeded, 1);
    assert_eq!(dir.related_names("Ops", Relation::Owner), vec!["Carol"]);
}

#[tokio::test]
async fn test_nested_group_and_prefixed_target() {
    let dir = destination();
    dir.add_group("GCC-Ops", "ops");
    dir.add_group("GCC-Ops-Leads", "ops-leads");
    let settings = ImportSettings {
        prefix: "GCC-".into(),
        ..fast_settings()
    };
    let members = vec![group_edge("Ops", "Ops-Leads"), user_edge("Ops", "Alice")];

    let result = converge_relations(&dir, Relation::Member, &members, &[], &settings).await;

    assert_eq!(result.succeeded, 2);
    assert_eq!(
        dir.related_names("GCC-Ops", Relation::Member),
        vec!["GCC-Ops-Leads", "Alice"]
    );
}

#[tokio::test]
async fn test_group_nickname_from_groups_dataset() {
    let dir = destination();
    // Renamed in the destination; only the nickname still matches
    dir.add_group("Finance (GCC High)", "finance");
    let groups = vec![group("Finance-Team", "finance")];
    let owners = vec![user_edge("Finance-Team", "Carol")];

    let without = converge_relations(&dir, Relation::Owner, &owners, &[], &fast_settings()).await;
    assert_eq!(without.errors, 1);

    let with = converge_relations(&dir, Relation::Owner, &owners, &groups, &fast_settings()).await;
    assert_eq!(with.succeeded, 1);
    assert_eq!(dir.related_names("Finance (GCC High)", Relation::Owner), vec!["Carol"]);
}

#[tokio::test]
async fn test_unreadable_relation_set_is_a_per_edge_error() {
    let dir = destination();
    let ops = dir.add_group("Ops", "ops");
    dir.fail_listing_of(&ops);
    let members = vec![user_edge("Ops", "Alice"), user_edge("Ops", "Bob")];

    let result =
        converge_relations(&dir, Relation::Member, &members, &[], &fast_settings()).await;

    assert_eq!((result.succeeded, result.errors), (0, 2));
    assert_eq!(dir.mutation_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_settle_delay_after_each_created_group() {
    let dir = destination();
    let settings = ImportSettings {
        settle_delay: Duration::from_secs(2),
        ..ImportSettings::default()
    };
    let groups = vec![group("Alpha", "alpha"), group("Beta", "beta")];

    let start = tokio::time::Instant::now();
    let result = create_groups(&dir, &groups, &settings).await;

    assert_eq!(result.succeeded, 2);
    assert!(start.elapsed() >= Duration::from_secs(4));
}
