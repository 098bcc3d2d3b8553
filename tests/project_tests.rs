use wa_cli::WaError;
use wa_cli::core::cache::{CacheStore, CachedArtifact};
use wa_cli::core::readonly::{Capability, ReadonlyGuard};
use wa_cli::project::Project;
use wa_cli::test_utils::fixtures::ProjectFixture;
use wa_cli::test_utils::{TestCase, run_table_tests};

#[test]
fn test_discover_from_nested_folder() {
    let fixture = ProjectFixture::default();
    let nested = fixture.root().join("waw").join("billing");
    std::fs::create_dir_all(&nested).unwrap();

    let project = Project::discover(&nested).unwrap();
    assert_eq!(project.root(), fixture.root());
    assert_eq!(project.main_branch().unwrap(), "master");
}

#[test]
fn test_fixture_main_branch() {
    let fixture = ProjectFixture::new("trunk", "");
    assert_eq!(fixture.project.main_branch().unwrap(), "trunk");
}

#[test]
fn test_readonly_guard_table() {
    let fixture = ProjectFixture::new("master", "source-apikey-123");
    let registry = fixture.project.readonly_registry_path();

    let cases = vec![
        TestCase {
            name: "registered credential is refused",
            input: (Capability::Mutates, Some("source-apikey-123")),
            expected: false,
            should_panic: false,
        },
        TestCase {
            name: "fragment of a registered credential is refused",
            input: (Capability::Mutates, Some("apikey")),
            expected: false,
            should_panic: false,
        },
        TestCase {
            name: "other credential is allowed",
            input: (Capability::Mutates, Some("target-apikey")),
            expected: true,
            should_panic: false,
        },
        TestCase {
            name: "reads are always allowed",
            input: (Capability::ReadOnly, Some("source-apikey-123")),
            expected: true,
            should_panic: false,
        },
        TestCase {
            name: "missing credential is allowed",
            input: (Capability::Mutates, None),
            expected: true,
            should_panic: false,
        },
    ];

    run_table_tests(cases, |(capability, credential)| {
        ReadonlyGuard::new(registry.clone())
            .authorize(capability, credential)
            .is_ok()
    })
    .unwrap();
}

#[test]
fn test_readonly_denial_names_registry() {
    let fixture = ProjectFixture::new("master", "ro-key");
    let err = ReadonlyGuard::new(fixture.project.readonly_registry_path())
        .authorize(Capability::Mutates, Some("ro-key"))
        .unwrap_err();
    assert!(matches!(err, WaError::ReadOnly { .. }));
    assert!(err.to_string().contains("readonly_services.txt"));
}

#[test]
fn test_cached_skill_hit_and_stale_marker() {
    let fixture = ProjectFixture::default();
    let path = fixture.cache_skill("ws-7", "billing", "2024-05-01T10:00:00Z");

    assert_eq!(path.parent().unwrap(), fixture.project.skills_dir());
    assert!(path.ends_with("ws-7-billing.json"));

    let hit = CacheStore::get_cached(&path, "2024-05-01T10:00:00Z").unwrap();
    assert_eq!(hit.name, "billing");
    assert!(CacheStore::get_cached(&path, "2024-06-01T10:00:00Z").is_none());

    let artifact = CachedArtifact::from_file(&path).unwrap();
    assert_eq!(artifact.updated_on, "2024-05-01T10:00:00Z");
    assert!(artifact.from_cache);
}

#[test]
fn test_corrupt_cache_file_is_a_miss() {
    let fixture = ProjectFixture::default();
    let path = fixture.create_file("skills/ws-1-broken.json", "{ not json");
    assert!(CacheStore::get_cached(&path, "anything").is_none());
}
