use admin_reconcile::domain::{
    CaSettingsPlan, ContactFields, CustomPeriodUnits, DirectoryEntry, DirectoryUser, EntryKind,
    PeriodSetting, SourceRole,
};
use admin_reconcile::infrastructure::memory::{
    InMemoryContactStore, InMemoryRegistry, StaticDirectory,
};
use admin_reconcile::reconcile::{
    BackupRecorder, ConfigurationReconciler, DirectoryReconciler, DirectorySources,
};
use pretty_assertions::assert_eq;

fn alice(job_title: &str) -> DirectoryEntry {
    DirectoryEntry::user(
        "Alice",
        DirectoryUser {
            primary_smtp_address: "a@x.com".to_string(),
            first_name: "Alice".to_string(),
            job_title: job_title.to_string(),
            ..Default::default()
        },
    )
}

#[test]
fn empty_store_gets_one_contact_and_resource_is_skipped() {
    let gal = StaticDirectory::new(
        "Global Address List",
        vec![alice(""), DirectoryEntry::unresolved("room1@x.com", EntryKind::Resource)],
    );
    let mut store = InMemoryContactStore::default();

    let report = DirectoryReconciler::new()
        .sync(&DirectorySources::new(&gal), &mut store)
        .unwrap();

    assert_eq!((report.created, report.updated, report.skipped), (1, 0, 1));
    assert_eq!(report.role, SourceRole::Primary);
    assert_eq!(store.contacts().len(), 1);
    assert_eq!(store.contacts()[0].fields.email, "a@x.com");
}

#[test]
fn outdated_job_title_is_updated_and_email_kept() {
    let gal = StaticDirectory::new("Global Address List", vec![alice("Principal Engineer")]);
    let mut store = InMemoryContactStore::with_contacts(vec![ContactFields {
        first_name: "Alice".to_string(),
        email: "a@x.com".to_string(),
        job_title: "Engineer".to_string(),
        ..Default::default()
    }]);

    let report = DirectoryReconciler::new()
        .sync(&DirectorySources::new(&gal), &mut store)
        .unwrap();

    assert_eq!((report.created, report.updated, report.skipped), (0, 1, 0));
    assert_eq!(store.contacts().len(), 1);
    assert_eq!(store.contacts()[0].fields.job_title, "Principal Engineer");
    assert_eq!(store.contacts()[0].fields.email, "a@x.com");
}

#[test]
fn offline_list_is_used_when_online_list_is_unreachable() {
    let online = StaticDirectory::unavailable("Global Address List");
    let offline = StaticDirectory::new("Offline Global Address List", vec![alice("")]);
    let mut store = InMemoryContactStore::default();

    let report = DirectoryReconciler::new()
        .sync(&DirectorySources::new(&online).with_fallback(&offline), &mut store)
        .unwrap();

    assert_eq!(report.source, "Offline Global Address List");
    assert_eq!(report.role, SourceRole::Secondary);
    assert_eq!(report.created, 1);
}

#[test]
fn custom_mode_write_failure_only_affects_that_setting() {
    let dir = tempfile::tempdir().unwrap();
    let mut custom = CustomPeriodUnits::default();
    custom.set(PeriodSetting::CrlPeriodUnits, "10".to_string());
    custom.set(PeriodSetting::CrlDeltaPeriodUnits, "1".to_string());
    custom.set(PeriodSetting::CrlOverlapPeriodUnits, "6".to_string());
    custom.set(PeriodSetting::ValidityPeriodUnits, "3".to_string());
    let plan = CaSettingsPlan::custom_mode(
        "CN=Configuration,DC=contoso,DC=com",
        "pki.contoso.com",
        &custom,
    )
    .unwrap();

    let registry = InMemoryRegistry::default().failing_on("CRLPeriodUnits");
    let mut reconciler = ConfigurationReconciler::for_certificate_authority(
        registry,
        BackupRecorder::new(dir.path().join("backup.txt")),
    );

    let report = reconciler.apply("ROOT-CA", &plan.desired_settings(), true).unwrap();

    assert!(!report.success());
    let failed: Vec<&str> = report.failed().map(|r| r.name.as_str()).collect();
    assert_eq!(failed, vec!["CRLPeriodUnits"]);

    let registry = reconciler.into_registry();
    assert_eq!(registry.value("CRLPeriodUnits"), None);
    assert_eq!(registry.value("CRLDeltaPeriodUnits").as_deref(), Some("1"));
    assert_eq!(registry.value("CRLOverlapPeriodUnits").as_deref(), Some("6"));
    assert_eq!(registry.value("ValidityPeriodUnits").as_deref(), Some("3"));
    assert_eq!(registry.value("AuditFilter").as_deref(), Some("127"));

    let backup = std::fs::read_to_string(dir.path().join("backup.txt")).unwrap();
    assert!(backup.starts_with("# snapshot "));
    assert!(backup.contains("CRLPeriodUnits"));
}
