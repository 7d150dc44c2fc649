use shared::{
    domain::RequirementScope, protocol::RequirementItem, requirements::merge_overrides,
};
use storage::{ReconcileOutcome, Storage};

#[tokio::test]
async fn regional_override_merges_over_nationwide_defaults() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");

    let passport = storage
        .create_process("Passport Application", Some("Fresh passport"))
        .await
        .expect("process");
    let adult = storage
        .create_age_category("Adult", 18, 59)
        .await
        .expect("age category");
    let kerala = storage.create_region("Kerala").await.expect("kerala");
    let delhi = storage.create_region("Delhi").await.expect("delhi");
    let doc_a = storage
        .create_document("DocA", None)
        .await
        .expect("doc a");
    let doc_b = storage
        .create_document("DocB", None)
        .await
        .expect("doc b");

    let nationwide = RequirementScope::new(passport.process_id, adult.age_category_id, None);
    let outcome = storage
        .reconcile_requirements(
            nationwide,
            &[
                RequirementItem::new(doc_a.document_id, 1, Some("ID proof")),
                RequirementItem::new(doc_b.document_id, 2, Some("Address proof")),
            ],
        )
        .await
        .expect("nationwide");
    assert!(matches!(outcome, ReconcileOutcome::Applied(_)));

    let kerala_scope = RequirementScope::new(
        passport.process_id,
        adult.age_category_id,
        Some(kerala.region_id),
    );
    storage
        .reconcile_requirements(
            kerala_scope,
            &[RequirementItem::new(
                doc_a.document_id,
                1,
                Some("Kerala-specific ID"),
            )],
        )
        .await
        .expect("kerala");

    let resolved_kerala = merge_overrides(
        storage
            .list_scope_documents(nationwide)
            .await
            .expect("nationwide rows"),
        storage
            .list_scope_documents(kerala_scope)
            .await
            .expect("kerala rows"),
    );
    let summary: Vec<_> = resolved_kerala
        .iter()
        .map(|item| (item.document_name.as_str(), item.step_description.as_deref()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("DocA", Some("Kerala-specific ID")),
            ("DocB", Some("Address proof")),
        ]
    );

    let delhi_scope = RequirementScope::new(
        passport.process_id,
        adult.age_category_id,
        Some(delhi.region_id),
    );
    let resolved_delhi = merge_overrides(
        storage
            .list_scope_documents(nationwide)
            .await
            .expect("nationwide rows"),
        storage
            .list_scope_documents(delhi_scope)
            .await
            .expect("delhi rows"),
    );
    assert_eq!(
        resolved_delhi[0].step_description.as_deref(),
        Some("ID proof")
    );
}
