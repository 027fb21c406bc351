//! Integration tests for the Steward permission engine
//!
//! Every test runs the full engine against an in-memory repository seeded
//! with a small site:
//! - wb-1 "Sales": user-9 holds Read, Write and Delete (Allow)
//! - wb-3 "Forecast", wb-empty "Scratch": no grants
//! - ds-2 "Orders": group legacy holds Read (Allow)
//! - v-1 "Overview": user-9 holds Filter (Allow)
//! - p-1 "Finance": no grants

use std::sync::Arc;

use steward_core::*;
use steward_engine::*;
use steward_store::InMemoryContentRepository;

// =============================================================================
// Test Fixtures
// =============================================================================

struct Site {
    repo: Arc<InMemoryContentRepository>,
    ctx: RequestContext,
    engine: PermissionEngine<InMemoryContentRepository>,
}

fn user9() -> GranteeRef {
    GranteeRef::user("user-9")
}

fn legacy() -> GranteeRef {
    GranteeRef::group("legacy")
}

fn rwd() -> CapabilitySet {
    CapabilitySet::allow([Capability::Read, Capability::Write, Capability::Delete])
}

fn site_with(config: EngineConfig) -> Site {
    let site_id = SiteId::new();
    let repo = InMemoryContentRepository::new();

    repo.insert_grantee(site_id, Grantee::new(user9(), "Grace"));
    repo.insert_grantee(site_id, Grantee::new(GranteeRef::group("analysts"), "Analysts"));
    repo.insert_grantee(site_id, Grantee::new(legacy(), "Legacy Readers"));

    for (content_type, id, name) in [
        (ContentType::Workbook, "wb-1", "Sales"),
        (ContentType::Workbook, "wb-3", "Forecast"),
        (ContentType::Workbook, "wb-empty", "Scratch"),
        (ContentType::Datasource, "ds-2", "Orders"),
        (ContentType::View, "v-1", "Overview"),
        (ContentType::Project, "p-1", "Finance"),
    ] {
        repo.insert_content(site_id, ContentRef::new(content_type, id, name));
    }

    repo.set_grants(
        site_id,
        ContentType::Workbook,
        "wb-1",
        vec![Grant::new(Grantee::new(user9(), "Grace"), rwd())],
    )
    .unwrap();
    repo.set_grants(
        site_id,
        ContentType::Datasource,
        "ds-2",
        vec![Grant::new(
            Grantee::new(legacy(), "Legacy Readers"),
            CapabilitySet::allow([Capability::Read]),
        )],
    )
    .unwrap();
    repo.set_grants(
        site_id,
        ContentType::View,
        "v-1",
        vec![Grant::new(
            Grantee::new(user9(), "Grace"),
            CapabilitySet::allow([Capability::Filter]),
        )],
    )
    .unwrap();

    let repo = Arc::new(repo);
    let engine = PermissionEngine::new(repo.clone(), &config);
    Site {
        repo,
        ctx: RequestContext::new(site_id).with_actor("admin@example.com"),
        engine,
    }
}

fn site() -> Site {
    site_with(EngineConfig::default())
}

fn workbook(id: &str) -> ContentRef {
    ContentRef::unnamed(ContentType::Workbook, id)
}

fn datasource(id: &str) -> ContentRef {
    ContentRef::unnamed(ContentType::Datasource, id)
}

impl Site {
    async fn grants(&self, content_type: ContentType, id: &str) -> Vec<Grant> {
        self.repo.get_grants(&self.ctx, content_type, id).await.unwrap()
    }

    async fn held(&self, content_type: ContentType, id: &str, grantee: &GranteeRef) -> CapabilitySet {
        self.grants(content_type, id)
            .await
            .into_iter()
            .find(|g| g.grantee.is(grantee))
            .map(|g| g.capabilities)
            .unwrap_or_default()
    }
}

fn copied(result: &OperationResult) -> &CopyOutcome {
    match &result.outcome {
        Outcome::Succeeded {
            change: Change::Copied(outcome),
        } => outcome,
        other => panic!("expected a copy, got {other:?}"),
    }
}

fn failure(result: &OperationResult) -> &Failure {
    match &result.outcome {
        Outcome::Failed(failure) => failure,
        other => panic!("expected a failure, got {other:?}"),
    }
}

fn partial_copy(failure: &Failure) -> &CopyOutcome {
    match &failure.partial {
        Some(Change::Copied(outcome)) => outcome,
        other => panic!("expected a partial copy, got {other:?}"),
    }
}

fn ghost() -> GranteeRef {
    GranteeRef::user("ghost")
}

/// wb-1 with a grant for a grantee the site no longer knows, after user-9's
fn seed_source_with_ghost(site: &Site) {
    site.repo
        .set_grants(
            site.ctx.site_id,
            ContentType::Workbook,
            "wb-1",
            vec![
                Grant::new(
                    Grantee::new(user9(), "Grace"),
                    CapabilitySet::allow([Capability::Read]),
                ),
                Grant::new(
                    Grantee::new(ghost(), "Departed"),
                    CapabilitySet::allow([Capability::Read]),
                ),
            ],
        )
        .unwrap();
}

fn ids(items: &[SucceededItem]) -> Vec<&str> {
    items.iter().map(|item| item.id.as_str()).collect()
}

// =============================================================================
// Grant and Revoke Tests
// =============================================================================

#[tokio::test]
async fn test_grant_twice_yields_same_state() {
    let site = site();
    let read = CapabilitySpec::Explicit(CapabilitySet::allow([Capability::Read]));

    let first = site.engine.grant(&site.ctx, &workbook("wb-3"), &user9(), &read).await;
    let state = site.repo.snapshot(site.ctx.site_id);
    let second = site.engine.grant(&site.ctx, &workbook("wb-3"), &user9(), &read).await;

    assert!(first.outcome.is_success());
    assert!(second.outcome.is_success());
    assert_eq!(site.repo.snapshot(site.ctx.site_id), state);
}

#[tokio::test]
async fn test_grant_failure_keeps_reason() {
    let site = site();
    let result = site
        .engine
        .grant(
            &site.ctx,
            &workbook("wb-missing"),
            &user9(),
            &CapabilitySpec::Template(Template::Viewer),
        )
        .await;

    let failure = failure(&result);
    assert_eq!(failure.reason, ErrorKind::ContentNotFound);
    assert_eq!(failure.phase, ItemPhase::Validating);
    assert!(failure.detail.contains("wb-missing"));
}

#[tokio::test]
async fn test_grant_rejected_grantee_fails_while_applying() {
    let site = site();
    let result = site
        .engine
        .grant(
            &site.ctx,
            &workbook("wb-3"),
            &GranteeRef::user("ghost"),
            &CapabilitySpec::Template(Template::Viewer),
        )
        .await;

    let failure = failure(&result);
    assert_eq!(failure.reason, ErrorKind::GranteeInvalid);
    assert_eq!(failure.phase, ItemPhase::Applying);
    assert!(failure.partial.is_none());
}

#[tokio::test]
async fn test_grant_failing_after_mode_flip_reports_revoked_entries() {
    let site = site();
    site.repo
        .set_grants(
            site.ctx.site_id,
            ContentType::Workbook,
            "wb-3",
            vec![Grant::new(
                Grantee::new(ghost(), "Departed"),
                CapabilitySet::allow([Capability::Read]),
            )],
        )
        .unwrap();

    let deny_read: CapabilitySet = [(Capability::Read, Mode::Deny)].into_iter().collect();
    let result = site
        .engine
        .grant(&site.ctx, &workbook("wb-3"), &ghost(), &CapabilitySpec::Explicit(deny_read))
        .await;

    let failure = failure(&result);
    assert_eq!(failure.reason, ErrorKind::GranteeInvalid);
    assert_eq!(failure.phase, ItemPhase::Applying);
    match &failure.partial {
        Some(Change::Revoked(revoked)) => {
            assert!(revoked.grantee.is(&ghost()));
            assert_eq!(revoked.removed, CapabilitySet::allow([Capability::Read]));
        }
        other => panic!("expected the revoked entries, got {other:?}"),
    }
    assert!(site.held(ContentType::Workbook, "wb-3", &ghost()).await.is_empty());
}

#[tokio::test]
async fn test_revoke_scopes_stay_distinct() {
    let site = site();

    let named = site
        .engine
        .revoke(
            &site.ctx,
            &workbook("wb-1"),
            &user9(),
            &RevokeScope::Capabilities(vec![Capability::Delete]),
        )
        .await;
    assert!(named.outcome.is_success());
    assert_eq!(
        site.held(ContentType::Workbook, "wb-1", &user9()).await,
        CapabilitySet::allow([Capability::Read, Capability::Write])
    );

    let all = site
        .engine
        .revoke(&site.ctx, &workbook("wb-1"), &user9(), &RevokeScope::AllForGrantee)
        .await;
    assert!(all.outcome.is_success());
    assert!(site.grants(ContentType::Workbook, "wb-1").await.is_empty());
}

#[tokio::test]
async fn test_revoke_nothing_is_skipped() {
    let site = site();
    let result = site
        .engine
        .revoke(&site.ctx, &workbook("wb-3"), &user9(), &RevokeScope::AllForGrantee)
        .await;

    assert_eq!(result.outcome, Outcome::skipped("nothing to revoke"));
}

// =============================================================================
// Copy Tests
// =============================================================================

#[tokio::test]
async fn test_replace_copy_workbook_to_datasource() {
    let site = site();
    let result = site
        .engine
        .copy(&site.ctx, &workbook("wb-1"), &datasource("ds-2"), CopyMode::Replace)
        .await;

    let outcome = copied(&result);
    assert_eq!(outcome.removed.len(), 1);
    assert!(outcome.removed[0].is(&legacy()));

    let grants = site.grants(ContentType::Datasource, "ds-2").await;
    assert_eq!(grants, vec![Grant::new(Grantee::new(user9(), "Grace"), rwd())]);
}

#[tokio::test]
async fn test_replace_copy_equals_filtered_source() {
    let site = site();
    let mut wide = rwd();
    wide.insert(Capability::Filter, Mode::Allow);
    wide.insert(Capability::ExportImage, Mode::Deny);
    site.repo
        .set_grants(
            site.ctx.site_id,
            ContentType::Workbook,
            "wb-1",
            vec![
                Grant::new(Grantee::new(user9(), "Grace"), wide),
                Grant::new(
                    Grantee::new(GranteeRef::group("analysts"), "Analysts"),
                    CapabilitySet::allow([Capability::ViewComments]),
                ),
            ],
        )
        .unwrap();

    let result = site
        .engine
        .copy(&site.ctx, &workbook("wb-1"), &datasource("ds-2"), CopyMode::Replace)
        .await;
    assert!(result.outcome.is_success());

    let grants = site.grants(ContentType::Datasource, "ds-2").await;
    assert_eq!(grants, vec![Grant::new(Grantee::new(user9(), "Grace"), rwd())]);
}

#[tokio::test]
async fn test_merge_never_removes_target_capabilities() {
    let site = site();
    let before: CapabilitySet = [(Capability::Read, Mode::Deny)].into_iter().collect();
    site.repo
        .set_grants(
            site.ctx.site_id,
            ContentType::Datasource,
            "ds-2",
            vec![
                Grant::new(Grantee::new(user9(), "Grace"), before.clone()),
                Grant::new(
                    Grantee::new(legacy(), "Legacy Readers"),
                    CapabilitySet::allow([Capability::Read]),
                ),
            ],
        )
        .unwrap();

    let result = site
        .engine
        .copy(&site.ctx, &workbook("wb-1"), &datasource("ds-2"), CopyMode::Merge)
        .await;
    let outcome = copied(&result);
    assert_eq!(
        outcome.applied,
        vec![Grant::new(
            Grantee::new(user9(), "Grace"),
            CapabilitySet::allow([Capability::Write, Capability::Delete])
        )]
    );

    let after = site.held(ContentType::Datasource, "ds-2", &user9()).await;
    assert!(before.iter().all(|(c, mode)| after.contains_entry(c, mode)));
    assert_eq!(after.get(Capability::Read), Some(Mode::Deny));
    assert_eq!(after.get(Capability::Write), Some(Mode::Allow));
    assert_eq!(
        site.held(ContentType::Datasource, "ds-2", &legacy()).await,
        CapabilitySet::allow([Capability::Read])
    );
}

#[tokio::test]
async fn test_merge_with_everything_present_is_skipped() {
    let site = site();
    let first = site
        .engine
        .copy(&site.ctx, &workbook("wb-1"), &workbook("wb-3"), CopyMode::Merge)
        .await;
    assert!(first.outcome.is_success());

    let second = site
        .engine
        .copy(&site.ctx, &workbook("wb-1"), &workbook("wb-3"), CopyMode::Merge)
        .await;
    assert_eq!(second.outcome, Outcome::skipped("already present"));
}

#[tokio::test]
async fn test_additive_twice_keeps_effective_permissions() {
    let site = site();

    site.engine
        .copy(&site.ctx, &workbook("wb-1"), &workbook("wb-3"), CopyMode::Additive)
        .await;
    let once = site.grants(ContentType::Workbook, "wb-3").await;
    assert_eq!(site.repo.transport_log().await.len(), 3);

    let again = site
        .engine
        .copy(&site.ctx, &workbook("wb-1"), &workbook("wb-3"), CopyMode::Additive)
        .await;
    assert!(again.outcome.is_success());
    assert_eq!(site.grants(ContentType::Workbook, "wb-3").await, once);
    assert_eq!(site.repo.transport_log().await.len(), 6);
}

#[tokio::test]
async fn test_additive_skip_conflicting_policy() {
    let site = site_with(EngineConfig {
        additive_conflicts: AdditiveConflictPolicy::SkipConflicting,
        ..EngineConfig::default()
    });
    site.repo
        .set_grants(
            site.ctx.site_id,
            ContentType::Workbook,
            "wb-3",
            vec![Grant::new(
                Grantee::new(user9(), "Grace"),
                [(Capability::Write, Mode::Deny)].into_iter().collect(),
            )],
        )
        .unwrap();

    let result = site
        .engine
        .copy(&site.ctx, &workbook("wb-1"), &workbook("wb-3"), CopyMode::Additive)
        .await;
    let outcome = copied(&result);
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].reason, "mode conflict");

    let held = site.held(ContentType::Workbook, "wb-3", &user9()).await;
    assert_eq!(held.get(Capability::Write), Some(Mode::Deny));
    assert_eq!(held.get(Capability::Read), Some(Mode::Allow));
    assert_eq!(held.get(Capability::Delete), Some(Mode::Allow));
}

#[tokio::test]
async fn test_copy_preconditions() {
    let site = site();

    let empty = site
        .engine
        .copy(&site.ctx, &workbook("wb-empty"), &workbook("wb-3"), CopyMode::Merge)
        .await;
    assert_eq!(failure(&empty).reason, ErrorKind::NothingToCopy);

    let incompatible = site
        .engine
        .copy(
            &site.ctx,
            &ContentRef::unnamed(ContentType::View, "v-1"),
            &ContentRef::unnamed(ContentType::Project, "p-1"),
            CopyMode::Replace,
        )
        .await;
    assert_eq!(failure(&incompatible).reason, ErrorKind::NoCompatibleCapabilities);

    let missing_target = site
        .engine
        .copy(&site.ctx, &workbook("wb-1"), &workbook("wb-missing"), CopyMode::Replace)
        .await;
    assert_eq!(failure(&missing_target).reason, ErrorKind::ContentNotFound);

    let onto_itself = site
        .engine
        .copy(&site.ctx, &workbook("wb-1"), &workbook("wb-1"), CopyMode::Replace)
        .await;
    assert_eq!(
        onto_itself.outcome,
        Outcome::skipped("source and target are the same")
    );

    assert!(site.repo.transport_log().await.is_empty());
}

#[tokio::test]
async fn test_replace_copy_stopped_part_way_reports_changes() {
    let site = site();
    seed_source_with_ghost(&site);

    let result = site
        .engine
        .copy(&site.ctx, &workbook("wb-1"), &datasource("ds-2"), CopyMode::Replace)
        .await;

    let failure = failure(&result);
    assert_eq!(failure.reason, ErrorKind::GranteeInvalid);
    assert_eq!(failure.phase, ItemPhase::Applying);

    let partial = partial_copy(failure);
    assert_eq!(partial.mode, CopyMode::Replace);
    assert_eq!(partial.removed.len(), 1);
    assert!(partial.removed[0].is(&legacy()));
    assert_eq!(
        partial.applied,
        vec![Grant::new(
            Grantee::new(user9(), "Grace"),
            CapabilitySet::allow([Capability::Read]),
        )]
    );

    let grants = site.grants(ContentType::Datasource, "ds-2").await;
    let holders: Vec<&str> = grants.iter().map(|g| g.grantee.id.as_str()).collect();
    assert_eq!(holders, vec!["user-9"]);
}

#[tokio::test]
async fn test_merge_copy_stopped_part_way_reports_changes() {
    let site = site();
    seed_source_with_ghost(&site);

    let result = site
        .engine
        .copy(&site.ctx, &workbook("wb-1"), &datasource("ds-2"), CopyMode::Merge)
        .await;

    let failure = failure(&result);
    assert_eq!(failure.reason, ErrorKind::GranteeInvalid);

    let partial = partial_copy(failure);
    assert!(partial.removed.is_empty());
    assert_eq!(partial.applied.len(), 1);
    assert!(partial.applied[0].grantee.is(&user9()));

    assert_eq!(
        site.held(ContentType::Datasource, "ds-2", &legacy()).await,
        CapabilitySet::allow([Capability::Read])
    );
    assert_eq!(
        site.held(ContentType::Datasource, "ds-2", &user9()).await,
        CapabilitySet::allow([Capability::Read])
    );
}

#[tokio::test]
async fn test_copy_failing_before_any_change_has_no_partial() {
    let site = site();
    site.repo
        .set_grants(
            site.ctx.site_id,
            ContentType::Workbook,
            "wb-1",
            vec![Grant::new(
                Grantee::new(ghost(), "Departed"),
                CapabilitySet::allow([Capability::Read]),
            )],
        )
        .unwrap();

    let result = site
        .engine
        .copy(&site.ctx, &workbook("wb-1"), &workbook("wb-3"), CopyMode::Merge)
        .await;

    let failure = failure(&result);
    assert_eq!(failure.reason, ErrorKind::GranteeInvalid);
    assert!(failure.partial.is_none());
    assert!(site.grants(ContentType::Workbook, "wb-3").await.is_empty());
}

// =============================================================================
// Bulk Tests
// =============================================================================

#[tokio::test]
async fn test_bulk_grant_with_missing_item() {
    let site = site();
    let report = site
        .engine
        .bulk(
            &site.ctx,
            &BulkRequest {
                content_type: ContentType::Workbook,
                content_ids: vec!["wb-1".into(), "wb-missing".into(), "wb-3".into()],
                operation: BulkOperation::Grant {
                    grantee: GranteeRef::group("analysts"),
                    capabilities: CapabilitySpec::Template(Template::Viewer),
                },
            },
        )
        .await;

    assert_eq!(ids(&report.result.successful), vec!["wb-1", "wb-3"]);
    assert_eq!(report.result.failed.len(), 1);
    assert_eq!(report.result.failed[0].id, "wb-missing");
    assert_eq!(report.result.failed[0].reason, ErrorKind::ContentNotFound);
    assert!(report.result.skipped.is_empty());

    assert_eq!(report.summary.total, 3);
    assert_eq!(report.summary.status, BulkStatus::PartialSuccess);
    assert_eq!(report.summary.impact_level, ImpactLevel::Low);
    assert!(report.result.completed_at >= report.result.started_at);
}

#[tokio::test]
async fn test_bulk_one_bad_item_never_aborts() {
    let site = site();
    for k in 0..3 {
        let mut content_ids: Vec<String> = vec!["wb-1".into(), "wb-3".into(), "wb-empty".into()];
        content_ids[k] = "not a valid id".into();

        let report = site
            .engine
            .bulk(
                &site.ctx,
                &BulkRequest {
                    content_type: ContentType::Workbook,
                    content_ids,
                    operation: BulkOperation::Revoke {
                        grantee: user9(),
                        scope: RevokeScope::Capabilities(vec![Capability::ExportData]),
                    },
                },
            )
            .await;

        let result = &report.result;
        assert_eq!(result.successful.len() + result.skipped.len(), 2);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].id, "not a valid id");
        assert_eq!(result.failed[0].reason, ErrorKind::InvalidInput);
    }
}

#[tokio::test]
async fn test_bulk_copy_reuses_source_and_skips_itself() {
    let site = site();
    let report = site
        .engine
        .bulk(
            &site.ctx,
            &BulkRequest {
                content_type: ContentType::Workbook,
                content_ids: vec!["wb-3".into(), "wb-1".into(), "wb-empty".into()],
                operation: BulkOperation::Copy {
                    source: workbook("wb-1"),
                    mode: CopyMode::Replace,
                },
            },
        )
        .await;

    assert_eq!(ids(&report.result.successful), vec!["wb-3", "wb-empty"]);
    assert_eq!(report.result.successful[0].name, "Forecast");
    assert_eq!(report.result.skipped.len(), 1);
    assert_eq!(report.result.skipped[0].id, "wb-1");
    assert_eq!(report.summary.status, BulkStatus::Success);

    for id in ["wb-3", "wb-empty"] {
        assert_eq!(site.held(ContentType::Workbook, id, &user9()).await, rwd());
    }
}

#[tokio::test]
async fn test_bulk_copy_with_missing_source_fails_every_item() {
    let site = site();
    let report = site
        .engine
        .bulk(
            &site.ctx,
            &BulkRequest {
                content_type: ContentType::Datasource,
                content_ids: vec!["ds-2".into(), "ds-2".into()],
                operation: BulkOperation::Copy {
                    source: workbook("wb-gone"),
                    mode: CopyMode::Merge,
                },
            },
        )
        .await;

    assert_eq!(report.result.failed.len(), 2);
    assert!(report
        .result
        .failed
        .iter()
        .all(|item| item.reason == ErrorKind::ContentNotFound && item.phase == ItemPhase::Validating));
    assert_eq!(report.summary.status, BulkStatus::Failed);
}

#[tokio::test]
async fn test_bulk_grant_rejected_grantee_fails_while_applying() {
    let site = site();
    let report = site
        .engine
        .bulk(
            &site.ctx,
            &BulkRequest {
                content_type: ContentType::Workbook,
                content_ids: vec!["wb-1".into(), "wb-3".into()],
                operation: BulkOperation::Grant {
                    grantee: GranteeRef::user("ghost"),
                    capabilities: CapabilitySpec::Template(Template::Author),
                },
            },
        )
        .await;

    assert_eq!(report.result.failed.len(), 2);
    assert!(report
        .result
        .failed
        .iter()
        .all(|item| item.reason == ErrorKind::GranteeInvalid && item.phase == ItemPhase::Applying));
}

#[tokio::test]
async fn test_bulk_repository_failure_is_isolated() {
    let site = site();
    site.repo
        .fail_content(site.ctx.site_id, ContentType::Workbook, "wb-3", "upstream timeout");

    let report = site
        .engine
        .bulk(
            &site.ctx,
            &BulkRequest {
                content_type: ContentType::Workbook,
                content_ids: vec!["wb-1".into(), "wb-3".into(), "wb-empty".into()],
                operation: BulkOperation::Grant {
                    grantee: user9(),
                    capabilities: CapabilitySpec::Template(Template::Viewer),
                },
            },
        )
        .await;

    assert_eq!(ids(&report.result.successful), vec!["wb-1", "wb-empty"]);
    assert_eq!(report.result.failed[0].id, "wb-3");
    assert_eq!(report.result.failed[0].reason, ErrorKind::RepositoryError);
    assert!(report.result.failed[0].detail.contains("upstream timeout"));
}

#[tokio::test]
async fn test_bulk_explicit_capabilities_must_fit_content_type() {
    let site = site();
    let report = site
        .engine
        .bulk(
            &site.ctx,
            &BulkRequest {
                content_type: ContentType::Project,
                content_ids: vec!["p-1".into()],
                operation: BulkOperation::Grant {
                    grantee: user9(),
                    capabilities: CapabilitySpec::Explicit(CapabilitySet::allow([
                        Capability::Read,
                        Capability::ShareView,
                    ])),
                },
            },
        )
        .await;
    assert_eq!(report.result.failed[0].reason, ErrorKind::CapabilityNotApplicable);

    let report = site
        .engine
        .bulk(
            &site.ctx,
            &BulkRequest {
                content_type: ContentType::Project,
                content_ids: vec!["p-1".into()],
                operation: BulkOperation::Grant {
                    grantee: user9(),
                    capabilities: CapabilitySpec::Template(Template::Viewer),
                },
            },
        )
        .await;
    assert_eq!(report.result.successful.len(), 1);
    assert_eq!(
        site.held(ContentType::Project, "p-1", &user9()).await,
        CapabilitySet::allow([Capability::Read])
    );
}

#[tokio::test]
async fn test_bulk_keeps_duplicates_and_order() {
    let site = site();
    let report = site
        .engine
        .bulk(
            &site.ctx,
            &BulkRequest {
                content_type: ContentType::Workbook,
                content_ids: vec!["wb-3".into(), "wb-1".into(), "wb-3".into()],
                operation: BulkOperation::Revoke {
                    grantee: user9(),
                    scope: RevokeScope::AllForGrantee,
                },
            },
        )
        .await;

    assert_eq!(ids(&report.result.successful), vec!["wb-1"]);
    let skipped: Vec<&str> = report.result.skipped.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(skipped, vec!["wb-3", "wb-3"]);
    assert!(report
        .result
        .skipped
        .iter()
        .all(|s| s.reason == "nothing to revoke"));
}

#[tokio::test]
async fn test_bulk_impact_and_empty_batches() {
    let site = site();
    let content_ids: Vec<String> = (0..12).map(|i| format!("wb-x{i}")).collect();
    let report = site
        .engine
        .bulk(
            &site.ctx,
            &BulkRequest {
                content_type: ContentType::Workbook,
                content_ids,
                operation: BulkOperation::Revoke {
                    grantee: user9(),
                    scope: RevokeScope::AllForGrantee,
                },
            },
        )
        .await;
    assert_eq!(report.summary.impact_level, ImpactLevel::Medium);
    assert_eq!(report.summary.status, BulkStatus::Failed);

    let empty = site
        .engine
        .bulk(
            &site.ctx,
            &BulkRequest {
                content_type: ContentType::Workbook,
                content_ids: Vec::new(),
                operation: BulkOperation::Revoke {
                    grantee: user9(),
                    scope: RevokeScope::AllForGrantee,
                },
            },
        )
        .await;
    assert_eq!(empty.summary.total, 0);
    assert_eq!(empty.summary.success_rate, 0.0);
    assert_eq!(empty.summary.status, BulkStatus::Success);
}

#[tokio::test]
async fn test_bulk_report_serializes() {
    let site = site();
    let report = site
        .engine
        .bulk(
            &site.ctx,
            &BulkRequest {
                content_type: ContentType::Workbook,
                content_ids: vec!["wb-missing".into()],
                operation: BulkOperation::Grant {
                    grantee: user9(),
                    capabilities: CapabilitySpec::Template(Template::Viewer),
                },
            },
        )
        .await;

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["result"]["operation"], "grant");
    assert_eq!(json["result"]["failed"][0]["id"], "wb-missing");
    assert_eq!(json["result"]["failed"][0]["reason"], "ContentNotFound");
    assert_eq!(json["summary"]["status"], "failed");
    assert_eq!(json["summary"]["impact_level"], "Low");
}

#[tokio::test]
async fn test_bulk_copy_reports_partial_changes_per_item() {
    let site = site();
    seed_source_with_ghost(&site);

    let report = site
        .engine
        .bulk(
            &site.ctx,
            &BulkRequest {
                content_type: ContentType::Workbook,
                content_ids: vec!["wb-3".into(), "wb-empty".into()],
                operation: BulkOperation::Copy {
                    source: workbook("wb-1"),
                    mode: CopyMode::Additive,
                },
            },
        )
        .await;

    assert_eq!(report.result.failed.len(), 2);
    for item in &report.result.failed {
        assert_eq!(item.reason, ErrorKind::GranteeInvalid);
        assert_eq!(item.phase, ItemPhase::Applying);
        match &item.partial {
            Some(Change::Copied(partial)) => {
                assert_eq!(partial.target.id, item.id);
                assert_eq!(partial.applied.len(), 1);
            }
            other => panic!("expected a partial copy on {}, got {other:?}", item.id),
        }
    }

    let json = serde_json::to_value(&report).unwrap();
    let partial = &json["result"]["failed"][0]["partial"];
    assert_eq!(partial["kind"], "copied");
    assert_eq!(partial["applied"][0]["grantee"]["id"], "user-9");
}
