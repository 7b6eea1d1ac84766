//! End-to-end workflow scenarios over a real studio database.

mod common;

use rust_decimal::Decimal;

use atelier::{
    AssignRequest, DerivedPaymentStatus, LocalStage, PaymentState, ReceiveRequest, StageCategory,
    StageStatus, StudioEvent, WorkerLedger, WorkflowError,
};
use common::{drain, TestHarness, DYER, EMBROIDERER, TAILOR};

fn dec(n: i64) -> Decimal {
    Decimal::from(n)
}

#[tokio::test]
async fn stages_unlock_in_order_as_work_is_received() {
    let h = TestHarness::new();
    let (job, _) = h
        .configured_job("sale-a", &[StageCategory::Dyeing, StageCategory::Stitching])
        .await;
    let engine = h.studio.engine();
    let dyeing = h.stage_ref(&job.id, 1).await;
    let stitching = h.stage_ref(&job.id, 2).await;

    let err = engine
        .assign(&stitching, AssignRequest::single(TAILOR, dec(300)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::StageLocked {
            previous_order: 1,
            ..
        }
    ));
    assert_eq!(h.stage(&job.id, 2).await.status, StageStatus::Pending);

    let snapshot = engine
        .assign(&dyeing, AssignRequest::single(DYER, dec(500)))
        .await
        .unwrap();
    let stage = snapshot.stage_at(1).unwrap();
    assert_eq!(stage.status, StageStatus::Assigned);
    assert_eq!(stage.assigned_worker_id.as_deref(), Some(DYER));
    assert_eq!(stage.expected_cost, dec(500));

    let snapshot = engine
        .receive(&dyeing, ReceiveRequest::new(dec(550)))
        .await
        .unwrap();
    let stage = snapshot.stage_at(1).unwrap();
    assert_eq!(stage.status, StageStatus::Completed);
    assert_eq!(stage.actual_cost, dec(550));
    assert_eq!(stage.cost_variance(), Some(dec(50)));

    let entry = h
        .studio
        .synchronizer()
        .ledger()
        .active_entry(&stage.id)
        .await
        .unwrap()
        .expect("ledger entry after receive");
    assert_eq!(entry.worker_id, DYER);
    assert_eq!(entry.amount, dec(550));
    assert_eq!(entry.status, PaymentState::Unpaid);

    assert!(!snapshot.is_locked(stitching.persisted().unwrap()));
    assert_eq!(
        snapshot.progress().next_assignable.as_ref(),
        Some(stitching.persisted().unwrap())
    );
    engine
        .assign(&stitching, AssignRequest::single(TAILOR, dec(300)))
        .await
        .unwrap();
}

#[tokio::test]
async fn reopen_blocked_while_a_later_stage_is_completed() {
    let h = TestHarness::new();
    let (job, _) = h
        .configured_job("sale-b", &[StageCategory::Dyeing, StageCategory::Stitching])
        .await;
    let engine = h.studio.engine();
    let dyeing = h.stage_ref(&job.id, 1).await;
    let stitching = h.stage_ref(&job.id, 2).await;

    engine
        .assign(&dyeing, AssignRequest::single(DYER, dec(500)))
        .await
        .unwrap();
    engine
        .receive(&dyeing, ReceiveRequest::new(dec(500)))
        .await
        .unwrap();
    engine
        .assign(&stitching, AssignRequest::single(TAILOR, dec(800)))
        .await
        .unwrap();
    engine
        .receive(&stitching, ReceiveRequest::new(dec(800)))
        .await
        .unwrap();

    let err = engine.reopen(&dyeing).await.unwrap_err();
    match err {
        WorkflowError::CannotReopenDependentsCompleted {
            completed_after, ..
        } => assert_eq!(completed_after, vec!["#2 Stitching".to_string()]),
        other => panic!("unexpected error: {other}"),
    }
    assert!(h.stage(&job.id, 1).await.is_completed());
}

#[tokio::test]
async fn reopening_from_the_back_unwinds_the_pipeline() {
    let h = TestHarness::new();
    let (job, _) = h
        .configured_job("sale-c", &[StageCategory::Dyeing, StageCategory::Stitching])
        .await;
    let engine = h.studio.engine();
    let ledger = h.studio.synchronizer().ledger().clone();
    let dyeing = h.stage_ref(&job.id, 1).await;
    let stitching = h.stage_ref(&job.id, 2).await;

    for (stage, worker, cost) in [(&dyeing, DYER, 500), (&stitching, TAILOR, 800)] {
        engine
            .assign(stage, AssignRequest::single(worker, dec(cost)))
            .await
            .unwrap();
        engine
            .receive(stage, ReceiveRequest::new(dec(cost)))
            .await
            .unwrap();
    }
    assert_eq!(ledger.entries_for_job(&job.id).await.unwrap().len(), 2);

    let snapshot = engine.reopen(&stitching).await.unwrap();
    let reopened = snapshot.stage_at(2).unwrap();
    assert_eq!(reopened.status, StageStatus::Assigned);
    assert!(reopened.completed_at.is_none());
    assert_eq!(reopened.assigned_worker_id.as_deref(), Some(TAILOR));
    assert!(ledger
        .active_entry(stitching.persisted().unwrap())
        .await
        .unwrap()
        .is_none());
    assert_eq!(
        snapshot.payment_status(stitching.persisted().unwrap()),
        DerivedPaymentStatus::Pending
    );

    let snapshot = engine.reopen(&dyeing).await.unwrap();
    assert_eq!(snapshot.stage_at(1).unwrap().status, StageStatus::Assigned);
    assert!(ledger.entries_for_job(&job.id).await.unwrap().is_empty());

    let history = ledger.entries_for_worker(DYER).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].is_void());
}

#[tokio::test]
async fn unsaved_placeholder_stage_cannot_be_received() {
    let h = TestHarness::new();
    let (job, _) = h.configured_job("sale-d", &[StageCategory::Dyeing]).await;
    let engine = h.studio.engine();
    let dyeing = h.stage_ref(&job.id, 1).await;
    engine
        .assign(&dyeing, AssignRequest::single(DYER, dec(500)))
        .await
        .unwrap();
    let before = engine.load(&job.id).await.unwrap();
    let mut rx = h.subscribe();

    let local = LocalStage::new("tmp-dyeing", StageCategory::Dyeing);
    let err = engine
        .receive(&local.stage_ref(), ReceiveRequest::new(dec(550)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WorkflowError::StageNotPersisted { ref local_id } if local_id == "tmp-dyeing"
    ));
    assert!(err.to_string().contains("save the stage configuration first"));
    assert_eq!(engine.load(&job.id).await.unwrap(), before);
    assert!(h
        .studio
        .synchronizer()
        .ledger()
        .entries_for_job(&job.id)
        .await
        .unwrap()
        .is_empty());
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn reconfiguration_keeps_assigned_stage_with_a_warning() {
    let h = TestHarness::new();
    let (job, _) = h
        .configured_job("sale-e", &[StageCategory::Handwork, StageCategory::Dyeing])
        .await;
    let handwork = h.stage_ref(&job.id, 1).await;
    h.studio
        .engine()
        .assign(&handwork, AssignRequest::single(EMBROIDERER, dec(1200)))
        .await
        .unwrap();

    let outcome = h
        .studio
        .configurator()
        .apply_configuration(
            &job.id,
            &[
                StageCategory::Dyeing,
                StageCategory::Stitching,
                StageCategory::custom("Finishing"),
            ],
        )
        .await
        .unwrap();

    assert!(!outcome.reset);
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(&outcome.warnings[0].stage_id, handwork.persisted().unwrap());
    assert_eq!(outcome.warnings[0].category, StageCategory::Handwork);

    let layout: Vec<(u32, StageCategory)> = outcome
        .stages
        .iter()
        .map(|s| (s.order, s.category.clone()))
        .collect();
    assert_eq!(
        layout,
        vec![
            (1, StageCategory::Dyeing),
            (2, StageCategory::Stitching),
            (3, StageCategory::custom("Finishing")),
            (4, StageCategory::Handwork),
        ]
    );
    let kept = outcome.stages.iter().find(|s| s.order == 4).unwrap();
    assert_eq!(kept.assigned_worker_id.as_deref(), Some(EMBROIDERER));
    assert_eq!(kept.status, StageStatus::Assigned);
}

#[tokio::test]
async fn events_published_for_stage_and_ledger_changes() {
    let h = TestHarness::new();
    let (job, _) = h.configured_job("sale-ev", &[StageCategory::Dyeing]).await;
    let dyeing = h.stage_ref(&job.id, 1).await;
    let mut rx = h.subscribe();

    h.studio
        .engine()
        .assign(&dyeing, AssignRequest::single(DYER, dec(500)))
        .await
        .unwrap();
    assert_eq!(
        drain(&mut rx),
        vec![StudioEvent::StageDataChanged {
            job_id: job.id.clone()
        }]
    );

    h.studio
        .engine()
        .receive(&dyeing, ReceiveRequest::new(dec(500)))
        .await
        .unwrap();
    let events = drain(&mut rx);
    assert!(events.contains(&StudioEvent::StageDataChanged {
        job_id: job.id.clone()
    }));
    assert!(events.contains(&StudioEvent::WorkerLedgerChanged {
        worker_id: DYER.to_string()
    }));

    h.studio
        .mark_payment(dyeing.persisted().unwrap(), PaymentState::Paid, Some("CASH-7"))
        .await
        .unwrap();
    assert_eq!(
        drain(&mut rx),
        vec![StudioEvent::WorkerLedgerChanged {
            worker_id: DYER.to_string()
        }]
    );
}

#[tokio::test]
async fn materialize_then_receive_with_bound_reference() {
    let h = TestHarness::new();
    let job = h.job("sale-m").await;
    let locals = vec![
        LocalStage::new("tmp-1", StageCategory::Dyeing),
        LocalStage::new("tmp-2", StageCategory::Stitching),
    ];

    let (_, bound) = h
        .studio
        .configurator()
        .materialize(&job.id, &locals)
        .await
        .unwrap();
    let dyeing = bound[0].1.clone();
    assert!(dyeing.is_persisted());

    let engine = h.studio.engine();
    engine
        .assign(&dyeing, AssignRequest::single(DYER, dec(100)))
        .await
        .unwrap();
    let snapshot = engine
        .receive(&dyeing, ReceiveRequest::new(dec(100)))
        .await
        .unwrap();
    assert!(snapshot.stage_at(1).unwrap().is_completed());
}
