//! 并发场景：同一账单上的并发状态更新、并发结账、并发加菜
//!
//! 使用多线程 runtime，让任务真正并行。

mod common;

use std::time::Duration;

use common::*;
use order_hub::auth::StaffRole;
use order_hub::db::RestaurantRef;
use order_hub::live::Delivery;
use order_hub::orders::GeofenceCheck;
use shared::error::{AppError, ErrorCode};
use shared::live::{DomainEvent, Topic};
use shared::order::{BillSnapshot, ItemStatus, PaymentMethod};
use uuid::Uuid;

const ROUNDS: usize = 20;

async fn open_bill(state: &order_hub::state::AppState, items: usize) -> BillSnapshot {
    let requests = (0..items).map(|_| item(FILTER_COFFEE, 1)).collect();
    state
        .ingest
        .create_order(
            RestaurantRef::Id(DOSA_CORNER),
            GeofenceCheck::Skip,
            details(requests),
        )
        .await
        .unwrap()
}

/// Drain every event currently buffered on the subscription
async fn drain(sub: &mut order_hub::live::Subscription) -> Vec<DomainEvent> {
    let mut events = Vec::new();
    while let Ok(Delivery::Event(event)) =
        tokio::time::timeout(Duration::from_millis(50), sub.recv()).await
    {
        events.push(event);
    }
    events
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_final_completions_emit_one_cashier_event() {
    for _ in 0..ROUNDS {
        let state = state();
        let chef = staff(DOSA_CORNER, StaffRole::Chef);
        let bill = open_bill(&state, 2).await;

        for item in &bill.items {
            state
                .status
                .update_item_status(&chef, item.id, ItemStatus::Accepted)
                .await
                .unwrap();
        }

        let mut cashier = state.router.subscribe(Topic::Cashier(DOSA_CORNER), Uuid::new_v4());

        let handles: Vec<_> = bill
            .items
            .iter()
            .map(|item| {
                let status = state.status.clone();
                let chef = chef.clone();
                let item_id = item.id;
                tokio::spawn(async move {
                    status
                        .update_item_status(&chef, item_id, ItemStatus::Completed)
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let events = drain(&mut cashier).await;
        let ready: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, DomainEvent::CashierBillReadyForPayment { .. }))
            .collect();
        assert_eq!(ready.len(), 1, "exactly one ready event per bill");

        let view = state.query.order_detail(bill.bill.id).await.unwrap();
        assert!(view.aggregates.is_ready_for_cashier);
        assert!(
            view.snapshot
                .items
                .iter()
                .all(|i| i.status == ItemStatus::Completed)
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_item_updated_twice_concurrently() {
    let state = state();
    let chef = staff(DOSA_CORNER, StaffRole::Chef);
    let bill = open_bill(&state, 1).await;
    let item_id = bill.items[0].id;

    let mut customer = state.router.subscribe(Topic::Customer(bill.bill.id), Uuid::new_v4());

    let accept = {
        let status = state.status.clone();
        let chef = chef.clone();
        tokio::spawn(async move {
            status
                .update_item_status(&chef, item_id, ItemStatus::Accepted)
                .await
        })
    };
    let decline = {
        let status = state.status.clone();
        let chef = chef.clone();
        tokio::spawn(async move {
            status
                .update_item_status(&chef, item_id, ItemStatus::Declined)
                .await
        })
    };

    let results = [accept.await.unwrap(), decline.await.unwrap()];
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1, "only one transition out of PENDING may win");

    for result in results {
        if let Err(e) = result {
            let err: AppError = e.into();
            assert_eq!(err.code, ErrorCode::InvalidStatusTransition);
        }
    }

    // 只有获胜的一次变化被推送
    let events = drain(&mut customer).await;
    assert_eq!(events.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_payments_settle_once() {
    let state = state();
    let chef = staff(DOSA_CORNER, StaffRole::Chef);
    let cashier = staff(DOSA_CORNER, StaffRole::Cashier);
    let bill = open_bill(&state, 1).await;
    let item_id = bill.items[0].id;

    state
        .status
        .update_item_status(&chef, item_id, ItemStatus::Accepted)
        .await
        .unwrap();
    state
        .status
        .update_item_status(&chef, item_id, ItemStatus::Completed)
        .await
        .unwrap();

    let mut feed = state.router.subscribe(Topic::Cashier(DOSA_CORNER), Uuid::new_v4());

    let handles: Vec<_> = [PaymentMethod::Offline, PaymentMethod::Online]
        .into_iter()
        .map(|method| {
            let payment = state.payment.clone();
            let cashier = cashier.clone();
            let bill_id = bill.bill.id;
            tokio::spawn(async move { payment.mark_paid(&cashier, bill_id, method).await })
        })
        .collect();

    let mut codes = Vec::new();
    let mut paid = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => paid += 1,
            Err(e) => codes.push(AppError::from(e).code),
        }
    }
    assert_eq!(paid, 1);
    assert_eq!(codes, vec![ErrorCode::OrderAlreadyPaid]);

    let events = drain(&mut feed).await;
    let paid_events = events
        .iter()
        .filter(|e| matches!(e, DomainEvent::CashierBillPaid { .. }))
        .count();
    assert_eq!(paid_events, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_appends_keep_every_item() {
    let state = state();
    let bill = open_bill(&state, 1).await;

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let ingest = state.ingest.clone();
            let bill_id = bill.bill.id;
            tokio::spawn(async move {
                ingest
                    .add_items(None, bill_id, vec![item(MASALA_DOSA_REGULAR, 1)])
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let view = state.query.order_detail(bill.bill.id).await.unwrap();
    assert_eq!(view.snapshot.items.len(), 11);

    // 所有明细 ID 唯一
    let mut ids: Vec<_> = view.snapshot.items.iter().map(|i| i.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 11);
}
