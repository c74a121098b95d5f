//! Pruebas del camino transaccional contra un MongoDB real.
//!
//! Necesitan un replica set (basta uno de un solo nodo):
//! `MONGODB_URI=mongodb://localhost:27017/?replicaSet=rs0 cargo test -- --ignored`

use std::sync::Arc;

use chrono::NaiveDate;
use mongodb::bson::oid::ObjectId;
use tokio::task::JoinSet;

use pispas_hotel::api::AppError;
use pispas_hotel::availability::Interval;
use pispas_hotel::db::models::{Booking, BookingStatus, Resource, ResourceKind, ResourceStatus};
use pispas_hotel::db::{BookingCommit, BookingFilter, MongoRepo, Store};

async fn repo() -> MongoRepo {
    let uri = std::env::var("MONGODB_URI")
        .unwrap_or_else(|_| "mongodb://localhost:27017/?replicaSet=rs0".to_string());
    let database = format!("pispas_test_{}", ObjectId::new().to_hex());
    let repo = MongoRepo::init(&uri, &database).await.unwrap();
    repo.create_indexes().await.unwrap();
    repo
}

fn stay(from: &str, to: &str) -> Interval {
    let parse = |s| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
    Interval::from_dates(parse(from), parse(to)).unwrap()
}

fn room() -> Resource {
    Resource {
        id: ObjectId::new(),
        kind: ResourceKind::Room,
        name: "101".into(),
        max_occupancy: 2,
        min_occupancy: None,
        status: ResourceStatus::Available,
        booking_version: 0,
        created_at: 0,
    }
}

fn booking(resource_id: ObjectId, interval: Interval) -> Booking {
    Booking {
        id: ObjectId::new(),
        resource_id,
        requested_by: ObjectId::new(),
        guest_name: "Elena".into(),
        guest_email: "elena@example.com".into(),
        guest_phone: "633333333".into(),
        party_size: 2,
        starts_at: interval.start(),
        ends_at: interval.end(),
        status: BookingStatus::Confirmed,
        created_at: 0,
        updated_at: 0,
    }
}

#[tokio::test]
#[ignore = "requiere un replica set de MongoDB"]
async fn concurrent_overlapping_commits_admit_exactly_one() {
    let repo = Arc::new(repo().await);
    let r = room();
    repo.insert_resource(r.clone()).await.unwrap();
    let window = stay("2024-01-10", "2024-01-12");

    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let repo = Arc::clone(&repo);
        let resource_id = r.id;
        tasks.spawn(async move {
            repo.commit_booking(BookingCommit::create(booking(resource_id, window)))
                .await
        });
    }

    let mut accepted = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(_) => accepted += 1,
            // El perdedor ve el solape o choca con la transacción ganadora
            Err(AppError::Unavailable { .. }) | Err(AppError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }
    assert_eq!(accepted, 1);

    let active = repo
        .list_bookings(&BookingFilter {
            resource_id: Some(r.id),
            active_only: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(active.len(), 1);

    repo.database.drop().await.unwrap();
}

#[tokio::test]
#[ignore = "requiere un replica set de MongoDB"]
async fn resource_with_live_booking_cannot_be_deleted() {
    let repo = repo().await;
    let r = room();
    repo.insert_resource(r.clone()).await.unwrap();
    repo.commit_booking(BookingCommit::create(booking(r.id, stay("2024-02-01", "2024-02-03"))))
        .await
        .unwrap();

    assert!(matches!(repo.delete_resource(r.id).await, Err(AppError::Conflict(_))));
    assert!(repo.get_resource(r.id).await.unwrap().is_some());
    assert!(!repo.delete_resource(ObjectId::new()).await.unwrap());

    repo.database.drop().await.unwrap();
}

#[tokio::test]
#[ignore = "requiere un replica set de MongoDB"]
async fn maintenance_is_checked_inside_the_transaction() {
    let repo = repo().await;
    let r = room();
    repo.insert_resource(r.clone()).await.unwrap();
    repo.set_resource_status(r.id, ResourceStatus::Maintenance)
        .await
        .unwrap();

    let result = repo
        .commit_booking(BookingCommit::create(booking(r.id, stay("2024-03-01", "2024-03-02"))))
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    repo.database.drop().await.unwrap();
}

#[tokio::test]
#[ignore = "requiere un replica set de MongoDB"]
async fn write_conflict_with_open_transaction_is_reported_as_conflict() {
    use mongodb::bson::doc;

    let repo = repo().await;
    let r = room();
    repo.insert_resource(r.clone()).await.unwrap();

    // Otra transacción mantiene bloqueado el recurso sin confirmar
    let mut holder = repo.client.start_session().await.unwrap();
    holder.start_transaction().await.unwrap();
    repo.resources()
        .update_one(doc! { "_id": r.id }, doc! { "$inc": { "booking_version": 1_i64 } })
        .session(&mut holder)
        .await
        .unwrap();

    let result = repo
        .commit_booking(BookingCommit::create(booking(r.id, stay("2024-04-01", "2024-04-02"))))
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))), "{result:?}");

    holder.abort_transaction().await.unwrap();
    assert!(repo
        .commit_booking(BookingCommit::create(booking(r.id, stay("2024-04-01", "2024-04-02"))))
        .await
        .is_ok());

    repo.database.drop().await.unwrap();
}
