mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use serde_json::json;

use common::{
    app, app_with, authed, bootstrap_admin, create_resource, get, memory_config, post, send,
    stay_request,
};

#[actix_web::test]
async fn adjacent_stays_are_accepted_and_overlaps_rejected() {
    let app = app().await;
    let admin = bootstrap_admin(&app).await;
    let room = create_resource(&app, &admin, "room", "101", 2).await;

    let (status, first) = post(&app, "/bookings", &admin, stay_request(&room, "2024-01-10", "2024-01-12")).await;
    assert_eq!(status, StatusCode::CREATED, "{first}");
    assert_eq!(first["status"], "confirmed");

    let (status, body) = post(&app, "/bookings", &admin, stay_request(&room, "2024-01-11", "2024-01-13")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "No disponible");
    assert_eq!(body["conflicts"][0]["booking_id"], first["id"]);

    let (status, _) = post(&app, "/bookings", &admin, stay_request(&room, "2024-01-12", "2024-01-14")).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = get(&app, &format!("/bookings?resource_id={room}"), &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[actix_web::test]
async fn malformed_intervals_are_validation_errors() {
    let app = app().await;
    let admin = bootstrap_admin(&app).await;
    let room = create_resource(&app, &admin, "room", "101", 2).await;

    let (status, body) = post(&app, "/bookings", &admin, stay_request(&room, "2024-01-12", "2024-01-12")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Error de validación");

    let (status, _) = post(&app, "/bookings", &admin, stay_request(&room, "2024-01-12", "2024-01-10")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(&app, "/bookings", &admin, stay_request(&room, "12/01/2024", "2024-01-14")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Una mesa no admite ventana por fechas
    let table = create_resource(&app, &admin, "table", "T1", 4).await;
    let (status, _) = post(&app, "/bookings", &admin, stay_request(&table, "2024-01-10", "2024-01-11")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        authed(test::TestRequest::post().uri("/bookings"), &admin)
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn cancelling_frees_the_interval() {
    let app = app().await;
    let admin = bootstrap_admin(&app).await;
    let room = create_resource(&app, &admin, "room", "101", 2).await;

    let (_, booking) = post(&app, "/bookings", &admin, stay_request(&room, "2024-01-10", "2024-01-12")).await;
    let id = booking["id"].as_str().unwrap();

    let search = "/resources/available?kind=room&check_in=2024-01-10&check_out=2024-01-12";
    let (_, body) = get(&app, search, &admin).await;
    assert_eq!(body["resources"], json!([]));

    let (status, body) = post(&app, &format!("/bookings/{id}/cancel"), &admin, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    let (_, body) = get(&app, search, &admin).await;
    assert_eq!(body["resources"][0]["id"], room.as_str());

    let (status, _) = post(&app, "/bookings", &admin, stay_request(&room, "2024-01-10", "2024-01-12")).await;
    assert_eq!(status, StatusCode::CREATED);

    // Cancelar dos veces no es una transición válida
    let (status, _) = post(&app, &format!("/bookings/{id}/cancel"), &admin, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn stay_lifecycle_updates_cached_room_status() {
    let app = app().await;
    let admin = bootstrap_admin(&app).await;
    let room = create_resource(&app, &admin, "room", "201", 2).await;
    let (_, booking) = post(&app, "/bookings", &admin, stay_request(&room, "2024-03-01", "2024-03-03")).await;
    let id = booking["id"].as_str().unwrap();

    let (status, _) = post(&app, &format!("/bookings/{id}/check-out"), &admin, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = post(&app, &format!("/bookings/{id}/check-in"), &admin, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "checked_in");
    let (_, resource) = get(&app, &format!("/resources/{room}"), &admin).await;
    assert_eq!(resource["status"], "occupied");

    let (status, _) = post(&app, &format!("/bookings/{id}/check-out"), &admin, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let (_, resource) = get(&app, &format!("/resources/{room}"), &admin).await;
    assert_eq!(resource["status"], "cleaning");
}

#[actix_web::test]
async fn pending_bookings_only_conflict_when_confirmed() {
    let mut config = memory_config();
    config.auto_confirm = false;
    let app = app_with(config).await;
    let admin = bootstrap_admin(&app).await;
    let room = create_resource(&app, &admin, "room", "301", 2).await;

    let (status, first) = post(&app, "/bookings", &admin, stay_request(&room, "2024-05-01", "2024-05-04")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["status"], "pending");
    let (status, second) = post(&app, "/bookings", &admin, stay_request(&room, "2024-05-02", "2024-05-05")).await;
    assert_eq!(status, StatusCode::CREATED);

    let first_id = first["id"].as_str().unwrap();
    let second_id = second["id"].as_str().unwrap();
    let (status, _) = post(&app, &format!("/bookings/{first_id}/confirm"), &admin, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = post(&app, &format!("/bookings/{second_id}/confirm"), &admin, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["conflicts"][0]["booking_id"], first["id"]);
}

#[actix_web::test]
async fn reschedule_ignores_own_booking_but_not_others() {
    let app = app().await;
    let admin = bootstrap_admin(&app).await;
    let room = create_resource(&app, &admin, "room", "401", 3).await;
    let (_, first) = post(&app, "/bookings", &admin, stay_request(&room, "2024-06-01", "2024-06-03")).await;
    post(&app, "/bookings", &admin, stay_request(&room, "2024-06-05", "2024-06-07")).await;
    let id = first["id"].as_str().unwrap();

    let reschedule = |check_in: &str, check_out: &str| {
        authed(test::TestRequest::put().uri(&format!("/bookings/{id}")), &admin).set_json(json!({
            "window": { "kind": "stay", "check_in": check_in, "check_out": check_out },
            "party_size": 3
        }))
    };

    let (status, body) = send(&app, reschedule("2024-06-02", "2024-06-05")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["party_size"], 3);

    let (status, _) = send(&app, reschedule("2024-06-04", "2024-06-06")).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn maintenance_and_capacity_block_new_bookings() {
    let app = app().await;
    let admin = bootstrap_admin(&app).await;
    let room = create_resource(&app, &admin, "room", "501", 2).await;

    let mut too_many = stay_request(&room, "2024-07-01", "2024-07-02");
    too_many["party_size"] = json!(3);
    let (status, _) = post(&app, "/bookings", &admin, too_many).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(&app, &format!("/resources/{room}/status"), &admin, json!({ "status": "maintenance" })).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post(&app, "/bookings", &admin, stay_request(&room, "2024-07-01", "2024-07-02")).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = get(&app, "/resources/available?kind=room&check_in=2024-07-01&check_out=2024-07-02", &admin).await;
    assert_eq!(body["resources"], json!([]));
}

#[actix_web::test]
async fn table_slots_use_default_duration() {
    let app = app().await;
    let admin = bootstrap_admin(&app).await;
    let table = create_resource(&app, &admin, "table", "Terraza 1", 4).await;

    let slot = |time: &str| {
        json!({
            "resource_id": table,
            "guest_name": "Pedro",
            "guest_email": "pedro@example.com",
            "guest_phone": "600123123",
            "party_size": 4,
            "window": { "kind": "slot", "date": "2024-08-10", "time": time }
        })
    };

    let (status, body) = post(&app, "/bookings", &admin, slot("20:00")).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["ends_at"], "2024-08-10T22:00:00Z");

    let (status, _) = post(&app, "/bookings", &admin, slot("21:30")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = post(&app, "/bookings", &admin, slot("22:00")).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = get(&app, "/resources/available?kind=table&date=2024-08-10&time=13:00&party_size=4", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resources"].as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn resource_with_live_bookings_cannot_be_deleted() {
    let app = app().await;
    let admin = bootstrap_admin(&app).await;
    let room = create_resource(&app, &admin, "room", "601", 2).await;
    let (_, booking) = post(&app, "/bookings", &admin, stay_request(&room, "2024-09-01", "2024-09-02")).await;

    let delete = || authed(test::TestRequest::delete().uri(&format!("/resources/{room}")), &admin);
    let (status, _) = send(&app, delete()).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let id = booking["id"].as_str().unwrap();
    post(&app, &format!("/bookings/{id}/cancel"), &admin, json!({})).await;
    let (status, _) = send(&app, delete()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = get(&app, &format!("/resources/{room}"), &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn simultaneous_overlapping_requests_admit_one() {
    let app = app().await;
    let admin = bootstrap_admin(&app).await;
    let room = create_resource(&app, &admin, "room", "701", 2).await;

    let request = |check_in: &str, check_out: &str| {
        authed(test::TestRequest::post().uri("/bookings"), &admin)
            .set_json(stay_request(&room, check_in, check_out))
    };
    let (a, b, c, d) = tokio::join!(
        send(&app, request("2024-10-01", "2024-10-04")),
        send(&app, request("2024-10-02", "2024-10-05")),
        send(&app, request("2024-10-03", "2024-10-06")),
        send(&app, request("2024-10-02", "2024-10-04")),
    );

    let statuses = [a.0, b.0, c.0, d.0];
    let created = statuses.iter().filter(|s| **s == StatusCode::CREATED).count();
    let conflicts = statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count();
    assert_eq!((created, conflicts), (1, 3), "{statuses:?}");
}
