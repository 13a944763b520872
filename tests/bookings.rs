mod common;

use axum::http::StatusCode;

use common::{date, json, location, seed_event, ticket, trailing_id, TestApp};
use eventhub_server::models::Event;
use eventhub_server::store::Store;

async fn ctrl_event(app: &TestApp, quota: Option<i32>) -> (Event, i64) {
    let event = seed_event(
        app,
        "CTRL",
        "SZA live",
        date("2099-06-01"),
        vec![ticket("Standard", "60.00", quota)],
    )
    .await;
    let tickets = app.store.ticket_types_for_event(event.id).await.unwrap();
    (event, tickets[0].id)
}

async fn book(
    app: &TestApp,
    event_id: i64,
    ticket_type: i64,
    quantity: &str,
    cookie: &str,
) -> axum::response::Response {
    let ticket_type = ticket_type.to_string();
    app.post_form(
        &format!("/event/{event_id}"),
        &[
            ("form", "booking"),
            ("ticket_type", &ticket_type),
            ("quantity", quantity),
        ],
        Some(cookie),
    )
    .await
}

#[tokio::test]
async fn test_booking_confirmation_shows_event_ticket_and_quantity() {
    let app = TestApp::new();
    let cookie = app.signed_in("fan").await;
    let (event, ticket_type) = ctrl_event(&app, Some(150)).await;

    let response = book(&app, event.id, ticket_type, "4", &cookie).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let target = location(&response).expect("redirect").to_string();
    assert!(target.ends_with("/confirmation"));

    let response = app.get(&target, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    let data = &body["data"];
    assert_eq!(data["event_title"], "CTRL");
    assert_eq!(data["ticket_label"], "Standard");
    assert_eq!(data["unit_price"], "60.00");
    assert_eq!(data["quantity"], 4);
    assert_eq!(data["total_price"], "240.00");
    assert_eq!(data["booker_name"], "Ada Lovelace");
}

#[tokio::test]
async fn test_quantity_outside_range_is_rejected() {
    let app = TestApp::new();
    let cookie = app.signed_in("fan").await;
    let (event, ticket_type) = ctrl_event(&app, None).await;

    for quantity in ["0", "11"] {
        let response = book(&app, event.id, ticket_type, quantity, &cookie).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json(response).await;
        assert!(body["error"]["details"]["fields"]["quantity"].is_array());
    }
    assert_eq!(app.store.booking_count().await, 0);
}

#[tokio::test]
async fn test_quota_is_enforced_across_bookings() {
    let app = TestApp::new();
    let cookie = app.signed_in("fan").await;
    let (event, ticket_type) = ctrl_event(&app, Some(5)).await;

    let response = book(&app, event.id, ticket_type, "4", &cookie).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = book(&app, event.id, ticket_type, "2", &cookie).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.store.booking_count().await, 1);

    let response = book(&app, event.id, ticket_type, "1", &cookie).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(app.store.booking_count().await, 2);
}

#[tokio::test]
async fn test_ticket_type_must_belong_to_the_event() {
    let app = TestApp::new();
    let cookie = app.signed_in("fan").await;
    let (event, _) = ctrl_event(&app, None).await;
    let other = seed_event(
        &app,
        "Other",
        "Elsewhere",
        date("2099-07-01"),
        vec![ticket("Balcony", "15", None)],
    )
    .await;
    let foreign = app.store.ticket_types_for_event(other.id).await.unwrap()[0].id;

    let response = book(&app, event.id, foreign, "1", &cookie).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json(response).await;
    assert!(body["error"]["details"]["fields"]["ticket_type"].is_array());
    assert_eq!(app.store.booking_count().await, 0);
}

#[tokio::test]
async fn test_past_event_cannot_be_booked() {
    let app = TestApp::new();
    let cookie = app.signed_in("fan").await;
    let event = seed_event(
        &app,
        "Last Year",
        "Over",
        date("2020-05-05"),
        vec![ticket("Standard", "10", None)],
    )
    .await;
    let ticket_type = app.store.ticket_types_for_event(event.id).await.unwrap()[0].id;

    let response = book(&app, event.id, ticket_type, "1", &cookie).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(app.store.booking_count().await, 0);
}

#[tokio::test]
async fn test_anonymous_submission_redirects_to_login() {
    let app = TestApp::new();
    let (event, _) = ctrl_event(&app, None).await;
    let uri = format!("/event/{}", event.id);

    let response = app
        .post_form(&uri, &[("form", "comment"), ("content", "Hi")], None)
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        Some(format!("/login?next=%2Fevent%2F{}", event.id).as_str())
    );
}

#[tokio::test]
async fn test_comment_appears_on_detail_page() {
    let app = TestApp::new();
    let cookie = app.signed_in("fan").await;
    let (event, _) = ctrl_event(&app, None).await;
    let uri = format!("/event/{}", event.id);

    let response = app
        .post_form(&uri, &[("form", "comment"), ("content", "Can't wait!")], Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some(uri.as_str()));

    let body = json(app.get(&uri, None).await).await;
    let comments = body["data"]["comments"].as_array().expect("comments");
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0]["content"], "Can't wait!");
}

#[tokio::test]
async fn test_confirmation_is_private_to_the_booker() {
    let app = TestApp::new();
    let fan = app.signed_in("fan").await;
    let stranger = app.signed_in("stranger").await;
    let (event, ticket_type) = ctrl_event(&app, None).await;

    let response = book(&app, event.id, ticket_type, "2", &fan).await;
    let target = location(&response).expect("redirect").to_string();
    let booking_id = trailing_id(&target);

    let response = app.get(&target, Some(&stranger)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = json(app.get("/bookinghistory", Some(&fan)).await).await;
    let bookings = body["data"]["bookings"].as_array().expect("bookings");
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0]["booking_id"], booking_id);

    let body = json(app.get("/bookinghistory", Some(&stranger)).await).await;
    assert_eq!(body["data"]["bookings"].as_array().map(Vec::len), Some(0));
}
