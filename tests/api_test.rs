mod common;

use axum::http::{Method, StatusCode};
use beacon::repository::{
    ApplicationRepository, PaymentRepository, PendingUserRepository, UserRepository,
};
use chrono::{Duration, Utc};
use common::*;
use serde_json::json;

#[tokio::test]
async fn health_and_root_answer() -> anyhow::Result<()> {
    let app = TestApp::new().await?;

    let res = app.send(Method::GET, "/health", None, None).await?;
    assert_eq!(res.status, StatusCode::OK);

    let res = app.send(Method::GET, "/", None, None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["paymentsConfigured"], true);

    Ok(())
}

#[tokio::test]
async fn signup_then_verify_creates_verified_user() -> anyhow::Result<()> {
    let app = TestApp::new().await?;

    let res = app
        .post(
            "/auth/signup",
            json!({"name": "Asha", "email": "  Asha@Example.com ", "password": "hunter22"}),
            None,
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["email"], "asha@example.com");

    // No user exists until the code is confirmed.
    assert!(app.services.user_repo.find_by_email("asha@example.com").await?.is_none());

    let code = app.email.last_code_for("asha@example.com").await.expect("code sent");
    assert_eq!(code.len(), 6);

    let res = app
        .post("/auth/verify-otp", json!({"email": "asha@example.com", "otp": code}), None)
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["user"]["role"], "user");

    let user = app
        .services
        .user_repo
        .find_by_email("asha@example.com")
        .await?
        .expect("user created");
    assert!(user.is_verified);

    // The code is single use.
    let res = app
        .post("/auth/verify-otp", json!({"email": "asha@example.com", "otp": code}), None)
        .await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn signup_survives_email_delivery_failure() -> anyhow::Result<()> {
    let app = TestApp::with_failing_email().await?;

    let res = app
        .post(
            "/auth/signup",
            json!({"name": "Asha", "email": "asha@example.com", "password": "hunter22"}),
            None,
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK);

    let pending = app
        .services
        .pending_user_repo
        .find_by_email("asha@example.com")
        .await?
        .expect("pending signup stored");
    assert_eq!(pending.otp_code.len(), 6);
    assert!(app.email.sent().await.is_empty());

    Ok(())
}

#[tokio::test]
async fn wrong_code_keeps_pending_signup() -> anyhow::Result<()> {
    let app = TestApp::new().await?;

    app.post(
        "/auth/signup",
        json!({"name": "Asha", "email": "asha@example.com", "password": "hunter22"}),
        None,
    )
    .await?;
    let code = app.email.last_code_for("asha@example.com").await.expect("code sent");
    let wrong = if code == "999999" { "100000" } else { "999999" };

    let res = app
        .post("/auth/verify-otp", json!({"email": "asha@example.com", "otp": wrong}), None)
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"], "Invalid verification code");

    // The right code still works afterwards.
    let res = app
        .post("/auth/verify-otp", json!({"email": "asha@example.com", "otp": code}), None)
        .await?;
    assert_eq!(res.status, StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn expired_code_is_reported_as_expired() -> anyhow::Result<()> {
    let app = TestApp::new().await?;

    app.post(
        "/auth/signup",
        json!({"name": "Asha", "email": "asha@example.com", "password": "hunter22"}),
        None,
    )
    .await?;
    let code = app.email.last_code_for("asha@example.com").await.expect("code sent");

    sqlx::query("UPDATE pending_users SET otp_expires = ? WHERE email = ?")
        .bind((Utc::now() - Duration::minutes(1)).naive_utc())
        .bind("asha@example.com")
        .execute(&app.pool)
        .await?;

    let res = app
        .post("/auth/verify-otp", json!({"email": "asha@example.com", "otp": code}), None)
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"], "Verification code expired");
    assert!(app.services.user_repo.find_by_email("asha@example.com").await?.is_none());

    Ok(())
}

#[tokio::test]
async fn signup_for_verified_email_is_rejected() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    app.verified_user("asha@example.com").await?;

    let res = app
        .post(
            "/auth/signup",
            json!({"name": "Asha", "email": "asha@example.com", "password": "another1"}),
            None,
        )
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"], "User already exists and is verified");

    Ok(())
}

#[tokio::test]
async fn login_rejects_bad_password_and_logout_ends_session() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let cookie = app.verified_user("asha@example.com").await?;

    let res = app
        .post("/auth/login", json!({"email": "asha@example.com", "password": "wrong-pass"}), None)
        .await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app.get("/auth/session", &cookie).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["user"]["email"], "asha@example.com");

    let res = app.send(Method::POST, "/auth/logout", None, Some(&cookie)).await?;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let res = app.get("/auth/session", &cookie).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn saving_one_section_keeps_the_others() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let cookie = app.verified_user("asha@example.com").await?;

    let res = app.get("/user/application/save-section", &cookie).await?;
    assert_eq!(res.body, json!({}));

    app.post(
        "/user/application/save-section",
        json!({"section": "personalInfo", "data": personal_info()}),
        Some(&cookie),
    )
    .await?;
    let res = app
        .post(
            "/user/application/save-section",
            json!({"section": "academicInfo", "data": {"isStudying": false, "_id": "spoofed"}}),
            Some(&cookie),
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK);

    let application = &res.body["application"];
    assert_eq!(application["personalInfo"]["fullName"], "Asha Rao");
    assert_eq!(application["academicInfo"]["isStudying"], false);
    assert!(application["academicInfo"].get("_id").is_none());

    let res = app.get("/user/application/progress", &cookie).await?;
    assert_eq!(res.body["personalInfo"], 0);
    assert_eq!(res.body["academicInfo"], 0);
    assert_eq!(res.body["sportsInfo"], 5);
    assert_eq!(res.body["complete"], false);

    Ok(())
}

#[tokio::test]
async fn uncoercible_section_value_is_rejected() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let cookie = app.verified_user("asha@example.com").await?;

    let res = app
        .post(
            "/user/application/save-section",
            json!({"section": "personalInfo", "data": {"dob": "not a date"}}),
            Some(&cookie),
        )
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app.get("/user/application/save-section", &cookie).await?;
    assert_eq!(res.body, json!({}));

    Ok(())
}

#[tokio::test]
async fn incomplete_application_cannot_open_checkout() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let cookie = app.verified_user("asha@example.com").await?;

    let res = app
        .post("/register", json!({"personalInfo": personal_info()}), Some(&cookie))
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(app.gateway.orders().await.is_empty());

    Ok(())
}

#[tokio::test]
async fn register_pay_and_verify_end_to_end() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let cookie = app.verified_user("asha@example.com").await?;
    fill_application(&app, &cookie).await?;

    let res = app.post("/register", json!({}), Some(&cookie)).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["amount"], 50_000);
    assert_eq!(res.body["currency"], "INR");
    assert_eq!(res.body["key"], "rzp_test_fake");
    let order_id = res.body["orderId"].as_str().expect("order id").to_string();
    let application_id = res.body["applicationId"].clone();

    let signature = app.gateway.sign(&order_id, "pay_001");
    let res = app
        .post(
            "/payment/verify",
            json!({
                "razorpay_order_id": order_id,
                "razorpay_payment_id": "pay_001",
                "razorpay_signature": signature,
            }),
            None,
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["success"], true);
    assert_eq!(res.body["applicationId"], application_id);
    assert_eq!(res.body["paymentStatus"], "completed");

    // Replaying the same confirmation records nothing new.
    let res = app
        .post(
            "/payment/verify",
            json!({
                "razorpay_order_id": order_id,
                "razorpay_payment_id": "pay_001",
                "razorpay_signature": app.gateway.sign(&order_id, "pay_001"),
            }),
            None,
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK);

    let res = app.get("/user/dashboard", &cookie).await?;
    assert_eq!(res.body["application"]["paymentStatus"], "completed");
    assert_eq!(res.body["progress"]["stage"], "paid");
    let payments = res.body["payments"].as_array().expect("payments");
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0]["status"], "paid");

    let res = app.post("/register", json!({}), Some(&cookie)).await?;
    assert_eq!(res.status, StatusCode::CONFLICT);

    Ok(())
}

#[tokio::test]
async fn tampered_signature_changes_nothing() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let cookie = app.verified_user("asha@example.com").await?;
    fill_application(&app, &cookie).await?;

    let res = app.post("/register", json!({}), Some(&cookie)).await?;
    let order_id = res.body["orderId"].as_str().expect("order id").to_string();

    // Signed for a different payment id.
    let res = app
        .post(
            "/payment/verify",
            json!({
                "razorpay_order_id": order_id,
                "razorpay_payment_id": "pay_002",
                "razorpay_signature": app.gateway.sign(&order_id, "pay_001"),
            }),
            None,
        )
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["success"], false);
    assert_eq!(res.body["message"], "Invalid payment signature");

    let res = app.get("/user/dashboard", &cookie).await?;
    assert_eq!(res.body["application"]["paymentStatus"], "pending");
    assert_eq!(res.body["payments"], json!([]));

    Ok(())
}

#[tokio::test]
async fn valid_signature_for_unknown_order_is_not_found() -> anyhow::Result<()> {
    let app = TestApp::new().await?;

    let res = app
        .post(
            "/payment/verify",
            json!({
                "razorpay_order_id": "order_nobody",
                "razorpay_payment_id": "pay_001",
                "razorpay_signature": app.gateway.sign("order_nobody", "pay_001"),
            }),
            None,
        )
        .await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn failed_checkout_is_recorded_and_retryable() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let cookie = app.verified_user("asha@example.com").await?;
    fill_application(&app, &cookie).await?;

    let res = app.post("/register", json!({}), Some(&cookie)).await?;
    let first_order = res.body["orderId"].as_str().expect("order id").to_string();

    let res = app
        .post(
            "/payment/failed",
            json!({"razorpay_order_id": first_order, "reason": "card declined"}),
            Some(&cookie),
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["payment"]["status"], "failed");

    let res = app.post("/register", json!({}), Some(&cookie)).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_ne!(res.body["orderId"], first_order.as_str());

    let user = app
        .services
        .user_repo
        .find_by_email("asha@example.com")
        .await?
        .expect("user");
    assert_eq!(app.services.payment_repo.find_by_user(user.id).await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn checkout_without_gateway_is_unavailable() -> anyhow::Result<()> {
    let app = TestApp::without_gateway().await?;
    let cookie = app.verified_user("asha@example.com").await?;
    fill_application(&app, &cookie).await?;

    let res = app.post("/register", json!({}), Some(&cookie)).await?;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);

    let res = app.send(Method::GET, "/", None, None).await?;
    assert_eq!(res.body["paymentsConfigured"], false);

    Ok(())
}

#[tokio::test]
async fn unreachable_gateway_stores_no_order() -> anyhow::Result<()> {
    let app = TestApp::with_unreachable_gateway().await?;
    let cookie = app.verified_user("asha@example.com").await?;
    fill_application(&app, &cookie).await?;

    let res = app.post("/register", json!({}), Some(&cookie)).await?;
    assert_eq!(res.status, StatusCode::BAD_GATEWAY);

    let user = app
        .services
        .user_repo
        .find_by_email("asha@example.com")
        .await?
        .expect("user exists");
    let application = app
        .services
        .application_repo
        .find_by_user(user.id)
        .await?
        .expect("application saved");
    assert!(application.razorpay_order_id.is_none());
    assert!(app.gateway.orders().await.is_empty());

    Ok(())
}

#[tokio::test]
async fn protected_routes_need_a_session() -> anyhow::Result<()> {
    let app = TestApp::new().await?;

    let res = app.send(Method::GET, "/user/dashboard", None, None).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app.get("/user/dashboard", "session=forged").await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn admin_routes_reject_regular_users() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let cookie = app.verified_user("asha@example.com").await?;

    for uri in ["/admin/stats", "/admin/applications", "/admin/users", "/admin/payments"] {
        let res = app.get(uri, &cookie).await?;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED, "{}", uri);
    }

    Ok(())
}

#[tokio::test]
async fn admin_fallback_login_manages_applicants() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let user_cookie = app.verified_user("asha@example.com").await?;
    fill_application(&app, &user_cookie).await?;

    let admin_cookie = app.login(ADMIN_EMAIL, ADMIN_PASSWORD).await?;

    let res = app.get("/admin/applications", &admin_cookie).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["stats"]["total"], 1);
    let application = &res.body["applications"][0];
    assert_eq!(application["user"]["email"], "asha@example.com");
    let id = application["id"].as_str().expect("id").to_string();

    let res = app
        .send(
            Method::PATCH,
            &format!("/admin/applications/{}", id),
            Some(json!({"approvalStatus": "approved"})),
            Some(&admin_cookie),
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["approvalStatus"], "approved");

    let res = app.get("/admin/users", &admin_cookie).await?;
    assert_eq!(res.body["stats"]["total"], 2);
    assert_eq!(res.body["stats"]["admins"], 1);

    let res = app.get("/admin/stats", &admin_cookie).await?;
    assert_eq!(res.status, StatusCode::OK);
    let chart = res.body["chartData"].as_array().expect("chart data");
    assert_eq!(chart.len(), 6);
    assert_eq!(chart[5]["applications"], 1);

    Ok(())
}

#[tokio::test]
async fn deleting_a_user_ends_their_sessions() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let user_cookie = app.verified_user("asha@example.com").await?;
    let admin_cookie = app.login(ADMIN_EMAIL, ADMIN_PASSWORD).await?;

    let user = app
        .services
        .user_repo
        .find_by_email("asha@example.com")
        .await?
        .expect("user");

    let res = app
        .send(Method::DELETE, &format!("/admin/users/{}", user.id), None, Some(&admin_cookie))
        .await?;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let res = app.get("/auth/session", &user_cookie).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app
        .send(Method::DELETE, &format!("/admin/users/{}", user.id), None, Some(&admin_cookie))
        .await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    Ok(())
}
