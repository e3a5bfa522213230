//! Integration tests for login / logout and multipart uploads.

mod common;

use std::sync::atomic::Ordering;

use assert_matches::assert_matches;
use hotpot_client::auth::AuthApi;
use hotpot_client::shipments::{DeliveryProof, ShipmentApi};
use hotpot_client::{ApiClient, ApiError};
use hotpot_core::session::{Role, SessionHandle};

use common::{TestBackend, FRESH_TOKEN};

fn anonymous_client(backend: &TestBackend) -> ApiClient {
    ApiClient::with_client(
        reqwest::Client::new(),
        &backend.base_url,
        SessionHandle::in_memory(),
    )
}

#[tokio::test]
async fn login_persists_session_from_pascal_case_envelope() {
    let backend = TestBackend::start("login-access").await;
    let auth = AuthApi::new(anonymous_client(&backend));

    let session = auth.login("staff@hotpot.vn", "correct horse").await.unwrap();

    assert_eq!(session.access_token(), "login-access");
    assert_eq!(session.refresh_token(), "login-refresh");
    assert_eq!(session.user_id, Some(12));
    assert_eq!(session.role, Some(Role::Staff));
    assert_eq!(session.profile["fullName"], "Thao Tran");
}

#[tokio::test]
async fn login_with_bad_password_leaves_no_session() {
    let backend = TestBackend::start("login-access").await;
    let client = anonymous_client(&backend);
    let auth = AuthApi::new(client.clone());

    let result = auth.login("staff@hotpot.vn", "wrong").await;

    assert_matches!(result, Err(ApiError::Status { status: 401, .. }));
    assert!(!client.session().is_authenticated());
}

#[tokio::test]
async fn logout_calls_backend_and_clears_session() {
    let backend = TestBackend::start("good").await;
    let client = backend.client_with_token("good");
    let auth = AuthApi::new(client.clone());

    auth.logout().await.unwrap();

    assert_eq!(backend.state.logout_calls.load(Ordering::SeqCst), 1);
    assert!(!client.session().is_authenticated());
}

#[tokio::test]
async fn delivery_proof_is_replayed_as_multipart_after_renewal() {
    let backend = TestBackend::start("not-yet-issued").await;
    let client = backend.client_with_token("expired");
    let shipments = ShipmentApi::new(client.clone());

    let result = shipments
        .upload_delivery_proof(
            31,
            DeliveryProof {
                image_file_name: "proof.jpg".into(),
                image_mime: "image/jpeg".into(),
                image_bytes: vec![0xff, 0xd8, 0xff],
                signature_base64: "c2lnbmF0dXJl".into(),
                notes: Some("Handed to restaurant manager".into()),
            },
        )
        .await
        .unwrap();

    assert_eq!(result["shipmentId"], 31);
    assert_eq!(backend.state.refresh_calls(), 1);
    assert_eq!(
        *backend.state.upload_fields.lock().unwrap(),
        vec!["ProofImage", "Base64Signature", "DeliveryNotes"]
    );
    assert_eq!(client.session().access_token().as_deref(), Some(FRESH_TOKEN));
}
