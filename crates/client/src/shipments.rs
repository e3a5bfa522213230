//! Staff shipment endpoints that need multipart uploads.

use hotpot_core::types::DbId;
use serde_json::Value;

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::request::{FormPart, PendingRequest};

/// Photo, customer signature and notes captured at hand-over.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryProof {
    pub image_file_name: String,
    pub image_mime: String,
    pub image_bytes: Vec<u8>,
    /// Signature pad capture, already base64-encoded.
    pub signature_base64: String,
    pub notes: Option<String>,
}

impl DeliveryProof {
    fn into_parts(self) -> Vec<FormPart> {
        let mut parts = vec![
            FormPart::file(
                "ProofImage",
                self.image_file_name,
                self.image_mime,
                self.image_bytes,
            ),
            FormPart::text("Base64Signature", self.signature_base64),
        ];
        if let Some(notes) = self.notes {
            parts.push(FormPart::text("DeliveryNotes", notes));
        }
        parts
    }
}

/// Wrapper for the `/staff/shipments` upload endpoints.
#[derive(Debug, Clone)]
pub struct ShipmentApi {
    client: ApiClient,
}

impl ShipmentApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// `POST /staff/shipments/{id}/delivery-proof` as multipart form data.
    pub async fn upload_delivery_proof(
        &self,
        shipment_id: DbId,
        proof: DeliveryProof,
    ) -> Result<Value, ApiError> {
        let request = PendingRequest::post(format!("/staff/shipments/{shipment_id}/delivery-proof"))
            .multipart(proof.into_parts());

        let result = self.client.execute(request).await?;
        tracing::info!(shipment_id, "Delivery proof uploaded");
        Ok(result)
    }
}
