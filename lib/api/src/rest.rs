use actix_cors::Cors;
use actix_multipart::Multipart;
use actix_web::{http::StatusCode, web, App, HttpResponse, HttpServer, Result as ActixResult};
use futures_util::StreamExt;
use receiptx_pipeline::{ReceiptPipeline, ResultEnvelope};
use std::sync::Arc;
use tracing::warn;

/// Largest accepted image upload
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Longest accepted `user_id` form value
const MAX_USER_ID_BYTES: usize = 256;

pub struct RestApi;

impl RestApi {
    pub async fn start(pipeline: Arc<ReceiptPipeline>, port: u16) -> std::io::Result<()> {
        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .wrap(cors)
                .app_data(web::Data::new(pipeline.clone()))
                .configure(RestApi::routes)
        })
        .bind(("0.0.0.0", port))?
        .run()
        .await
    }

    /// Register the receipt routes; the app must provide `Data<Arc<ReceiptPipeline>>`.
    pub fn routes(cfg: &mut web::ServiceConfig) {
        cfg.route("/health", web::get().to(health))
            .route("/receipts", web::post().to(upload_receipt));
    }
}

async fn health() -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "ok"
    })))
}

enum FormError {
    BadRequest(String),
    TooLarge,
}

struct ReceiptForm {
    user_id: String,
    image: Vec<u8>,
}

async fn read_form(mut payload: Multipart) -> Result<ReceiptForm, FormError> {
    let mut user_id: Option<String> = None;
    let mut image: Option<Vec<u8>> = None;

    while let Some(field) = payload.next().await {
        let mut field = field.map_err(|e| FormError::BadRequest(e.to_string()))?;
        let name = field.name().unwrap_or_default().to_string();
        let limit = match name.as_str() {
            "image" => MAX_IMAGE_BYTES,
            "user_id" => MAX_USER_ID_BYTES,
            _ => 0,
        };

        let mut buf = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| FormError::BadRequest(e.to_string()))?;
            if limit == 0 {
                continue;
            }
            if buf.len() + chunk.len() > limit {
                return Err(match name.as_str() {
                    "image" => FormError::TooLarge,
                    _ => FormError::BadRequest(format!("field {} is too long", name)),
                });
            }
            buf.extend_from_slice(&chunk);
        }

        match name.as_str() {
            "image" => image = Some(buf),
            "user_id" => {
                let value = String::from_utf8(buf)
                    .map_err(|_| FormError::BadRequest("user_id is not valid UTF-8".to_string()))?;
                user_id = Some(value.trim().to_string());
            }
            _ => {}
        }
    }

    let user_id = user_id
        .filter(|u| !u.is_empty())
        .ok_or_else(|| FormError::BadRequest("missing user_id field".to_string()))?;
    let image = image.ok_or_else(|| FormError::BadRequest("missing image field".to_string()))?;
    Ok(ReceiptForm { user_id, image })
}

async fn upload_receipt(
    pipeline: web::Data<Arc<ReceiptPipeline>>,
    payload: Multipart,
) -> ActixResult<HttpResponse> {
    let form = match read_form(payload).await {
        Ok(form) => form,
        Err(FormError::BadRequest(reason)) => {
            warn!(%reason, "Rejected receipt upload");
            return Ok(HttpResponse::BadRequest().json(ResultEnvelope::failed()));
        }
        Err(FormError::TooLarge) => {
            warn!(limit = MAX_IMAGE_BYTES, "Rejected oversized receipt upload");
            return Ok(HttpResponse::build(StatusCode::PAYLOAD_TOO_LARGE).json(ResultEnvelope::failed()));
        }
    };

    let envelope = pipeline.process_receipt(&form.image, &form.user_id).await;
    if envelope.is_success() {
        Ok(HttpResponse::Ok().json(envelope))
    } else {
        Ok(HttpResponse::UnprocessableEntity().json(envelope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::header, test};
    use async_trait::async_trait;
    use receiptx_core::{CatalogProduct, DraftItem, DraftReceipt, HashingEmbedder, RawLine};
    use receiptx_pipeline::{
        Bitmap, ImageLoader, InMemoryProductStore, OcrEngine, Status, StructuredParser,
    };
    use std::collections::BTreeSet;

    const BOUNDARY: &str = "receiptxboundary";

    struct AnyImage;

    #[async_trait]
    impl ImageLoader for AnyImage {
        async fn decode(&self, bytes: &[u8]) -> anyhow::Result<Bitmap> {
            if bytes == b"corrupt" {
                anyhow::bail!("unsupported image format");
            }
            Ok(Bitmap::new(2, 2))
        }
    }

    struct FixedLines;

    #[async_trait]
    impl OcrEngine for FixedLines {
        async fn extract(&self, _bitmap: &Bitmap) -> anyhow::Result<Vec<RawLine>> {
            Ok(vec!["ES TEH MANIS 3".to_string()])
        }
    }

    struct FixedDraft;

    #[async_trait]
    impl StructuredParser for FixedDraft {
        async fn parse(&self, _lines: &[RawLine], _known: &BTreeSet<String>) -> anyhow::Result<DraftReceipt> {
            Ok(DraftReceipt {
                timestamp: Some("2024-03-01T19:20:00+07:00".to_string()),
                items: vec![DraftItem::new("Es Teh Manis", 3.0)],
                ..Default::default()
            })
        }
    }

    fn pipeline() -> Arc<ReceiptPipeline> {
        let embedder = HashingEmbedder::default();
        let store = InMemoryProductStore::new();
        store.set_catalog(
            "user-7",
            vec![CatalogProduct::new(
                "prod_002",
                "Es Teh Manis",
                10000.0,
                embedder.embed_text("Es Teh Manis"),
            )],
        );
        Arc::new(
            ReceiptPipeline::builder()
                .image_loader(Arc::new(AnyImage))
                .ocr(Arc::new(FixedLines))
                .parser(Arc::new(FixedDraft))
                .embedder(Arc::new(embedder))
                .store(Arc::new(store))
                .build()
                .unwrap(),
        )
    }

    fn multipart_body(user_id: Option<&str>, image: Option<&[u8]>) -> Vec<u8> {
        let mut body = Vec::new();
        if let Some(user_id) = user_id {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"user_id\"\r\n\r\n{}\r\n",
                    BOUNDARY, user_id
                )
                .as_bytes(),
            );
        }
        if let Some(image) = image {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"receipt.png\"\r\nContent-Type: image/png\r\n\r\n",
                    BOUNDARY
                )
                .as_bytes(),
            );
            body.extend_from_slice(image);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload(body: Vec<u8>) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/receipts")
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(body)
    }

    #[actix_web::test]
    async fn test_health() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(pipeline()))
                .configure(RestApi::routes),
        )
        .await;
        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn test_upload_success() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(pipeline()))
                .configure(RestApi::routes),
        )
        .await;
        let req = upload(multipart_body(Some("user-7"), Some(b"png-bytes"))).to_request();
        let envelope: ResultEnvelope = test::call_and_read_body_json(&app, req).await;

        assert_eq!(envelope.status, Status::Success);
        let receipt = envelope.data.unwrap();
        assert_eq!(receipt.user_id, "user-7");
        assert_eq!(receipt.timestamp, "2024-03-01T19:20:00+07:00");
        assert_eq!(receipt.items.len(), 1);
        assert_eq!(receipt.items[0].product_id, "prod_002");
        assert_eq!(receipt.total_price, 30000.0);
    }

    #[actix_web::test]
    async fn test_pipeline_failure_is_unprocessable() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(pipeline()))
                .configure(RestApi::routes),
        )
        .await;
        let req = upload(multipart_body(Some("user-7"), Some(b"corrupt"))).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let envelope: ResultEnvelope = test::read_body_json(resp).await;
        assert_eq!(envelope.status, Status::Failed);
        assert!(envelope.data.is_none());
        assert!(!envelope.message.is_empty());
    }

    #[actix_web::test]
    async fn test_missing_fields_are_bad_request() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(pipeline()))
                .configure(RestApi::routes),
        )
        .await;

        let req = upload(multipart_body(None, Some(b"png-bytes"))).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = upload(multipart_body(Some("user-7"), None)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_oversized_fields_are_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(pipeline()))
                .configure(RestApi::routes),
        )
        .await;

        let image = vec![0u8; MAX_IMAGE_BYTES + 1];
        let req = upload(multipart_body(Some("user-7"), Some(&image))).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let envelope: ResultEnvelope = test::read_body_json(resp).await;
        assert_eq!(envelope.status, Status::Failed);

        let user_id = "u".repeat(MAX_USER_ID_BYTES + 1);
        let req = upload(multipart_body(Some(&user_id), Some(b"png-bytes"))).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
