use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::models::job::{StatusResponse, SubmitResponse, UploadKind};
use crate::models::payload::{
    EstimateRequest, MealEstimate, MealLogResponse, MealPayload, StockPayload, StockRecord,
};

/// The persistence and analysis endpoints the ingestion core talks to.
///
/// Injected everywhere as `Arc<dyn PantryApi>` so tests can swap in an in-memory fake.
#[async_trait]
pub trait PantryApi: Send + Sync {
    /// `POST /upload/` with the image as multipart field `file`. Returns the job id.
    async fn upload_image(
        &self,
        user_id: &str,
        kind: UploadKind,
        file_name: &str,
        image: Vec<u8>,
    ) -> Result<String, ApiError>;

    /// `GET /upload/status/{job_id}`
    async fn job_status(&self, job_id: &str) -> Result<StatusResponse, ApiError>;

    /// `POST /stock/`
    async fn create_stock(&self, item: &StockPayload) -> Result<(), ApiError>;

    /// `POST /stock/batch`
    async fn create_stock_batch(&self, items: &[StockPayload]) -> Result<(), ApiError>;

    /// `PUT /stock/{stock_id}`
    async fn update_stock(&self, stock_id: &str, item: &StockPayload) -> Result<(), ApiError>;

    /// `GET /stock/{user_id}`
    async fn list_stock(&self, user_id: &str) -> Result<Vec<StockRecord>, ApiError>;

    /// `POST /meals/`
    async fn create_meal(&self, meal: &MealPayload) -> Result<MealLogResponse, ApiError>;

    /// `PUT /meals/{meal_id}`
    async fn update_meal(&self, meal_id: &str, meal: &MealPayload) -> Result<(), ApiError>;

    /// `POST /meals/estimate`
    async fn estimate_meal(&self, meal_name: &str) -> Result<MealEstimate, ApiError>;
}

/// reqwest-backed client for the pantry backend.
pub struct HttpPantryApi {
    http: Client,
    base_url: String,
}

impl HttpPantryApi {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(ApiError::Http)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-2xx response into `ApiError::Status`, pulling FastAPI's `detail`.
    async fn check(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status,
            detail: extract_detail(&body),
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let bytes = Self::check(response).await?.bytes().await.map_err(ApiError::Http)?;
        serde_json::from_slice(&bytes).map_err(ApiError::Decode)
    }
}

#[async_trait]
impl PantryApi for HttpPantryApi {
    async fn upload_image(
        &self,
        user_id: &str,
        kind: UploadKind,
        file_name: &str,
        image: Vec<u8>,
    ) -> Result<String, ApiError> {
        let mime = upload_mime(&image);
        let part = multipart::Part::bytes(image)
            .file_name(file_name.to_string())
            .mime_str(mime)
            .map_err(ApiError::Http)?;
        let form = multipart::Form::new().part("file", part);

        let kind = kind.to_string();
        let response = self
            .http
            .post(self.url("/upload/"))
            .query(&[("user_id", user_id), ("upload_type", kind.as_str())])
            .multipart(form)
            .send()
            .await
            .map_err(ApiError::Http)?;

        let submitted: SubmitResponse = Self::decode(response).await?;
        Ok(submitted.job_id)
    }

    async fn job_status(&self, job_id: &str) -> Result<StatusResponse, ApiError> {
        let response = self
            .http
            .get(self.url(&format!("/upload/status/{}", job_id)))
            .send()
            .await
            .map_err(ApiError::Http)?;
        Self::decode(response).await
    }

    async fn create_stock(&self, item: &StockPayload) -> Result<(), ApiError> {
        let response = self
            .http
            .post(self.url("/stock/"))
            .json(item)
            .send()
            .await
            .map_err(ApiError::Http)?;
        Self::check(response).await?;
        Ok(())
    }

    async fn create_stock_batch(&self, items: &[StockPayload]) -> Result<(), ApiError> {
        let response = self
            .http
            .post(self.url("/stock/batch"))
            .json(items)
            .send()
            .await
            .map_err(ApiError::Http)?;
        Self::check(response).await?;
        Ok(())
    }

    async fn update_stock(&self, stock_id: &str, item: &StockPayload) -> Result<(), ApiError> {
        let response = self
            .http
            .put(self.url(&format!("/stock/{}", stock_id)))
            .json(item)
            .send()
            .await
            .map_err(ApiError::Http)?;
        Self::check(response).await?;
        Ok(())
    }

    async fn list_stock(&self, user_id: &str) -> Result<Vec<StockRecord>, ApiError> {
        let response = self
            .http
            .get(self.url(&format!("/stock/{}", user_id)))
            .send()
            .await
            .map_err(ApiError::Http)?;
        Self::decode(response).await
    }

    async fn create_meal(&self, meal: &MealPayload) -> Result<MealLogResponse, ApiError> {
        let response = self
            .http
            .post(self.url("/meals/"))
            .json(meal)
            .send()
            .await
            .map_err(ApiError::Http)?;
        Self::decode(response).await
    }

    async fn update_meal(&self, meal_id: &str, meal: &MealPayload) -> Result<(), ApiError> {
        let response = self
            .http
            .put(self.url(&format!("/meals/{}", meal_id)))
            .json(meal)
            .send()
            .await
            .map_err(ApiError::Http)?;
        Self::check(response).await?;
        Ok(())
    }

    async fn estimate_meal(&self, meal_name: &str) -> Result<MealEstimate, ApiError> {
        let response = self
            .http
            .post(self.url("/meals/estimate"))
            .json(&EstimateRequest {
                meal_name: meal_name.to_string(),
            })
            .send()
            .await
            .map_err(ApiError::Http)?;
        Self::decode(response).await
    }
}

/// Content type for upload bytes: compressed uploads are JPEG, pass-through bytes keep
/// whatever format they sniff as.
fn upload_mime(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

/// Pull a readable message out of an error body. FastAPI puts it under `detail`,
/// which may itself be structured.
fn extract_detail(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => match map.get("detail") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => body.to_string(),
        },
        _ => body.to_string(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {detail}")]
    Status { status: StatusCode, detail: String },

    #[error("Failed to decode server response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// Network-level failures a user can simply retry.
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Http(_))
    }
}
