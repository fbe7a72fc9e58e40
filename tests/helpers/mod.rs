//! Test helper utilities: an in-memory pantry backend.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use pantry_ingest::models::job::{StatusResponse, UploadKind};
use pantry_ingest::models::payload::{
    MealEstimate, MealLogResponse, MealPayload, StockPayload, StockRecord,
};
use pantry_ingest::services::api::{ApiError, PantryApi};
use pantry_ingest::services::compress::CompressionSettings;
use pantry_ingest::services::session::IngestSession;
use pantry_ingest::services::upload::PollPolicy;

pub const USER_ID: &str = "user-1";

/// One recorded `POST /upload/`.
#[derive(Debug, Clone)]
pub struct UploadCall {
    pub user_id: String,
    pub kind: UploadKind,
    pub file_name: String,
    pub bytes: usize,
}

/// Scripted stand-in for the backend. Status replies are consumed in order; the last
/// one repeats once the script runs out.
#[derive(Default)]
pub struct FakePantryApi {
    pub job_id: Mutex<String>,
    pub fail_upload: Mutex<bool>,
    statuses: Mutex<VecDeque<Result<StatusResponse, String>>>,
    last_status: Mutex<Option<StatusResponse>>,
    pub status_calls: AtomicUsize,
    pub uploads: Mutex<Vec<UploadCall>>,
    pub stock_created: Mutex<Vec<StockPayload>>,
    pub stock_batches: Mutex<Vec<Vec<StockPayload>>>,
    pub stock_updates: Mutex<Vec<(String, StockPayload)>>,
    pub meals_created: Mutex<Vec<MealPayload>>,
    pub meal_updates: Mutex<Vec<(String, MealPayload)>>,
    pub stock_records: Mutex<Vec<StockRecord>>,
    pub list_stock_calls: AtomicUsize,
    /// Item or meal names whose create call fails with a 500.
    pub failing_names: Mutex<HashSet<String>>,
    /// Artificial latency for create calls, to observe concurrency.
    pub write_delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakePantryApi {
    pub fn new() -> Arc<Self> {
        let api = Self::default();
        *api.job_id.lock().unwrap() = "abc123".to_string();
        Arc::new(api)
    }

    pub fn script_statuses(&self, statuses: Vec<StatusResponse>) {
        let mut queue = self.statuses.lock().unwrap();
        queue.extend(statuses.into_iter().map(Ok));
    }

    /// Make the next status call fail at the transport level.
    pub fn script_status_failure(&self, message: &str) {
        self.statuses.lock().unwrap().push_back(Err(message.to_string()));
    }

    pub fn fail_writes_for(&self, name: &str) {
        self.failing_names.lock().unwrap().insert(name.to_string());
    }

    pub fn clear_write_failures(&self) {
        self.failing_names.lock().unwrap().clear();
    }

    pub fn set_known_stock(&self, names: &[&str]) {
        *self.stock_records.lock().unwrap() = names
            .iter()
            .map(|n| StockRecord {
                stock_id: None,
                item_name: n.to_string(),
                quantity: None,
                category: None,
            })
            .collect();
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.stock_created.lock().unwrap().len() + self.meals_created.lock().unwrap().len()
    }

    async fn write(&self, name: &str) -> Result<(), ApiError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.write_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_names.lock().unwrap().contains(name) {
            return Err(server_error("database unavailable"));
        }
        Ok(())
    }
}

pub fn server_error(detail: &str) -> ApiError {
    ApiError::Status {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        detail: detail.to_string(),
    }
}

#[async_trait]
impl PantryApi for FakePantryApi {
    async fn upload_image(
        &self,
        user_id: &str,
        kind: UploadKind,
        file_name: &str,
        image: Vec<u8>,
    ) -> Result<String, ApiError> {
        if *self.fail_upload.lock().unwrap() {
            return Err(server_error("upload rejected"));
        }
        self.uploads.lock().unwrap().push(UploadCall {
            user_id: user_id.to_string(),
            kind,
            file_name: file_name.to_string(),
            bytes: image.len(),
        });
        Ok(self.job_id.lock().unwrap().clone())
    }

    async fn job_status(&self, _job_id: &str) -> Result<StatusResponse, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.statuses.lock().unwrap().pop_front();
        match next {
            Some(Ok(status)) => {
                *self.last_status.lock().unwrap() = Some(status.clone());
                Ok(status)
            }
            Some(Err(message)) => Err(server_error(&message)),
            None => Ok(self
                .last_status
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(StatusResponse::processing)),
        }
    }

    async fn create_stock(&self, item: &StockPayload) -> Result<(), ApiError> {
        self.write(&item.item_name).await?;
        self.stock_created.lock().unwrap().push(item.clone());
        Ok(())
    }

    async fn create_stock_batch(&self, items: &[StockPayload]) -> Result<(), ApiError> {
        for item in items {
            if self.failing_names.lock().unwrap().contains(&item.item_name) {
                return Err(server_error("batch rejected"));
            }
        }
        self.stock_batches.lock().unwrap().push(items.to_vec());
        Ok(())
    }

    async fn update_stock(&self, stock_id: &str, item: &StockPayload) -> Result<(), ApiError> {
        self.stock_updates
            .lock()
            .unwrap()
            .push((stock_id.to_string(), item.clone()));
        Ok(())
    }

    async fn list_stock(&self, _user_id: &str) -> Result<Vec<StockRecord>, ApiError> {
        self.list_stock_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.stock_records.lock().unwrap().clone())
    }

    async fn create_meal(&self, meal: &MealPayload) -> Result<MealLogResponse, ApiError> {
        self.write(&meal.name).await?;
        let mut meals = self.meals_created.lock().unwrap();
        meals.push(meal.clone());
        Ok(MealLogResponse {
            meal_id: Some(serde_json::json!(meals.len())),
            deduction_report: vec![format!("Logged {}", meal.name)],
        })
    }

    async fn update_meal(&self, meal_id: &str, meal: &MealPayload) -> Result<(), ApiError> {
        self.meal_updates
            .lock()
            .unwrap()
            .push((meal_id.to_string(), meal.clone()));
        Ok(())
    }

    async fn estimate_meal(&self, _meal_name: &str) -> Result<MealEstimate, ApiError> {
        Ok(serde_json::from_value(serde_json::json!({
            "ingredients": [{"item": "Lentils", "qty": "80g"}, {"item": "Turmeric", "qty": "2g"}],
            "nutrition": {"calories": 320, "protein": 18, "carbs": 50, "fat": 4}
        }))
        .expect("estimate fixture"))
    }
}

/// Session wired to the fake with the baseline fixed 2 s poll.
pub fn session(api: &Arc<FakePantryApi>) -> IngestSession {
    session_with(api, PollPolicy::fixed(Duration::from_millis(2000)), 8)
}

pub fn session_with(api: &Arc<FakePantryApi>, policy: PollPolicy, concurrency: usize) -> IngestSession {
    let api: Arc<dyn PantryApi> = api.clone();
    IngestSession::with_settings(api, USER_ID, policy, CompressionSettings::default(), concurrency)
}

/// A small PNG photo stand-in.
pub fn sample_image(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([90, 160, 60]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .expect("encode sample image");
    buf.into_inner()
}
