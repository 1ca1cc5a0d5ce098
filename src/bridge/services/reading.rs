use poem_openapi::payload::Json;

use crate::{
	api_client::{ContinueItem, StudyDocsClient},
	bridge::models::{ContinueReadingDto, ContinueReadingResponse, DocumentDto, DocumentResponseDto, ErrorDto},
	domain::models::DocumentId,
};

const CARD_THUMBNAIL_WIDTH: u32 = 400;

pub struct ReadingService<'a> {
	pub client: &'a StudyDocsClient,
}

impl<'a> ReadingService<'a> {
	pub fn new(client: &'a StudyDocsClient) -> Self {
		Self { client }
	}

	#[tracing::instrument(level = "debug", skip(self))]
	pub async fn get_document(&self, document_id: DocumentId) -> DocumentResponseDto {
		match self.client.get_document(document_id).await {
			Ok(doc) => DocumentResponseDto::Ok(Json(DocumentDto {
				document_id: doc.document_id,
				title: doc.title,
				subject_name: doc.subject_name,
				uploader_id: doc.user_id,
				uploader_name: doc.user_name,
				thumbnail_url: self.client.thumbnail_url(doc.document_id, 1, CARD_THUMBNAIL_WIDTH),
			})),
			Err(e) => {
				tracing::error!(error = %e, document_id, "failed to load document");
				DocumentResponseDto::BadGateway(Json(ErrorDto { message: format!("Failed to load document: {}", e) }))
			}
		}
	}

	#[tracing::instrument(level = "debug", skip(self))]
	pub async fn continue_reading(&self, user_id: i64) -> ContinueReadingResponse {
		match self.client.get_continue_reading(user_id).await {
			Ok(items) => {
				let cards = items.iter().map(|item| self.card(item)).collect();
				ContinueReadingResponse::Ok(Json(cards))
			}
			Err(e) => {
				tracing::error!(error = %e, user_id, "failed to load continue reading list");
				ContinueReadingResponse::BadGateway(Json(ErrorDto { message: e.to_string() }))
			}
		}
	}

	fn card(&self, item: &ContinueItem) -> ContinueReadingDto {
		let hints = item.resume_hints();
		ContinueReadingDto {
			document_id: item.document_id,
			title: item.title.clone(),
			last_page: item.last_page,
			percent: item.percent,
			last_read_at: item.last_read_at,
			viewer_path: item.viewer_path(),
			thumbnail_url: self.client.thumbnail_url(item.document_id, 1, CARD_THUMBNAIL_WIDTH),
			hinted_page: hints.hinted_page,
			hinted_percent: hints.hinted_percent,
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use super::*;
	use crate::auth::CookieCredentials;

	#[test]
	fn maps_continue_item_to_card() {
		let client = StudyDocsClient::new("http://localhost:8080/api", Arc::new(CookieCredentials::new())).unwrap();
		let item: ContinueItem = serde_json::from_str(
			r#"{"documentId":31,"title":"Calculus II","filePath":"/files/31.pdf","lastPage":14,"percent":47,"lastReadAt":"2024-05-02T09:15:00Z"}"#,
		)
		.unwrap();

		let card = ReadingService::new(&client).card(&item);
		assert_eq!(card.viewer_path, "/viewer/31?page=14");
		assert_eq!(card.thumbnail_url, "http://localhost:8080/api/documents/31/thumbnail?page=1&width=400");
		assert_eq!(card.hinted_page, Some(14));
		assert_eq!(card.hinted_percent, Some(47));
		assert!(card.last_read_at.is_some());
	}

	#[tokio::test]
	async fn unreachable_backend_is_bad_gateway() {
		let client = StudyDocsClient::new("http://127.0.0.1:9", Arc::new(CookieCredentials::new())).unwrap();
		let resp = ReadingService::new(&client).get_document(7).await;
		assert!(matches!(resp, DocumentResponseDto::BadGateway(_)));
	}
}
