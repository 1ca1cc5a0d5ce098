// Mapping from StudyDocs DTOs to domain models

use super::models::{ClientHints, DocumentId, ServerPosition};
use crate::api_client::{ContinueItem, OpenDocumentResponse};

impl OpenDocumentResponse {
    pub fn server_position(&self) -> ServerPosition {
        ServerPosition {
            last_page: self.last_page,
            percent: self.percent,
            total_pages: self.total_pages,
        }
    }
}

/// Viewer route for a document, with `?page=` when a last page is known.
pub fn viewer_path(document_id: DocumentId, last_page: Option<i64>) -> String {
    match last_page.filter(|p| *p > 0) {
        Some(page) => format!("/viewer/{}?page={}", document_id, page),
        None => format!("/viewer/{}", document_id),
    }
}

impl ContinueItem {
    pub fn viewer_path(&self) -> String {
        viewer_path(self.document_id, self.last_page)
    }

    /// Hints a "continue reading" card hands to the viewer it opens.
    pub fn resume_hints(&self) -> ClientHints {
        ClientHints {
            url_page: self
                .last_page
                .filter(|p| *p > 0)
                .map(|p| p.to_string()),
            hinted_page: self.last_page,
            hinted_percent: self.percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(last_page: Option<i64>, percent: Option<i64>) -> ContinueItem {
        ContinueItem {
            document_id: 31,
            title: "Calculus II".into(),
            file_path: None,
            last_page,
            percent,
            last_read_at: None,
        }
    }

    #[test]
    fn viewer_path_carries_page() {
        assert_eq!(item(Some(14), Some(47)).viewer_path(), "/viewer/31?page=14");
        assert_eq!(item(Some(0), None).viewer_path(), "/viewer/31");
        assert_eq!(item(None, None).viewer_path(), "/viewer/31");
    }

    #[test]
    fn continue_item_hints() {
        let hints = item(Some(14), Some(47)).resume_hints();
        assert_eq!(hints.url_page.as_deref(), Some("14"));
        assert_eq!(hints.hinted_page, Some(14));
        assert_eq!(hints.hinted_percent, Some(47));

        let hints = item(None, Some(30)).resume_hints();
        assert_eq!(hints.url_page, None);
        assert_eq!(hints.hinted_percent, Some(30));
    }
}
