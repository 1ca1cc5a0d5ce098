// Domain models shared by the tracker, the API client and the bridge

use serde::Serialize;

pub type DocumentId = i64;

/// One reading-progress upsert, as sent to `/recent-views/upsert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingProgress {
    pub document_id: DocumentId,
    pub last_page: u32,
    pub percent: u8,
    pub session_read_seconds: u64,
}

impl ReadingProgress {
    /// Build a record for `page`, clamping it into the document and deriving `percent`.
    ///
    /// `total_pages` must be at least 1.
    pub fn at_page(
        document_id: DocumentId,
        page: i64,
        total_pages: u32,
        session_read_seconds: u64,
    ) -> Self {
        let last_page = clamp_page(page, total_pages);
        ReadingProgress {
            document_id,
            last_page,
            percent: percent_for_page(last_page, total_pages),
            session_read_seconds,
        }
    }
}

/// Clamp a reported page into `[1, total_pages]`.
pub fn clamp_page(page: i64, total_pages: u32) -> u32 {
    let max = i64::from(total_pages.max(1));
    page.clamp(1, max) as u32
}

/// `round(page / total_pages * 100)`, capped at 100.
pub fn percent_for_page(page: u32, total_pages: u32) -> u8 {
    if total_pages == 0 {
        return 0;
    }
    let pct = (f64::from(page) / f64::from(total_pages) * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Convert a percent hint into a page: `max(1, round(percent / 100 * total_pages))`, clamped.
pub fn page_for_percent(percent: i64, total_pages: u32) -> u32 {
    let pct = percent.clamp(0, 100) as f64;
    let page = ((pct / 100.0) * f64::from(total_pages)).round() as i64;
    clamp_page(page.max(1), total_pages)
}

/// Resume hints handed over by whoever opened the viewer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientHints {
    /// Raw `page` query parameter; unparsable values are ignored.
    pub url_page: Option<String>,
    pub hinted_page: Option<i64>,
    pub hinted_percent: Option<i64>,
}

/// Last known position recorded by the backend, fetched when the document is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerPosition {
    pub last_page: Option<i64>,
    pub percent: Option<i64>,
    pub total_pages: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_bounded_for_every_page() {
        for total in 1..=250u32 {
            for page in 1..=total {
                let pct = percent_for_page(page, total);
                assert!(pct <= 100, "page {page}/{total} gave {pct}");
                assert_eq!(pct, percent_for_page(page, total));
            }
            assert_eq!(percent_for_page(total, total), 100);
        }
    }

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(percent_for_page(1, 8), 13); // 12.5
        assert_eq!(percent_for_page(1, 3), 33);
        assert_eq!(percent_for_page(2, 3), 67);
    }

    #[test]
    fn clamps_reported_pages() {
        let low = ReadingProgress::at_page(7, -3, 10, 0);
        assert_eq!(low.last_page, 1);
        assert_eq!(low.percent, 10);

        let high = ReadingProgress::at_page(7, 57, 10, 0);
        assert_eq!(high.last_page, 10);
        assert_eq!(high.percent, 100);

        assert_eq!(clamp_page(0, 10), 1);
    }

    #[test]
    fn percent_hint_maps_to_page() {
        assert_eq!(page_for_percent(0, 40), 1);
        assert_eq!(page_for_percent(50, 40), 20);
        assert_eq!(page_for_percent(250, 40), 40);
        assert_eq!(page_for_percent(-10, 40), 1);
        assert_eq!(page_for_percent(1, 10), 1);
    }

    #[test]
    fn serializes_camel_case() {
        let p = ReadingProgress::at_page(42, 3, 12, 17);
        let json = serde_json::to_value(p).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "documentId": 42,
                "lastPage": 3,
                "percent": 25,
                "sessionReadSeconds": 17
            })
        );
    }
}
