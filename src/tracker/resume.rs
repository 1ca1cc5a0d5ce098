//! Initial scroll target for a freshly opened document.
//!
//! Hint priority, first usable one wins:
//! 1. `page` query parameter
//! 2. page carried in navigation state
//! 3. last page recorded by the backend
//! 4. percent carried in navigation state
//! 5. last percent recorded by the backend

use crate::domain::models::{
    ClientHints, DocumentId, ServerPosition, clamp_page, page_for_percent,
};

/// Where the backend keeps the reader's last position.
#[async_trait::async_trait]
pub trait PositionSource: Send + Sync {
    async fn last_position(&self, document_id: DocumentId) -> anyhow::Result<ServerPosition>;
}

/// Layout constants of the page list, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    /// Margin around each page canvas.
    pub canvas_margin: f64,
    /// Gap below each page block.
    pub block_gap: f64,
    /// Top padding of the page list.
    pub list_padding_top: f64,
    /// Space left above the target page after scrolling.
    pub scroll_lead: f64,
}

impl Default for PageGeometry {
    fn default() -> Self {
        PageGeometry {
            canvas_margin: 24.0,
            block_gap: 24.0,
            list_padding_top: 24.0,
            scroll_lead: 12.0,
        }
    }
}

impl PageGeometry {
    /// Scroll offset that brings `page` to the top, assuming uniform page blocks.
    pub fn scroll_top(&self, page: u32, canvas_height: f64) -> f64 {
        let block = canvas_height + self.canvas_margin * 2.0;
        let offset = self.list_padding_top + f64::from(page.saturating_sub(1)) * (block + self.block_gap);
        (offset - self.scroll_lead).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResumeTarget {
    pub page: u32,
    pub scroll_top: f64,
}

/// Numeric `page` query values are truncated toward zero; huge values saturate.
fn parse_url_page(raw: &str) -> Option<i64> {
    let value = raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())?;
    Some(value.trunc() as i64)
}

/// Pick the resume page from the available hints. `None` means start at the top.
pub fn resolve_page(
    client: &ClientHints,
    server: Option<&ServerPosition>,
    total_pages: u32,
) -> Option<u32> {
    if total_pages == 0 {
        return None;
    }
    let url_page = client.url_page.as_deref().and_then(parse_url_page);
    let server_page = server.and_then(|s| s.last_page);
    let server_percent = server.and_then(|s| s.percent);

    url_page
        .or(client.hinted_page)
        .or(server_page)
        .map(|page| clamp_page(page, total_pages))
        .or_else(|| {
            client
                .hinted_percent
                .or(server_percent)
                .map(|pct| page_for_percent(pct, total_pages))
        })
}

/// Runs the resolution once per opened document.
#[derive(Debug)]
pub struct ResumeResolver {
    hints: ClientHints,
    server: Option<ServerPosition>,
    geometry: PageGeometry,
    done: bool,
}

impl ResumeResolver {
    pub fn new(hints: ClientHints, geometry: PageGeometry) -> Self {
        Self {
            hints,
            server: None,
            geometry,
            done: false,
        }
    }

    /// Record the position fetched from the backend; ignored once resolution ran.
    pub fn set_server_position(&mut self, position: ServerPosition) {
        if !self.done {
            self.server = Some(position);
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Resolve the scroll target if the layout is known and resolution has not run yet.
    ///
    /// Without pages or a measured canvas height nothing happens and a later call
    /// may still resolve.
    pub fn try_resolve(&mut self, total_pages: u32, canvas_height: f64) -> Option<ResumeTarget> {
        if self.done || total_pages == 0 || canvas_height.is_nan() || canvas_height <= 0.0 {
            return None;
        }
        self.done = true;
        let page = resolve_page(&self.hints, self.server.as_ref(), total_pages)?;
        let target = ResumeTarget {
            page,
            scroll_top: self.geometry.scroll_top(page, canvas_height),
        };
        tracing::debug!(page, scroll_top = target.scroll_top, "resume target resolved");
        Some(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_hints() -> (ClientHints, ServerPosition) {
        (
            ClientHints {
                url_page: Some("7".into()),
                hinted_page: Some(5),
                hinted_percent: Some(90),
            },
            ServerPosition {
                last_page: Some(3),
                percent: Some(20),
                total_pages: Some(20),
            },
        )
    }

    #[test]
    fn priority_order() {
        let (mut client, mut server) = all_hints();
        assert_eq!(resolve_page(&client, Some(&server), 20), Some(7));

        client.url_page = None;
        assert_eq!(resolve_page(&client, Some(&server), 20), Some(5));

        client.hinted_page = None;
        assert_eq!(resolve_page(&client, Some(&server), 20), Some(3));

        server.last_page = None;
        assert_eq!(resolve_page(&client, Some(&server), 20), Some(18));

        client.hinted_percent = None;
        assert_eq!(resolve_page(&client, Some(&server), 20), Some(4));

        server.percent = None;
        assert_eq!(resolve_page(&client, Some(&server), 20), None);
    }

    #[test]
    fn unparsable_url_page_falls_through() {
        let (mut client, server) = all_hints();
        client.url_page = Some("abc".into());
        assert_eq!(resolve_page(&client, Some(&server), 20), Some(5));
    }

    #[test]
    fn fractional_url_page_is_truncated() {
        let client = ClientHints {
            url_page: Some("3.5".into()),
            hinted_page: Some(9),
            ..Default::default()
        };
        assert_eq!(resolve_page(&client, None, 20), Some(3));
    }

    #[test]
    fn oversized_url_page_clamps_to_last_page() {
        let client = ClientHints {
            url_page: Some("99999999999999999999".into()),
            hinted_page: Some(9),
            ..Default::default()
        };
        assert_eq!(resolve_page(&client, None, 20), Some(20));

        let client = ClientHints {
            url_page: Some("inf".into()),
            hinted_page: Some(9),
            ..Default::default()
        };
        assert_eq!(resolve_page(&client, None, 20), Some(9));
    }

    #[test]
    fn missing_server_position_falls_through() {
        let client = ClientHints {
            hinted_percent: Some(50),
            ..Default::default()
        };
        assert_eq!(resolve_page(&client, None, 10), Some(5));
    }

    #[test]
    fn hints_are_clamped() {
        let client = ClientHints {
            url_page: Some("99".into()),
            ..Default::default()
        };
        assert_eq!(resolve_page(&client, None, 12), Some(12));

        let client = ClientHints {
            hinted_page: Some(-4),
            ..Default::default()
        };
        assert_eq!(resolve_page(&client, None, 12), Some(1));
    }

    #[test]
    fn scroll_offset_uses_uniform_blocks() {
        let g = PageGeometry::default();
        assert_eq!(g.scroll_top(1, 800.0), 12.0);
        // 24 + 2 * (800 + 48 + 24) - 12
        assert_eq!(g.scroll_top(3, 800.0), 1756.0);
    }

    #[test]
    fn resolves_only_once() {
        let (client, server) = all_hints();
        let mut resolver = ResumeResolver::new(client, PageGeometry::default());
        resolver.set_server_position(server);

        let target = resolver.try_resolve(20, 800.0).unwrap();
        assert_eq!(target.page, 7);
        assert!(resolver.is_done());
        assert_eq!(resolver.try_resolve(20, 900.0), None);
    }

    #[test]
    fn waits_for_layout() {
        let (client, _) = all_hints();
        let mut resolver = ResumeResolver::new(client, PageGeometry::default());
        assert_eq!(resolver.try_resolve(0, 800.0), None);
        assert_eq!(resolver.try_resolve(20, 0.0), None);
        assert!(!resolver.is_done());
        assert!(resolver.try_resolve(20, 800.0).is_some());
    }

    #[test]
    fn no_hints_consumes_guard() {
        let mut resolver = ResumeResolver::new(ClientHints::default(), PageGeometry::default());
        assert_eq!(resolver.try_resolve(10, 800.0), None);
        assert!(resolver.is_done());

        resolver.set_server_position(ServerPosition {
            last_page: Some(4),
            ..Default::default()
        });
        assert_eq!(resolver.try_resolve(10, 800.0), None);
    }
}
