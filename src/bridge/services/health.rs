use poem_openapi::payload::PlainText;

use crate::auth::{CookieCredentials, CredentialSource};

use super::session::SessionRegistry;

pub struct HealthService<'a> {
	pub sessions: &'a SessionRegistry,
	pub credentials: &'a CookieCredentials,
}

impl<'a> HealthService<'a> {
	pub fn new(sessions: &'a SessionRegistry, credentials: &'a CookieCredentials) -> Self {
		Self { sessions, credentials }
	}

	#[tracing::instrument(level = "debug", skip(self))]
	pub async fn status_text(&self) -> PlainText<String> {
		PlainText(format!(
			"reader bridge version={} sessions={} signed_in={}",
			env!("CARGO_PKG_VERSION"),
			self.sessions.len().await,
			self.credentials.current().is_some()
		))
	}
}
