use poem_openapi::payload::Json;

use crate::{
	auth::CookieCredentials,
	bridge::models::{AuthResponse, CredentialsRequest, ErrorDto},
};

pub struct AuthService<'a> {
	pub credentials: &'a CookieCredentials,
}

impl<'a> AuthService<'a> {
	pub fn new(credentials: &'a CookieCredentials) -> Self {
		Self { credentials }
	}

	#[tracing::instrument(level = "debug", skip(self, body))]
	pub fn sign_in(&self, body: CredentialsRequest) -> AuthResponse {
		let access_token = body.access_token.trim();
		if access_token.is_empty() {
			return AuthResponse::BadRequest(Json(ErrorDto { message: "accessToken must not be empty".into() }));
		}
		let xsrf_token = body.xsrf_token.as_deref().map(str::trim).filter(|t| !t.is_empty());
		self.credentials.sign_in(access_token, xsrf_token);
		AuthResponse::NoContent
	}

	#[tracing::instrument(level = "debug", skip(self))]
	pub fn sign_out(&self) -> AuthResponse {
		self.credentials.sign_out();
		AuthResponse::NoContent
	}
}
