//! Runs a token manager against a mock Keycloak realm: background renewal, bearer headers for
//! outbound calls, and an orderly shutdown that ends the provider session.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use time::Duration;
// self
use token_lifecycle::{
	auth::{Credentials, Realm},
	config::ManagerConfig,
	manager::ReqwestTokenManager,
	provider::{IdentityProvider, PathLayout},
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/realms/demo/protocol/openid-connect/token")
				.body_includes("grant_type=password");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"refresh_token\":\"demo-refresh\",\
				 \"token_type\":\"Bearer\",\"expires_in\":300}",
			);
		})
		.await;
	let logout_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/realms/demo/protocol/openid-connect/logout")
				.body_includes("refresh_token=demo-refresh");
			then.status(204);
		})
		.await;
	let provider = IdentityProvider::builder(Url::parse(&server.base_url())?, Realm::new("demo")?)
		.layout(PathLayout::Modern)
		.build()?;
	let credentials =
		Credentials::new("demo-gateway", "gateway", "demo-password")?.with_client_secret("secret");
	let manager = Arc::new(ReqwestTokenManager::new(
		provider,
		credentials,
		ManagerConfig::default().with_scopes(["openid"]),
	)?);
	let renewal = manager.spawn_renewal(Duration::seconds(30));

	match manager.authorization_header().await {
		Some(header) => println!("Attach to outbound requests: {header:?}."),
		None => println!("No token available; outbound calls would be rejected."),
	}

	println!("Token state: {:?}.", manager.token_info());

	renewal.stop().await;

	println!("Provider session ended: {}.", manager.shutdown().await);

	token_mock.assert_async().await;
	logout_mock.assert_async().await;

	Ok(())
}
