//! OAuth 2.0 for the Google Sheets API.
//!
//! `TokenProvider` loads the client credentials and the saved tokens, refreshes the access token
//! when it is about to expire and persists the refreshed token. `TokenProvider::initialize` runs
//! the consent flow: it prints the Google consent URL and waits for the redirect on a local
//! listener.

use crate::error::Res;
use crate::mirror::files::{File, SecretFile, TokenFile};
use crate::mirror::OAUTH_SCOPES;
use anyhow::{bail, ensure, Context};
use chrono::{DateTime, Utc};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, info};

/// How long the consent flow waits for the browser to come back.
const CONSENT_TIMEOUT: Duration = Duration::from_secs(300);

const CALLBACK_PAGE: &str = "Authorization received. You can close this window and return to \
the terminal.";

type OAuthClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Holds the OAuth client credentials and the token file, and hands out access tokens.
#[derive(Debug, Clone)]
pub(crate) struct TokenProvider {
    secret: SecretFile,
    token: File<TokenFile>,
}

impl TokenProvider {
    /// Runs the consent flow and saves the received tokens to `token_path`. This is the only
    /// place that asks the user to open a browser.
    pub(crate) async fn initialize(secret_path: &Path, token_path: &Path) -> Res<Self> {
        let secret = SecretFile::load(secret_path).await.context(
            "The OAuth client secret file is required. Download it from Google Cloud Console and \
            pass it to 'budget init --client-secret'",
        )?;
        let token = consent(&secret).await?;
        let token = File::new(token_path, token);
        token.save().await?;
        info!("Tokens saved to {}", token.path().display());
        Ok(Self { secret, token })
    }

    /// Loads existing credentials and tokens without any user interaction.
    pub(crate) async fn load(secret_path: &Path, token_path: &Path) -> Res<Self> {
        let secret = SecretFile::load(secret_path).await?;
        let token: File<TokenFile> = File::load(token_path).await.with_context(|| {
            format!(
                "Unable to read the OAuth token file '{}', run 'budget auth'",
                token_path.display()
            )
        })?;
        token.data().validate_scopes()?;
        Ok(Self { secret, token })
    }

    /// Exchanges the refresh token for a new access token and saves it.
    pub(crate) async fn refresh(&mut self) -> Res<()> {
        let client = oauth_client(&self.secret)?;
        let http = http_client()?;
        let refresh_token = RefreshToken::new(self.token.data().refresh_token().to_string());
        let response = client
            .exchange_refresh_token(&refresh_token)
            .request_async(&http)
            .await
            .context("Failed to refresh the OAuth token")?;
        self.token.data_mut().update(
            response.access_token().secret().clone(),
            expires_at(response.expires_in()),
            response.refresh_token().map(|t| t.secret().clone()),
        );
        self.token.save().await?;
        debug!("Token refreshed, valid until {}", self.expires_at());
        Ok(())
    }

    /// The current access token, refreshed first if it is expired or about to expire.
    pub(crate) async fn token_with_refresh(&mut self) -> Res<String> {
        if self.token.data().is_expired() {
            self.refresh().await?;
        }
        Ok(self.token().to_string())
    }

    pub(crate) fn token(&self) -> &str {
        self.token.data().access_token()
    }

    pub(crate) fn expires_at(&self) -> DateTime<Utc> {
        self.token.data().expires_at()
    }
}

fn oauth_client(secret: &SecretFile) -> Res<OAuthClient> {
    let auth_url = AuthUrl::new(secret.auth_uri().to_string())
        .context("Invalid auth_uri in the client secret file")?;
    let token_url = TokenUrl::new(secret.token_uri().to_string())
        .context("Invalid token_uri in the client secret file")?;
    Ok(BasicClient::new(ClientId::new(secret.client_id().to_string()))
        .set_client_secret(ClientSecret::new(secret.client_secret().to_string()))
        .set_auth_uri(auth_url)
        .set_token_uri(token_url))
}

fn http_client() -> Res<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .context("Unable to build the HTTP client for OAuth")
}

fn expires_at(expires_in: Option<Duration>) -> DateTime<Utc> {
    let expires_in = expires_in.unwrap_or(Duration::from_secs(3600));
    Utc::now() + chrono::Duration::from_std(expires_in).unwrap_or(chrono::Duration::hours(1))
}

async fn consent(secret: &SecretFile) -> Res<TokenFile> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .context("Unable to start the local OAuth redirect listener")?;
    let port = listener.local_addr()?.port();
    let redirect = RedirectUrl::new(format!("http://127.0.0.1:{port}"))
        .context("Invalid OAuth redirect URL")?;
    let client = oauth_client(secret)?.set_redirect_uri(redirect);

    let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
    let (auth_url, csrf) = client
        .authorize_url(CsrfToken::new_random)
        .add_scopes(OAUTH_SCOPES.iter().map(|s| Scope::new(s.to_string())))
        .add_extra_param("access_type", "offline")
        .add_extra_param("prompt", "consent")
        .set_pkce_challenge(challenge)
        .url();

    info!("Open this URL in your browser to allow access to your Google sheet:\n\n{auth_url}\n");
    info!("Waiting for the redirect on http://127.0.0.1:{port}");

    let query = tokio::time::timeout(CONSENT_TIMEOUT, wait_for_redirect(listener))
        .await
        .context("Timed out waiting for the OAuth consent")??;
    let params: HashMap<String, String> = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    if let Some(error) = params.get("error") {
        bail!("The OAuth consent was not granted: {error}");
    }
    let state = params
        .get("state")
        .context("The OAuth redirect is missing 'state'")?;
    ensure!(
        state == csrf.secret(),
        "The OAuth redirect 'state' does not match the request"
    );
    let code = params
        .get("code")
        .context("The OAuth redirect is missing 'code'")?;

    let http = http_client()?;
    let response = client
        .exchange_code(AuthorizationCode::new(code.clone()))
        .set_pkce_verifier(verifier)
        .request_async(&http)
        .await
        .context("Failed to exchange the authorization code for tokens")?;
    let refresh_token = response
        .refresh_token()
        .context("Google did not return a refresh token")?
        .secret()
        .clone();
    let scopes = response
        .scopes()
        .map(|scopes| scopes.iter().map(|s| s.as_str().to_string()).collect())
        .unwrap_or_else(|| OAUTH_SCOPES.iter().map(|s| s.to_string()).collect());

    info!("Authorization successful");
    Ok(TokenFile::new(
        scopes,
        response.access_token().secret().clone(),
        refresh_token,
        expires_at(response.expires_in()),
    ))
}

/// Serves connections on `listener` until one carries the OAuth redirect, and returns its query
/// string. Other requests (e.g. `/favicon.ico`) get the same page and are otherwise ignored.
async fn wait_for_redirect(listener: TcpListener) -> Res<String> {
    loop {
        let (stream, _) = listener
            .accept()
            .await
            .context("The OAuth redirect listener failed")?;
        let (tx, rx) = oneshot::channel::<String>();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let service = service_fn(move |request: Request<Incoming>| {
            let tx = tx.clone();
            async move {
                let query = request.uri().query().unwrap_or_default().to_string();
                let sender = tx.lock().unwrap_or_else(|e| e.into_inner()).take();
                if let Some(sender) = sender {
                    let _ = sender.send(query);
                }
                Ok::<_, Infallible>(Response::new(CALLBACK_PAGE.to_string()))
            }
        });

        let mut builder = http1::Builder::new();
        builder.keep_alive(false);
        if let Err(e) = builder
            .serve_connection(TokioIo::new(stream), service)
            .await
        {
            debug!("OAuth redirect connection error: {e}");
        }

        match rx.await {
            Ok(query) if query.contains("code=") || query.contains("error=") => return Ok(query),
            _ => continue,
        }
    }
}
