//! Serialization and deserialization structures for Google OAuth credential files.
//! - `client_secret.json`: OAuth 2.0 client credentials from Google Cloud Console
//! - `token.json`: the access and refresh tokens we received

use crate::error::Res;
use crate::mirror::OAUTH_SCOPES;
use crate::utils;
use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, Error};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// This redirect needs to be present in the OAuth credential file, or else OAuth will not work.
const REDIRECT: &str = "http://localhost";

/// A file that we hold in memory between loading and saving: the `path` and its `data`.
#[derive(Default, Debug, Clone)]
pub(super) struct File<F>
where
    F: Serialize + DeserializeOwned + Clone + Debug,
{
    path: PathBuf,
    data: F,
}

impl<F> File<F>
where
    F: Serialize + DeserializeOwned + Clone + Debug,
{
    pub(super) async fn load(path: impl Into<PathBuf>) -> Res<Self> {
        let path = path.into();
        let data: F = utils::deserialize(&path).await?;
        Ok(Self { path, data })
    }

    pub(super) fn new(path: impl Into<PathBuf>, data: F) -> Self {
        Self {
            path: path.into(),
            data,
        }
    }

    /// Saves the data as JSON, readable by the owner only.
    pub(super) async fn save(&self) -> Res<()> {
        let json =
            serde_json::to_string_pretty(&self.data).context("Failed to serialize data to JSON")?;
        utils::write(&self.path, json).await?;

        #[cfg(unix)]
        {
            use std::fs::Permissions;
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.path, Permissions::from_mode(0o600))
                .await
                .context("Failed to set file permissions")?;
        }

        Ok(())
    }

    pub(super) fn data(&self) -> &F {
        &self.data
    }

    pub(super) fn data_mut(&mut self) -> &mut F {
        &mut self.data
    }

    pub(super) fn path(&self) -> &Path {
        &self.path
    }
}

/// The `client_secret.json` file downloaded from Google Cloud Console. It holds OAuth 2.0 Desktop
/// Application credentials wrapped in an "installed" object.
///
/// Example:
/// ```json
/// {
///   "installed": {
///     "client_id": "YOUR_CLIENT_ID.apps.googleusercontent.com",
///     "client_secret": "YOUR_CLIENT_SECRET",
///     "redirect_uris": ["http://localhost"],
///     "auth_uri": "https://accounts.google.com/o/oauth2/auth",
///     "token_uri": "https://oauth2.googleapis.com/token"
///   }
/// }
/// ```
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(super) struct SecretFile {
    installed: InstalledCredentials,
}

impl SecretFile {
    pub(super) async fn load(path: &Path) -> Res<SecretFile> {
        utils::deserialize(path).await.with_context(|| {
            format!(
                "Unable to read the OAuth client secret file '{}'",
                path.display()
            )
        })
    }

    pub(super) fn client_id(&self) -> &str {
        &self.installed.client_id
    }

    pub(super) fn client_secret(&self) -> &str {
        &self.installed.client_secret
    }

    pub(super) fn auth_uri(&self) -> &str {
        &self.installed.auth_uri
    }

    pub(super) fn token_uri(&self) -> &str {
        &self.installed.token_uri
    }
}

#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
struct InstalledCredentials {
    client_id: String,
    client_secret: String,
    /// Must contain "http://localhost" (without a port number)
    redirect_uris: RedirectUris,
    auth_uri: String,
    token_uri: String,
}

#[derive(Default, Debug, Clone)]
struct RedirectUris(Vec<String>);

impl Serialize for RedirectUris {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RedirectUris {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let vec = Vec::<String>::deserialize(deserializer)?;
        if !vec.iter().any(|s| is_valid_redirect(s)) {
            return Err(D::Error::custom(format!(
                "At least one of the redirects needs to be {REDIRECT}, but this was not found. \
                When creating the OAuth client for your Google sheet, you must include \
                '{REDIRECT}'"
            )));
        }
        Ok(RedirectUris(vec))
    }
}

fn is_valid_redirect(s: &str) -> bool {
    s == REDIRECT || s == "http://127.0.0.1"
}

/// How we save the token information that we receive from Google OAuth.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(super) struct TokenFile {
    scopes: Vec<String>,
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
    id_token: Option<String>,
}

impl TokenFile {
    pub(super) fn new(
        scopes: Vec<String>,
        access_token: String,
        refresh_token: String,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            scopes,
            access_token,
            refresh_token,
            expires_at,
            id_token: None,
        }
    }

    pub(super) fn validate_scopes(&self) -> Res<()> {
        let found_scopes: HashSet<&str> = self.scopes.iter().map(|s| s.as_str()).collect();
        for &required_scope in OAUTH_SCOPES {
            if !found_scopes.contains(required_scope) {
                bail!("OAuth scope '{required_scope}' is missing.");
            }
        }
        Ok(())
    }

    pub(super) fn access_token(&self) -> &str {
        &self.access_token
    }

    pub(super) fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub(super) fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the token is expired or will expire within 5 minutes.
    pub(super) fn is_expired(&self) -> bool {
        let buffer = chrono::Duration::minutes(5);
        self.expires_at <= Utc::now() + buffer
    }

    pub(super) fn update(
        &mut self,
        access_token: String,
        expires_at: DateTime<Utc>,
        refresh_token: Option<String>,
    ) {
        self.access_token = access_token;
        self.expires_at = expires_at;
        if let Some(rt) = refresh_token {
            self.refresh_token = rt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn secret_json(redirects: &str) -> String {
        format!(
            r#"{{
    "installed": {{
        "client_id": "YOUR_CLIENT_ID.apps.googleusercontent.com",
        "client_secret": "YOUR_CLIENT_SECRET",
        "redirect_uris": {redirects},
        "auth_uri": "https://accounts.google.com/o/oauth2/auth",
        "token_uri": "https://oauth2.googleapis.com/token"
    }}
}}"#
        )
    }

    #[tokio::test]
    async fn test_client_secret_good_redirect() {
        let temp_dir = TempDir::new().unwrap();
        let p = temp_dir.path().join("file.json");
        let json = secret_json(r#"["http://localhost", "https://example.com:4040/whatever"]"#);
        utils::write(&p, json).await.unwrap();
        let secret_file = SecretFile::load(&p).await.unwrap();
        assert_eq!(
            secret_file.client_id(),
            "YOUR_CLIENT_ID.apps.googleusercontent.com"
        );
        assert_eq!(secret_file.token_uri(), "https://oauth2.googleapis.com/token");
    }

    #[tokio::test]
    async fn test_client_secret_loopback_ip_redirect() {
        let temp_dir = TempDir::new().unwrap();
        let p = temp_dir.path().join("file.json");
        utils::write(&p, secret_json(r#"["http://127.0.0.1"]"#))
            .await
            .unwrap();
        assert!(SecretFile::load(&p).await.is_ok());
    }

    #[tokio::test]
    async fn test_client_secret_bad_redirect() {
        let temp_dir = TempDir::new().unwrap();
        let p = temp_dir.path().join("file.json");
        let json = secret_json(r#"["http://localhost:9900", "https://example.com:4040/whatever"]"#);
        utils::write(&p, json).await.unwrap();
        let parse_error = SecretFile::load(&p).await.unwrap_err();
        let parse_error_message = format!("{parse_error:?}");
        assert!(
            parse_error_message.contains("At least one of the redirects needs to be http://localhost")
        );
    }

    #[tokio::test]
    async fn test_token_file_scopes() {
        let json = r##"
        {
            "scopes": ["https://www.googleapis.com/auth/drive.readonly"],
            "access_token":"abc12",
            "refresh_token":"xyz89",
            "expires_at":"2025-01-01T00:00:00Z",
            "id_token":null
        }
        "##;
        let tmp = TempDir::new().unwrap();
        let json_path = tmp.path().join("file.json");
        utils::write(&json_path, json).await.unwrap();

        let file = File::<TokenFile>::load(&json_path).await.unwrap();
        let error_message = file.data().validate_scopes().unwrap_err().to_string();
        assert!(error_message.contains("https://www.googleapis.com/auth/spreadsheets"));
        assert!(file.data().is_expired());
    }

    #[tokio::test]
    async fn test_token_file_save_is_private() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("token.json");
        let expires_at = Utc::now() + chrono::Duration::hours(1);
        let mut file = File::new(
            &path,
            TokenFile::new(
                vec![OAUTH_SCOPES[0].to_string()],
                "a1".to_string(),
                "r1".to_string(),
                expires_at,
            ),
        );
        file.data_mut().update("a2".to_string(), expires_at, None);
        file.save().await.unwrap();

        let loaded = File::<TokenFile>::load(&path).await.unwrap();
        assert_eq!(loaded.data().access_token(), "a2");
        assert_eq!(loaded.data().refresh_token(), "r1");
        assert!(!loaded.data().is_expired());
        loaded.data().validate_scopes().unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
