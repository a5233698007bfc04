use std::sync::Arc;

use axum::{
    extract::Query,
    http::StatusCode,
    response::{IntoResponse, Redirect},
    Json,
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{
    config::OAuthConfig,
    entities::{Identity, SessionUser, User},
    error::AppError,
};

pub type AuthSession = axum_login::AuthSession<OAuthBackend>;

const CSRF_STATE_KEY: &str = "oauth.csrf-state";

const KAKAO_AUTHORIZE_URL: &str = "https://kauth.kakao.com/oauth/authorize";
const KAKAO_TOKEN_URL: &str = "https://kauth.kakao.com/oauth/token";
const KAKAO_USER_URL: &str = "https://kapi.kakao.com/v2/user/me";

/// What the provider tells us about the person who signed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider rejected the authorization code ({0})")]
    Rejected(StatusCode),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// An OAuth identity provider: where to send the browser, and how to turn the
/// authorization code it sends back into a profile.
#[async_trait::async_trait]
pub trait IdentityProvider: std::fmt::Debug + Send + Sync {
    fn authorize_url(&self, state: &str) -> Result<String, ProviderError>;

    async fn resolve(&self, code: &str) -> Result<ProviderProfile, ProviderError>;
}

#[derive(Debug, Clone)]
pub struct KakaoProvider {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl KakaoProvider {
    pub fn new(config: &OAuthConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct KakaoUser {
    id: i64,
    #[serde(default)]
    properties: Option<KakaoProperties>,
    #[serde(default)]
    kakao_account: Option<KakaoAccount>,
}

#[derive(Debug, Deserialize)]
struct KakaoProperties {
    nickname: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KakaoAccount {
    profile: Option<KakaoProperties>,
}

impl KakaoUser {
    fn into_profile(self) -> ProviderProfile {
        let name = self
            .kakao_account
            .and_then(|account| account.profile)
            .and_then(|profile| profile.nickname)
            .or_else(|| self.properties.and_then(|properties| properties.nickname))
            .unwrap_or_else(|| format!("kakao-{}", self.id));

        ProviderProfile {
            provider_id: format!("kakao:{}", self.id),
            name,
        }
    }
}

#[async_trait::async_trait]
impl IdentityProvider for KakaoProvider {
    fn authorize_url(&self, state: &str) -> Result<String, ProviderError> {
        let request = self
            .client
            .get(KAKAO_AUTHORIZE_URL)
            .query(&[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("state", state),
            ])
            .build()?;
        Ok(request.url().to_string())
    }

    async fn resolve(&self, code: &str) -> Result<ProviderProfile, ProviderError> {
        let response = self
            .client
            .post(KAKAO_TOKEN_URL)
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("code", code),
            ])
            .send()
            .await?;

        if response.status().is_client_error() {
            return Err(ProviderError::Rejected(response.status()));
        }
        let token: TokenResponse = response.error_for_status()?.json().await?;

        let user: KakaoUser = self
            .client
            .get(KAKAO_USER_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(user.into_profile())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub code: String,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Signs users in through an [`IdentityProvider`] and keeps a local `users`
/// row per provider account.
#[derive(Debug, Clone)]
pub struct OAuthBackend {
    pub sqlite_pool: sqlx::SqlitePool,
    pub provider: Arc<dyn IdentityProvider>,
}

impl OAuthBackend {
    pub fn new(sqlite_pool: sqlx::SqlitePool, provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            sqlite_pool,
            provider,
        }
    }
}

#[async_trait::async_trait]
impl axum_login::AuthnBackend for OAuthBackend {
    type User = crate::entities::User;
    type Credentials = self::Credentials;
    type Error = self::Error;

    async fn authenticate(
        &self,
        creds: Self::Credentials,
    ) -> Result<Option<Self::User>, Self::Error> {
        let profile = match self.provider.resolve(&creds.code).await {
            Ok(profile) => profile,
            Err(ProviderError::Rejected(status)) => {
                tracing::warn!(%status, "authorization code rejected");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        // display names can change on the provider side; the latest one wins
        let user: Self::User = sqlx::query_as(
            "INSERT INTO users (provider_id, name) VALUES (?, ?) \
             ON CONFLICT(provider_id) DO UPDATE SET name = excluded.name \
             RETURNING id, provider_id, name",
        )
        .bind(&profile.provider_id)
        .bind(&profile.name)
        .fetch_one(&self.sqlite_pool)
        .await?;

        Ok(Some(user))
    }

    async fn get_user(
        &self,
        user_id: &axum_login::UserId<Self>,
    ) -> Result<Option<Self::User>, Self::Error> {
        let user = sqlx::query_as("SELECT id, provider_id, name FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.sqlite_pool)
            .await?;

        Ok(user)
    }
}

/// The identity of the signed-in user, or 401.
pub fn require_identity(auth_session: &AuthSession) -> Result<Identity, AppError> {
    auth_session
        .user
        .as_ref()
        .map(User::identity)
        .ok_or(AppError::Unauthorized)
}

pub async fn sign_in(auth_session: AuthSession, session: Session) -> Result<Redirect, AppError> {
    let state = uuid::Uuid::new_v4().simple().to_string();
    session.insert(CSRF_STATE_KEY, &state).await?;

    let url = auth_session.backend.provider.authorize_url(&state)?;
    Ok(Redirect::to(&url))
}

#[derive(Debug, Deserialize)]
pub struct AuthzResponse {
    pub code: String,
    pub state: String,
}

pub async fn oauth_callback(
    mut auth_session: AuthSession,
    session: Session,
    Query(AuthzResponse { code, state }): Query<AuthzResponse>,
) -> Result<Redirect, AppError> {
    let expected = session.remove::<String>(CSRF_STATE_KEY).await?;
    if expected.as_deref() != Some(state.as_str()) {
        tracing::warn!("oauth callback with unknown state");
        return Err(AppError::BadRequest("invalid oauth state".into()));
    }

    let Some(user) = auth_session.authenticate(Credentials { code }).await? else {
        return Err(AppError::Unauthorized);
    };
    auth_session.login(&user).await?;

    tracing::info!(user = %user.name, "signed in");
    Ok(Redirect::to("/"))
}

pub async fn sign_out(mut auth_session: AuthSession) -> Result<impl IntoResponse, AppError> {
    if let Some(user) = auth_session.logout().await? {
        tracing::info!(user = %user.name, "signed out");
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn current_user(auth_session: AuthSession) -> Result<Json<SessionUser>, AppError> {
    let identity = require_identity(&auth_session)?;
    Ok(Json(SessionUser {
        name: identity.name().to_string(),
    }))
}
