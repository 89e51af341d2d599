pub mod error;
pub mod models;

use reqwest::{RequestBuilder, Response, header::AUTHORIZATION};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::config::{Config, normalize_base_url};

pub use error::ApiError;
use models::{
    DeezerSearchResponse, DeezerTrack, ForgotPasswordRequest,
    ForgotPasswordResponse, LogoutRequest, MusicPreferenceDto, ProfileDto,
    UserAuthResponse, UserLoginRequest, UserRegistrationRequest,
};

pub struct ApiService {
    client: reqwest::Client,
    base_url: String,
}

impl ApiService {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self {
            client,
            base_url: normalize_base_url(&config.base_url),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn register_user(
        &self,
        request: &UserRegistrationRequest,
    ) -> Result<UserAuthResponse, ApiError> {
        self.post_json("users/signup/", request).await
    }

    pub async fn login_user(
        &self,
        request: &UserLoginRequest,
    ) -> Result<UserAuthResponse, ApiError> {
        self.post_json("users/login/", request).await
    }

    pub async fn logout_user(
        &self,
        request: &LogoutRequest,
        token: &str,
    ) -> Result<(), ApiError> {
        let builder =
            self.client.post(self.url("users/logout/")).json(request);
        ensure_success(self.send(authorize(builder, token)).await?).await
    }

    pub async fn forgot_password(
        &self,
        request: &ForgotPasswordRequest,
    ) -> Result<ForgotPasswordResponse, ApiError> {
        self.post_json("users/forgot_password/", request).await
    }

    pub async fn fetch_profile(
        &self,
        user_id: &str,
        token: &str,
    ) -> Result<ProfileDto, ApiError> {
        let builder =
            self.client.get(self.url(&format!("profile/{user_id}/")));
        read_json(self.send(authorize(builder, token)).await?).await
    }

    pub async fn fetch_music_preferences(
        &self,
        token: &str,
    ) -> Result<Vec<MusicPreferenceDto>, ApiError> {
        let builder = self.client.get(self.url("profile/music_preferences/"));
        read_json(self.send(authorize(builder, token)).await?).await
    }

    pub async fn search_tracks(
        &self,
        query: &str,
    ) -> Result<DeezerSearchResponse, ApiError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ApiError::InvalidRequest(
                "search query must not be empty".into(),
            ));
        }

        let builder = self
            .client
            .get(self.url("deezer/search/"))
            .query(&[("q", query)]);
        read_json(self.send(builder).await?).await
    }

    pub async fn fetch_track(
        &self,
        track_id: &str,
    ) -> Result<DeezerTrack, ApiError> {
        let track_id = track_id.trim();
        if track_id.is_empty() {
            return Err(ApiError::InvalidRequest(
                "track id must not be empty".into(),
            ));
        }

        let builder =
            self.client.get(self.url(&format!("deezer/track/{track_id}/")));
        read_json(self.send(builder).await?).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let builder = self.client.post(self.url(path)).json(body);
        read_json(self.send(builder).await?).await
    }

    async fn send(
        &self,
        builder: RequestBuilder,
    ) -> Result<Response, ApiError> {
        let response = builder.send().await?;
        debug!(
            url = %response.url(),
            status = response.status().as_u16(),
            "api response"
        );
        Ok(response)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn authorize(builder: RequestBuilder, token: &str) -> RequestBuilder {
    builder.header(AUTHORIZATION, format!("Token {token}"))
}

async fn read_json<T: DeserializeOwned>(
    response: Response,
) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ApiError::from_body(status.as_u16(), &body));
    }
    Ok(serde_json::from_str(&body)?)
}

async fn ensure_success(response: Response) -> Result<(), ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await?;
    Err(ApiError::from_body(status.as_u16(), &body))
}
