use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRegistrationRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserLoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogoutRequest {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ForgotPasswordResponse {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserDto {
    pub id: i64,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserAuthResponse {
    pub token: String,
    pub user: UserDto,
}

/// Profile as served to the signed-in user. Fields hidden by the owner's
/// visibility settings are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProfileDto {
    pub id: i64,
    pub user: String,
    pub avatar: Option<String>,
    pub name: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub phone: Option<String>,
    pub friend_info: Option<String>,
    pub music_preferences: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MusicPreferenceDto {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DeezerArtist {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DeezerAlbum {
    pub id: i64,
    pub title: String,
    pub cover_medium: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DeezerTrack {
    pub id: i64,
    pub title: String,
    pub link: String,
    pub preview: String,
    /// Seconds.
    pub duration: u32,
    pub artist: DeezerArtist,
    pub album: Option<DeezerAlbum>,
}

impl DeezerTrack {
    pub fn duration_label(&self) -> String {
        format!("{}:{:02}", self.duration / 60, self.duration % 60)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DeezerSearchResponse {
    pub data: Vec<DeezerTrack>,
    pub total: u64,
    pub next: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_track_payload_decodes() {
        let track: DeezerTrack = serde_json::from_str(
            r#"{
                "id": 3135556,
                "title": "Harder, Better, Faster, Stronger",
                "duration": 224,
                "rank": 956167,
                "artist": {"id": 27, "name": "Daft Punk", "type": "artist"},
                "album": {"id": 302127, "title": "Discovery"}
            }"#,
        )
        .unwrap();

        assert_eq!(track.artist.name, "Daft Punk");
        assert_eq!(track.album.as_ref().map(|a| a.id), Some(302127));
        assert_eq!(track.preview, "");
        assert_eq!(track.duration_label(), "3:44");
    }

    #[test]
    fn profile_with_hidden_fields_decodes() {
        let profile: ProfileDto = serde_json::from_str(
            r#"{
                "id": 4,
                "user": "alice",
                "name": "Alice",
                "music_preferences": ["Jazz"]
            }"#,
        )
        .unwrap();

        assert_eq!(profile.user, "alice");
        assert_eq!(profile.phone, None);
        assert_eq!(
            profile.music_preferences,
            Some(vec!["Jazz".to_string()])
        );
    }
}
