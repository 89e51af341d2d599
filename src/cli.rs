use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};

use crate::{
    config::Config,
    http::{
        ApiService,
        models::{DeezerTrack, MusicPreferenceDto},
    },
    session::{
        SessionError, SessionManager,
        state::{InfoBlock, ProfileUpdate, UserProfile},
    },
};

#[derive(Parser, Debug)]
#[command(name = "musicroom", version, about = "Music Room client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Create an account and sign in
    Signup(Credentials),
    /// Sign in with email and password
    Login(Credentials),
    /// Sign in with a placeholder Google identity
    LoginGoogle,
    /// Sign in with a placeholder Facebook identity
    LoginFacebook,
    /// Sign out and forget the stored token
    Logout,
    /// Show who is signed in
    Whoami,
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// Ask the server to send a password reset email
    ResetPassword { email: String },
    /// Search the track catalogue
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Show a single track
    Track { id: String },
    /// List the music preference tags the server knows about
    Preferences,
}

#[derive(Args, Debug, PartialEq)]
pub struct Credentials {
    pub email: String,
    #[arg(long, env = "MUSICROOM_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum ProfileCommand {
    /// Print the cached profile
    Show,
    /// Change profile fields; anything not given is kept
    Set(ProfileArgs),
    /// Merge the server-side profile into the cached one
    Refresh,
}

#[derive(Args, Debug, Default, PartialEq)]
pub struct ProfileArgs {
    #[arg(long)]
    pub display_name: Option<String>,
    #[arg(long)]
    pub avatar: Option<String>,
    /// Replaces the public block; repeat for several entries
    #[arg(
        long = "public",
        value_name = "KEY=VALUE",
        value_parser = parse_key_value
    )]
    pub public: Vec<(String, String)>,
    /// Replaces the friends-only block
    #[arg(
        long = "friends",
        value_name = "KEY=VALUE",
        value_parser = parse_key_value
    )]
    pub friends: Vec<(String, String)>,
    /// Replaces the private block
    #[arg(
        long = "private",
        value_name = "KEY=VALUE",
        value_parser = parse_key_value
    )]
    pub private: Vec<(String, String)>,
    /// Replaces the music preferences; repeat for several tags
    #[arg(long = "genre")]
    pub genres: Vec<String>,
    #[arg(long, conflicts_with = "genres")]
    pub clear_genres: bool,
}

impl ProfileArgs {
    pub fn into_update(self) -> ProfileUpdate {
        let music_preferences = if self.clear_genres {
            Some(Vec::new())
        } else {
            (!self.genres.is_empty()).then_some(self.genres)
        };

        ProfileUpdate {
            display_name: self.display_name,
            profile_pic_url: self.avatar,
            public_info: block(self.public),
            friends_only_info: block(self.friends),
            private_info: block(self.private),
            music_preferences,
        }
    }
}

fn block(pairs: Vec<(String, String)>) -> Option<InfoBlock> {
    (!pairs.is_empty()).then(|| pairs.into_iter().collect())
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {s:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in {s:?}"));
    }
    Ok((key.to_string(), value.to_string()))
}

pub async fn run(cli: Cli, config: Config) -> Result<()> {
    let api = Arc::new(ApiService::new(&config)?);
    let session = SessionManager::from_config(&config, api.clone())?;

    match cli.command {
        Command::Signup(creds) => {
            session
                .register_user(&creds.email, &creds.password)
                .await?;
            print_signed_in(&session);
        }
        Command::Login(creds) => {
            session
                .login_with_email(&creds.email, &creds.password)
                .await?;
            print_signed_in(&session);
        }
        Command::LoginGoogle => {
            session.login_with_google()?;
            session.settle().await;
            print_signed_in(&session);
        }
        Command::LoginFacebook => {
            session.login_with_facebook()?;
            session.settle().await;
            print_signed_in(&session);
        }
        Command::Logout => {
            session.logout().await?;
            println!("Signed out");
        }
        Command::Whoami => match session.current_profile() {
            Some(profile) => println!("{}", render_profile(&profile)),
            None => println!("Not signed in"),
        },
        Command::Profile(ProfileCommand::Show) => {
            let profile = session
                .current_profile()
                .ok_or(SessionError::NotLoggedIn)?;
            println!("{}", render_profile(&profile));
        }
        Command::Profile(ProfileCommand::Set(args)) => {
            let update = args.into_update();
            if update.is_empty() {
                return Err(eyre!("Nothing to update"));
            }
            let profile = session.update_profile(update)?;
            println!("{}", render_profile(&profile));
        }
        Command::Profile(ProfileCommand::Refresh) => {
            let profile = session.refresh_profile().await?;
            println!("{}", render_profile(&profile));
        }
        Command::ResetPassword { email } => {
            session.reset_password(&email).await?;
            println!("Password reset requested for {email}");
        }
        Command::Search { query } => {
            let results = api.search_tracks(&query.join(" ")).await?;
            println!("{}", render_tracks(&results.data));
        }
        Command::Track { id } => {
            let track = api.fetch_track(&id).await?;
            println!("{}", render_track(&track));
        }
        Command::Preferences => {
            let token = session.token()?.ok_or(SessionError::NotLoggedIn)?;
            let preferences = api.fetch_music_preferences(&token).await?;
            println!("{}", render_preferences(&preferences));
        }
    }

    Ok(())
}

fn print_signed_in(session: &SessionManager) {
    if let Some(profile) = session.current_profile() {
        println!("Signed in as {} <{}>", profile.display_name, profile.email);
    }
}

pub fn render_profile(profile: &UserProfile) -> String {
    let mut lines = vec![
        format!("{} <{}>", profile.display_name, profile.email),
        format!("id: {}", profile.id),
    ];

    if let Some(avatar) = profile.avatar() {
        lines.push(format!("avatar: {avatar}"));
    }

    for (label, block) in [
        ("public", &profile.public_info),
        ("friends", &profile.friends_only_info),
        ("private", &profile.private_info),
    ] {
        lines.extend(block.iter().map(|(k, v)| format!("{label}.{k}: {v}")));
    }

    if !profile.music_preferences.is_empty() {
        lines.push(format!("music: {}", profile.music_preferences.join(", ")));
    }

    lines.join("\n")
}

pub fn render_tracks(tracks: &[DeezerTrack]) -> String {
    if tracks.is_empty() {
        return "No tracks found".to_string();
    }

    tracks
        .iter()
        .map(|t| {
            format!(
                "{:>10}  {} - {} ({})",
                t.id,
                t.artist.name,
                t.title,
                t.duration_label()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_track(track: &DeezerTrack) -> String {
    let mut lines = vec![
        format!("{} - {}", track.artist.name, track.title),
        format!("duration: {}", track.duration_label()),
    ];
    if let Some(album) = &track.album {
        lines.push(format!("album: {}", album.title));
    }
    if !track.link.is_empty() {
        lines.push(format!("link: {}", track.link));
    }
    if !track.preview.is_empty() {
        lines.push(format!("preview: {}", track.preview));
    }
    lines.join("\n")
}

fn render_preferences(preferences: &[MusicPreferenceDto]) -> String {
    preferences
        .iter()
        .map(|p| format!("{}\t{}", p.id, p.name))
        .collect::<Vec<_>>()
        .join("\n")
}
