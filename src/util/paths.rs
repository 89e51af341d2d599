use std::path::PathBuf;

use directories::ProjectDirs;
use lazy_static::lazy_static;

lazy_static! {
    pub static ref PROJECT_NAME: String =
        env!("CARGO_CRATE_NAME").to_uppercase();
    pub static ref DATA_ENV: String = format!("{}_DATA", PROJECT_NAME.as_str());
    pub static ref DATA_FOLDER: Option<PathBuf> =
        std::env::var(DATA_ENV.as_str()).ok().map(PathBuf::from);
}

fn project_directory() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "musicroom", env!("CARGO_PKG_NAME"))
}

pub fn data_dir() -> PathBuf {
    if let Some(dir) = DATA_FOLDER.clone() {
        dir
    } else if let Some(proj_dirs) = project_directory() {
        proj_dirs.data_local_dir().to_path_buf()
    } else {
        PathBuf::from(".").join(".data")
    }
}
