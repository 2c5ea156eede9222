use std::env;
use std::path::PathBuf;

fn fallback_dotenv_path(
    config_dir: Option<PathBuf>,
    home_dir: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(dir) = config_dir {
        return Some(dir.join(".env"));
    }
    Some(home_dir?.join(".catalog-archiver/.env"))
}

/// Load PIM endpoint settings and other secrets from a `.env` file.
///
/// The working directory wins (one `.env` per export drop folder), then the
/// user-level config directory.
pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let fallback = fallback_dotenv_path(
        env::var_os("ARCHIVER_CONFIG_DIR").map(PathBuf::from),
        dirs::home_dir(),
    );

    let Some(path) = fallback else {
        return;
    };
    if path.is_file() {
        let _ = dotenvy::from_path(&path);
    }
}
