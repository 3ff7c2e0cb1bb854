//! Utility functions for directory management and duration formatting
//!
//! Directories follow the XDG Base Directory specification:
//!
//! - Data: `~/.local/share/lhfw/` - cached credentials (`lighthouse.json`)

use directories::ProjectDirs;
use std::path::PathBuf;
use std::time::Duration;

pub fn get_data_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "lhfw", "lhfw").map(|pd| pd.data_dir().to_path_buf())
}

pub fn ensure_dirs() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::fs::DirBuilder;
        use std::os::unix::fs::DirBuilderExt;

        let mut builder = DirBuilder::new();
        builder.mode(0o700); // Holds secrets: user only
        builder.recursive(true);

        if let Some(dir) = get_data_dir() {
            builder.create(dir)?;
        }
    }

    #[cfg(not(unix))]
    {
        if let Some(dir) = get_data_dir() {
            std::fs::create_dir_all(dir)?;
        }
    }

    Ok(())
}

/// Rounds a duration to three significant digits when it is below 100s,
/// so `1.234567s` prints as `1.23s` and `45.678ms` as `45.7ms`.
pub fn round_duration(d: Duration) -> Duration {
    let mut scale = Duration::from_secs(100);
    while scale > d && scale > Duration::from_nanos(1) {
        scale /= 10;
    }
    let unit = (scale / 100).as_nanos();
    if unit <= 1 {
        return d;
    }
    // Round half away from zero
    let rounded = (d.as_nanos() + unit / 2) / unit * unit;
    Duration::from_nanos(u64::try_from(rounded).unwrap_or(u64::MAX))
}
