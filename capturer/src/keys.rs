use chrono::{DateTime, TimeZone};
use std::path::{Path, PathBuf};

/// File name for a capture taken at `at`, e.g. "2026-10-18-14-05-09.jpg".
pub fn capture_file_name<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%Y-%m-%d-%H-%M-%S.jpg").to_string()
}

/// First path in `dir` for `file_name` that does not exist yet. A second
/// capture in the same second becomes "<stem>-1.jpg", then "<stem>-2.jpg", ...
pub fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = file_name.rsplit_once('.').unwrap_or((file_name, ""));
    (1u32..)
        .map(|n| {
            if ext.is_empty() {
                dir.join(format!("{stem}-{n}"))
            } else {
                dir.join(format!("{stem}-{n}.{ext}"))
            }
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    #[test]
    fn test_name_format() {
        let at = Utc.with_ymd_and_hms(2026, 2, 8, 9, 3, 7).unwrap();
        assert_eq!(capture_file_name(&at), "2026-02-08-09-03-07.jpg");

        // Local fields are used, not UTC.
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        assert_eq!(
            capture_file_name(&at.with_timezone(&tokyo)),
            "2026-02-08-18-03-07.jpg"
        );
    }

    #[test]
    fn test_unique_path_suffixes() {
        let dir = std::env::temp_dir().join(format!("framesnap-keys-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let name = "2026-02-08-09-03-07.jpg";

        let first = unique_path(&dir, name);
        assert_eq!(first, dir.join(name));
        std::fs::write(&first, b"x").unwrap();

        let second = unique_path(&dir, name);
        assert_eq!(second, dir.join("2026-02-08-09-03-07-1.jpg"));
        std::fs::write(&second, b"x").unwrap();

        assert_eq!(
            unique_path(&dir, name),
            dir.join("2026-02-08-09-03-07-2.jpg")
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
