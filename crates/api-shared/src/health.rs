use crate::types::HealthRes;
use std::fs;
use std::path::Path;

/// Liveness check shared by every API surface
///
/// The service is healthy while its upload directory is still a writable directory; a
/// removed mount or a read-only remount is reported with the reason.
pub struct HealthService;

impl HealthService {
    /// Checks the upload directory at `base_dir`.
    pub fn check(base_dir: &Path) -> HealthRes {
        let problem = match fs::metadata(base_dir) {
            Ok(meta) if !meta.is_dir() => Some("upload directory is not a directory".to_owned()),
            Ok(meta) if meta.permissions().readonly() => {
                Some("upload directory is read-only".to_owned())
            }
            Ok(_) => None,
            Err(e) => Some(format!("upload directory is unavailable: {e}")),
        };

        match problem {
            None => HealthRes {
                ok: true,
                message: "Filing service is alive".into(),
            },
            Some(message) => HealthRes { ok: false, message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_existing_directory_is_ok() {
        let temp = tempfile::TempDir::new().unwrap();
        let res = HealthService::check(temp.path());
        assert!(res.ok);
    }

    #[test]
    fn test_check_missing_or_file_is_not_ok() {
        let temp = tempfile::TempDir::new().unwrap();
        assert!(!HealthService::check(&temp.path().join("gone")).ok);

        let file = temp.path().join("file");
        fs::write(&file, b"x").unwrap();
        let res = HealthService::check(&file);
        assert!(!res.ok);
        assert!(res.message.contains("not a directory"));
    }
}
