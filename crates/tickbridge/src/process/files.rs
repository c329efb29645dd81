use std::io::{self, Write};
use std::path::Path;

use tempfile::Builder;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Replaces `path` with `contents` so readers never see a partial write.
///
/// The bytes land in a sibling temporary file that is synced and then renamed
/// over the target.
pub(super) fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let directory = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            "target path did not have a parent directory",
        )
    })?;

    let mut builder = Builder::new();
    builder.prefix(
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("tickbridge"),
    );
    #[cfg(unix)]
    {
        use std::fs::Permissions;
        builder.permissions(Permissions::from_mode(0o600));
    }

    let mut file = builder.tempfile_in(directory)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|error| error.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn replaces_existing_contents() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("tickbridge.pid");
        fs::write(&path, "stale").expect("seed file");
        atomic_write(&path, b"fresh").expect("atomic write");
        assert_eq!(fs::read_to_string(&path).expect("read back"), "fresh");
    }
}
