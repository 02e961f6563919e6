// HostSync - Name Service Switch
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Editing of `nsswitch.conf` provider lists.

use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::info;

use crate::models::{Error, Result};

/// Add or remove `provider` on the lines of the given `databases`.
///
/// A database line looks like `passwd:     files sss`. Other lines are kept
/// verbatim. The file is replaced atomically and left with mode 0644.
pub fn update_nss(path: &Path, databases: &[&str], provider: &str, remove: bool) -> Result<()> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::ConfigReadFailed(format!("{}: {}", path.display(), e)))?;

    let mut output = String::with_capacity(content.len() + 64);
    for line in content.lines() {
        output.push_str(&edit_line(line, databases, provider, remove));
        output.push('\n');
    }

    let dir = path
        .parent()
        .ok_or_else(|| Error::ConfigWriteFailed(format!("{} has no parent", path.display())))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(output.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o644))?;
    }

    info!(
        "{} {} for {:?} in {}",
        if remove { "Removed" } else { "Added" },
        provider,
        databases,
        path.display()
    );
    Ok(())
}

fn edit_line(line: &str, databases: &[&str], provider: &str, remove: bool) -> String {
    let Some((key, rest)) = line.split_once(':') else {
        return line.to_string();
    };
    if line.trim_start().starts_with('#') || !databases.contains(&key.trim()) {
        return line.to_string();
    }

    let mut tokens: Vec<&str> = rest.split_whitespace().collect();
    let present = tokens.contains(&provider);
    if remove {
        tokens.retain(|t| *t != provider);
    } else if !present {
        tokens.push(provider);
    } else {
        return line.to_string();
    }
    format!("{}: {}", key, tokens.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# comment: keep\npasswd:     files\ngroup:      files sss\nhosts:      files dns\n";

    #[test]
    fn test_add_and_remove_provider() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nsswitch.conf");
        fs::write(&path, SAMPLE).expect("seed");

        update_nss(&path, &["passwd", "group"], "sss", false).expect("add");
        let content = fs::read_to_string(&path).expect("read");
        assert!(content.contains("passwd: files sss\n"));
        assert!(content.contains("group:      files sss\n"));
        assert!(content.contains("hosts:      files dns\n"));
        assert!(content.starts_with("# comment: keep\n"));

        update_nss(&path, &["passwd", "group"], "sss", true).expect("remove");
        let content = fs::read_to_string(&path).expect("read");
        assert!(content.contains("passwd: files\n"));
        assert!(content.contains("group: files\n"));
    }

    #[cfg(unix)]
    #[test]
    fn test_mode_restored() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nsswitch.conf");
        fs::write(&path, SAMPLE).expect("seed");
        update_nss(&path, &["hosts"], "winbind", false).expect("add");
        let mode = fs::metadata(&path).expect("meta").permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn test_missing_file() {
        let err = update_nss(Path::new("/nonexistent/nsswitch.conf"), &["passwd"], "sss", false)
            .expect_err("should fail");
        assert!(matches!(err, Error::ConfigReadFailed(_)));
    }
}
