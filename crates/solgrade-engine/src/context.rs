//! Build-context packaging
//!
//! The Docker build endpoint consumes a tar archive; this module packs a
//! prepared scratch directory into one.

use crate::Result;
use std::io::Write;
use std::path::Path;

/// Create a tar archive of the build context directory.
pub fn create_build_context(context: &Path) -> Result<Vec<u8>> {
    use std::io::Cursor;
    use tar::Builder;

    let mut tar_data = Vec::new();
    {
        let cursor = Cursor::new(&mut tar_data);
        let mut builder = Builder::new(cursor);
        add_dir_to_tar(&mut builder, context, Path::new(""))?;
        builder.finish()?;
    }

    Ok(tar_data)
}

/// Recursively add directory contents to tar.
fn add_dir_to_tar<W: Write>(
    builder: &mut tar::Builder<W>,
    base: &Path,
    prefix: &Path,
) -> Result<()> {
    for entry in std::fs::read_dir(base)? {
        let entry = entry?;
        let path = entry.path();
        let name = prefix.join(entry.file_name());

        // Skip build artifacts that only bloat the context
        let file_name = entry.file_name();
        let file_name_str = file_name.to_string_lossy();
        if file_name_str == ".git" || file_name_str == "out" || file_name_str == "cache" {
            continue;
        }

        if path.is_dir() {
            add_dir_to_tar(builder, &path, &name)?;
        } else if path.is_file() {
            builder.append_path_with_name(&path, &name)?;
        }
    }

    Ok(())
}
