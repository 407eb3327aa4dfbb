use std::io::Write;
use std::path::Path;

use zip::write::FileOptions;

/// Write a zip/jar at `path` with the given entries. Names ending in `/`
/// become directory entries.
pub fn write_jar(path: &Path, entries: &[(&str, &[u8])]) -> std::io::Result<()> {
    let file = std::fs::File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::<()>::default();
    for (name, bytes) in entries {
        if let Some(dir) = name.strip_suffix('/') {
            zip.add_directory(dir, options)?;
        } else {
            zip.start_file(*name, options)?;
            zip.write_all(bytes)?;
        }
    }
    zip.finish()?;
    Ok(())
}

/// Lay out `<internal_name>.class` files under `root`.
pub fn write_class_dir(root: &Path, classes: &[(&str, Vec<u8>)]) -> std::io::Result<()> {
    for (internal_name, bytes) in classes {
        let path = root.join(format!("{internal_name}.class"));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)?;
    }
    Ok(())
}
