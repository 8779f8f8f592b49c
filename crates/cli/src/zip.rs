use std::io::Cursor;
use std::path::Path;

use zip::write::FileOptions;

/// Packs a function directory into an in-memory archive the same way a
/// control plane's upload pipeline would, so the local runner exercises the
/// real Package Materializer instead of bypassing it.
pub fn zip_directory(root: &Path) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    {
        let mut writer = zip::ZipWriter::new(Cursor::new(&mut buf));
        let options = FileOptions::default().unix_permissions(0o644);
        add_dir(&mut writer, root, "", &options)?;
        writer.finish()?;
    }
    Ok(buf)
}

fn add_dir(
    writer: &mut zip::ZipWriter<Cursor<&mut Vec<u8>>>,
    dir: &Path,
    prefix: &str,
    options: &FileOptions,
) -> anyhow::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = path.file_name().unwrap().to_string_lossy();
        let archive_path = if prefix.is_empty() { name.to_string() } else { format!("{prefix}/{name}") };

        if path.is_dir() {
            writer.add_directory(&archive_path, *options)?;
            add_dir(writer, &path, &archive_path, options)?;
        } else {
            writer.start_file(&archive_path, *options)?;
            let mut file = std::fs::File::open(&path)?;
            std::io::copy(&mut file, writer)?;
        }
    }
    Ok(())
}
