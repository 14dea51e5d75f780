use std::{
    fs,
    io,
    path::{Path, PathBuf},
};

const EXTENSION: &str = "jpeg";

/// Writes picture payloads to numbered files, `0.jpeg`, `1.jpeg`, ...
pub struct PictureSink {
    dir: PathBuf,
    next: u64,
}

impl PictureSink {
    /// Numbering continues after the highest picture already in `dir`.
    pub fn new(dir: PathBuf) -> Self {
        let next = fs::read_dir(&dir)
            .into_iter()
            .flatten()
            .flatten()
            .filter_map(|entry| Self::index(&entry.path()))
            .max()
            .map_or(0, |index| index + 1);

        Self { dir, next }
    }

    fn index(path: &Path) -> Option<u64> {
        if path.extension()? != EXTENSION {
            return None;
        }
        path.file_stem()?.to_str()?.parse().ok()
    }

    pub fn save(&mut self, picture: &[u8]) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let path = self.dir.join(format!("{}.{}", self.next, EXTENSION));
        fs::write(&path, picture)?;
        self.next += 1;
        Ok(path)
    }
}
