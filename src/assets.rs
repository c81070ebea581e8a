use crate::error::AssetError;
use crate::sequence::Category;
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "webp"];
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3"];

/// Files directly inside `dir` whose extension is in `extensions`, sorted by
/// name. A missing directory yields an empty list.
pub async fn list_files_with_ext(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>, AssetError> {
    let mut out = Vec::new();
    if !fs::metadata(dir).await.map(|m| m.is_dir()).unwrap_or(false) {
        return Ok(out);
    }

    let unreadable = |source| AssetError::Unreadable {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = fs::read_dir(dir).await.map_err(unreadable)?;
    while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(OsStr::to_str)
            .map(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
            .unwrap_or(false);
        if matches {
            out.push(path);
        }
    }

    out.sort();
    Ok(out)
}

pub async fn list_audio_files(dir: &Path) -> Result<Vec<PathBuf>, AssetError> {
    list_files_with_ext(dir, AUDIO_EXTENSIONS).await
}

pub fn pick_audio<'a, R: Rng + ?Sized>(files: &'a [PathBuf], rng: &mut R) -> Option<&'a Path> {
    files.choose(rng).map(PathBuf::as_path)
}

/// One image per category, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AssetCatalog {
    images: BTreeMap<Category, PathBuf>,
}

impl AssetCatalog {
    /// Scans `dir` and maps every category to the single image whose filename
    /// contains its token (case-insensitive).
    ///
    /// Fails if any category matches no file or more than one file.
    pub async fn scan(dir: &Path) -> Result<Self, AssetError> {
        let files = list_files_with_ext(dir, IMAGE_EXTENSIONS).await?;
        Self::from_files(files)
    }

    pub fn from_files(files: Vec<PathBuf>) -> Result<Self, AssetError> {
        let mut images = BTreeMap::new();
        let mut missing = Vec::new();

        for category in Category::ALL {
            let matches: Vec<PathBuf> = files
                .iter()
                .filter(|path| {
                    path.file_name()
                        .map(|name| name.to_string_lossy().to_lowercase().contains(category.token()))
                        .unwrap_or(false)
                })
                .cloned()
                .collect();

            match matches.len() {
                0 => missing.push(category),
                1 => {
                    images.insert(category, matches[0].clone());
                }
                _ => {
                    return Err(AssetError::Ambiguous {
                        category,
                        files: matches,
                    });
                }
            }
        }

        if !missing.is_empty() {
            return Err(AssetError::Missing(missing));
        }

        Ok(Self { images })
    }

    pub fn image_for(&self, category: Category) -> Option<&Path> {
        self.images.get(&category).map(PathBuf::as_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &Path)> {
        self.images.iter().map(|(c, p)| (*c, p.as_path()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"x").unwrap();
    }

    fn full_set(dir: &Path) {
        for name in ["Crying.jpg", "confused-face.PNG", "shocked.webp", "tongue_out.jpeg", "goofy.bmp"] {
            touch(dir, name);
        }
    }

    #[tokio::test]
    async fn scan_maps_every_category() {
        let tmp = tempfile::tempdir().unwrap();
        full_set(tmp.path());
        touch(tmp.path(), "notes.txt");

        let catalog = AssetCatalog::scan(tmp.path()).await.unwrap();
        assert_eq!(catalog.iter().count(), 5);
        assert_eq!(
            catalog.image_for(Category::Confused).unwrap(),
            tmp.path().join("confused-face.PNG")
        );
    }

    #[tokio::test]
    async fn scan_reports_all_missing_categories() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "crying.jpg");
        touch(tmp.path(), "goofy.txt");

        match AssetCatalog::scan(tmp.path()).await {
            Err(AssetError::Missing(missing)) => assert_eq!(
                missing,
                vec![Category::Confused, Category::Shocked, Category::Tongue, Category::Goofy]
            ),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn scan_rejects_ambiguous_category() {
        let tmp = tempfile::tempdir().unwrap();
        full_set(tmp.path());
        touch(tmp.path(), "shocked-2.png");

        match AssetCatalog::scan(tmp.path()).await {
            Err(AssetError::Ambiguous { category, files }) => {
                assert_eq!(category, Category::Shocked);
                assert_eq!(files.len(), 2);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_directory_lists_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let files = list_audio_files(&tmp.path().join("nope")).await.unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn audio_listing_keeps_only_mp3() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "a.mp3");
        touch(tmp.path(), "b.MP3");
        touch(tmp.path(), "c.wav");

        let files = list_audio_files(tmp.path()).await.unwrap();
        assert_eq!(files, vec![tmp.path().join("a.mp3"), tmp.path().join("b.MP3")]);

        let mut rng = StdRng::seed_from_u64(5);
        let picked = pick_audio(&files, &mut rng).unwrap();
        assert!(files.iter().any(|f| f == picked));
        assert!(pick_audio(&[], &mut rng).is_none());
    }
}
