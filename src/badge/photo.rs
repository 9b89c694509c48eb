//! Canonical photo processing and storage.
//!
//! Every employee owns at most one stored photo: a 1000×991 quality-80 JPEG
//! named `{emp_id}_{sanitized english first name}.jpg`. Re-uploads delete the
//! previous file before writing, serialized per employee so concurrent
//! readers never observe a half-replaced photo.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use image::{imageops, imageops::FilterType, ImageEncoder, RgbaImage};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use super::{crop::NormalizedSample, BadgeError};

/// Canonical stored resolution. Same 350:347 aspect as the photo band.
pub const CANONICAL_W: u32 = 1000;
pub const CANONICAL_H: u32 = 991;
pub const JPEG_QUALITY: u8 = 80;

pub const HEADER_ART: &str = "card/card_header.png";
pub const FOOTER_ART: &str = "card/card_footer.png";

static EMP_LOCKS: Lazy<Mutex<HashMap<u32, Arc<Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn lock_for(emp_id: u32) -> Arc<Mutex<()>> {
    Arc::clone(EMP_LOCKS.lock().entry(emp_id).or_default())
}

/// Collapse whitespace runs to underscores, trimming the ends.
pub fn sanitize_name(name: &str) -> String {
    name.trim().split_whitespace().collect::<Vec<_>>().join("_")
}

pub fn canonical_filename(emp_id: u32, en_firstname: &str) -> String {
    format!("{emp_id}_{}.jpg", sanitize_name(en_firstname))
}

/// Center-anchored resize-to-cover: scale preserving aspect until both target
/// dimensions are covered, then crop the overflow symmetrically.
pub(crate) fn resize_to_cover(img: &RgbaImage, w: u32, h: u32) -> RgbaImage {
    let (sw, sh) = img.dimensions();
    if (sw, sh) == (w, h) {
        return img.clone();
    }
    let scale = (w as f32 / sw as f32).max(h as f32 / sh as f32);
    let rw = (((sw as f32) * scale).ceil() as u32).max(w);
    let rh = (((sh as f32) * scale).ceil() as u32).max(h);
    let resized = imageops::resize(img, rw, rh, FilterType::Lanczos3);
    imageops::crop_imm(&resized, (rw - w) / 2, (rh - h) / 2, w, h).to_image()
}

/// Deterministic canonical bytes for a normalized sample.
pub fn canonicalize(sample: &NormalizedSample) -> Result<Vec<u8>, BadgeError> {
    let cover = resize_to_cover(sample.image(), CANONICAL_W, CANONICAL_H);
    let rgb = image::DynamicImage::ImageRgba8(cover).to_rgb8();
    let mut buf = Vec::new();
    let enc = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
    enc.write_image(&rgb, rgb.width(), rgb.height(), image::ExtendedColorType::Rgb8)
        .map_err(|e| BadgeError::Internal(format!("jpeg encode: {e}")))?;
    Ok(buf)
}

/// Flat uploads directory holding canonical photos and the shared card art.
#[derive(Clone, Debug)]
pub struct PhotoStore {
    root: PathBuf,
}

impl PhotoStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_env() -> Self {
        let root = std::env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("app").join("uploads"));
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store canonical bytes for an employee, superseding any previous photo.
    ///
    /// Deletes every `{emp_id}_*.jpg` first so renames cannot leave orphans.
    /// Returns the stored filename.
    pub fn replace(
        &self,
        emp_id: u32,
        en_firstname: &str,
        jpeg: &[u8],
    ) -> Result<String, BadgeError> {
        let lock = lock_for(emp_id);
        let _g = lock.lock();

        fs::create_dir_all(&self.root)?;
        self.remove_locked(emp_id)?;

        let name = canonical_filename(emp_id, en_firstname);
        fs::write(self.root.join(&name), jpeg)?;
        Ok(name)
    }

    /// Delete the employee's stored photo, if any. Returns whether one existed.
    pub fn remove(&self, emp_id: u32) -> Result<bool, BadgeError> {
        let lock = lock_for(emp_id);
        let _g = lock.lock();
        self.remove_locked(emp_id)
    }

    fn remove_locked(&self, emp_id: u32) -> Result<bool, BadgeError> {
        let mut removed = false;
        let prefix = format!("{emp_id}_");
        let entries = match fs::read_dir(&self.root) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(&prefix) && name.ends_with(".jpg") {
                fs::remove_file(entry.path())?;
                removed = true;
            }
        }
        Ok(removed)
    }

    /// Path of the employee's stored photo, if present.
    pub fn find(&self, emp_id: u32) -> Option<PathBuf> {
        let lock = lock_for(emp_id);
        let _g = lock.lock();
        let prefix = format!("{emp_id}_");
        let entries = fs::read_dir(&self.root).ok()?;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(&prefix) && name.ends_with(".jpg") {
                return Some(entry.path());
            }
        }
        None
    }

    /// Read a file under the uploads root by relative path. Rejects traversal.
    pub fn read(&self, rel: &str) -> Result<Vec<u8>, BadgeError> {
        let rel_path = Path::new(rel);
        if rel_path.is_absolute()
            || rel_path
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(BadgeError::Storage(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "invalid path",
            )));
        }
        Ok(fs::read(self.root.join(rel_path))?)
    }

    /// Shared decorative art, absent until the operator installs it.
    pub fn art_path(&self, rel: &str) -> Option<PathBuf> {
        let p = self.root.join(rel);
        p.is_file().then_some(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::badge::crop;
    use image::{Rgba, RgbaImage};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn temp_store(tag: &str) -> PhotoStore {
        static SEQ: AtomicU32 = AtomicU32::new(0);
        let n = SEQ.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!(
            "badgegen-test-{}-{tag}-{n}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        PhotoStore::new(dir)
    }

    fn sample(w: u32, h: u32) -> crop::NormalizedSample {
        use image::ImageEncoder;
        let img = RgbaImage::from_pixel(w, h, Rgba([120, 80, 40, 255]));
        let mut buf = Vec::new();
        let enc = image::codecs::png::PngEncoder::new(&mut buf);
        enc.write_image(&img, w, h, image::ExtendedColorType::Rgba8)
            .unwrap();
        crop::normalize(&buf, None, None).unwrap()
    }

    #[test]
    fn canonical_output_is_exactly_1000x991() {
        use image::GenericImageView;
        for (w, h) in [(350, 347), (2000, 1983), (64, 64), (700, 1200)] {
            let jpeg = canonicalize(&sample(w, h)).unwrap();
            let img = image::load_from_memory(&jpeg).unwrap();
            assert_eq!(img.dimensions(), (CANONICAL_W, CANONICAL_H));
        }
    }

    #[test]
    fn canonicalize_is_deterministic() {
        let s = sample(800, 793);
        let a = canonicalize(&s).unwrap();
        let b = canonicalize(&s).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn sanitize_collapses_whitespace_runs() {
        assert_eq!(sanitize_name("Somchai"), "Somchai");
        assert_eq!(sanitize_name("  Mary   Jane  "), "Mary_Jane");
        assert_eq!(sanitize_name("a\t b\n c"), "a_b_c");
        assert_eq!(canonical_filename(10001, " Somchai "), "10001_Somchai.jpg");
    }

    #[test]
    fn replace_is_idempotent_and_single_file() {
        let store = temp_store("idem");
        let jpeg = canonicalize(&sample(500, 500)).unwrap();

        let f1 = store.replace(77, "Somchai", &jpeg).unwrap();
        let f2 = store.replace(77, "Somchai", &jpeg).unwrap();
        assert_eq!(f1, f2);

        let files: Vec<_> = fs::read_dir(store.root()).unwrap().collect();
        assert_eq!(files.len(), 1);
        assert_eq!(store.read(&f1).unwrap(), jpeg);
    }

    #[test]
    fn rename_supersedes_previous_file() {
        let store = temp_store("rename");
        let jpeg = canonicalize(&sample(500, 500)).unwrap();

        store.replace(42, "Somchai", &jpeg).unwrap();
        let newer = store.replace(42, "Somsak", &jpeg).unwrap();
        assert_eq!(newer, "42_Somsak.jpg");

        let files: Vec<_> = fs::read_dir(store.root()).unwrap().collect();
        assert_eq!(files.len(), 1, "old filename must be superseded");
        assert!(store.find(42).unwrap().ends_with("42_Somsak.jpg"));
    }

    #[test]
    fn remove_deletes_the_stored_photo() {
        let store = temp_store("remove");
        let jpeg = canonicalize(&sample(400, 400)).unwrap();
        store.replace(9, "Nina", &jpeg).unwrap();

        assert!(store.remove(9).unwrap());
        assert!(store.find(9).is_none());
        assert!(!store.remove(9).unwrap());
    }

    #[test]
    fn read_rejects_traversal() {
        let store = temp_store("trav");
        assert!(store.read("../etc/passwd").is_err());
        assert!(store.read("/etc/passwd").is_err());
    }
}
