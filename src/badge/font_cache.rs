//! The two badge typefaces, parsed once per process.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rusttype::Font;
use std::{collections::HashMap, path::PathBuf, sync::Arc};

use super::BadgeError;

/// Faces a badge is set in. The name lines need Thai glyph coverage; the
/// employee id is latin digits only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Face {
    Name,
    EmployeeId,
}

impl Face {
    fn file(self) -> &'static str {
        match self {
            Face::Name => "Sarabun-SemiBold.ttf",
            Face::EmployeeId => "Roboto-Medium.ttf",
        }
    }
}

static FACES: Lazy<Mutex<HashMap<Face, Arc<Font<'static>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

pub fn fonts_dir() -> PathBuf {
    std::env::var("FONTS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("app").join("assets").join("fonts"))
}

pub fn load(face: Face) -> Result<Arc<Font<'static>>, BadgeError> {
    if let Some(font) = FACES.lock().get(&face) {
        return Ok(Arc::clone(font));
    }

    let path = fonts_dir().join(face.file());
    let bytes = std::fs::read(&path)
        .map_err(|e| BadgeError::Internal(format!("read typeface {}: {e}", path.display())))?;
    let font = Font::try_from_vec(bytes)
        .ok_or_else(|| BadgeError::Internal(format!("unusable typeface {}", path.display())))?;

    let font = Arc::new(font);
    FACES.lock().insert(face, Arc::clone(&font));
    Ok(font)
}
