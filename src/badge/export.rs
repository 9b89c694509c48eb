//! Badge export: gather resources, compose, encode.
//!
//! Composition never starts until every embedded image has been fetched and
//! fully decoded. That gather runs under one bounded timeout (the
//! stabilization barrier); a capture over half-loaded resources is therefore
//! impossible rather than merely unlikely.

use std::time::Duration;

use image::{ImageEncoder, Rgba, RgbaImage};
use tracing::{debug, info};

use super::{
    code::{CodeService, ContactCard},
    compose::{self, BadgeFonts, BadgeResources},
    layout::{BadgeLayout, BadgeRecord},
    photo::{self, PhotoStore},
    BadgeError,
};

pub const DEFAULT_TIMEOUT_MS: u64 = 1_500;

#[derive(Clone, Debug)]
pub struct RenderOptions {
    /// Resolution multiplier: ~1 for preview, ~1.857 for print export.
    pub scale: f32,
    pub background: Option<Rgba<u8>>,
    /// Stabilization window for resource fetch + decode.
    pub timeout: Duration,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            background: None,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

/// Download name for an exported badge.
pub fn export_filename(record: &BadgeRecord) -> Result<String, BadgeError> {
    let emp_id = record.require_identity()?;
    let name = photo::sanitize_name(record.en_firstname.as_deref().unwrap_or_default());
    Ok(format!("badge_{emp_id}_{name}.png"))
}

/// Render one badge to PNG bytes at the requested multiplier.
pub async fn render_badge(
    http: &reqwest::Client,
    store: &PhotoStore,
    code: &CodeService,
    record: &BadgeRecord,
    opts: &RenderOptions,
) -> Result<Vec<u8>, BadgeError> {
    let _timing = crate::perf_scope!("render_badge");
    let layout = BadgeLayout::compute(record, opts.scale)?;
    let card = ContactCard::from_record(record);
    // fail on an unencodable payload before any fetch happens
    card.payload()?;

    let resources = tokio::time::timeout(
        opts.timeout,
        gather_resources(http, store, code, record, &layout, &card),
    )
    .await
    .map_err(|_| BadgeError::RenderTimeout)??;

    let fonts = BadgeFonts::load()?;
    let img = compose::compose(&layout, record, &fonts, &resources, opts.background);
    debug_assert_eq!((img.width(), img.height()), (layout.width, layout.height));

    let png = encode_png(&img)?;
    info!(
        emp_id = record.emp_id,
        scale = opts.scale,
        width = layout.width,
        height = layout.height,
        "badge rendered"
    );
    Ok(png)
}

/// Fetch and fully decode every embedded image for one render.
async fn gather_resources(
    http: &reqwest::Client,
    store: &PhotoStore,
    code: &CodeService,
    record: &BadgeRecord,
    layout: &BadgeLayout,
    card: &ContactCard,
) -> Result<BadgeResources, BadgeError> {
    let code_side = layout.code_image_side().max(1);

    let code_fut = async {
        let bytes = code.fetch_png(http, card, code_side).await?;
        decode_rgba(&bytes)
            .map_err(|e| BadgeError::Internal(format!("code service image: {e}")))
    };
    let photo_fut = async { load_photo(store, record) };

    let (code_img, photo_img) = tokio::try_join!(code_fut, photo_fut)?;
    debug!(code_side, has_photo = photo_img.is_some(), "render resources decoded");

    Ok(BadgeResources {
        photo: photo_img,
        code: code_img,
        header_art: load_art(store, photo::HEADER_ART)?,
        footer_art: load_art(store, photo::FOOTER_ART)?,
    })
}

fn load_photo(store: &PhotoStore, record: &BadgeRecord) -> Result<Option<RgbaImage>, BadgeError> {
    let Some(emp_id) = record.emp_id else {
        return Ok(None);
    };
    let Some(path) = store.find(emp_id) else {
        return Ok(None);
    };
    let bytes = std::fs::read(&path)?;
    let img = decode_rgba(&bytes).map_err(|e| BadgeError::InvalidSource(e.to_string()))?;
    Ok(Some(img))
}

fn load_art(store: &PhotoStore, rel: &str) -> Result<Option<RgbaImage>, BadgeError> {
    let Some(path) = store.art_path(rel) else {
        return Ok(None);
    };
    let bytes = std::fs::read(&path)?;
    let img = decode_rgba(&bytes).map_err(|e| BadgeError::InvalidSource(e.to_string()))?;
    Ok(Some(img))
}

fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage, image::ImageError> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

pub(crate) fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, BadgeError> {
    let mut buf = Vec::new();
    let enc = image::codecs::png::PngEncoder::new(&mut buf);
    enc.write_image(img, img.width(), img.height(), image::ExtendedColorType::Rgba8)
        .map_err(|e| BadgeError::Internal(format!("png encode: {e}")))?;
    Ok(buf)
}
