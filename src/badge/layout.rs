//! Badge geometry, parametrized by a single resolution multiplier.
//!
//! Every zone and font size derives from one set of base constants so the
//! on-screen preview (m ≈ 1) and the print export (m ≈ 1.857) stay
//! pixel-proportional instead of being tuned independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::BadgeError;

/// Base badge size in layout units (1 unit = 1 px at m = 1).
pub const BASE_WIDTH: f32 = 350.0;
pub const BASE_HEADER_H: f32 = 73.0;
pub const BASE_PHOTO_H: f32 = 347.0;
pub const BASE_FOOTER_H: f32 = 127.0;
pub const BASE_TOTAL_H: f32 = BASE_HEADER_H + BASE_PHOTO_H + BASE_FOOTER_H;

/// 1 rem-equivalent of font scale in pixels at m = 1.
pub const BASE_UNIT_PX: f32 = 16.0;

fn default_name_scale() -> f32 {
    1.4
}
fn default_en_name_scale() -> f32 {
    1.0
}
fn default_id_scale() -> f32 {
    1.4
}

/// Badge fields as supplied by the employee-data collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BadgeRecord {
    pub th_firstname: Option<String>,
    pub th_lastname: Option<String>,
    pub en_firstname: Option<String>,
    pub en_lastname: Option<String>,
    pub emp_id: Option<u32>,
    pub emp_card_id: Option<String>,
    pub department: Option<String>,
    pub section: Option<String>,
    pub company: Option<String>,
    pub website: Option<String>,
    pub email: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default = "default_name_scale")]
    pub name_font_size: f32,
    #[serde(default = "default_en_name_scale")]
    pub en_name_font_size: f32,
    #[serde(default = "default_id_scale")]
    pub id_font_size: f32,
}

impl Default for BadgeRecord {
    fn default() -> Self {
        Self {
            th_firstname: None,
            th_lastname: None,
            en_firstname: None,
            en_lastname: None,
            emp_id: None,
            emp_card_id: None,
            department: None,
            section: None,
            company: None,
            website: None,
            email: None,
            start_date: None,
            name_font_size: default_name_scale(),
            en_name_font_size: default_en_name_scale(),
            id_font_size: default_id_scale(),
        }
    }
}

fn join_name(first: &Option<String>, last: &Option<String>) -> String {
    let mut parts = Vec::new();
    for p in [first, last] {
        if let Some(p) = p {
            let p = p.trim();
            if !p.is_empty() {
                parts.push(p);
            }
        }
    }
    parts.join(" ")
}

impl BadgeRecord {
    pub fn th_full_name(&self) -> String {
        join_name(&self.th_firstname, &self.th_lastname)
    }

    pub fn en_full_name(&self) -> String {
        join_name(&self.en_firstname, &self.en_lastname)
    }

    pub fn company(&self) -> &str {
        match self.company.as_deref() {
            Some(c) if !c.trim().is_empty() => c,
            _ => "SNNP",
        }
    }

    pub fn website(&self) -> &str {
        match self.website.as_deref() {
            Some(w) if !w.trim().is_empty() => w,
            _ => "snnp.co.th",
        }
    }

    /// The badge cannot identify anyone without an id and at least one name pair.
    pub fn require_identity(&self) -> Result<u32, BadgeError> {
        let emp_id = self
            .emp_id
            .ok_or(BadgeError::MissingRequiredField("emp_id"))?;
        if self.th_full_name().is_empty() && self.en_full_name().is_empty() {
            return Err(BadgeError::MissingRequiredField("name"));
        }
        Ok(emp_id)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Zone {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Zone {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
}

/// Resolution-bound badge geometry. Derived, never persisted.
#[derive(Clone, Debug)]
pub struct BadgeLayout {
    pub scale: f32,
    pub width: u32,
    pub height: u32,
    pub header: Zone,
    pub photo: Zone,
    pub footer: Zone,
    /// White code square, right-aligned within the footer.
    pub code: Zone,
    /// Inner padding between the white square and the code image itself.
    pub code_inset: u32,
    /// Gap above the header art.
    pub header_inset: u32,
    pub corner_radius: u32,
    /// Left edge and max width of the footer text block.
    pub text_left: u32,
    pub text_width: u32,
    pub line_gap: u32,
    pub th_name_px: f32,
    pub en_name_px: f32,
    pub id_px: f32,
    pub id_letter_spacing: f32,
}

fn scaled(base: f32, m: f32) -> u32 {
    (base * m).round() as u32
}

impl BadgeLayout {
    /// Pure function of (record, multiplier). The photo band absorbs the
    /// rounding remainder so the summed bands always equal the total height.
    pub fn compute(record: &BadgeRecord, scale: f32) -> Result<Self, BadgeError> {
        record.require_identity()?;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(BadgeError::Internal(format!(
                "resolution multiplier must be positive, got {scale}"
            )));
        }

        let width = scaled(BASE_WIDTH, scale);
        let height = scaled(BASE_TOTAL_H, scale);
        let header_h = scaled(BASE_HEADER_H, scale);
        let footer_h = scaled(BASE_FOOTER_H, scale);
        let photo_h = height - header_h - footer_h;
        let footer_y = header_h + photo_h;

        let code_side = footer_h;
        let text_left = scaled(24.0, scale);
        let gap = scaled(8.0, scale);

        let unit = BASE_UNIT_PX * scale;

        Ok(Self {
            scale,
            width,
            height,
            header: Zone::new(0, 0, width, header_h),
            photo: Zone::new(0, header_h, width, photo_h),
            footer: Zone::new(0, footer_y, width, footer_h),
            code: Zone::new(width - code_side, footer_y, code_side, code_side),
            code_inset: scaled(4.0, scale),
            header_inset: scaled(4.0, scale),
            corner_radius: scaled(18.0, scale),
            text_left,
            text_width: (width - code_side).saturating_sub(text_left + gap),
            line_gap: gap,
            th_name_px: record.name_font_size * unit,
            en_name_px: record.en_name_font_size * unit,
            id_px: record.id_font_size * unit,
            id_letter_spacing: scale,
        })
    }

    /// Side of the code image inside its white square.
    pub fn code_image_side(&self) -> u32 {
        self.code.w.saturating_sub(2 * self.code_inset)
    }
}
