//! Rasterizes a computed layout into an RGBA buffer.
//!
//! All inputs arrive fully decoded; composition itself is synchronous and
//! deterministic. Fonts come from the process-wide cache.

use std::sync::Arc;

use image::{imageops, imageops::FilterType, Rgba, RgbaImage};
use rusttype::{point, Font, Scale};

use super::{
    font_cache::{self, Face},
    layout::{BadgeLayout, BadgeRecord, Zone},
    photo, BadgeError,
};

const PHOTO_BAND_BG: Rgba<u8> = Rgba([241, 245, 249, 255]);
const PLACEHOLDER_FG: Rgba<u8> = Rgba([203, 213, 225, 255]);
const HEADER_RULE: Rgba<u8> = Rgba([241, 245, 249, 255]);
const FOOTER_FALLBACK_BG: Rgba<u8> = Rgba([30, 41, 59, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

pub struct BadgeFonts {
    pub name: Arc<Font<'static>>,
    pub id: Arc<Font<'static>>,
}

impl BadgeFonts {
    pub fn load() -> Result<Self, BadgeError> {
        Ok(Self {
            name: font_cache::load(Face::Name)?,
            id: font_cache::load(Face::EmployeeId)?,
        })
    }
}

/// Decoded embedded images for one render.
pub struct BadgeResources {
    pub photo: Option<RgbaImage>,
    pub code: RgbaImage,
    pub header_art: Option<RgbaImage>,
    pub footer_art: Option<RgbaImage>,
}

pub(crate) fn parse_hex_color(s: &str) -> Option<Rgba<u8>> {
    let s = s.trim().trim_start_matches('#');
    if s.len() != 6 {
        return None;
    }
    let b = hex::decode(s).ok()?;
    Some(Rgba([b[0], b[1], b[2], 255]))
}

pub(crate) fn text_width(font: &Font<'_>, px: f32, text: &str, letter_spacing: f32) -> f32 {
    if text.is_empty() {
        return 0.0;
    }
    let scale = Scale::uniform(px);
    let v_metrics = font.v_metrics(scale);
    let glyphs: Vec<_> = font.layout(text, scale, point(0.0, v_metrics.ascent)).collect();

    let mut width: f32 = 0.0;
    for (i, g) in glyphs.iter().enumerate() {
        if let Some(bb) = g.pixel_bounding_box() {
            width = width.max(bb.max.x as f32);
        }
        if i + 1 < glyphs.len() {
            width += letter_spacing;
        }
    }
    width
}

/// `y` is the top of the em box; rusttype positions by baseline.
fn draw_text(
    img: &mut RgbaImage,
    font: &Font<'_>,
    px: f32,
    x: i32,
    y: i32,
    color: Rgba<u8>,
    text: &str,
    letter_spacing: f32,
) {
    let scale = Scale::uniform(px);
    let v_metrics = font.v_metrics(scale);
    let mut caret_x = x as f32;
    let baseline_y = y as f32 + v_metrics.ascent;

    for ch in text.chars() {
        let glyph = font.glyph(ch).scaled(scale).positioned(point(caret_x, baseline_y));
        if let Some(bb) = glyph.pixel_bounding_box() {
            glyph.draw(|gx, gy, v| {
                let px = gx as i32 + bb.min.x;
                let py = gy as i32 + bb.min.y;
                if px < 0 || py < 0 {
                    return;
                }
                let (px, py) = (px as u32, py as u32);
                if px >= img.width() || py >= img.height() {
                    return;
                }
                let a = (v * 255.0) as u8;
                if a == 0 {
                    return;
                }
                let dst = img.get_pixel_mut(px, py);
                let sa = a as f32 / 255.0;
                let inv = 1.0 - sa;
                dst.0[0] = (color.0[0] as f32 * sa + dst.0[0] as f32 * inv) as u8;
                dst.0[1] = (color.0[1] as f32 * sa + dst.0[1] as f32 * inv) as u8;
                dst.0[2] = (color.0[2] as f32 * sa + dst.0[2] as f32 * inv) as u8;
                dst.0[3] = 255;
            });
        }
        caret_x += glyph.unpositioned().h_metrics().advance_width + letter_spacing;
    }
}

fn wrap_to_width(text: &str, font: &Font<'_>, px: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for word in text.split_whitespace() {
        let mut test = current.clone();
        test.push(word);
        let test_line = test.join(" ");
        if text_width(font, px, &test_line, 0.0) <= max_width {
            current.push(word);
        } else {
            if !current.is_empty() {
                lines.push(current.join(" "));
            }
            current = vec![word];
        }
    }
    if !current.is_empty() {
        lines.push(current.join(" "));
    }
    lines
}

/// Word-wrap, then keep at most `max_lines` lines, eliding the overflow.
pub fn clamp_lines(
    text: &str,
    font: &Font<'_>,
    px: f32,
    max_width: f32,
    max_lines: usize,
) -> Vec<String> {
    let mut lines = wrap_to_width(text, font, px, max_width);
    if lines.len() <= max_lines {
        return lines;
    }

    lines.truncate(max_lines);
    if let Some(last) = lines.last_mut() {
        const ELLIPSIS: &str = "...";
        while !last.is_empty()
            && text_width(font, px, &format!("{last}{ELLIPSIS}"), 0.0) > max_width
        {
            last.pop();
        }
        while last.ends_with(' ') {
            last.pop();
        }
        last.push_str(ELLIPSIS);
    }
    lines
}

fn overlay(base: &mut RgbaImage, over: &RgbaImage, x: u32, y: u32) {
    for oy in 0..over.height() {
        for ox in 0..over.width() {
            let p = over.get_pixel(ox, oy);
            let a = p.0[3] as f32 / 255.0;
            if a <= 0.0 {
                continue;
            }
            let bx = x + ox;
            let by = y + oy;
            if bx >= base.width() || by >= base.height() {
                continue;
            }
            let dst = base.get_pixel_mut(bx, by);
            let inv = 1.0 - a;
            dst.0[0] = (p.0[0] as f32 * a + dst.0[0] as f32 * inv) as u8;
            dst.0[1] = (p.0[1] as f32 * a + dst.0[1] as f32 * inv) as u8;
            dst.0[2] = (p.0[2] as f32 * a + dst.0[2] as f32 * inv) as u8;
            dst.0[3] = 255;
        }
    }
}

fn fill_zone(img: &mut RgbaImage, zone: Zone, color: Rgba<u8>) {
    for y in zone.y..(zone.y + zone.h).min(img.height()) {
        for x in zone.x..(zone.x + zone.w).min(img.width()) {
            img.put_pixel(x, y, color);
        }
    }
}

/// Largest scaled copy of `sw`×`sh` that fits inside `bounds`, centered.
pub(crate) fn contain_zone(sw: u32, sh: u32, bounds: Zone) -> Zone {
    if sw == 0 || sh == 0 || bounds.w == 0 || bounds.h == 0 {
        return Zone::new(bounds.x, bounds.y, 0, 0);
    }
    let scale = (bounds.w as f32 / sw as f32).min(bounds.h as f32 / sh as f32);
    let w = (((sw as f32) * scale).round() as u32).clamp(1, bounds.w);
    let h = (((sh as f32) * scale).round() as u32).clamp(1, bounds.h);
    Zone::new(
        bounds.x + (bounds.w - w) / 2,
        bounds.y + (bounds.h - h) / 2,
        w,
        h,
    )
}

/// Neutral person silhouette for records with no stored photo.
fn draw_placeholder(img: &mut RgbaImage, band: Zone) {
    let side = band.w.min(band.h) as f32;
    let cx = band.x as f32 + band.w as f32 / 2.0;
    let cy = band.y as f32 + band.h as f32 / 2.0;

    // head
    let head_r = side * 0.11;
    let head_cy = cy - side * 0.12;
    // shoulders: half-disc below the head
    let torso_r = side * 0.20;
    let torso_cy = cy + side * 0.16;

    let y0 = band.y;
    let y1 = (band.y + band.h).min(img.height());
    let x0 = band.x;
    let x1 = (band.x + band.w).min(img.width());
    for y in y0..y1 {
        for x in x0..x1 {
            let fx = x as f32 + 0.5;
            let fy = y as f32 + 0.5;

            let dh = ((fx - cx).powi(2) + (fy - head_cy).powi(2)).sqrt();
            let in_head = dh <= head_r;

            let dt = ((fx - cx).powi(2) + (fy - torso_cy).powi(2)).sqrt();
            let in_torso = dt <= torso_r && fy >= torso_cy - torso_r * 0.55;

            if in_head || in_torso {
                img.put_pixel(x, y, PLACEHOLDER_FG);
            }
        }
    }
}

/// Make the area outside the rounded rect transparent.
fn carve_rounded_corners(img: &mut RgbaImage, radius: u32) {
    if radius == 0 {
        return;
    }
    let (w, h) = (img.width() as i32, img.height() as i32);
    let r = radius as i32;

    for y in 0..h {
        for x in 0..w {
            let dx_left = x;
            let dx_right = (w - 1) - x;
            let dy_top = y;
            let dy_bottom = (h - 1) - y;

            let corner = if dx_left < r && dy_top < r {
                Some((dx_left, dy_top))
            } else if dx_right < r && dy_top < r {
                Some((dx_right, dy_top))
            } else if dx_left < r && dy_bottom < r {
                Some((dx_left, dy_bottom))
            } else if dx_right < r && dy_bottom < r {
                Some((dx_right, dy_bottom))
            } else {
                None
            };

            if let Some((dx, dy)) = corner {
                let cx = r - 1;
                let cy = r - 1;
                let dist2 = (dx - cx) * (dx - cx) + (dy - cy) * (dy - cy);
                if dist2 > r * r {
                    img.get_pixel_mut(x as u32, y as u32).0[3] = 0;
                }
            }
        }
    }
}

/// One text group in the footer block.
struct FooterLine<'a> {
    font: &'a Font<'static>,
    px: f32,
    line_height: f32,
    letter_spacing: f32,
    lines: Vec<String>,
}

impl FooterLine<'_> {
    fn height(&self) -> f32 {
        self.px * self.line_height * self.lines.len() as f32
    }
}

/// Compose the full badge. Every resource must already be decoded.
pub fn compose(
    layout: &BadgeLayout,
    record: &BadgeRecord,
    fonts: &BadgeFonts,
    res: &BadgeResources,
    background: Option<Rgba<u8>>,
) -> RgbaImage {
    let _timing = crate::perf_scope!("compose");
    let mut img = RgbaImage::from_pixel(layout.width, layout.height, background.unwrap_or(WHITE));

    // header band: white backing, contained art, hairline rule at the bottom
    fill_zone(&mut img, layout.header, WHITE);
    if let Some(art) = &res.header_art {
        let bounds = Zone::new(
            layout.header.x,
            layout.header.y + layout.header_inset,
            layout.header.w,
            layout.header.h.saturating_sub(layout.header_inset),
        );
        let slot = contain_zone(art.width(), art.height(), bounds);
        if slot.w > 0 && slot.h > 0 {
            let scaled = imageops::resize(art, slot.w, slot.h, FilterType::Lanczos3);
            overlay(&mut img, &scaled, slot.x, slot.y);
        }
    }
    let rule = ((layout.scale).round() as u32).max(1);
    fill_zone(
        &mut img,
        Zone::new(
            layout.header.x,
            (layout.header.y + layout.header.h).saturating_sub(rule),
            layout.header.w,
            rule,
        ),
        HEADER_RULE,
    );

    // photo band: crop-to-fill, or the placeholder silhouette
    fill_zone(&mut img, layout.photo, PHOTO_BAND_BG);
    match &res.photo {
        Some(photo_img) => {
            let fitted = photo::resize_to_cover(photo_img, layout.photo.w, layout.photo.h);
            overlay(&mut img, &fitted, layout.photo.x, layout.photo.y);
        }
        None => draw_placeholder(&mut img, layout.photo),
    }

    // footer band art
    match &res.footer_art {
        Some(art) => {
            let fitted = photo::resize_to_cover(art, layout.footer.w, layout.footer.h);
            overlay(&mut img, &fitted, layout.footer.x, layout.footer.y);
        }
        None => fill_zone(&mut img, layout.footer, FOOTER_FALLBACK_BG),
    }

    // footer text block, vertically centered left of the code square
    let mut groups: Vec<FooterLine> = Vec::new();
    let th_name = record.th_full_name();
    if !th_name.is_empty() {
        groups.push(FooterLine {
            font: fonts.name.as_ref(),
            px: layout.th_name_px,
            line_height: 1.2,
            letter_spacing: 0.0,
            lines: vec![th_name],
        });
    }
    let en_name = record.en_full_name().to_uppercase();
    if !en_name.is_empty() {
        groups.push(FooterLine {
            font: fonts.name.as_ref(),
            px: layout.en_name_px,
            line_height: 1.1,
            letter_spacing: 0.0,
            lines: clamp_lines(&en_name, &fonts.name, layout.en_name_px, layout.text_width as f32, 2),
        });
    }
    if let Some(emp_id) = record.emp_id {
        groups.push(FooterLine {
            font: fonts.id.as_ref(),
            px: layout.id_px,
            line_height: 1.2,
            letter_spacing: layout.id_letter_spacing,
            lines: vec![emp_id.to_string()],
        });
    }

    let total: f32 = groups.iter().map(FooterLine::height).sum::<f32>()
        + layout.line_gap as f32 * groups.len().saturating_sub(1) as f32;
    let mut cursor = layout.footer.y as f32 + (layout.footer.h as f32 - total).max(0.0) / 2.0;
    for group in &groups {
        for line in &group.lines {
            draw_text(
                &mut img,
                group.font,
                group.px,
                layout.text_left as i32,
                cursor.round() as i32,
                WHITE,
                line,
                group.letter_spacing,
            );
            cursor += group.px * group.line_height;
        }
        cursor += layout.line_gap as f32;
    }

    // code square, right-aligned in the footer
    fill_zone(&mut img, layout.code, WHITE);
    let side = layout.code_image_side();
    if side > 0 {
        let code = if res.code.dimensions() == (side, side) {
            res.code.clone()
        } else {
            imageops::resize(&res.code, side, side, FilterType::Lanczos3)
        };
        overlay(&mut img, &code, layout.code.x + layout.code_inset, layout.code.y + layout.code_inset);
    }

    carve_rounded_corners(&mut img, layout.corner_radius);
    img
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_parse() {
        assert_eq!(parse_hex_color("#FFFFFF"), Some(WHITE));
        assert_eq!(parse_hex_color("1e293b"), Some(Rgba([30, 41, 59, 255])));
        assert_eq!(parse_hex_color("#fff"), None);
        assert_eq!(parse_hex_color("zzzzzz"), None);
    }

    #[test]
    fn contain_zone_fits_and_centers() {
        let bounds = Zone::new(10, 20, 100, 50);
        // wide source limited by width
        let z = contain_zone(200, 50, bounds);
        assert_eq!((z.w, z.h), (100, 25));
        assert_eq!(z.x, 10);
        assert_eq!(z.y, 20 + (50 - 25) / 2);
        // tall source limited by height
        let z = contain_zone(50, 200, bounds);
        assert_eq!((z.w, z.h), (13, 50));
        assert!(z.x >= 10 && z.x + z.w <= 110);
    }

    #[test]
    fn placeholder_marks_the_band() {
        let mut img = RgbaImage::from_pixel(350, 547, WHITE);
        let band = Zone::new(0, 73, 350, 347);
        fill_zone(&mut img, band, PHOTO_BAND_BG);
        draw_placeholder(&mut img, band);

        // head center is tinted
        let cx = 175u32;
        let head_y = (73.0 + 347.0 / 2.0 - 347.0 * 0.12) as u32;
        assert_eq!(*img.get_pixel(cx, head_y), PLACEHOLDER_FG);
        // band corner stays background
        assert_eq!(*img.get_pixel(2, 75), PHOTO_BAND_BG);
    }

    #[test]
    fn corner_carve_clears_corners_only() {
        let mut img = RgbaImage::from_pixel(100, 100, WHITE);
        carve_rounded_corners(&mut img, 18);
        assert_eq!(img.get_pixel(0, 0).0[3], 0);
        assert_eq!(img.get_pixel(99, 0).0[3], 0);
        assert_eq!(img.get_pixel(0, 99).0[3], 0);
        assert_eq!(img.get_pixel(99, 99).0[3], 0);
        assert_eq!(img.get_pixel(50, 0).0[3], 255);
        assert_eq!(img.get_pixel(50, 50).0[3], 255);
        assert_eq!(img.get_pixel(0, 50).0[3], 255);
    }

    #[test]
    fn zone_fill_respects_bounds() {
        let mut img = RgbaImage::from_pixel(10, 10, WHITE);
        fill_zone(&mut img, Zone::new(8, 8, 10, 10), PHOTO_BAND_BG);
        assert_eq!(*img.get_pixel(9, 9), PHOTO_BAND_BG);
        assert_eq!(*img.get_pixel(7, 7), WHITE);
    }
}
