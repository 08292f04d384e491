use pdfmark_core::{CanvasGeometry, DocPoint, PageSize, RenderImage};

const MARKER_RGBA: [u8; 4] = [229, 57, 53, 255];
const HALO_RGBA: [u8; 4] = [255, 255, 255, 255];

/// Paints a crosshair at `point` (document space) onto a raster of a page of
/// `page` size. Points off the page are ignored.
pub fn draw_destination_marker(image: &mut RenderImage, page: PageSize, point: DocPoint) {
    if image.width == 0 || image.height == 0 {
        return;
    }
    let geometry = CanvasGeometry {
        render_width: f64::from(page.width),
        render_height: f64::from(page.height),
        display_width: f64::from(image.width),
        display_height: f64::from(image.height),
    };
    let (cx, cy) = geometry.to_canvas(point);
    if !cx.is_finite() || !cy.is_finite() || !geometry.contains(cx, cy) {
        return;
    }

    let arm = (image.width.min(image.height) / 40).clamp(6, 24) as i64;
    let (cx, cy) = (cx.round() as i64, cy.round() as i64);

    for offset in -arm..=arm {
        for spread in [-1, 1] {
            put(image, cx + offset, cy + spread, HALO_RGBA);
            put(image, cx + spread, cy + offset, HALO_RGBA);
        }
    }
    for offset in -arm..=arm {
        put(image, cx + offset, cy, MARKER_RGBA);
        put(image, cx, cy + offset, MARKER_RGBA);
    }
}

fn put(image: &mut RenderImage, x: i64, y: i64, rgba: [u8; 4]) {
    if x < 0 || y < 0 || x >= i64::from(image.width) || y >= i64::from(image.height) {
        return;
    }
    let index = ((y as usize) * image.width as usize + x as usize) * 4;
    if let Some(pixel) = image.pixels.get_mut(index..index + 4) {
        pixel.copy_from_slice(&rgba);
    }
}
