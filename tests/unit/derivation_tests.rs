// End-to-end derivation tests: source on disk to published thumbnail

use super::support::{files_below, png_bytes, thumb_in, write_png, FIXTURE_FONT};
use image::{ImageFormat, Rgba, RgbaImage};
use serde_json::json;
use std::collections::HashSet;
use std::io::Cursor;
use std::sync::Arc;
use thumbsmith::raster::ImageBackend;
use thumbsmith::thumb::{render_thumbnail, Derivation};

fn derive_image(
    thumb: &thumbsmith::thumb::Thumb,
    image: &str,
    overrides: serde_json::Value,
) -> image::RgbaImage {
    let options = thumb.options_with(&overrides).unwrap();
    let derivation =
        tokio_test::block_on(thumb.get_or_create_thumbnail(image, &options)).unwrap();
    // Output bytes follow the encoded format, not the file extension
    let bytes = std::fs::read(derivation.path().unwrap()).unwrap();
    image::load_from_memory(&bytes).unwrap().to_rgba8()
}

fn write_source(path: &std::path::Path, bytes: Vec<u8>) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, bytes).unwrap();
}

fn assert_padded_white_around_dark_content(img: &RgbaImage) {
    assert_eq!(img.dimensions(), (50, 50));
    for (x, y) in [(0, 0), (49, 0), (0, 49), (49, 49)] {
        let corner = img.get_pixel(x, y);
        assert!(
            corner[0] > 240 && corner[1] > 240 && corner[2] > 240,
            "corner ({}, {}) is {:?}",
            x,
            y,
            corner
        );
        assert_eq!(corner[3], 255);
    }
    let center = img.get_pixel(25, 25);
    assert!(center[0] < 60);
}

/// Test: concurrent requests for one missing thumbnail
///
/// Every request must observe the same path, and the published file must be
/// complete and identical to a single render. No temp files may remain.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_generation_publishes_one_complete_file() {
    let dir = tempfile::tempdir().unwrap();
    write_png(&dir.path().join("images/cat.png"), 300, 200);
    let thumb = Arc::new(thumb_in(dir.path()));
    let options = thumb
        .options_with(&json!({"resize": {"width": 64, "height": 64, "method": "crop"}}))
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let thumb = Arc::clone(&thumb);
        let options = options.clone();
        handles.push(tokio::spawn(async move {
            thumb.get_or_create_thumbnail("cat.png", &options).await
        }));
    }

    let mut paths = HashSet::new();
    for handle in handles {
        let derivation = handle.await.unwrap().unwrap();
        paths.insert(derivation.path().unwrap().to_path_buf());
    }
    assert_eq!(paths.len(), 1);
    let path = paths.into_iter().next().unwrap();

    let published = files_below(&dir.path().join("thumbs"));
    assert_eq!(published, vec![path.clone()]);

    let expected = render_thumbnail(
        &ImageBackend::default(),
        &png_bytes(300, 200),
        &options,
        None,
    )
    .unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), expected);
}

#[test]
fn test_crop_undersized_never_enlarges() {
    let dir = tempfile::tempdir().unwrap();
    write_png(&dir.path().join("images/small.png"), 20, 10);
    let thumb = thumb_in(dir.path());

    let img = derive_image(
        &thumb,
        "small.png",
        json!({"resize": {"width": 40, "height": 40, "method": "crop", "stretch": false}}),
    );
    assert_eq!(img.dimensions(), (20, 10));
}

#[test]
fn test_fit_trim_canvas_is_content() {
    let dir = tempfile::tempdir().unwrap();
    write_png(&dir.path().join("images/wide.png"), 100, 50);
    let thumb = thumb_in(dir.path());

    let img = derive_image(
        &thumb,
        "wide.png",
        json!({"resize": {"width": 50, "height": 50, "trim": true}}),
    );
    assert_eq!(img.dimensions(), (50, 25));
}

#[test]
fn test_fit_pads_with_solid_background() {
    let dir = tempfile::tempdir().unwrap();
    write_png(&dir.path().join("images/wide.png"), 100, 50);
    let thumb = thumb_in(dir.path());

    let img = derive_image(
        &thumb,
        "wide.png",
        json!({"resize": {"width": 50, "height": 50, "background": "#336699"}}),
    );
    assert_eq!(img.dimensions(), (50, 50));
    assert_eq!(*img.get_pixel(0, 0), Rgba([0x33, 0x66, 0x99, 255]));
    assert_eq!(*img.get_pixel(49, 49), Rgba([0x33, 0x66, 0x99, 255]));
}

#[test]
fn test_fit_pads_alpha_source_with_transparency() {
    let dir = tempfile::tempdir().unwrap();
    write_png(&dir.path().join("images/wide.png"), 100, 50);
    let thumb = thumb_in(dir.path());

    let img = derive_image(&thumb, "wide.png", json!({"resize": {"width": 50, "height": 50}}));
    assert_eq!(img.get_pixel(0, 0)[3], 0);
    assert_eq!(img.get_pixel(25, 25)[3], 255);
}

#[test]
fn test_jpeg_source_is_padded_white() {
    let dir = tempfile::tempdir().unwrap();
    let source = RgbaImage::from_pixel(100, 50, Rgba([20, 20, 20, 255]));
    let mut buffer = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(source)
        .to_rgb8()
        .write_to(&mut buffer, ImageFormat::Jpeg)
        .unwrap();
    let path = dir.path().join("images/dark.jpg");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, buffer.into_inner()).unwrap();
    let thumb = thumb_in(dir.path());

    let img = derive_image(&thumb, "dark.jpg", json!({"resize": {"width": 50, "height": 50}}));
    assert_padded_white_around_dark_content(&img);
}

#[test]
fn test_gif_source_is_padded_white() {
    let dir = tempfile::tempdir().unwrap();
    let source = RgbaImage::from_pixel(100, 50, Rgba([20, 20, 20, 255]));
    let mut buffer = Cursor::new(Vec::new());
    source.write_to(&mut buffer, ImageFormat::Gif).unwrap();
    write_source(&dir.path().join("images/dark.gif"), buffer.into_inner());
    let thumb = thumb_in(dir.path());

    let img = derive_image(&thumb, "dark.gif", json!({"resize": {"width": 50, "height": 50}}));
    assert_padded_white_around_dark_content(&img);
}

#[test]
fn test_webp_source_is_padded_white() {
    let dir = tempfile::tempdir().unwrap();
    let rgb = vec![20u8; 100 * 50 * 3];
    let encoded = webp::Encoder::from_rgb(&rgb, 100, 50).encode(90.0).to_vec();
    write_source(&dir.path().join("images/dark.webp"), encoded);
    let thumb = thumb_in(dir.path());

    let img = derive_image(&thumb, "dark.webp", json!({"resize": {"width": 50, "height": 50}}));
    assert_padded_white_around_dark_content(&img);
}

#[test]
fn test_forced_webp_output_keeps_transparent_padding() {
    let dir = tempfile::tempdir().unwrap();
    let source = RgbaImage::from_pixel(100, 50, Rgba([20, 20, 20, 255]));
    let mut buffer = Cursor::new(Vec::new());
    source.write_to(&mut buffer, ImageFormat::Gif).unwrap();
    write_source(&dir.path().join("images/dark.gif"), buffer.into_inner());
    let thumb = thumb_in(dir.path());

    let options = thumb
        .options_with(&json!({"webp": true, "resize": {"width": 50, "height": 50}}))
        .unwrap();
    let derivation =
        tokio_test::block_on(thumb.get_or_create_thumbnail("dark.gif", &options)).unwrap();
    let bytes = std::fs::read(derivation.path().unwrap()).unwrap();

    let decoded = webp::Decoder::new(&bytes).decode().unwrap();
    assert!(decoded.is_alpha());
    assert_eq!((decoded.width(), decoded.height()), (50, 50));
    let alpha_at = |x: usize, y: usize| decoded[(y * 50 + x) * 4 + 3];
    assert_eq!(alpha_at(0, 0), 0);
    assert_eq!(alpha_at(25, 25), 255);
}

#[test]
fn test_grayscale_output() {
    let dir = tempfile::tempdir().unwrap();
    write_png(&dir.path().join("images/cat.png"), 60, 60);
    let thumb = thumb_in(dir.path());

    let img = derive_image(
        &thumb,
        "cat.png",
        json!({"resize": {"width": 30, "height": 30, "grayscale": true}}),
    );
    for pixel in img.pixels() {
        assert_eq!(pixel[0], pixel[1]);
        assert_eq!(pixel[1], pixel[2]);
    }
}

#[test]
fn test_image_watermark_is_aligned_top_left() {
    let dir = tempfile::tempdir().unwrap();
    write_png(&dir.path().join("images/cat.png"), 80, 80);
    let logo = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 255, 255]));
    let logo_path = dir.path().join("watermarks/logo.png");
    std::fs::create_dir_all(logo_path.parent().unwrap()).unwrap();
    logo.save(&logo_path).unwrap();
    let thumb = thumb_in(dir.path());

    let img = derive_image(
        &thumb,
        "cat.png",
        json!({
            "resize": {"width": null, "height": null},
            "watermark": {
                "image": "logo.png",
                "width": 20,
                "height": 20,
                "align_x": "left",
                "align_y": "top"
            }
        }),
    );
    assert_eq!(img.dimensions(), (80, 80));
    let inside = img.get_pixel(5, 5);
    assert!(inside[2] > 240 && inside[0] < 15);
    let outside = img.get_pixel(60, 60);
    assert_eq!(outside[2], 120);
}

#[test]
fn test_text_watermark_is_drawn_bottom_right() {
    let dir = tempfile::tempdir().unwrap();
    write_png(&dir.path().join("images/cat.png"), 200, 100);
    let thumb = thumb_in(dir.path());

    let img = derive_image(
        &thumb,
        "cat.png",
        json!({
            "resize": {"width": null, "height": null},
            "watermark": {
                "text": "HI",
                "font": FIXTURE_FONT,
                "font_size": 32.0,
                "color": "#F00",
                "align_x": "right",
                "align_y": "bottom"
            }
        }),
    );

    let red_in_corner = (140..200)
        .flat_map(|x| (50..100).map(move |y| (x, y)))
        .any(|(x, y)| {
            let p = img.get_pixel(x, y);
            p[0] > 200 && p[1] < 80 && p[2] < 80
        });
    assert!(red_in_corner);

    let untouched = img.get_pixel(10, 10);
    assert_eq!(untouched[2], 120);
}

#[test]
fn test_missing_font_fails_without_publishing() {
    let dir = tempfile::tempdir().unwrap();
    write_png(&dir.path().join("images/cat.png"), 20, 20);
    let thumb = thumb_in(dir.path());
    let options = thumb
        .options_with(&json!({"watermark": {"text": "x", "font": "NoSuchFont"}}))
        .unwrap();

    let result = tokio_test::block_on(thumb.get_or_create_thumbnail("cat.png", &options));
    assert!(result.is_err());
    assert!(files_below(&dir.path().join("thumbs")).is_empty());
}

#[tokio::test]
async fn test_existing_thumbnail_is_not_regenerated() {
    let dir = tempfile::tempdir().unwrap();
    write_png(&dir.path().join("images/cat.png"), 40, 40);
    let thumb = thumb_in(dir.path());
    let options = thumb.config().defaults.clone();

    let first = thumb.get_or_create_thumbnail("cat.png", &options).await.unwrap();
    let path = first.path().unwrap().to_path_buf();
    std::fs::write(&path, b"sentinel").unwrap();

    let second = thumb.get_or_create_thumbnail("cat.png", &options).await.unwrap();
    assert_eq!(second, Derivation::Existing(path.clone()));
    assert_eq!(std::fs::read(&path).unwrap(), b"sentinel");
}
