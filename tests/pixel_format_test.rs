use tex_ngin::{
    data_structures::pixel_format::{
        self, PixelFormat, WRONG_FORMAT, pixel_format_name, pixel_format_size,
    },
    render::{Capabilities, TextureLimits},
};

#[test]
fn sizes_in_bits() {
    assert_eq!(PixelFormat::Rgba8888.size_in_bits(), 32);
    assert_eq!(PixelFormat::Rgb565.size_in_bits(), 16);
    assert_eq!(PixelFormat::Rgba4444.size_in_bits(), 16);
    assert_eq!(PixelFormat::A8.size_in_bits(), 8);
    assert_eq!(PixelFormat::Pvr4.size_in_bits(), 4);
    assert_eq!(PixelFormat::Pvr2.size_in_bits(), 2);
    assert_eq!(PixelFormat::Invalid.size_in_bits(), 0);
    assert_eq!(PixelFormat::Closest.size_in_bits(), 0);
}

#[test]
fn raw_values_outside_the_table_are_wrong_formats() {
    assert_eq!(pixel_format_size(1), 32);
    assert_eq!(pixel_format_size(256), 0);
    assert_eq!(pixel_format_size(77), 0);
    assert_eq!(pixel_format_name(3), "RGBA4444");
    assert_eq!(pixel_format_name(0), WRONG_FORMAT);
    assert_eq!(pixel_format_name(77), WRONG_FORMAT);
    assert_eq!(PixelFormat::try_from(6), Ok(PixelFormat::Pvr2));
    assert_eq!(PixelFormat::try_from(7), Err(7));
}

#[test]
fn closest_prefers_alpha_over_precision() {
    let no_rgba8 = Capabilities {
        formats: vec![PixelFormat::Rgb565, PixelFormat::Rgba4444],
        ..Capabilities::desktop_gl()
    };
    assert_eq!(no_rgba8.closest(PixelFormat::Rgba8888), Some(PixelFormat::Rgba4444));
    assert_eq!(no_rgba8.closest(PixelFormat::Rgb565), Some(PixelFormat::Rgb565));
    assert_eq!(no_rgba8.closest(PixelFormat::A8), Some(PixelFormat::Rgba4444));
}

#[test]
fn compressed_requests_degrade_on_desktop() {
    let desktop = Capabilities::desktop_gl();
    assert_eq!(desktop.closest(PixelFormat::Pvr4), Some(PixelFormat::Rgba8888));
    assert_eq!(desktop.closest(PixelFormat::Pvr2), Some(PixelFormat::Rgba4444));
    assert_eq!(Capabilities::gles().closest(PixelFormat::Pvr2), Some(PixelFormat::Pvr2));
}

#[test]
fn resolve_only_negotiates_closest() {
    let desktop = Capabilities::desktop_gl();
    assert_eq!(
        desktop.resolve(PixelFormat::Closest, PixelFormat::Rgb565),
        Some(PixelFormat::Rgb565)
    );
    assert_eq!(desktop.resolve(PixelFormat::Pvr4, PixelFormat::Rgba8888), None);
    assert_eq!(desktop.resolve(PixelFormat::Invalid, PixelFormat::Rgba8888), None);
}

#[test]
fn limits_presets() {
    assert!(TextureLimits::MOBILE.contains(1024, 8));
    assert!(!TextureLimits::MOBILE.contains(2048, 8));
    assert!(TextureLimits::DESKTOP.contains(4096, 4096));
    assert!(!TextureLimits::DESKTOP.contains(4, 64));
    assert_eq!(Capabilities::gles().limits, TextureLimits::MOBILE);
}

#[test]
fn conversions_go_through_rgba8() {
    let rgba = [255, 128, 0, 255, 0, 0, 255, 0];
    let packed = pixel_format::from_rgba8(PixelFormat::Rgb565, &rgba).unwrap();
    assert_eq!(packed.len(), 4);
    let back = pixel_format::to_rgba8(PixelFormat::Rgb565, &packed).unwrap();
    assert_eq!(&back[0..4], &[255, 130, 0, 255]);
    assert_eq!(&back[4..8], &[0, 0, 255, 255]);

    let alpha = pixel_format::from_rgba8(PixelFormat::A8, &rgba).unwrap();
    assert_eq!(alpha, vec![255, 0]);
    assert!(pixel_format::from_rgba8(PixelFormat::Pvr4, &rgba).is_none());
}
