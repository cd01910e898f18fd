use super::*;
use crate::foundation::core::Extent;

fn half_alpha_source(w: u32, h: u32) -> SourceImage {
    SourceImage::from_premul_rgba8(w, h, [64u8, 32, 16, 128].repeat((w * h) as usize)).unwrap()
}

#[test]
fn shared_edges_cover_each_pixel_exactly_once() {
    let extent = Extent::new(32, 32).unwrap();
    let src = half_alpha_source(32, 32);
    let mut dst = FrameRGBA::transparent(extent);

    let a = Point::new(2.3, 1.7);
    let b = Point::new(29.6, 3.1);
    let c = Point::new(30.2, 28.9);
    let d = Point::new(1.1, 30.4);
    let m = Point::new(17.37, 12.81);
    let fan = [[a, b, m], [b, c, m], [c, d, m], [d, a, m]];

    let mut total = 0;
    for tri in fan {
        total += fill_triangle(&mut dst, tri, Affine::IDENTITY, &src, Sampling::Nearest);
    }

    let mut covered = 0;
    for px in dst.data.chunks_exact(4) {
        assert!(px[3] == 0 || px[3] == 128, "double coverage: {px:?}");
        if px[3] == 128 {
            covered += 1;
        }
    }
    assert_eq!(covered, total);
    assert!(covered > 600);
}

#[test]
fn winding_order_does_not_matter() {
    let extent = Extent::new(16, 16).unwrap();
    let src = half_alpha_source(16, 16);
    let tri = [
        Point::new(1.0, 1.0),
        Point::new(14.0, 2.0),
        Point::new(4.0, 13.0),
    ];
    let mut cw = FrameRGBA::transparent(extent);
    let mut ccw = FrameRGBA::transparent(extent);
    let n0 = fill_triangle(&mut cw, tri, Affine::IDENTITY, &src, Sampling::Nearest);
    let n1 = fill_triangle(
        &mut ccw,
        [tri[0], tri[2], tri[1]],
        Affine::IDENTITY,
        &src,
        Sampling::Nearest,
    );
    assert!(n0 > 0);
    assert_eq!(n0, n1);
    assert_eq!(cw, ccw);
}

#[test]
fn zero_area_and_offscreen_triangles_write_nothing() {
    let extent = Extent::new(8, 8).unwrap();
    let src = half_alpha_source(8, 8);
    let mut dst = FrameRGBA::transparent(extent);
    let flat = [
        Point::new(0.0, 0.0),
        Point::new(4.0, 4.0),
        Point::new(8.0, 8.0),
    ];
    assert_eq!(
        fill_triangle(&mut dst, flat, Affine::IDENTITY, &src, Sampling::Nearest),
        0
    );
    let off = [
        Point::new(-20.0, -20.0),
        Point::new(-10.0, -20.0),
        Point::new(-20.0, -10.0),
    ];
    assert_eq!(
        fill_triangle(&mut dst, off, Affine::IDENTITY, &src, Sampling::Nearest),
        0
    );
    let nan = [Point::new(f64::NAN, 0.0), Point::new(4.0, 0.0), Point::new(0.0, 4.0)];
    assert_eq!(
        fill_triangle(&mut dst, nan, Affine::IDENTITY, &src, Sampling::Nearest),
        0
    );
    assert!(dst.data.iter().all(|&b| b == 0));
}

#[test]
fn samples_outside_the_source_are_skipped() {
    let src = half_alpha_source(4, 4);
    assert!(sample(&src, Point::new(-0.5, 1.0), Sampling::Nearest).is_none());
    assert!(sample(&src, Point::new(10.0, 1.0), Sampling::Bilinear).is_none());
    assert_eq!(
        sample(&src, Point::new(1.5, 1.5), Sampling::Nearest),
        Some([64, 32, 16, 128])
    );
    assert_eq!(
        sample(&src, Point::new(1.5, 1.5), Sampling::Bilinear),
        Some([64, 32, 16, 128])
    );
}

#[test]
fn bilinear_blends_neighbouring_pixels() {
    let src =
        SourceImage::from_premul_rgba8(2, 1, vec![0, 0, 0, 255, 200, 200, 200, 255]).unwrap();
    let mid = sample(&src, Point::new(1.0, 0.5), Sampling::Bilinear).unwrap();
    assert_eq!(mid, [100, 100, 100, 255]);
}
