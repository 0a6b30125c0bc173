use j2k_by_frame::*;

const TOLERANCE: i32 = 24;

fn solid(size: Size, rgb: [u8; 3]) -> Image {
    let data = rgb
        .iter()
        .copied()
        .cycle()
        .take(size.area() * 3)
        .collect();
    Image::from_rgb24(size, data).unwrap()
}

fn request(size: Size) -> FrameEncodeRequest {
    FrameEncodeRequest::new(size, 0, Scaler::Bicubic, 0, 24.0, "", 0, 250_000_000)
}

fn decode(codestream: &[u8]) -> jpeg2k::Image {
    jpeg2k::Image::from_bytes(codestream).expect("codestream should decode")
}

#[test]
fn solid_colours_survive_compression() {
    let size = Size::new(64, 64);
    for &rgb in &[[255, 255, 255], [0, 255, 0], [200, 100, 50], [128, 64, 32]] {
        let expected = rgb_to_xyz(rgb, ColourLut::Srgb);
        let encoded = encode_locally(&solid(size, rgb), &request(size)).unwrap();

        let decoded = decode(encoded.data());
        assert_eq!(decoded.width(), 64);
        assert_eq!(decoded.height(), 64);
        let components = decoded.components();
        assert_eq!(components.len(), 3);
        for (c, component) in components.iter().enumerate() {
            assert_eq!(component.precision(), 12);
            for &sample in component.data() {
                assert!(
                    (sample - expected[c]).abs() <= TOLERANCE,
                    "{:?} component {}: decoded {} expected {}",
                    rgb,
                    c,
                    sample,
                    expected[c]
                );
            }
        }
    }
}

#[test]
fn output_has_requested_size_with_padding() {
    let out = Size::new(96, 64);
    let mut req = request(out);
    req.padding = 16;
    let encoded = encode_locally(&solid(Size::new(40, 40), [255, 255, 255]), &req).unwrap();

    let decoded = decode(encoded.data());
    assert_eq!((decoded.width(), decoded.height()), (96, 64));

    // Padding is black, which maps to XYZ code value 0
    let white = rgb_to_xyz([255, 255, 255], ColourLut::Srgb);
    let y = &decoded.components()[1];
    let row = &y.data()[32 * 96..33 * 96];
    assert!(row[2].abs() <= TOLERANCE, "left padding: {}", row[2]);
    assert!(row[93].abs() <= TOLERANCE, "right padding: {}", row[93]);
    assert!((row[48] - white[1]).abs() <= TOLERANCE, "picture: {}", row[48]);
}

#[test]
fn codestream_fits_the_bandwidth_budget() {
    let size = Size::new(256, 128);
    // A noisy picture so that the rate control has to do something
    let data = (0..size.area() * 3)
        .map(|i| ((i * 7919) % 251) as u8)
        .collect();
    let image = Image::from_rgb24(size, data).unwrap();
    let mut req = request(size);
    req.j2k_bandwidth = 2_000_000;

    let encoded = encode_locally(&image, &req).unwrap();
    let budget = build_compressor_config(size, req.j2k_bandwidth, req.frames_per_second).max_cs_len
        as usize;
    // Rate control targets tile data; leave room for marker segments
    assert!(
        encoded.size() <= budget + budget / 20,
        "{} bytes over budget of {}",
        encoded.size(),
        budget
    );
}
