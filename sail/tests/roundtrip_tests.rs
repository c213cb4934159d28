//! Lossless round-trip tests across the built-in codecs.

use sail::{
    read_mem, write_mem, Image, ImageInput, ImageOutput, Palette, PixelFormat, ReadOptions,
    Registry,
};

fn patterned_image(width: u32, height: u32, format: PixelFormat) -> Image {
    let mut image = Image::new(width, height, format).unwrap();
    for (i, byte) in image.pixels_mut().iter_mut().enumerate() {
        *byte = (i * 7 % 251) as u8;
    }
    image
}

#[test]
fn pnm_gray8_round_trip() {
    let codec = Registry::global().by_name("pnm").unwrap();
    let original = patterned_image(16, 9, PixelFormat::Grayscale8);

    let encoded = write_mem(&original, codec).unwrap();
    let decoded = read_mem(&encoded).unwrap();

    assert_eq!(decoded.pixel_format(), PixelFormat::Grayscale8);
    assert_eq!(decoded.pixels(), original.pixels());
}

#[test]
fn pnm_rgb48_round_trip() {
    let codec = Registry::global().by_name("pnm").unwrap();
    let original = patterned_image(7, 5, PixelFormat::Rgb48);

    let encoded = write_mem(&original, codec).unwrap();
    let decoded = read_mem(&encoded).unwrap();

    assert_eq!(decoded.pixel_format(), PixelFormat::Rgb48);
    assert_eq!(decoded.pixels(), original.pixels());
}

#[test]
fn bmp_round_trips() {
    let codec = Registry::global().by_name("bmp").unwrap();

    for format in [PixelFormat::Bgr24, PixelFormat::Bgra32] {
        // An odd width exercises the four-byte row padding.
        let original = patterned_image(5, 4, format);

        let encoded = write_mem(&original, codec).unwrap();
        let decoded = read_mem(&encoded).unwrap();

        assert_eq!(decoded.pixel_format(), format);
        assert_eq!(decoded.pixels(), original.pixels(), "{format}");
    }
}

fn indexed_frame(seed: u8) -> Image {
    let mut image = Image::new(4, 4, PixelFormat::Indexed8).unwrap();
    for (i, byte) in image.pixels_mut().iter_mut().enumerate() {
        *byte = ((i as u8 + seed) % 4) as u8;
    }
    image.set_palette(Palette::new(
        PixelFormat::Rgb24,
        vec![0, 0, 0, 255, 0, 0, 0, 255, 0, 0, 0, 255],
        4,
    ));
    image
}

#[test]
fn gif_indexed_round_trip() {
    let codec = Registry::global().by_name("gif").unwrap();
    let original = indexed_frame(0);

    let encoded = write_mem(&original, codec).unwrap();

    // Request the raw indexed data back instead of the composited canvas.
    let options = ReadOptions::from_features(codec.read_features())
        .with_output_pixel_format(PixelFormat::Indexed8);
    let mut input = ImageInput::new();
    input
        .start_mem_with(&encoded, Some(codec), Some(options))
        .unwrap();
    let decoded = input.next_frame().unwrap();
    input.stop().unwrap();

    assert_eq!(decoded.pixel_format(), PixelFormat::Indexed8);
    assert_eq!(decoded.pixels(), original.pixels());

    let palette = decoded.palette().unwrap();
    assert_eq!(palette.count, 4);
    assert_eq!(&palette.data[..12], &original.palette().unwrap().data[..]);
}

#[test]
fn gif_composited_decode() {
    let codec = Registry::global().by_name("gif").unwrap();
    let original = indexed_frame(0);

    let encoded = write_mem(&original, codec).unwrap();
    let decoded = read_mem(&encoded).unwrap();

    assert_eq!(decoded.pixel_format(), PixelFormat::Rgba32);
    assert_eq!(decoded.width(), 4);
    assert_eq!(decoded.height(), 4);

    // First pixel is palette index 0 = opaque black.
    assert_eq!(&decoded.pixels()[..4], &[0, 0, 0, 255]);
    // Second pixel is palette index 1 = red.
    assert_eq!(&decoded.pixels()[4..8], &[255, 0, 0, 255]);
}

#[test]
fn gif_three_frame_animation() {
    let codec = Registry::global().by_name("gif").unwrap();

    let mut output = ImageOutput::new();
    output.start_mem(codec).unwrap();
    for (seed, delay) in [(0u8, 100u32), (1, 200), (2, 300)] {
        let mut frame = indexed_frame(seed);
        frame.set_delay_ms(delay);
        output.next_frame(&frame).unwrap();
    }
    output.stop().unwrap();
    let encoded = output.take_buffer().unwrap();

    let mut input = ImageInput::new();
    input.start_mem(&encoded).unwrap();

    let mut delays = Vec::new();
    loop {
        match input.next_frame() {
            Ok(frame) => delays.push(frame.delay_ms()),
            Err(err) => {
                assert!(err.is_no_more_frames());
                break;
            }
        }
    }
    input.stop().unwrap();

    assert_eq!(delays, vec![100, 200, 300]);
}

#[test]
fn gif_comment_meta_round_trip() {
    let codec = Registry::global().by_name("gif").unwrap();

    let mut original = indexed_frame(0);
    original.push_meta("Comment", "three red pixels");

    let encoded = write_mem(&original, codec).unwrap();
    let decoded = read_mem(&encoded).unwrap();

    assert_eq!(decoded.find_meta("Comment"), Some("three red pixels"));
}
