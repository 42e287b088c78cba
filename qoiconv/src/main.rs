mod container;

use std::path::PathBuf;

use image::{DynamicImage, ImageFormat};
use qoif::{Descriptor, Format, Options, Path as CodecPath};

use container::RawImage;

fn usage() -> ! {
    eprintln!("Usage: qoiconv [ops] <infile> <outfile>");
    eprintln!("[ops]");
    eprintln!(" -scalar : force the scalar encode path");
    eprintln!(" -sse : prefer the vectorized encode path (roif output only, needs --features simd)");
    eprintln!(" -rle : toggle run-length encoding away from its default (roif output only)");
    eprintln!(" -mlut : drive roif encoding from the mega-LUT instead of the scalar classifier");
    eprintln!(" -mlut-path file : load a previously generated mega-LUT from file");
    eprintln!(" -mlut-gen file : generate a mega-LUT and write it to file, then exit");
    eprintln!("Examples:");
    eprintln!("  qoiconv input.png output.qoi");
    eprintln!("  qoiconv input.roif output.png");
    std::process::exit(1);
}

fn main() {
    if let Err(()) = run() {
        std::process::exit(1);
    }
}

fn run() -> Result<(), ()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        usage();
    }

    let mut options = Options::default();
    let mut mlut_path: Option<PathBuf> = None;
    let mut positional = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-scalar" => options.path = CodecPath::Scalar,
            "-sse" => options.path = CodecPath::Sse,
            "-rle" => options.rle = !options.rle,
            "-mlut" => options.mlut = true,
            "-mlut-path" => {
                i += 1;
                let path = args.get(i).ok_or(()).map_err(|_| eprintln!("-mlut-path requires a file argument"))?;
                mlut_path = Some(PathBuf::from(path));
                options.mlut = true;
            }
            "-mlut-gen" => {
                i += 1;
                let path = args.get(i).ok_or(()).map_err(|_| eprintln!("-mlut-gen requires a file argument"))?;
                return generate_mlut(PathBuf::from(path));
            }
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    if positional.len() != 2 {
        usage();
    }
    let input = PathBuf::from(&positional[0]);
    let output = PathBuf::from(&positional[1]);

    if options.path == CodecPath::Sse {
        warn_if_sse_unsupported();
    }

    let image = load_input(&input)?;
    write_output(&output, &image, options, mlut_path.as_deref())
}

#[cfg(feature = "simd")]
fn warn_if_sse_unsupported() {}

#[cfg(not(feature = "simd"))]
fn warn_if_sse_unsupported() {
    eprintln!("qoiconv was built without the `simd` feature; -sse falls back to the scalar encoder");
}

#[cfg(feature = "mlut")]
fn generate_mlut(path: PathBuf) -> Result<(), ()> {
    let table = qoif::mlut::generate();
    qoif::mlut::dump_file(&path, &table)
        .map_err(|err| eprintln!("Failed to write mega-LUT to '{}'. {:#}", path.display(), err))
}

#[cfg(not(feature = "mlut"))]
fn generate_mlut(_path: PathBuf) -> Result<(), ()> {
    eprintln!("qoiconv was built without the `mlut` feature");
    Err(())
}

fn ext_is(path: &std::path::Path, ext: &str) -> bool {
    path.extension().map_or(false, |e| e.eq_ignore_ascii_case(ext))
}

fn load_input(path: &std::path::Path) -> Result<RawImage, ()> {
    if ext_is(path, "ppm") {
        return container::read_ppm(path)
            .map_err(|err| eprintln!("Failed to read PPM '{}'. {:#}", path.display(), err));
    }
    if ext_is(path, "pam") {
        return container::read_pam(path)
            .map_err(|err| eprintln!("Failed to read PAM '{}'. {:#}", path.display(), err));
    }
    if ext_is(path, "qoi") || ext_is(path, "roi") {
        let bytes = std::fs::read(path)
            .map_err(|err| eprintln!("Failed to read '{}'. {:#}", path.display(), err))?;
        let (pixels, desc) = qoif::decode_alloc(&bytes, 0)
            .map_err(|err| eprintln!("Failed to decode '{}'. {:#?}", path.display(), err))?;
        return Ok(RawImage { width: desc.width, height: desc.height, channels: desc.channels, pixels });
    }
    if ext_is(path, "png") {
        let dynamic = image::open(path)
            .map_err(|err| eprintln!("Failed to open PNG '{}'. {:#}", path.display(), err))?;
        return Ok(from_dynamic_image(dynamic));
    }
    eprintln!("Unrecognized input extension for '{}'", path.display());
    Err(())
}

fn from_dynamic_image(dynamic: DynamicImage) -> RawImage {
    match &dynamic {
        DynamicImage::ImageRgba8(_) | DynamicImage::ImageRgba16(_) | DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLumaA16(_) => {
            let rgba = dynamic.to_rgba8();
            RawImage { width: rgba.width(), height: rgba.height(), channels: 4, pixels: rgba.into_raw() }
        }
        _ => {
            let rgb = dynamic.to_rgb8();
            RawImage { width: rgb.width(), height: rgb.height(), channels: 3, pixels: rgb.into_raw() }
        }
    }
}

fn write_output(
    path: &std::path::Path,
    image: &RawImage,
    options: Options,
    mlut_path: Option<&std::path::Path>,
) -> Result<(), ()> {
    if ext_is(path, "ppm") {
        return container::write_ppm(path, image)
            .map_err(|err| eprintln!("Failed to write PPM '{}'. {:#}", path.display(), err));
    }
    if ext_is(path, "pam") {
        return container::write_pam(path, image)
            .map_err(|err| eprintln!("Failed to write PAM '{}'. {:#}", path.display(), err));
    }
    if ext_is(path, "qoi") || ext_is(path, "roi") {
        let format = if ext_is(path, "roi") { Format::R } else { Format::Q };
        let desc = Descriptor::new(image.width, image.height, image.channels, 0);
        let bytes = encode_with_options(image, &desc, format, options, mlut_path)?;
        return std::fs::write(path, &bytes)
            .map_err(|err| eprintln!("Failed to write '{}'. {:#}", path.display(), err));
    }
    if ext_is(path, "png") {
        let dynamic = if image.channels == 4 {
            DynamicImage::ImageRgba8(
                image::RgbaImage::from_raw(image.width, image.height, image.pixels.clone()).unwrap(),
            )
        } else {
            DynamicImage::ImageRgb8(
                image::RgbImage::from_raw(image.width, image.height, image.pixels.clone()).unwrap(),
            )
        };
        return dynamic
            .save_with_format(path, ImageFormat::Png)
            .map_err(|err| eprintln!("Failed to save PNG '{}'. {:#}", path.display(), err));
    }
    eprintln!("Unrecognized output extension for '{}'", path.display());
    Err(())
}

#[cfg(feature = "mlut")]
fn encode_with_options(
    image: &RawImage,
    desc: &Descriptor,
    format: Format,
    options: Options,
    mlut_path: Option<&std::path::Path>,
) -> Result<Vec<u8>, ()> {
    let Some(path) = mlut_path else {
        return qoif::encode_alloc(&image.pixels, desc, format, options)
            .map_err(|err| eprintln!("Failed to encode. {:#?}", err));
    };
    let table = qoif::mlut::load_file(path)
        .map_err(|err| eprintln!("Failed to load mega-LUT '{}'. {:#}", path.display(), err))?;
    let mut out = vec![0u8; qoif::encoded_size_limit(desc, format)];
    let colorspace = if !options.rle { 0b10 } else { 0 };
    let mut cursor = qoif::header::HEADER_SIZE;
    qoif::header::write(&mut out[..cursor], format, desc, colorspace);
    let mut state = qoif::scalar::r::EncodeState::default();
    qoif::mlut::encode_pixels(
        &image.pixels,
        desc.channels,
        &mut state,
        &mut out,
        &mut cursor,
        options.rle,
        true,
        &table,
    )
    .map_err(|err| eprintln!("Failed to encode with mega-LUT. {:#?}", err))?;
    qoif::header::write_terminator(&mut out[cursor..cursor + qoif::header::TERMINATOR_SIZE]);
    cursor += qoif::header::TERMINATOR_SIZE;
    out.truncate(cursor);
    Ok(out)
}

#[cfg(not(feature = "mlut"))]
fn encode_with_options(
    image: &RawImage,
    desc: &Descriptor,
    format: Format,
    options: Options,
    _mlut_path: Option<&std::path::Path>,
) -> Result<Vec<u8>, ()> {
    qoif::encode_alloc(&image.pixels, desc, format, options)
        .map_err(|err| eprintln!("Failed to encode. {:#?}", err))
}
