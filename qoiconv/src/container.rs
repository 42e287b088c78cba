//! Minimal PPM (`.ppm`, binary RGB) and PAM (`.pam`, RGB or RGBA) readers
//! and writers. These are the ASCII-framed test-hull formats the converter
//! uses alongside PNG/QOI/ROI, not a general-purpose image library.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub pixels: Vec<u8>,
}

fn read_token(bytes: &[u8], pos: &mut usize) -> io::Result<Vec<u8>> {
    while *pos < bytes.len() && bytes[*pos].is_ascii_whitespace() {
        *pos += 1;
    }
    let start = *pos;
    while *pos < bytes.len() && !bytes[*pos].is_ascii_whitespace() {
        *pos += 1;
    }
    if start == *pos {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated PPM/PAM header"));
    }
    Ok(bytes[start..*pos].to_vec())
}

pub fn read_ppm(path: &Path) -> io::Result<RawImage> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;

    let mut pos = 0usize;
    let magic = read_token(&bytes, &mut pos)?;
    if magic != b"P6" {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "only binary (P6) PPM is supported"));
    }
    let width: u32 = String::from_utf8_lossy(&read_token(&bytes, &mut pos)?)
        .parse()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "bad PPM width"))?;
    let height: u32 = String::from_utf8_lossy(&read_token(&bytes, &mut pos)?)
        .parse()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "bad PPM height"))?;
    let _maxval = read_token(&bytes, &mut pos)?;
    pos += 1; // the single whitespace byte separating the header from pixel data

    let needed = width as usize * height as usize * 3;
    if bytes.len() < pos + needed {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated PPM pixel data"));
    }
    Ok(RawImage { width, height, channels: 3, pixels: bytes[pos..pos + needed].to_vec() })
}

pub fn write_ppm(path: &Path, image: &RawImage) -> io::Result<()> {
    if image.channels != 3 {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "PPM output requires RGB pixels"));
    }
    let mut out = BufWriter::new(File::create(path)?);
    write!(out, "P6 {} {} 255\n", image.width, image.height)?;
    out.write_all(&image.pixels)
}

pub fn read_pam(path: &Path) -> io::Result<RawImage> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;

    let mut pos = 0usize;
    let magic = read_token(&bytes, &mut pos)?;
    if magic != b"P7" {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "only P7 PAM is supported"));
    }

    let (mut width, mut height, mut depth) = (0u32, 0u32, 0u32);
    loop {
        let tok = read_token(&bytes, &mut pos)?;
        match tok.as_slice() {
            b"WIDTH" => width = String::from_utf8_lossy(&read_token(&bytes, &mut pos)?).parse().unwrap_or(0),
            b"HEIGHT" => height = String::from_utf8_lossy(&read_token(&bytes, &mut pos)?).parse().unwrap_or(0),
            b"DEPTH" => depth = String::from_utf8_lossy(&read_token(&bytes, &mut pos)?).parse().unwrap_or(0),
            b"MAXVAL" => {
                read_token(&bytes, &mut pos)?;
            }
            b"TUPLTYPE" => {
                read_token(&bytes, &mut pos)?;
            }
            b"ENDHDR" => break,
            _ => return Err(io::Error::new(io::ErrorKind::InvalidData, "unrecognized PAM header field")),
        }
    }
    pos += 1;

    let channels = depth as u8;
    if channels != 3 && channels != 4 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "PAM depth must be 3 or 4"));
    }
    let needed = width as usize * height as usize * channels as usize;
    if bytes.len() < pos + needed {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated PAM pixel data"));
    }
    Ok(RawImage { width, height, channels, pixels: bytes[pos..pos + needed].to_vec() })
}

pub fn write_pam(path: &Path, image: &RawImage) -> io::Result<()> {
    let tupltype = if image.channels == 4 { "RGB_ALPHA" } else { "RGB" };
    let mut out = BufWriter::new(File::create(path)?);
    write!(
        out,
        "P7\nWIDTH {}\nHEIGHT {}\nDEPTH {}\nMAXVAL 255\nTUPLTYPE {}\nENDHDR\n",
        image.width, image.height, image.channels, tupltype
    )?;
    out.write_all(&image.pixels)
}
