//! FITS reading and writing.
//!
//! A FITS header is a sequence of 2880-byte blocks, each holding thirty-six
//! 80-byte "cards" of the form `KEYWORD = VALUE / COMMENT`. We only need the
//! keywords flat calibration actually inspects (geometry, `BSCALE`/`BZERO`,
//! and the metadata fields the reader looks up), so this is not a general
//! FITS library: anything this crate doesn't recognize is preserved verbatim
//! in the keyword map and re-emitted on write, but never interpreted.

use flatcal_grid::{ImageData, Keywords};

use crate::error::{Error, Result};

const BLOCK_SIZE: usize = 2880;
const CARD_SIZE: usize = 80;
const CARDS_PER_BLOCK: usize = BLOCK_SIZE / CARD_SIZE;

/// Reads only the header cards, stopping at `END`. Used by the metadata
/// reader, which never needs pixel data.
pub fn read_headers(path: &std::path::Path) -> Result<Keywords> {
    let bytes = std::fs::read(path)?;
    let (keywords, _header_blocks) = parse_header(&bytes)?;
    Ok(keywords)
}

/// Reads headers and decodes the full pixel plane.
pub fn read(path: &std::path::Path) -> Result<ImageData> {
    let bytes = std::fs::read(path)?;
    let (keywords, header_blocks) = parse_header(&bytes)?;
    let geometry = Geometry::from_keywords(&keywords)?;

    let data_start = header_blocks * BLOCK_SIZE;
    let sample_bytes = (geometry.bitpix.unsigned_abs() / 8) as usize;
    let pixel_count = geometry.width * geometry.height * geometry.channels;
    let data_len = pixel_count * sample_bytes;

    let data = bytes
        .get(data_start..data_start + data_len)
        .ok_or(Error::TruncatedHeader)?;

    let pixels = decode_pixels(data, geometry.bitpix, geometry.bscale, geometry.bzero, pixel_count)?;
    Ok(ImageData::new(geometry.width, geometry.height, geometry.channels, pixels, keywords))
}

struct Geometry {
    width: usize,
    height: usize,
    channels: usize,
    bitpix: i32,
    bscale: f64,
    bzero: f64,
}

impl Geometry {
    fn from_keywords(kw: &Keywords) -> Result<Self> {
        let bitpix: i32 = required_int(kw, "BITPIX")?;
        let naxis: i32 = required_int(kw, "NAXIS")?;
        if !(2..=3).contains(&naxis) {
            return Err(Error::BadGeometry(format!("unsupported NAXIS={naxis}")));
        }
        let width = required_int::<usize>(kw, "NAXIS1")?;
        let height = required_int::<usize>(kw, "NAXIS2")?;
        let channels = if naxis == 3 {
            required_int::<usize>(kw, "NAXIS3")?
        } else {
            1
        };
        if !matches!(bitpix, 8 | 16 | 32 | -32 | -64) {
            return Err(Error::UnsupportedFormat(format!("BITPIX={bitpix}")));
        }
        let bscale = kw.get("BSCALE").and_then(|v| v.parse().ok()).unwrap_or(1.0);
        let bzero = kw.get("BZERO").and_then(|v| v.parse().ok()).unwrap_or(0.0);
        Ok(Self {
            width,
            height,
            channels,
            bitpix,
            bscale,
            bzero,
        })
    }
}

fn required_int<T: std::str::FromStr>(kw: &Keywords, key: &str) -> Result<T> {
    kw.get(key)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| Error::BadGeometry(format!("missing or invalid {key}")))
}

fn decode_pixels(data: &[u8], bitpix: i32, bscale: f64, bzero: f64, count: usize) -> Result<Vec<f64>> {
    let mut out = Vec::with_capacity(count);
    match bitpix {
        8 => {
            for &b in &data[..count] {
                out.push((b as f64 * bscale + bzero) / 255.0);
            }
        }
        16 => {
            for chunk in data[..count * 2].chunks_exact(2) {
                let raw = i16::from_be_bytes([chunk[0], chunk[1]]);
                out.push((raw as f64 * bscale + bzero) / 65535.0);
            }
        }
        32 => {
            for chunk in data[..count * 4].chunks_exact(4) {
                let raw = i32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                out.push(raw as f64 * bscale + bzero);
            }
        }
        -32 => {
            for chunk in data[..count * 4].chunks_exact(4) {
                let raw = f32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                out.push(raw as f64 * bscale + bzero);
            }
        }
        -64 => {
            for chunk in data[..count * 8].chunks_exact(8) {
                let raw = f64::from_be_bytes(chunk.try_into().unwrap());
                out.push(raw * bscale + bzero);
            }
        }
        other => return Err(Error::UnsupportedFormat(format!("BITPIX={other}"))),
    }
    Ok(out)
}

/// Parses header cards from the start of `bytes`. Returns the keyword map
/// and the number of 2880-byte blocks the header occupied (so the caller
/// knows where pixel data begins).
fn parse_header(bytes: &[u8]) -> Result<(Keywords, usize)> {
    let mut keywords = Keywords::new();
    let mut block_idx = 0;
    loop {
        let start = block_idx * BLOCK_SIZE;
        let block = bytes
            .get(start..start + BLOCK_SIZE)
            .ok_or(Error::TruncatedHeader)?;
        block_idx += 1;

        let mut ended = false;
        for card_idx in 0..CARDS_PER_BLOCK {
            let card_start = card_idx * CARD_SIZE;
            let card = &block[card_start..card_start + CARD_SIZE];
            let card = String::from_utf8_lossy(card);
            let card = card.trim_end();

            if card.trim() == "END" || card.starts_with("END ") {
                ended = true;
                break;
            }
            if let Some((key, value)) = parse_card(card) {
                keywords.set(key, value);
            }
        }
        if ended {
            return Ok((keywords, block_idx));
        }
    }
}

/// Parses one 80-byte card into `(key, value)`, or `None` for cards with no
/// keyword value (blank, `COMMENT`, `HISTORY`, or malformed cards we choose
/// to skip rather than fail the whole read on).
fn parse_card(card: &str) -> Option<(String, String)> {
    let eq = card.find('=')?;
    if eq > 8 {
        // Not a value card: '=' should appear at column 9 (index 8). Treat
        // anything else as a comment-style card.
        return None;
    }
    let key = card[..eq].trim().to_string();
    if key.is_empty() {
        return None;
    }
    let rest = &card[eq + 1..];
    let value = extract_value(rest);
    Some((key, value))
}

/// Extracts the value portion of a card, stopping at an unquoted `/` comment
/// delimiter, and stripping surrounding quotes/whitespace.
fn extract_value(rest: &str) -> String {
    let rest = rest.trim_start();
    if let Some(stripped) = rest.strip_prefix('\'') {
        // Quoted string value: find the closing quote, treating '' as an
        // escaped single quote.
        let bytes = stripped.as_bytes();
        let mut i = 0;
        let mut value = String::new();
        while i < bytes.len() {
            if bytes[i] == b'\'' {
                if i + 1 < bytes.len() && bytes[i + 1] == b'\'' {
                    value.push('\'');
                    i += 2;
                    continue;
                }
                break;
            }
            value.push(bytes[i] as char);
            i += 1;
        }
        value.trim().to_string()
    } else {
        let value_part = match rest.find('/') {
            Some(slash) => &rest[..slash],
            None => rest,
        };
        value_part.trim().to_string()
    }
}

/// Writes a primary HDU: `BITPIX=-32`, big-endian, 2880-aligned, with all
/// inherited keywords re-emitted except the structural ones this function
/// regenerates itself.
pub fn write(path: &std::path::Path, image: &ImageData) -> Result<()> {
    let mut cards = Vec::new();
    push_card(&mut cards, "SIMPLE", "T", Some("conforms to FITS standard"));
    push_card(&mut cards, "BITPIX", "-32", Some("IEEE single-precision float"));
    let naxis = if image.channels() > 1 { 3 } else { 2 };
    push_card(&mut cards, "NAXIS", &naxis.to_string(), None);
    push_card(&mut cards, "NAXIS1", &image.width().to_string(), None);
    push_card(&mut cards, "NAXIS2", &image.height().to_string(), None);
    if naxis == 3 {
        push_card(&mut cards, "NAXIS3", &image.channels().to_string(), None);
    }
    push_card(&mut cards, "BSCALE", "1.0", None);
    push_card(&mut cards, "BZERO", "0.0", None);

    const STRUCTURAL: &[&str] = &[
        "SIMPLE", "BITPIX", "NAXIS", "NAXIS1", "NAXIS2", "NAXIS3", "BSCALE", "BZERO", "END",
    ];
    for (key, value) in image.keywords().iter() {
        if STRUCTURAL.contains(&key.to_ascii_uppercase().as_str()) {
            continue;
        }
        push_card(&mut cards, key, value, None);
    }
    cards.push(format_card("END", None, None));

    let mut header = Vec::new();
    for card in &cards {
        header.extend_from_slice(card.as_bytes());
    }
    pad_to_block(&mut header, b' ');

    let mut data = Vec::with_capacity(image.pixels().len() * 4);
    for &p in image.pixels() {
        data.extend_from_slice(&(p as f32).to_be_bytes());
    }
    pad_to_block(&mut data, 0);

    let mut out = header;
    out.extend_from_slice(&data);
    std::fs::write(path, out)?;
    Ok(())
}

fn push_card(cards: &mut Vec<String>, key: &str, value: &str, comment: Option<&str>) {
    cards.push(format_card(key, Some(value), comment));
}

fn format_card(key: &str, value: Option<&str>, comment: Option<&str>) -> String {
    let mut line = format!("{key:<8}");
    if let Some(value) = value {
        line.push_str("= ");
        let needs_quotes = value.parse::<f64>().is_err() && value != "T" && value != "F";
        if needs_quotes {
            line.push('\'');
            line.push_str(value);
            line.push('\'');
        } else {
            line.push_str(value);
        }
    }
    if let Some(comment) = comment {
        line.push_str(" / ");
        line.push_str(comment);
    }
    if line.len() > CARD_SIZE {
        line.truncate(CARD_SIZE);
    } else {
        line.push_str(&" ".repeat(CARD_SIZE - line.len()));
    }
    line
}

fn pad_to_block(buf: &mut Vec<u8>, fill: u8) {
    let rem = buf.len() % BLOCK_SIZE;
    if rem != 0 {
        buf.extend(std::iter::repeat(fill).take(BLOCK_SIZE - rem));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flatcal_grid::Keywords;

    fn synthetic_fits(width: usize, height: usize, bitpix: i32, raw: &[u8], extra: &[(&str, &str)]) -> Vec<u8> {
        let mut cards = vec![
            format_card("SIMPLE", Some("T"), None),
            format_card("BITPIX", Some(&bitpix.to_string()), None),
            format_card("NAXIS", Some("2"), None),
            format_card("NAXIS1", Some(&width.to_string()), None),
            format_card("NAXIS2", Some(&height.to_string()), None),
        ];
        for (k, v) in extra {
            cards.push(format_card(k, Some(v), None));
        }
        cards.push(format_card("END", None, None));
        let mut header = Vec::new();
        for c in &cards {
            header.extend_from_slice(c.as_bytes());
        }
        pad_to_block(&mut header, b' ');
        let mut data = raw.to_vec();
        pad_to_block(&mut data, 0);
        header.extend_from_slice(&data);
        header
    }

    #[test]
    fn parses_simple_card() {
        let card = format_card("EXPTIME", Some("1.5"), Some("seconds"));
        let (key, value) = parse_card(&card).unwrap();
        assert_eq!(key, "EXPTIME");
        assert_eq!(value, "1.5");
    }

    #[test]
    fn parses_quoted_string_with_slash() {
        let card = format_card("DATE-OBS", Some("2024-01-02T03:04:05"), None);
        let (_key, value) = parse_card(&card).unwrap();
        assert_eq!(value, "2024-01-02T03:04:05");
    }

    #[test]
    fn round_trips_32bit_float_plane() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.fits");
        let mut kw = Keywords::new();
        kw.set("IMAGETYP", "Flat");
        let image = ImageData::new(2, 2, 1, vec![0.1, 0.2, 0.3, 0.4], kw);
        write(&path, &image).unwrap();
        let back = read(&path).unwrap();
        assert_eq!(back.width(), 2);
        assert_eq!(back.height(), 2);
        for (a, b) in image.pixels().iter().zip(back.pixels()) {
            assert!((*a as f32 - *b as f32).abs() < 1e-6);
        }
        assert_eq!(back.keywords().get("IMAGETYP"), Some("Flat"));
    }

    #[test]
    fn decodes_8bit_unsigned_normalized() {
        let bytes = synthetic_fits(2, 1, 8, &[0, 255], &[]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("u8.fits");
        std::fs::write(&path, &bytes).unwrap();
        let image = read(&path).unwrap();
        assert!((image.pixels()[0] - 0.0).abs() < 1e-9);
        assert!((image.pixels()[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn decodes_16bit_signed_with_bzero_offset_unsigned() {
        // Common unsigned-16 producers set BZERO=32768 and store signed
        // values that, once rescaled, cover the full unsigned range.
        let raw: Vec<u8> = [(-32768i16), 32767i16]
            .iter()
            .flat_map(|v| v.to_be_bytes())
            .collect();
        let bytes = synthetic_fits(2, 1, 16, &raw, &[("BZERO", "32768"), ("BSCALE", "1")]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("u16.fits");
        std::fs::write(&path, &bytes).unwrap();
        let image = read(&path).unwrap();
        assert!((image.pixels()[0] - 0.0).abs() < 1e-6);
        assert!((image.pixels()[1] - 1.0).abs() < 1e-4);
    }

    #[test]
    fn truncated_header_is_reported() {
        let bytes = vec![0u8; 100];
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.fits");
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(read_headers(&path), Err(Error::TruncatedHeader)));
    }

    #[test]
    fn unsupported_bitpix_is_rejected() {
        let bytes = synthetic_fits(2, 1, 12, &[0, 0, 0, 0], &[]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad_bitpix.fits");
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(read(&path), Err(Error::UnsupportedFormat(_))));
    }
}
