//! QR and barcode payloads printed on property labels, and their PNG
//! renderings.
//!
//! Payloads are computed once when a property is registered and stored with
//! it; images are rendered from the stored payload on request.

use barcoders::sym::ean13::EAN13;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use qrcode::{Color, QrCode};
use std::fmt;
use std::io::Cursor;

const QR_PREFIX: &str = "QM:";

/// Pixels per QR module.
const QR_SCALE: u32 = 8;
/// Light modules around the QR symbol.
const QR_QUIET_ZONE: u32 = 4;
/// Pixels per barcode bar module.
const BAR_SCALE: u32 = 3;
const BAR_HEIGHT: u32 = 90;
const BAR_QUIET_ZONE: u32 = 11;

const DARK: Luma<u8> = Luma([0]);
const LIGHT: Luma<u8> = Luma([255]);

#[derive(Debug)]
pub enum CodeImageError {
    Qr(qrcode::types::QrError),
    Barcode(barcoders::error::Error),
    /// Stored barcode payload is not a valid EAN-13 number
    InvalidBarcode(String),
    Encode(image::ImageError),
}

impl fmt::Display for CodeImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeImageError::Qr(e) => write!(f, "QR encoding failed: {e}"),
            CodeImageError::Barcode(e) => write!(f, "Barcode encoding failed: {e}"),
            CodeImageError::InvalidBarcode(code) => write!(f, "Not an EAN-13 payload: {code}"),
            CodeImageError::Encode(e) => write!(f, "PNG encoding failed: {e}"),
        }
    }
}

impl std::error::Error for CodeImageError {}

/// QR payload for an inventory number.
pub fn qr_payload(inventory_number: &str) -> String {
    format!("{QR_PREFIX}{inventory_number}")
}

/// 13-digit EAN-13 payload derived from an inventory number.
///
/// Uses the number's digits, or each byte modulo 10 when it has none; keeps
/// the last 12, left-pads with zeros and appends the check digit.
pub fn barcode_payload(inventory_number: &str) -> String {
    let mut digits: Vec<u8> = inventory_number
        .bytes()
        .filter(u8::is_ascii_digit)
        .map(|b| b - b'0')
        .collect();
    if digits.is_empty() {
        digits = inventory_number.bytes().map(|b| b % 10).collect();
    }

    let tail = &digits[digits.len().saturating_sub(12)..];
    let mut body = vec![0u8; 12 - tail.len()];
    body.extend_from_slice(tail);
    body.push(ean13_check_digit(&body));

    body.iter().map(|d| char::from(b'0' + d)).collect()
}

/// Check digit for 12 data digits: odd positions weigh 1, even weigh 3.
fn ean13_check_digit(digits: &[u8]) -> u8 {
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| u32::from(*d) * if i % 2 == 0 { 1 } else { 3 })
        .sum();
    ((10 - sum % 10) % 10) as u8
}

/// True when `code` is 13 digits with a valid check digit.
pub fn is_valid_ean13(code: &str) -> bool {
    if code.len() != 13 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let digits: Vec<u8> = code.bytes().map(|b| b - b'0').collect();
    ean13_check_digit(&digits[..12]) == digits[12]
}

/// PNG of the QR symbol for `payload`.
pub fn qr_png(payload: &str) -> Result<Vec<u8>, CodeImageError> {
    let code = QrCode::new(payload.as_bytes()).map_err(CodeImageError::Qr)?;
    let width = code.width() as u32;
    let colors = code.to_colors();
    let side = (width + 2 * QR_QUIET_ZONE) * QR_SCALE;

    let image = GrayImage::from_fn(side, side, |x, y| {
        let (mx, my) = (x / QR_SCALE, y / QR_SCALE);
        if mx < QR_QUIET_ZONE || my < QR_QUIET_ZONE {
            return LIGHT;
        }
        let (mx, my) = (mx - QR_QUIET_ZONE, my - QR_QUIET_ZONE);
        if mx >= width || my >= width {
            return LIGHT;
        }
        match colors[(my * width + mx) as usize] {
            Color::Dark => DARK,
            Color::Light => LIGHT,
        }
    });
    encode_png(image)
}

/// PNG of the EAN-13 bars for a stored 13-digit `payload`.
pub fn barcode_png(payload: &str) -> Result<Vec<u8>, CodeImageError> {
    if !is_valid_ean13(payload) {
        return Err(CodeImageError::InvalidBarcode(payload.to_string()));
    }
    // the encoder appends its own check digit
    let bars = EAN13::new(&payload[..12])
        .map_err(CodeImageError::Barcode)?
        .encode();
    let modules = bars.len() as u32 + 2 * BAR_QUIET_ZONE;

    let image = GrayImage::from_fn(modules * BAR_SCALE, BAR_HEIGHT, |x, _| {
        let module = x / BAR_SCALE;
        let bar = module
            .checked_sub(BAR_QUIET_ZONE)
            .and_then(|i| bars.get(i as usize));
        match bar {
            Some(1) => DARK,
            _ => LIGHT,
        }
    });
    encode_png(image)
}

fn encode_png(image: GrayImage) -> Result<Vec<u8>, CodeImageError> {
    let mut png = Vec::new();
    DynamicImage::ImageLuma8(image)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(CodeImageError::Encode)?;
    Ok(png)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

    #[test]
    fn test_qr_payload_prefixes_inventory_number() {
        let code = qr_payload("INV-2024-001");
        assert_eq!(code, "QM:INV-2024-001");
    }

    #[test]
    fn test_barcode_uses_digits_of_inventory_number() {
        assert_eq!(barcode_payload("123456789012"), "1234567890128");
        assert_eq!(barcode_payload("INV-001"), "0000000000017");
    }

    #[test]
    fn test_barcode_keeps_last_twelve_digits() {
        assert_eq!(barcode_payload("99-123456789012"), "1234567890128");
    }

    #[test]
    fn test_barcode_without_digits_uses_bytes() {
        // 'A' 'B' 'C' = 65 66 67
        assert_eq!(barcode_payload("ABC"), "0000000005678");
    }

    #[test]
    fn test_generated_barcodes_validate() {
        for number in ["INV-001", "PC/17", "desk", "000000000000"] {
            assert!(is_valid_ean13(&barcode_payload(number)), "{number}");
        }
        assert!(!is_valid_ean13("1234567890127"));
        assert!(!is_valid_ean13("12345"));
    }

    #[test]
    fn test_qr_png_has_quiet_zone_and_dark_modules() {
        let png = qr_png("QM:INV-2024-001").unwrap();
        assert!(png.starts_with(PNG_SIGNATURE));

        let image = image::load_from_memory(&png).unwrap().to_luma8();
        assert_eq!(image.width(), image.height());
        assert_eq!(image.get_pixel(0, 0), &LIGHT);
        // top-left finder pattern starts right after the quiet zone
        let corner = QR_QUIET_ZONE * QR_SCALE;
        assert_eq!(image.get_pixel(corner, corner), &DARK);
    }

    #[test]
    fn test_barcode_png_renders_95_modules() {
        let png = barcode_png(&barcode_payload("INV-001")).unwrap();
        assert!(png.starts_with(PNG_SIGNATURE));

        let image = image::load_from_memory(&png).unwrap().to_luma8();
        assert_eq!(image.width(), (95 + 2 * BAR_QUIET_ZONE) * BAR_SCALE);
        assert_eq!(image.height(), BAR_HEIGHT);
        // start guard 101
        let first_bar = BAR_QUIET_ZONE * BAR_SCALE;
        assert_eq!(image.get_pixel(first_bar, 10), &DARK);
        assert_eq!(image.get_pixel(first_bar + BAR_SCALE, 10), &LIGHT);
    }

    #[test]
    fn test_barcode_png_rejects_corrupt_payload() {
        assert!(matches!(
            barcode_png("1234567890127"),
            Err(CodeImageError::InvalidBarcode(_))
        ));
    }
}
