//! EAN barcode shape validation
//!
//! The scanner hardware already restricts decoding to EAN-8/EAN-13, but
//! decode noise and manual entry both reach the client as arbitrary
//! strings, so the shape check is repeated here.

/// True iff `s` is all ASCII decimal digits and 8 or 13 characters long
/// (the EAN-8 / EAN-13 shapes).
pub fn is_valid_ean(s: &str) -> bool {
    (s.len() == 8 || s.len() == 13) && s.bytes().all(|b| b.is_ascii_digit())
}
