//! Content identity (MD5) of downloaded bytes

use crate::types::Image;

/// Lowercase hex MD5 of `bytes`
#[must_use]
pub fn compute_md5(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

/// Identity of an item's content
///
/// A known hash is trusted as-is without looking at `bytes`. Otherwise the MD5
/// of `bytes` is derived once and cached on the item, so later calls return
/// the first derivation.
pub fn identify_image<'a>(image: &'a Image, bytes: &[u8]) -> &'a str {
    image.md5_or_init(|| {
        let derived = compute_md5(bytes);
        tracing::debug!(image_id = %image.id(), md5 = %derived, "derived content hash");
        derived
    })
}
