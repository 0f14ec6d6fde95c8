//! Byte-level JPEG marker helpers.

pub const SOI: [u8; 2] = [0xFF, 0xD8];
pub const EOI: [u8; 2] = [0xFF, 0xD9];
/// SOI followed by the first marker prefix.
pub const SIGNATURE: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// Upper bound on embedded streams considered inside one container.
const MAX_EMBEDDED: usize = 16;

pub fn has_signature(data: &[u8]) -> bool {
    data.starts_with(&SIGNATURE)
}

pub fn find_first(data: &[u8], marker: &[u8]) -> Option<usize> {
    data.windows(marker.len()).position(|w| w == marker)
}

pub fn find_last(data: &[u8], marker: &[u8]) -> Option<usize> {
    data.windows(marker.len()).rposition(|w| w == marker)
}

/// First SOI through last EOI, inclusive.
pub fn legacy_span(data: &[u8]) -> Option<&[u8]> {
    let start = find_first(data, &SOI)?;
    let end = find_last(data, &EOI)?;
    (end > start).then(|| &data[start..end + EOI.len()])
}

/// First full signature through the last EOI after it, inclusive.
pub fn signature_span(data: &[u8]) -> Option<&[u8]> {
    let start = find_first(data, &SIGNATURE)?;
    let end = start + find_last(&data[start..], &EOI)?;
    (end > start).then(|| &data[start..end + EOI.len()])
}

/// Every embedded stream starting at a signature and running to the last EOI,
/// longest first.
pub fn embedded_jpegs(data: &[u8]) -> Vec<&[u8]> {
    let Some(last_eoi) = find_last(data, &EOI) else {
        return Vec::new();
    };

    let mut spans = Vec::new();
    let mut offset = 0;
    while spans.len() < MAX_EMBEDDED {
        let Some(found) = find_first(&data[offset..], &SIGNATURE) else {
            break;
        };
        let start = offset + found;
        if start >= last_eoi {
            break;
        }
        spans.push(&data[start..last_eoi + EOI.len()]);
        offset = start + SIGNATURE.len();
    }

    spans.sort_by_key(|span| std::cmp::Reverse(span.len()));
    spans
}
