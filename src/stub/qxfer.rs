//! `qXfer:object:read:annex:offset,length` request parsing and the
//! "materialize once, serve a window" reply convention shared by every
//! `qXfer` object (library list, thread list, memory map, ...).

use crate::hex::parse_hex_integer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QXferRequest<'a> {
    pub object: &'a [u8],
    pub annex: &'a [u8],
    pub offset: usize,
    pub length: usize,
}

/// Parse `object:read:annex:offset,length` (the part of the packet after
/// the leading `qXfer:`).
pub fn parse_request(body: &[u8]) -> Option<QXferRequest<'_>> {
    let mut parts = body.splitn(4, |&b| b == b':');
    let object = parts.next()?;
    let op = parts.next()?;
    if op != b"read" {
        return None;
    }
    let annex = parts.next()?;
    let range = parts.next()?;
    let comma = range.iter().position(|&b| b == b',')?;
    let offset = parse_hex_integer(&range[..comma])? as usize;
    let length = parse_hex_integer(&range[comma + 1..])? as usize;
    Some(QXferRequest {
        object,
        annex,
        offset,
        length,
    })
}

/// Slice `document` into the requested `[offset, offset + length)` window,
/// returning the full reply body (including its `m`/`l` prefix). An empty
/// document means "unsupported" — callers should send the empty reply
/// instead of calling this.
pub fn serve_window(document: &[u8], offset: usize, length: usize) -> Vec<u8> {
    let offset = offset.min(document.len());
    let end = (offset + length).min(document.len());
    let chunk = &document[offset..end];

    let mut out = Vec::with_capacity(chunk.len() + 1);
    out.push(if end >= document.len() { b'l' } else { b'm' });
    out.extend_from_slice(chunk);
    out
}
