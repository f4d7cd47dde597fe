//! Stop-reply encoding: turns a [`StopRecord`] (plus, for signal stops, the
//! frame-related register values) into the wire's `T`/`W`/`X` reply.

use crate::hex::append_hex_byte;
use crate::target::{RegisterValues, StopReason, StopRecord};

const SIGTRAP: u8 = 5;

/// Build the body of a stop-reply packet (no leading `$`/trailing checksum).
///
/// `expedite` is `None` when `ReadFrameRelatedRegisters` failed or the
/// target has no frame registers for this stop; its entries are omitted
/// rather than causing the whole reply to fail.
pub fn encode_stop_reply(
    rec: &StopRecord,
    expedite: Option<&RegisterValues>,
    expedite_indices: &[u32],
) -> Vec<u8> {
    let mut out = Vec::new();

    match rec.reason {
        StopReason::ProcessExited(code) => {
            out.push(b'W');
            append_hex_byte(&mut out, code as u8);
            if let Some(pid) = rec.pid {
                out.extend(b";process:");
                out.extend(format!("{:x}", pid).as_bytes());
            }
            return out;
        }
        StopReason::SignalReceived(sig) => {
            out.push(b'T');
            append_hex_byte(&mut out, sig);
        }
        StopReason::LibraryEvent => {
            out.push(b'T');
            append_hex_byte(&mut out, SIGTRAP);
        }
        StopReason::Unspecified => {
            out.push(b'T');
            append_hex_byte(&mut out, SIGTRAP);
        }
    }

    if let Some(regs) = expedite {
        for &idx in expedite_indices {
            if let Some(value) = regs.get(idx as usize) {
                if value.is_valid() {
                    append_hex_byte(&mut out, idx as u8);
                    out.push(b':');
                    for &b in value.as_bytes() {
                        append_hex_byte(&mut out, b);
                    }
                    out.push(b';');
                }
            }
        }
    }

    if let Some(tid) = rec.tid {
        out.extend(b"thread:");
        out.extend(format!("{:x}", tid).as_bytes());
        out.push(b';');
    }

    if matches!(rec.reason, StopReason::LibraryEvent) {
        out.extend(b"library:;");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::RegisterValue;

    #[test]
    fn process_exited_encodes_w() {
        let rec = StopRecord {
            reason: StopReason::ProcessExited(0),
            pid: None,
            tid: None,
        };
        assert_eq!(encode_stop_reply(&rec, None, &[]), b"W00");
    }

    #[test]
    fn signal_received_without_expedite() {
        let rec = StopRecord {
            reason: StopReason::SignalReceived(11),
            pid: None,
            tid: Some(2),
        };
        assert_eq!(encode_stop_reply(&rec, None, &[]), b"T0bthread:2;");
    }

    #[test]
    fn expedited_registers_are_included_only_when_valid() {
        let rec = StopRecord {
            reason: StopReason::SignalReceived(5),
            pid: None,
            tid: Some(1),
        };
        let mut regs = RegisterValues::new(2);
        regs.set(0, RegisterValue::from_bytes(&[0xef, 0xbe]));
        let body = encode_stop_reply(&rec, Some(&regs), &[0, 1]);
        assert_eq!(body, b"T0500:efbe;thread:1;");
    }

    #[test]
    fn thread_and_process_ids_above_one_byte_are_not_truncated() {
        let rec = StopRecord {
            reason: StopReason::SignalReceived(5),
            pid: Some(0x1234),
            tid: Some(0x4321),
        };
        let body = encode_stop_reply(&rec, None, &[]);
        assert_eq!(body, b"T05thread:4321;");

        let rec = StopRecord {
            reason: StopReason::ProcessExited(0),
            pid: Some(0x1234),
            tid: None,
        };
        assert_eq!(encode_stop_reply(&rec, None, &[]), b"W00;process:1234");
    }

    #[test]
    fn library_event_sets_flag() {
        let rec = StopRecord {
            reason: StopReason::LibraryEvent,
            pid: None,
            tid: None,
        };
        assert_eq!(encode_stop_reply(&rec, None, &[]), b"T05library:;");
    }
}
