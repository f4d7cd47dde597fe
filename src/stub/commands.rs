//! Per-command handlers. Each function takes the already-split argument
//! bytes and returns the reply body (unframed, no checksum) or propagates a
//! target's fatal error, which unwinds the whole session.

use crate::error::DispatchError;
use crate::hex::{append_hex_byte, byte_from_hex, parse_hex_integer};
use crate::stub::qxfer;
use crate::stub::session::{FeatureValue, SessionState};
use crate::stub::stop::encode_stop_reply;
use crate::stub::vcont;
use crate::target::{
    BreakpointKind, ContinueMode, RegisterValue, RegisterValues, Target, TargetError,
};
use crate::xml;

pub type CmdResult<T> = Result<Vec<u8>, <T as Target>::Error>;

const UNSUPPORTED: &[u8] = b"";
const OK: &[u8] = b"OK";
const EFAULT: u8 = 0x0e;
const ENOSUCHTHREAD: u8 = 0x01;

fn enn(code: u8) -> Vec<u8> {
    let mut out = vec![b'E'];
    append_hex_byte(&mut out, code);
    out
}

/// Translate a target call's outcome into a wire reply, propagating
/// `TargetError::Fatal` as a session-ending error instead of a reply.
fn handle<V, E>(
    result: Result<V, TargetError<E>>,
    on_ok: impl FnOnce(V) -> Vec<u8>,
    nonfatal_errno: u8,
) -> Result<Vec<u8>, E> {
    match result {
        Ok(v) => Ok(on_ok(v)),
        Err(TargetError::NotSupported) => Ok(UNSUPPORTED.to_vec()),
        Err(TargetError::Errno(n)) => Ok(enn(n)),
        Err(TargetError::NonFatal) => Ok(enn(nonfatal_errno)),
        Err(TargetError::Fatal(e)) => Err(e),
    }
}

fn status_reply<E>(result: Result<(), TargetError<E>>, nonfatal_errno: u8) -> Result<Vec<u8>, E> {
    handle(result, |()| OK.to_vec(), nonfatal_errno)
}

fn dispatch_error_reply(e: DispatchError) -> Vec<u8> {
    match e.errno() {
        Some(n) => enn(n),
        None => UNSUPPORTED.to_vec(),
    }
}

/// `qSupported:f1;f2;...` — record what GDB advertises, reply with this
/// stub's own feature list.
pub fn q_supported(state: &mut SessionState, args: &[u8]) -> Vec<u8> {
    state.gdb_features.clear();
    for tok in args.split(|&b| b == b';') {
        if tok.is_empty() {
            continue;
        }
        let s = String::from_utf8_lossy(tok);
        let (name, value) = if let Some(stripped) = s.strip_suffix('+') {
            (stripped.to_string(), FeatureValue::Supported)
        } else if let Some(stripped) = s.strip_suffix('-') {
            (stripped.to_string(), FeatureValue::Unsupported)
        } else if let Some(stripped) = s.strip_suffix('?') {
            (stripped.to_string(), FeatureValue::NotSupported)
        } else if let Some((name, val)) = s.split_once('=') {
            let v = u64::from_str_radix(val, 16).unwrap_or(0);
            (name.to_string(), FeatureValue::Value(v))
        } else {
            (s.to_string(), FeatureValue::Supported)
        };
        state.gdb_features.insert(name, value);
    }

    let mut out = Vec::new();
    out.extend(b"PacketSize=4000");
    out.extend(b";QStartNoAckMode+");
    for (name, value) in &state.stub_features {
        out.push(b';');
        out.extend(name.as_bytes());
        match value {
            FeatureValue::Supported => out.push(b'+'),
            FeatureValue::Unsupported => out.push(b'-'),
            FeatureValue::NotSupported => out.push(b'?'),
            FeatureValue::Value(v) => {
                out.push(b'=');
                out.extend(format!("{:x}", v).as_bytes());
            }
        }
    }
    out
}

pub fn start_no_ack_mode(state: &mut SessionState) -> Vec<u8> {
    state.ack_enabled = false;
    OK.to_vec()
}

pub fn query_stop_reason<T: Target>(state: &mut SessionState, target: &mut T) -> CmdResult<T> {
    let rec = match target.last_stop_record() {
        Ok(rec) => rec,
        Err(TargetError::Fatal(e)) => return Err(e),
        Err(_) => return Ok(UNSUPPORTED.to_vec()),
    };
    emit_stop_reply(state, target, rec)
}

fn emit_stop_reply<T: Target>(
    state: &mut SessionState,
    target: &mut T,
    rec: crate::target::StopRecord,
) -> CmdResult<T> {
    if let Some(tid) = rec.tid {
        state.last_reported_stop_thread = tid;
    }
    let expedite = match target.read_frame_related_registers(rec.tid.unwrap_or(0)) {
        Ok(v) => Some(v),
        Err(TargetError::Fatal(e)) => return Err(e),
        Err(_) => None,
    };
    let indices: Vec<u32> = target
        .register_list()
        .registers
        .iter()
        .map(|r| r.index)
        .collect();
    Ok(encode_stop_reply(&rec, expedite.as_ref(), &indices))
}

/// `H op tid` — select the thread used for continue (`c`) or general (`g`)
/// operations. Verifies the thread the same way `T tid` does (the
/// thread-info cache), rather than forcing a live register read as a side
/// effect.
pub fn set_thread(state: &mut SessionState, args: &[u8]) -> Vec<u8> {
    let (op, tid_bytes) = match args.split_first() {
        Some(x) => x,
        None => return dispatch_error_reply(DispatchError::InvalidArgument),
    };
    let tid = match parse_hex_integer(tid_bytes) {
        Some(t) => t as u32,
        None => return dispatch_error_reply(DispatchError::InvalidArgument),
    };

    if tid != 0 && !thread_is_known(state, tid) {
        return dispatch_error_reply(DispatchError::NoSuchThread);
    }

    match op {
        b'c' => state.thread_for_cont_op = tid,
        b'g' => state.thread_for_reg_op = tid,
        _ => return dispatch_error_reply(DispatchError::InvalidArgument),
    }
    OK.to_vec()
}

pub fn read_all_registers<T: Target>(state: &SessionState, target: &mut T) -> CmdResult<T> {
    let tid = state.effective_reg_thread();
    let result = target.read_target_registers(tid);
    handle(result, |values| encode_register_block(target, &values), ENOSUCHTHREAD)
}

fn encode_register_block<T: Target>(target: &T, values: &RegisterValues) -> Vec<u8> {
    let mut out = Vec::new();
    for reg in target.register_list().registers {
        match values.get(reg.index as usize) {
            Some(v) if v.is_valid() => {
                for &b in v.as_bytes() {
                    append_hex_byte(&mut out, b);
                }
            }
            _ => {
                for _ in 0..reg.size_bytes() {
                    crate::hex::append_unknown_byte(&mut out);
                }
            }
        }
    }
    out
}

pub fn write_all_registers<T: Target>(
    state: &SessionState,
    target: &mut T,
    args: &[u8],
) -> CmdResult<T> {
    let tid = state.effective_reg_thread();
    let registers = target.register_list().registers;
    let mut values = RegisterValues::new(registers.len());

    let mut offset = 0usize;
    for reg in registers {
        let width = reg.size_bytes() * 2;
        let chunk = match args.get(offset..offset + width) {
            Some(c) => c,
            None => return Ok(dispatch_error_reply(DispatchError::InvalidArgument)),
        };
        let mut bytes = Vec::with_capacity(reg.size_bytes());
        for pair in chunk.chunks_exact(2) {
            match byte_from_hex(pair[0], pair[1]) {
                Some(b) => bytes.push(b),
                None => return Ok(dispatch_error_reply(DispatchError::InvalidArgument)),
            }
        }
        values.set(reg.index as usize, RegisterValue::from_bytes(&bytes));
        offset += width;
    }
    if offset != args.len() {
        return Ok(dispatch_error_reply(DispatchError::InvalidArgument));
    }

    status_reply(target.write_target_registers(tid, &values), ENOSUCHTHREAD)
}

pub fn write_one_register<T: Target>(
    state: &SessionState,
    target: &mut T,
    args: &[u8],
) -> CmdResult<T> {
    let tid = state.effective_reg_thread();
    let eq = match args.iter().position(|&b| b == b'=') {
        Some(p) => p,
        None => return Ok(dispatch_error_reply(DispatchError::InvalidArgument)),
    };
    let index = match parse_hex_integer(&args[..eq]) {
        Some(i) => i as u32,
        None => return Ok(dispatch_error_reply(DispatchError::InvalidArgument)),
    };
    let reg = match target.register_list().get(index) {
        Some(r) => *r,
        None => return Ok(dispatch_error_reply(DispatchError::InvalidArgument)),
    };

    let value_hex = &args[eq + 1..];
    if value_hex.len() != reg.size_bytes() * 2 {
        return Ok(dispatch_error_reply(DispatchError::InvalidArgument));
    }
    let mut bytes = Vec::with_capacity(reg.size_bytes());
    for pair in value_hex.chunks_exact(2) {
        match byte_from_hex(pair[0], pair[1]) {
            Some(b) => bytes.push(b),
            None => return Ok(dispatch_error_reply(DispatchError::InvalidArgument)),
        }
    }

    let mut values = RegisterValues::new(reg.index as usize + 1);
    values.set(reg.index as usize, RegisterValue::from_bytes(&bytes));
    status_reply(target.write_target_registers(tid, &values), ENOSUCHTHREAD)
}

fn parse_addr_len(args: &[u8]) -> Option<(u64, usize)> {
    let comma = args.iter().position(|&b| b == b',')?;
    let addr = parse_hex_integer(&args[..comma])?;
    let len = parse_hex_integer(&args[comma + 1..])? as usize;
    Some((addr, len))
}

pub fn read_memory<T: Target>(target: &mut T, args: &[u8]) -> CmdResult<T> {
    let (addr, len) = match parse_addr_len(args) {
        Some(x) => x,
        None => return Ok(dispatch_error_reply(DispatchError::InvalidArgument)),
    };
    let mut buf = vec![0u8; len];
    let result = target.read_target_memory(addr, &mut buf);
    handle(
        result,
        |n| {
            let mut out = Vec::with_capacity(n * 2);
            for &b in &buf[..n] {
                append_hex_byte(&mut out, b);
            }
            out
        },
        EFAULT,
    )
}

pub fn write_memory<T: Target>(target: &mut T, args: &[u8]) -> CmdResult<T> {
    let colon = match args.iter().position(|&b| b == b':') {
        Some(p) => p,
        None => return Ok(dispatch_error_reply(DispatchError::InvalidArgument)),
    };
    let (addr, len) = match parse_addr_len(&args[..colon]) {
        Some(x) => x,
        None => return Ok(dispatch_error_reply(DispatchError::InvalidArgument)),
    };
    let hex_data = &args[colon + 1..];
    if hex_data.len() != len * 2 {
        return Ok(dispatch_error_reply(DispatchError::InvalidArgument));
    }
    let mut data = Vec::with_capacity(len);
    for pair in hex_data.chunks_exact(2) {
        match byte_from_hex(pair[0], pair[1]) {
            Some(b) => data.push(b),
            None => return Ok(dispatch_error_reply(DispatchError::InvalidArgument)),
        }
    }
    status_reply(target.write_target_memory(addr, &data), EFAULT)
}

/// `X addr,len:binary` — binary memory write. `len == 0` is a probe: the
/// dispatcher must not call into the target at all.
pub fn write_memory_binary<T: Target>(target: &mut T, args: &[u8]) -> CmdResult<T> {
    let colon = match args.iter().position(|&b| b == b':') {
        Some(p) => p,
        None => return Ok(dispatch_error_reply(DispatchError::InvalidArgument)),
    };
    let (addr, len) = match parse_addr_len(&args[..colon]) {
        Some(x) => x,
        None => return Ok(dispatch_error_reply(DispatchError::InvalidArgument)),
    };
    if len == 0 {
        return Ok(OK.to_vec());
    }
    let data = unescape_binary(&args[colon + 1..]);
    status_reply(target.write_target_memory(addr, &data), EFAULT)
}

/// Reverse the `X`/binary-reply escaping (`}` followed by `byte ^ 0x20`
/// stands in for `#`, `$`, `}`, `*`).
fn unescape_binary(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i] == b'}' && i + 1 < data.len() {
            out.push(data[i + 1] ^ 0x20);
            i += 2;
        } else {
            out.push(data[i]);
            i += 1;
        }
    }
    out
}

pub fn resume<T: Target>(state: &mut SessionState, target: &mut T) -> CmdResult<T> {
    state.invalidate_on_resume();
    let tid = state.effective_cont_thread();
    match target.resume_and_wait(tid) {
        Ok(rec) => emit_stop_reply(state, target, rec),
        Err(TargetError::Fatal(e)) => Err(e),
        Err(_) => Ok(enn(ENOSUCHTHREAD)),
    }
}

pub fn step<T: Target>(state: &mut SessionState, target: &mut T) -> CmdResult<T> {
    state.invalidate_on_resume();
    let tid = state.effective_cont_thread();
    match target.step(tid) {
        Ok(rec) => emit_stop_reply(state, target, rec),
        Err(TargetError::Fatal(e)) => Err(e),
        Err(_) => Ok(enn(ENOSUCHTHREAD)),
    }
}

pub fn vcont_probe() -> Vec<u8> {
    b"vCont;c;C;s;S;t".to_vec()
}

pub fn vcont<T: Target>(
    state: &mut SessionState,
    target: &mut T,
    body: &[u8],
    known_threads: &[u32],
) -> CmdResult<T> {
    let actions = match vcont::resolve_actions(body, known_threads) {
        Some(a) => a,
        None => return Ok(dispatch_error_reply(DispatchError::InvalidArgument)),
    };

    if actions.iter().any(|&(_, m)| m != ContinueMode::Probe) {
        state.invalidate_on_resume();
    }

    let mut restore_queue = Vec::new();
    for &(tid, mode) in &actions {
        if mode == ContinueMode::Probe {
            continue;
        }
        let mut need_restore = false;
        match target.set_thread_mode_for_next_cont(tid, mode, &mut need_restore) {
            Ok(()) if need_restore => restore_queue.push(tid),
            Ok(()) => {}
            Err(TargetError::Fatal(e)) => return Err(e),
            Err(_) => {}
        }
    }

    let result = target.resume_and_wait(0);

    for tid in restore_queue {
        let mut need_restore = false;
        // Best-effort: a restore failing here doesn't change the reply
        // already determined by `result`.
        let _ = target.set_thread_mode_for_next_cont(tid, ContinueMode::Restore, &mut need_restore);
    }

    match result {
        Ok(rec) => emit_stop_reply(state, target, rec),
        Err(TargetError::Fatal(e)) => Err(e),
        Err(_) => Ok(enn(ENOSUCHTHREAD)),
    }
}

pub fn kill<T: Target>(target: &mut T) -> Vec<u8> {
    target.terminate();
    OK.to_vec()
}

pub fn set_breakpoint<T: Target>(
    state: &mut SessionState,
    target: &mut T,
    args: &[u8],
) -> CmdResult<T> {
    let (kind, addr, size, cond) = match parse_breakpoint_args(args) {
        Some(x) => x,
        None => return Ok(dispatch_error_reply(DispatchError::InvalidArgument)),
    };
    if cond.is_some() {
        return Ok(dispatch_error_reply(DispatchError::NotSupported));
    }
    let result = target.create_breakpoint(kind, addr, size);
    match result {
        Ok(cookie) => {
            state.breakpoint_table.insert((kind, addr), cookie);
            Ok(OK.to_vec())
        }
        Err(TargetError::NotSupported) => Ok(UNSUPPORTED.to_vec()),
        Err(TargetError::Errno(n)) => Ok(enn(n)),
        Err(TargetError::NonFatal) => Ok(enn(ENOSUCHTHREAD)),
        Err(TargetError::Fatal(e)) => Err(e),
    }
}

pub fn remove_breakpoint<T: Target>(
    state: &mut SessionState,
    target: &mut T,
    args: &[u8],
) -> CmdResult<T> {
    let (kind, addr, _size, _cond) = match parse_breakpoint_args(args) {
        Some(x) => x,
        None => return Ok(dispatch_error_reply(DispatchError::InvalidArgument)),
    };
    let cookie = match state.breakpoint_table.remove(&(kind, addr)) {
        Some(c) => c,
        None => return Ok(dispatch_error_reply(DispatchError::InvalidArgument)),
    };
    status_reply(target.remove_breakpoint(kind, addr, cookie), ENOSUCHTHREAD)
}

fn parse_breakpoint_args(args: &[u8]) -> Option<(BreakpointKind, u64, u64, Option<Vec<u8>>)> {
    let mut parts = args.splitn(2, |&b| b == b',');
    let kind_digit = parts.next()?;
    let rest = parts.next()?;
    let kind = match kind_digit {
        b"0" => BreakpointKind::Software,
        b"1" => BreakpointKind::Hardware,
        b"2" => BreakpointKind::WriteWatch,
        b"3" => BreakpointKind::ReadWatch,
        b"4" => BreakpointKind::AccessWatch,
        _ => return None,
    };
    let mut rest_parts = rest.splitn(2, |&b| b == b';');
    let addr_kind = rest_parts.next()?;
    let cond = rest_parts.next().map(|c| c.to_vec());
    let comma = addr_kind.iter().position(|&b| b == b',')?;
    let addr = parse_hex_integer(&addr_kind[..comma])?;
    let size = parse_hex_integer(&addr_kind[comma + 1..])?;
    Some((kind, addr, size, cond))
}

pub fn qcrc<T: Target>(target: &mut T, args: &[u8]) -> CmdResult<T> {
    let (addr, len) = match parse_addr_len(args) {
        Some(x) => x,
        None => return Ok(dispatch_error_reply(DispatchError::InvalidArgument)),
    };

    let mut crc = crate::crc32::Crc32::new();
    let mut remaining = len;
    let mut cur = addr;
    let mut buf = vec![0u8; crate::crc32::CRC_CHUNK_LEN];
    while remaining > 0 {
        let chunk_len = remaining.min(buf.len());
        match target.read_target_memory(cur, &mut buf[..chunk_len]) {
            Ok(n) => {
                crc.update(&buf[..n]);
                if n < chunk_len {
                    break;
                }
            }
            Err(TargetError::Fatal(e)) => return Err(e),
            Err(TargetError::Errno(n)) => return Ok(enn(n)),
            Err(_) => return Ok(enn(EFAULT)),
        }
        cur += chunk_len as u64;
        remaining -= chunk_len;
    }

    let mut out = vec![b'C'];
    for b in crc.finalize().to_be_bytes() {
        append_hex_byte(&mut out, b);
    }
    Ok(out)
}

pub fn qrcmd<T: Target>(target: &mut T, args: &[u8]) -> CmdResult<T> {
    let mut cmd = Vec::with_capacity(args.len() / 2);
    for pair in args.chunks(2) {
        if pair.len() != 2 {
            return Ok(dispatch_error_reply(DispatchError::InvalidArgument));
        }
        match byte_from_hex(pair[0], pair[1]) {
            Some(b) => cmd.push(b),
            None => return Ok(dispatch_error_reply(DispatchError::InvalidArgument)),
        }
    }

    let remote = match target.remote_command() {
        Some(r) => r,
        None => return Ok(UNSUPPORTED.to_vec()),
    };
    match remote.execute_remote_command(&cmd) {
        Ok(reply) if reply.is_empty() => Ok(OK.to_vec()),
        Ok(reply) => {
            let mut out = Vec::with_capacity(reply.len() * 2);
            for b in reply {
                append_hex_byte(&mut out, b);
            }
            Ok(out)
        }
        Err(TargetError::Fatal(e)) => Err(e),
        Err(TargetError::Errno(n)) => Ok(enn(n)),
        Err(_) => Ok(enn(ENOSUCHTHREAD)),
    }
}

pub fn vflash_erase<T: Target>(target: &mut T, args: &[u8]) -> CmdResult<T> {
    let (addr, len) = match parse_addr_len(args) {
        Some(x) => x,
        None => return Ok(dispatch_error_reply(DispatchError::InvalidArgument)),
    };
    let flash = match target.flash_programmer() {
        Some(f) => f,
        None => return Ok(UNSUPPORTED.to_vec()),
    };
    status_reply(flash.erase_flash(addr, len as u64), ENOSUCHTHREAD)
}

pub fn vflash_write<T: Target>(target: &mut T, args: &[u8]) -> CmdResult<T> {
    let colon = match args.iter().position(|&b| b == b':') {
        Some(p) => p,
        None => return Ok(dispatch_error_reply(DispatchError::InvalidArgument)),
    };
    let addr = match parse_hex_integer(&args[..colon]) {
        Some(a) => a,
        None => return Ok(dispatch_error_reply(DispatchError::InvalidArgument)),
    };
    let data = unescape_binary(&args[colon + 1..]);
    if data.is_empty() {
        return Ok(OK.to_vec());
    }
    let flash = match target.flash_programmer() {
        Some(f) => f,
        None => return Ok(UNSUPPORTED.to_vec()),
    };
    status_reply(flash.write_flash(addr, &data), ENOSUCHTHREAD)
}

pub fn vflash_done<T: Target>(target: &mut T) -> CmdResult<T> {
    let flash = match target.flash_programmer() {
        Some(f) => f,
        None => return Ok(UNSUPPORTED.to_vec()),
    };
    status_reply(flash.commit_flash_write(), ENOSUCHTHREAD)
}

pub fn q_first_thread_info<T: Target>(state: &mut SessionState, target: &mut T) -> CmdResult<T> {
    match target.thread_list() {
        Ok(threads) => {
            state.thread_info_cache.threads = threads
                .into_iter()
                .map(|t| (t.thread_id, t.user_friendly_name))
                .collect();
            state.thread_info_cache.valid = true;
            state.thread_info_cache.next = 0;
            Ok(q_subsequent_thread_info(state))
        }
        Err(TargetError::Fatal(e)) => Err(e),
        Err(_) => Ok(UNSUPPORTED.to_vec()),
    }
}

pub fn q_subsequent_thread_info(state: &mut SessionState) -> Vec<u8> {
    if !state.thread_info_cache.valid
        || state.thread_info_cache.next >= state.thread_info_cache.threads.len()
    {
        return b"l".to_vec();
    }
    let mut out = vec![b'm'];
    let remaining = &state.thread_info_cache.threads[state.thread_info_cache.next..];
    for (i, (tid, _)) in remaining.iter().enumerate() {
        if i > 0 {
            out.push(b',');
        }
        out.extend(format!("{:x}", tid).as_bytes());
    }
    state.thread_info_cache.next = state.thread_info_cache.threads.len();
    out
}

pub fn q_thread_extra_info(state: &SessionState, args: &[u8]) -> Vec<u8> {
    let tid = match parse_hex_integer(args) {
        Some(t) => t as u32,
        None => return dispatch_error_reply(DispatchError::InvalidArgument),
    };
    match state.thread_info_cache.threads.iter().find(|(id, _)| *id == tid) {
        Some((_, name)) => {
            let mut out = Vec::with_capacity(name.len() * 2);
            for b in name.as_bytes() {
                append_hex_byte(&mut out, *b);
            }
            out
        }
        None => UNSUPPORTED.to_vec(),
    }
}

/// Whether `tid` is known to be alive, per the thread-info cache. Mirrors
/// `T tid`'s own optimism: with no cache populated yet, any tid is assumed
/// alive rather than rejected.
fn thread_is_known(state: &SessionState, tid: u32) -> bool {
    !state.thread_info_cache.valid
        || state
            .thread_info_cache
            .threads
            .iter()
            .any(|(id, _)| *id == tid)
}

pub fn thread_alive(state: &SessionState, args: &[u8]) -> Vec<u8> {
    let tid = match parse_hex_integer(args) {
        Some(t) => t as u32,
        None => return dispatch_error_reply(DispatchError::InvalidArgument),
    };
    if thread_is_known(state, tid) {
        OK.to_vec()
    } else {
        dispatch_error_reply(DispatchError::NoSuchThread)
    }
}

pub fn q_current_thread(state: &SessionState) -> Vec<u8> {
    let mut out = b"QC".to_vec();
    out.extend(format!("{:x}", state.last_reported_stop_thread).as_bytes());
    out
}

pub fn qxfer_request<T: Target>(
    target: &mut T,
    state: &SessionState,
    args: &[u8],
) -> CmdResult<T> {
    let req = match qxfer::parse_request(args) {
        Some(r) => r,
        None => return Ok(dispatch_error_reply(DispatchError::InvalidArgument)),
    };

    let document = match req.object {
        b"libraries" => match target.dynamic_library_list() {
            Ok(libs) => xml::library_list(&libs),
            Err(TargetError::Fatal(e)) => return Err(e),
            Err(_) => return Ok(UNSUPPORTED.to_vec()),
        },
        b"threads" => match target.thread_list() {
            Ok(threads) => xml::thread_list(&threads),
            Err(TargetError::Fatal(e)) => return Err(e),
            Err(_) => return Ok(UNSUPPORTED.to_vec()),
        },
        b"memory-map" => xml::memory_map(&state.memory_regions),
        _ => return Ok(UNSUPPORTED.to_vec()),
    };

    if document.is_empty() {
        return Ok(UNSUPPORTED.to_vec());
    }
    Ok(qxfer::serve_window(document.as_bytes(), req.offset, req.length))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enn_formats_two_hex_digits() {
        assert_eq!(enn(0x16), b"E16");
        assert_eq!(enn(0x01), b"E01");
    }

    #[test]
    fn unescape_binary_reverses_escape() {
        assert_eq!(unescape_binary(b"a}\x04b"), b"a#b");
    }

    #[test]
    fn parse_breakpoint_args_rejects_condition() {
        let (kind, addr, size, cond) = parse_breakpoint_args(b"0,1000,4;cond").unwrap();
        assert_eq!(kind, BreakpointKind::Software);
        assert_eq!(addr, 0x1000);
        assert_eq!(size, 4);
        assert!(cond.is_some());
    }
}
