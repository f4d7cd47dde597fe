//! `vCont` action-list parsing and per-thread resolution.

use crate::hex::parse_hex_integer;
use crate::target::ContinueMode;

/// One `action[:tid]` token from a `vCont;...` packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Token {
    mode: ContinueMode,
    tid: Option<u32>,
}

fn mode_from_action(action: u8) -> Option<ContinueMode> {
    match action {
        b'c' | b'C' => Some(ContinueMode::Probe),
        b's' | b'S' => Some(ContinueMode::SingleStep),
        b't' => Some(ContinueMode::Suspend),
        _ => None,
    }
}

fn parse_token(raw: &[u8]) -> Option<Token> {
    let (&action, rest) = raw.split_first()?;
    let mode = mode_from_action(action)?;
    let tid = match rest.split_first() {
        Some((b':', tid_bytes)) => Some(parse_hex_integer(tid_bytes)? as u32),
        None => None,
        _ => return None,
    };
    Some(Token { mode, tid })
}

/// Resolve the effective per-thread continuation mode for a `vCont` action
/// list, given the full set of thread ids known to the dispatcher.
///
/// Threads with no matching token (explicit or default) resolve to `Probe`.
/// The result preserves `known_threads`' order followed by any explicitly
/// named thread the dispatcher didn't already know about, in the order
/// their tokens appeared — callers (the restore-queue replay) rely on this
/// being a stable, deterministic order rather than hash-map iteration.
/// Returns `None` if any action token fails to parse.
pub fn resolve_actions(body: &[u8], known_threads: &[u32]) -> Option<Vec<(u32, ContinueMode)>> {
    let mut default_mode = ContinueMode::Probe;
    let mut per_thread: Vec<(u32, ContinueMode)> = Vec::new();

    for raw in body.split(|&b| b == b';').skip(1) {
        if raw.is_empty() {
            continue;
        }
        let token = parse_token(raw)?;
        match token.tid {
            Some(tid) => {
                if let Some(slot) = per_thread.iter_mut().find(|(t, _)| *t == tid) {
                    slot.1 = token.mode;
                } else {
                    per_thread.push((tid, token.mode));
                }
            }
            None => default_mode = token.mode,
        }
    }

    let mode_for = |tid: u32| {
        per_thread
            .iter()
            .find(|(t, _)| *t == tid)
            .map(|(_, m)| *m)
            .unwrap_or(default_mode)
    };

    let mut resolved: Vec<(u32, ContinueMode)> = known_threads
        .iter()
        .map(|&tid| (tid, mode_for(tid)))
        .collect();
    for &(tid, mode) in &per_thread {
        if !known_threads.contains(&tid) {
            resolved.push((tid, mode));
        }
    }

    Some(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode_of(resolved: &[(u32, ContinueMode)], tid: u32) -> ContinueMode {
        resolved.iter().find(|(t, _)| *t == tid).unwrap().1
    }

    #[test]
    fn mixed_actions_resolve_per_thread() {
        let resolved = resolve_actions(b"vCont;s:1;c:2;t:3", &[1, 2, 3]).unwrap();
        assert_eq!(mode_of(&resolved, 1), ContinueMode::SingleStep);
        assert_eq!(mode_of(&resolved, 2), ContinueMode::Probe);
        assert_eq!(mode_of(&resolved, 3), ContinueMode::Suspend);
    }

    #[test]
    fn default_action_applies_to_unlisted_threads() {
        let resolved = resolve_actions(b"vCont;s", &[1, 2]).unwrap();
        assert_eq!(mode_of(&resolved, 1), ContinueMode::SingleStep);
        assert_eq!(mode_of(&resolved, 2), ContinueMode::SingleStep);
    }

    #[test]
    fn order_follows_known_threads_then_explicit_extras() {
        let resolved = resolve_actions(b"vCont;s:9;c:2", &[1, 2]).unwrap();
        let order: Vec<u32> = resolved.iter().map(|(tid, _)| *tid).collect();
        assert_eq!(order, vec![1, 2, 9]);
    }

    #[test]
    fn malformed_action_is_rejected() {
        assert!(resolve_actions(b"vCont;Q:1", &[1]).is_none());
    }
}
