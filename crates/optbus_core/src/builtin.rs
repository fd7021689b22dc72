//! Entries every registry starts with.

use crate::entry::EntryInfo;
use crate::hooks::{GetContext, Hooks};
use crate::ini::format_value;
use crate::registry::Registry;
use crate::types::{Value, ValueType, WatchPhase};
use std::fmt::Write;

/// Set to 0 at the start of every session.
pub const SESSION_START: &str = "i:/k/opt/session/start";
/// Set to the cancel flag when a session is committed.
pub const SESSION_DONE: &str = "i:/k/opt/session/done";
/// Connection hash of the last command channel that connected.
pub const RPC_COMMAND_CONNECT: &str = "s:/k/opt/rpc/o/connect";
/// Connection hash of the last command channel that disconnected.
pub const RPC_COMMAND_DISCONNECT: &str = "s:/k/opt/rpc/o/disconnect";
/// Connection hash of the last watch channel that connected.
pub const RPC_WATCH_CONNECT: &str = "s:/k/opt/rpc/w/connect";
/// Connection hash of the last watch channel that disconnected.
pub const RPC_WATCH_DISCONNECT: &str = "s:/k/opt/rpc/w/disconnect";
/// All paths, one per `\r\n` terminated line.
pub const DIAG_LIST: &str = "s:/k/opt/diag/list";
/// Table of hooks, counters and values.
pub const DIAG_DUMP: &str = "s:/k/opt/diag/dump";
/// Paths of watches still waiting for their entry.
pub const DIAG_PENDING_WATCHES: &str = "s:/k/opt/wch/notyet";

const DUMP_HEADER: &str = "\r\nS:G:D   SC:  GC: AWC: BWC AC:BC PATH ...\r\n";

pub(crate) fn install(registry: &Registry) {
    let plain = [
        (SESSION_START, ValueType::Int, "session started"),
        (SESSION_DONE, ValueType::Int, "session committed"),
        (RPC_COMMAND_CONNECT, ValueType::Str, "rpc command channel connected"),
        (RPC_COMMAND_DISCONNECT, ValueType::Str, "rpc command channel closed"),
        (RPC_WATCH_CONNECT, ValueType::Str, "rpc watch channel connected"),
        (RPC_WATCH_DISCONNECT, ValueType::Str, "rpc watch channel closed"),
    ];
    for (path, value_type, description) in plain {
        registry.insert_builtin(path, value_type, description, Hooks::new());
    }

    registry.insert_builtin(
        DIAG_LIST,
        ValueType::Str,
        "list of all entries",
        Hooks::new().with_getter(|ctx: &GetContext<'_>| Ok(Some(Value::Str(list(ctx.registry()))))),
    );
    registry.insert_builtin(
        DIAG_DUMP,
        ValueType::Str,
        "dump of all entries",
        Hooks::new().with_getter(|ctx: &GetContext<'_>| Ok(Some(Value::Str(dump(ctx.registry()))))),
    );
    registry.insert_builtin(
        DIAG_PENDING_WATCHES,
        ValueType::Str,
        "watches waiting for their entry",
        Hooks::new().with_getter(|ctx: &GetContext<'_>| {
            Ok(Some(Value::Str(pending_watches(ctx.registry()))))
        }),
    );
}

fn list(registry: &Registry) -> String {
    let mut out = String::new();
    for path in registry.paths() {
        out.push_str(&path);
        out.push_str("\r\n");
    }
    out
}

fn dump(registry: &Registry) -> String {
    let mut out = String::from(DUMP_HEADER);
    registry.for_each(None, |info| dump_line(&mut out, info));
    out
}

fn dump_line(out: &mut String, info: &EntryInfo) {
    let value = match info.value_type {
        ValueType::Blob => match &info.current {
            Value::Blob(bytes) => format!("l:{}", bytes.len()),
            other => format_value(other),
        },
        _ => format_value(&info.current),
    };
    let _ = write!(
        out,
        "{}:{}:{} {:4}:{:4}:{:4}:{:4} {:2}:{:2} {:<30}\t{}\r\n",
        u8::from(info.has_setter),
        u8::from(info.has_getter),
        u8::from(info.has_deleter),
        info.stats.set_calls,
        info.stats.get_calls,
        info.stats.after_watch_calls,
        info.stats.before_watch_calls,
        info.after_watchers,
        info.before_watchers,
        info.path,
        value
    );
}

fn pending_watches(registry: &Registry) -> String {
    let mut out = String::from("after:\n");
    for path in registry.pending_watch_paths(WatchPhase::After) {
        out.push_str(&path);
        out.push('\n');
    }
    out.push_str("\nbefore:\n");
    for path in registry.pending_watch_paths(WatchPhase::Before) {
        out.push_str(&path);
        out.push('\n');
    }
    out
}
