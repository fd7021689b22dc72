//! The watch delivery thread.

use crate::channel::{FramedStream, Received};
use optbus_protocol::{is_bye, WatchNotice, ACK};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// What the watch thread hands to the user callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientWatchEvent {
    /// A watched entry was set on the server.
    Changed {
        /// Entry path.
        path: String,
        /// New value in text form.
        value: String,
    },
    /// The watch channel is gone; no further events follow.
    Closed,
}

/// Callback receiving watch events on the watch thread.
pub type WatchHandler = Box<dyn FnMut(ClientWatchEvent) + Send + 'static>;

pub(crate) fn run(mut channel: FramedStream, mut handler: WatchHandler, quit: Arc<AtomicBool>) {
    loop {
        if quit.load(Ordering::Acquire) {
            break;
        }
        let frame = match channel.recv() {
            Ok(Received::Frame(frame)) => frame,
            Ok(Received::TimedOut) => continue,
            Ok(Received::Closed) => break,
            Err(err) => {
                if !quit.load(Ordering::Acquire) {
                    debug!("Watch channel read failed: {}", err);
                }
                break;
            }
        };
        if is_bye(&frame) {
            debug!("Server closed the watch channel");
            break;
        }

        match WatchNotice::parse(&frame) {
            Ok(notice) => handler(ClientWatchEvent::Changed {
                path: notice.path,
                value: notice.value,
            }),
            Err(err) => warn!("Ignoring watch frame: {}", err),
        }
        if let Err(err) = channel.send(ACK) {
            debug!("Watch acknowledgement failed: {}", err);
            break;
        }
    }
    handler(ClientWatchEvent::Closed);
}
