//! Notification sound.
//!
//! The headless client has no audio backend; it rings the terminal bell.

use std::io::Write;

/// Play the notification sound for new messages.
pub fn play_notification() {
    let mut stderr = std::io::stderr();
    let _ = stderr.write_all(b"\x07");
    let _ = stderr.flush();
}
