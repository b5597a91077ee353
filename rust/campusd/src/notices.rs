//! User-visible notices ("toasts"). Fire-and-forget: nothing reads them back
//! to make a decision, and every failure is also returned as an error.
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

pub trait Notifier {
    fn notify(&mut self, kind: NoticeKind, message: String);
}

/// Holds notices until the host drains them.
#[derive(Debug, Default)]
pub struct NoticeQueue {
    pending: Vec<Notice>,
}

impl NoticeQueue {
    const CAPACITY: usize = 100;

    pub fn drain(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.pending)
    }
}

impl Notifier for NoticeQueue {
    fn notify(&mut self, kind: NoticeKind, message: String) {
        // A host that never drains must not grow us without bound.
        if self.pending.len() >= Self::CAPACITY {
            self.pending.remove(0);
        }
        self.pending.push(Notice { kind, message });
    }
}
