// Reading position tracking: where the reader is, where to resume, and when to persist.

pub mod debounce;
pub mod observer;
pub mod persister;
pub mod resume;
pub mod session;
