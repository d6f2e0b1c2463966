mod book;
mod event_queue;
mod venue;

pub use book::*;
pub use event_queue::*;
pub use venue::*;
