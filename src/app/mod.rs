pub(crate) mod classify;
pub(crate) mod console;
pub(crate) mod error;
pub(crate) mod generator;
pub(crate) mod launcher;
pub(crate) mod manager;
pub(crate) mod media;
pub(crate) mod probe;
pub(crate) mod process;
pub(crate) mod result;
pub(crate) mod scenario;

pub use self::error::Error;
pub use self::launcher::Launcher;
