pub mod console;
pub mod crypto;
pub mod fs;
pub mod kv;
pub mod net;
pub mod process;
pub mod timers;
pub mod zlib;
