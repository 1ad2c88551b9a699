pub mod backend;
pub mod config_io;
pub mod data_dir;
pub mod lock;
pub mod recovery;
pub mod save_queue;
pub mod state;
pub mod watcher;
