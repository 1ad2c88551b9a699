pub mod aggregate;
pub mod availability;
pub mod pantry_ops;
pub mod review;
pub mod seed;
pub mod thread_ops;
