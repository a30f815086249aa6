pub mod audit;
pub mod backend_client;
pub mod draft;
pub mod export;
pub mod inbox;
pub mod metrics;
pub mod session;
pub mod storage;
pub mod uploader;
pub mod vendors;
pub mod workflow;
