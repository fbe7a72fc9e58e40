pub mod api;
pub mod commit;
pub mod compress;
pub mod extraction;
pub mod leftovers;
pub mod queue;
pub mod session;
pub mod upload;
