pub mod commit;
pub mod draft;
pub mod job;
pub mod payload;
pub mod quantity;
