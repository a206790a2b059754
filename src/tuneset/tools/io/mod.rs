pub mod google;
pub mod jsonl;
pub mod sheets;
