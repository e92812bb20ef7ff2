pub mod email_batch;
pub mod email_entry;
