pub mod auto_reply;
pub mod slack;
pub mod worker;
