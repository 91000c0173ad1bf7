pub mod retry;
pub mod text;
