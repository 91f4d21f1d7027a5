pub mod spend;
