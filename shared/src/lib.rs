// Data models shared by the scanning engine and its collaborators.
pub mod models;
pub mod utils;
