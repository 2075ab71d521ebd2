pub mod constants;
pub mod data_handle;
pub mod error;
pub mod export;
pub mod format;
pub mod reader;

#[cfg(test)]
pub mod test_support;
