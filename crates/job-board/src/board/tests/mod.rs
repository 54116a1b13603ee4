mod common;
mod expiry;
