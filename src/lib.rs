#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![cfg_attr(not(test), no_std)]

pub mod assigned;
pub mod payload;

pub use payload::{AdvertisingData, MAX_PAYLOAD_SIZE};
