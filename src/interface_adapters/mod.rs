// Interface adapters: HTTP client and storage backends behind the domain ports.

pub mod clients;
pub mod protocol;
pub mod storage;
