// Command sources feeding the ingestor, and the status echo
//
// - zenoh: subscriber (fire-and-forget), queryable (acknowledged), status publisher
// - serial: byte stream from a serial Bluetooth/RF modem

pub mod serial;
pub mod zenoh_link;
