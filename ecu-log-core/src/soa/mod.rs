//! SOA service bus counter analysis
//!
//! The ECU periodically dumps its flat SOA counter array in slices:
//!
//! ```text
//! 2025-08-25 16:52:08.434 BZCU I 5ae0 SOA cnt on0:20,45109,0,7
//! 2025-08-25 16:52:08.434 BZCU I 5ae1 SOA cnt on4:3,0,12
//! 2025-08-25 16:52:08.434 BZCU I 5ae2 SOA ASW drop cnt on0:0,1,0,0
//! ```
//!
//! Slots are positional. A channel manifest (the `TOPIC` list of the bus
//! summary JSON) names each slot; a topic listed twice owns a receive slot
//! (first occurrence) and a send slot (second occurrence).

pub mod parser;
pub mod reconstruct;

pub use parser::{load_manifest, manifest_from_json, SoaLineParser};
pub use reconstruct::{ChannelSeries, LogDetail, ServiceBusReconstructor, SummarySeries};
