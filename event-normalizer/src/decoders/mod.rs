//! Decoders for the sensor families deployed by MHN.
//!
//! Each decoder handles the channel(s) of one honeypot or IDS and maps its
//! payload onto the canonical key set.

mod amun;
mod beeswarm;
mod conpot;
mod dionaea;
mod elastichoney;
mod glastopf;
mod ids;
mod kippo;
mod p0f;
mod shockpot;
mod wordpot;

pub use amun::AmunDecoder;
pub use beeswarm::BeeswarmDecoder;
pub use conpot::ConpotDecoder;
pub use dionaea::DionaeaDecoder;
pub use elastichoney::ElastichoneyDecoder;
pub use glastopf::GlastopfDecoder;
pub use ids::IdsAlertDecoder;
pub use kippo::KippoDecoder;
pub use p0f::P0fDecoder;
pub use shockpot::ShockpotDecoder;
pub use wordpot::WordpotDecoder;

use crate::decoder::ChannelDecoder;

/// Channels the default decoders cover, which is also the default
/// subscription list.
pub const DEFAULT_CHANNELS: [&str; 13] = [
    "amun.events",
    "beeswarm.hive",
    "conpot.events",
    "dionaea.capture",
    "dionaea.connections",
    "elastichoney.events",
    "glastopf.events",
    "kippo.sessions",
    "p0f.events",
    "shockpot.events",
    "snort.alerts",
    "suricata.events",
    "wordpot.events",
];

/// Create the default set of decoders for MHN sensor channels
pub fn default_decoders() -> Vec<Box<dyn ChannelDecoder>> {
    vec![
        Box::new(AmunDecoder),
        Box::new(BeeswarmDecoder),
        Box::new(ConpotDecoder),
        Box::new(DionaeaDecoder),
        Box::new(ElastichoneyDecoder),
        Box::new(GlastopfDecoder),
        Box::new(IdsAlertDecoder),
        Box::new(KippoDecoder),
        Box::new(P0fDecoder),
        Box::new(ShockpotDecoder),
        Box::new(WordpotDecoder),
    ]
}
