pub mod energy;
pub mod equipment;
pub mod site;
pub mod telemetry;
pub mod time_unit;

pub use energy::{Energy, EnergySample};
pub use equipment::{
    Battery, Equipment, EquipmentKind, Gateway, Inventory, Inverter, Meter, Sensor, SmiDevice,
};
pub use site::{Location, PrimaryModule, Site};
pub use telemetry::{PhaseData, Telemetry};
pub use time_unit::{TimeUnit, TimeWindow};

/// Upstream site identifier. Integers on the wire, opaque strings everywhere else.
pub type SiteId = String;

/// Equipment identity within a site.
pub type SerialNumber = String;
