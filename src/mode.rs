//! Transport mode enumeration and the static per-mode profile table.
//!
//! Every axis that varied per-mode in the source material (ride mode,
//! facility class, sampling radius, scoring weight) is a plain match on
//! [`TransportMode`] here rather than a trait object hierarchy.

use crate::shared::Distance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportMode {
    Walk,
    Cycle,
    SelfDriveCar,
    BicycleRental,
    EscooterRental,
    CarSharing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacilityClass {
    PublicTransport,
    BikeParking,
    CarParking,
    BikeRental,
    EscooterRental,
    CarRental,
}

/// Broad family used for scoring and sampling-constant lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeFamily {
    Walk,
    CycleFamily,
    CarFamily,
}

impl TransportMode {
    pub const fn is_rental(self) -> bool {
        matches!(
            self,
            TransportMode::BicycleRental | TransportMode::EscooterRental | TransportMode::CarSharing
        )
    }

    pub const fn is_private(self) -> bool {
        matches!(self, TransportMode::Cycle | TransportMode::SelfDriveCar)
    }

    /// The mode actually used for the "ride" leg of a rental chain. For
    /// non-rental modes this is just the mode itself.
    pub const fn ride_mode(self) -> TransportMode {
        match self {
            TransportMode::BicycleRental => TransportMode::Cycle,
            TransportMode::EscooterRental => TransportMode::Cycle,
            TransportMode::CarSharing => TransportMode::SelfDriveCar,
            other => other,
        }
    }

    pub const fn family(self) -> ModeFamily {
        match self {
            TransportMode::Walk => ModeFamily::Walk,
            TransportMode::Cycle | TransportMode::BicycleRental | TransportMode::EscooterRental => {
                ModeFamily::CycleFamily
            }
            TransportMode::SelfDriveCar | TransportMode::CarSharing => ModeFamily::CarFamily,
        }
    }

    /// Facility class queried for a destination POI under this mode.
    pub const fn destination_class(self) -> FacilityClass {
        match self {
            TransportMode::Walk | TransportMode::Cycle | TransportMode::SelfDriveCar => {
                FacilityClass::PublicTransport
            }
            TransportMode::BicycleRental => FacilityClass::BikeRental,
            TransportMode::EscooterRental => FacilityClass::EscooterRental,
            TransportMode::CarSharing => FacilityClass::CarRental,
        }
    }

    /// Facility class queried for the user's private-mode parking.
    pub const fn parking_class(self) -> Option<FacilityClass> {
        match self {
            TransportMode::Cycle => Some(FacilityClass::BikeParking),
            TransportMode::SelfDriveCar => Some(FacilityClass::CarParking),
            _ => None,
        }
    }

    /// `weight_mode` from the candidate-scoring design: car-family modes
    /// discount the ride leg relative to everything else.
    pub fn weight_mode(self) -> f64 {
        match self.family() {
            ModeFamily::CarFamily => 0.5,
            _ => 0.7,
        }
    }

    /// `base_max_distance`, in meters, used as the un-boosted walk-distance
    /// ceiling in candidate evaluation.
    pub fn base_max_distance(self) -> Distance {
        match self.family() {
            ModeFamily::CarFamily => Distance::from_meters(800.0),
            _ => Distance::from_meters(600.0),
        }
    }
}

/// Per-submode priority used by the candidate evaluator. Submode tags come
/// from station metadata (`mode_tags`), not from [`TransportMode`] itself.
pub fn submode_priority(tag: &str) -> u8 {
    match tag {
        "rail" | "TRAIN" | "air" => 2,
        "tram" | "TRAM" | "suburbanRail" | "urbanRail" | "metro" | "underground" | "water"
        | "taxi" | "selfDrive" | "METRO" | "RACK_RAILWAY" | "BOAT" => 1,
        _ => 0,
    }
}

pub const BOOST_FACTOR: f64 = 0.05;
pub const PRIORITY_BOOST_FACTOR: f64 = 0.10;
pub const WEIGHT_FACTOR_BASE: f64 = 0.05;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rental_modes_map_to_ride_modes() {
        assert_eq!(TransportMode::BicycleRental.ride_mode(), TransportMode::Cycle);
        assert_eq!(TransportMode::EscooterRental.ride_mode(), TransportMode::Cycle);
        assert_eq!(
            TransportMode::CarSharing.ride_mode(),
            TransportMode::SelfDriveCar
        );
        assert_eq!(TransportMode::Walk.ride_mode(), TransportMode::Walk);
    }

    #[test]
    fn base_max_distance_splits_car_family() {
        assert_eq!(
            TransportMode::SelfDriveCar.base_max_distance(),
            Distance::from_meters(800.0)
        );
        assert_eq!(
            TransportMode::Walk.base_max_distance(),
            Distance::from_meters(600.0)
        );
    }

    #[test]
    fn submode_priority_table() {
        assert_eq!(submode_priority("rail"), 2);
        assert_eq!(submode_priority("bus"), 0);
        assert_eq!(submode_priority("tram"), 1);
    }
}
