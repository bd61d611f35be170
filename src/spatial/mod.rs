//! Spatial Index & Nearest Lookup (C3). One R-tree per facility class, built
//! once at startup from static datasets and queried read-only thereafter.

pub mod graph;

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::{mode::FacilityClass, shared::Coordinate};

/// A single indexed point of interest: a parking spot, rental dock, or
/// public-transport station, tagged with whatever submode labels apply.
#[derive(Debug, Clone)]
pub struct Facility {
    pub coordinate: Coordinate,
    pub name: String,
    pub mode_tags: Vec<String>,
}

impl RTreeObject for Facility {
    type Envelope = AABB<[f32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.coordinate.longitude, self.coordinate.latitude])
    }
}

impl PointDistance for Facility {
    fn distance_2(&self, point: &[f32; 2]) -> f32 {
        let dx = self.coordinate.longitude - point[0];
        let dy = self.coordinate.latitude - point[1];
        dx * dx + dy * dy
    }
}

/// A collection of R-trees keyed by facility class. Immutable after
/// construction; reads never take a lock.
#[derive(Default)]
pub struct SpatialIndex {
    public_transport: RTree<Facility>,
    bike_parking: RTree<Facility>,
    car_parking: RTree<Facility>,
    bike_rental: RTree<Facility>,
    escooter_rental: RTree<Facility>,
    car_rental: RTree<Facility>,
}

impl SpatialIndex {
    pub fn build(facilities: impl IntoIterator<Item = (FacilityClass, Facility)>) -> Self {
        let mut buckets: [Vec<Facility>; 6] = Default::default();
        for (class, facility) in facilities {
            buckets[class as usize].push(facility);
        }
        let [public_transport, bike_parking, car_parking, bike_rental, escooter_rental, car_rental] =
            buckets;
        Self {
            public_transport: RTree::bulk_load(public_transport),
            bike_parking: RTree::bulk_load(bike_parking),
            car_parking: RTree::bulk_load(car_parking),
            bike_rental: RTree::bulk_load(bike_rental),
            escooter_rental: RTree::bulk_load(escooter_rental),
            car_rental: RTree::bulk_load(car_rental),
        }
    }

    fn tree(&self, class: FacilityClass) -> &RTree<Facility> {
        match class {
            FacilityClass::PublicTransport => &self.public_transport,
            FacilityClass::BikeParking => &self.bike_parking,
            FacilityClass::CarParking => &self.car_parking,
            FacilityClass::BikeRental => &self.bike_rental,
            FacilityClass::EscooterRental => &self.escooter_rental,
            FacilityClass::CarRental => &self.car_rental,
        }
    }

    /// The k nearest facilities of `class` to `point`.
    pub fn nearest(&self, class: FacilityClass, point: Coordinate, k: usize) -> Vec<&Facility> {
        self.tree(class)
            .nearest_neighbor_iter(&[point.longitude, point.latitude])
            .take(k)
            .collect()
    }

    /// As [`nearest`](Self::nearest), but only candidates whose coordinate
    /// satisfies `within` (e.g. region-polygon containment) are returned.
    pub fn nearest_filtered(
        &self,
        class: FacilityClass,
        point: Coordinate,
        k: usize,
        within: impl Fn(Coordinate) -> bool,
    ) -> Vec<&Facility> {
        self.tree(class)
            .nearest_neighbor_iter(&[point.longitude, point.latitude])
            .filter(|f| within(f.coordinate))
            .take(k)
            .collect()
    }
}
